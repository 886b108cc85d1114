use crate::{
    converge::{converge, Converged},
    store::{Store, StoreError},
};
use frpc_controller_core::RenderError;
use frpc_controller_k8s_api::{FrpcClient, Proxy, ResourceId};
use frpc_controller_k8s_builder::{self as builder, AgentSettings};
use std::{sync::Arc, time::Duration};

/// Drives `Client` and `Proxy` objects toward their derived state.
///
/// Each pass re-reads everything it needs from the store, so passes may be
/// retried, reordered or abandoned at any await point.
#[derive(Clone)]
pub struct Reconciler<S> {
    pub(crate) store: S,
    pub(crate) settings: Arc<AgentSettings>,
}

/// How a successful pass left its object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reconciled {
    /// The object does not exist.
    Missing,
    /// Deletion was requested and nothing of ours holds the object.
    Gone,
    /// The finalizer was added; the update triggers the next pass.
    FinalizerAdded,
    Converged,
    /// A proxy's client is missing or terminating, so there is nothing to
    /// rebuild.
    Orphaned,
    /// Teardown completed and the finalizer was released.
    TornDown,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to render config for client {client}: {source}")]
    Render {
        client: ResourceId,
        #[source]
        source: RenderError,
    },

    #[error("reconciliation did not complete within {0:?}")]
    Timeout(Duration),
}

// === impl Reconciler ===

impl<S: Store> Reconciler<S> {
    pub fn new(store: S, settings: AgentSettings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
        }
    }

    /// Re-renders a client's config from a fresh listing of its proxies and
    /// writes it to the client's config map.
    ///
    /// Proxies that are being deleted are left out.
    pub(crate) async fn converge_config(
        &self,
        id: &ResourceId,
        client: &FrpcClient,
    ) -> Result<Converged, Error> {
        let proxies = self.store.list::<Proxy>(&id.namespace).await?;
        let owned = proxies
            .iter()
            .filter(|proxy| proxy.is_active_for(&id.name))
            .collect::<Vec<_>>();

        let config = builder::agent_config(client, &owned, &self.settings).map_err(|source| {
            Error::Render {
                client: id.clone(),
                source,
            }
        })?;
        let converged = converge(&self.store, builder::config_map(id, config)).await?;
        tracing::debug!(proxies = owned.len(), ?converged, "ConfigMap");
        Ok(converged)
    }
}

// === impl Reconciled ===

impl Reconciled {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Gone => "gone",
            Self::FinalizerAdded => "finalizer_added",
            Self::Converged => "converged",
            Self::Orphaned => "orphaned",
            Self::TornDown => "torn_down",
        }
    }
}

// === impl Error ===

impl Error {
    /// Render failures only clear once the input changes, so retrying them
    /// on a short interval is pointless.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Render { .. })
    }

    pub(crate) fn reason(&self) -> &'static str {
        match self {
            Self::Store(error) => error.reason(),
            Self::Render { .. } => "render",
            Self::Timeout(_) => "timeout",
        }
    }
}
