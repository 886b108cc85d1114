use crate::{
    reconcile::{Error, Reconciled, Reconciler},
    store::Store,
};
use frpc_controller_k8s_api::{lifecycle, FrpcClient, Lifecycle, Proxy, ResourceId};
use tracing::{debug, info, instrument};

impl<S: Store> Reconciler<S> {
    /// Runs one pass of the `Proxy` lifecycle.
    ///
    /// Both a change and a deletion reduce to rebuilding the owning client's
    /// config map from a fresh listing; a proxy being deleted is excluded
    /// from that listing, and its finalizer is released afterwards.
    #[instrument(skip_all, fields(namespace = %id.namespace, name = %id.name))]
    pub async fn reconcile_proxy(&self, id: &ResourceId) -> Result<Reconciled, Error> {
        let Some(mut proxy) = self.store.get::<Proxy>(id).await? else {
            debug!("Proxy not found");
            return Ok(Reconciled::Missing);
        };

        match Lifecycle::of(&proxy) {
            Lifecycle::Gone => Ok(Reconciled::Gone),

            Lifecycle::Terminating => {
                self.rebuild_client(id, &proxy).await?;
                lifecycle::remove_finalizer(&mut proxy);
                self.store.replace(&proxy).await?;
                info!("Released Proxy");
                Ok(Reconciled::TornDown)
            }

            Lifecycle::Active => {
                if lifecycle::add_finalizer(&mut proxy) {
                    self.store.replace(&proxy).await?;
                    debug!("Added finalizer");
                    return Ok(Reconciled::FinalizerAdded);
                }

                if self.rebuild_client(id, &proxy).await? {
                    Ok(Reconciled::Converged)
                } else {
                    Ok(Reconciled::Orphaned)
                }
            }
        }
    }

    /// Returns false without touching anything when the client does not
    /// exist or is being deleted.
    async fn rebuild_client(&self, id: &ResourceId, proxy: &Proxy) -> Result<bool, Error> {
        let client_id = id.sibling(proxy.spec.client.clone());
        let client = match self.store.get::<FrpcClient>(&client_id).await? {
            Some(client) if client.metadata.deletion_timestamp.is_none() => client,
            Some(_) => {
                debug!(client = %client_id.name, "Client is terminating");
                return Ok(false);
            }
            None => {
                debug!(client = %client_id.name, "Client not found");
                return Ok(false);
            }
        };

        self.converge_config(&client_id, &client).await?;
        Ok(true)
    }
}
