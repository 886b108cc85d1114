use crate::{
    converge::{converge, ensure},
    reconcile::{Error, Reconciled, Reconciler},
    store::Store,
};
use frpc_controller_k8s_api::{lifecycle, ConfigMap, Deployment, FrpcClient, Lifecycle, ResourceId};
use frpc_controller_k8s_builder as builder;
use tracing::{debug, info, instrument};

impl<S: Store> Reconciler<S> {
    /// Runs one pass of the `Client` lifecycle.
    ///
    /// An active client first gets the finalizer. Once it holds it, the
    /// config map, the namespace's reload RBAC and the deployment are
    /// converged in that order. A terminating client has its deployment and
    /// config map deleted before the finalizer is released. Proxies are never
    /// touched.
    #[instrument(skip_all, fields(namespace = %id.namespace, name = %id.name))]
    pub async fn reconcile_client(&self, id: &ResourceId) -> Result<Reconciled, Error> {
        let Some(mut client) = self.store.get::<FrpcClient>(id).await? else {
            debug!("Client not found");
            return Ok(Reconciled::Missing);
        };

        match Lifecycle::of(&client) {
            Lifecycle::Gone => Ok(Reconciled::Gone),

            Lifecycle::Terminating => {
                self.store.delete::<Deployment>(id).await?;
                self.store.delete::<ConfigMap>(id).await?;
                lifecycle::remove_finalizer(&mut client);
                self.store.replace(&client).await?;
                info!("Tore down Client");
                Ok(Reconciled::TornDown)
            }

            Lifecycle::Active => {
                if lifecycle::add_finalizer(&mut client) {
                    self.store.replace(&client).await?;
                    debug!("Added finalizer");
                    return Ok(Reconciled::FinalizerAdded);
                }

                self.converge_config(id, &client).await?;
                self.ensure_rbac(&id.namespace).await?;
                let deployment = builder::deployment(id, &self.settings);
                let deployment = converge(&self.store, deployment).await?;
                debug!(?deployment, "Deployment");
                Ok(Reconciled::Converged)
            }
        }
    }

    /// Creates the namespace's shared reload RBAC if it is missing. Existing
    /// objects are never updated.
    async fn ensure_rbac(&self, namespace: &str) -> Result<(), Error> {
        ensure(&self.store, builder::service_account(namespace)).await?;
        ensure(&self.store, builder::role(namespace)).await?;
        ensure(&self.store, builder::role_binding(namespace)).await?;
        Ok(())
    }
}
