use crate::store::{kind, resource_id, Object, Store, StoreError};

/// What a convergence step did to the store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Converged {
    Created,
    Replaced,
    /// The object already matched; the update was a no-op.
    Unchanged,
    /// The object existed and was left alone.
    Existing,
}

/// Creates `desired` or overwrites the current object with it.
///
/// The update is conditioned on the resource version that was read, so a
/// concurrent writer surfaces as [`StoreError::Conflict`]. A creation race
/// surfaces as [`StoreError::AlreadyExists`]; both are retried by a later
/// pass, which reads the fresh object.
pub async fn converge<S: Store, K: Object>(
    store: &S,
    mut desired: K,
) -> Result<Converged, StoreError> {
    let id = resource_id(&desired);
    let Some(current) = store.get::<K>(&id).await? else {
        store.create(&desired).await?;
        tracing::debug!(kind = %kind::<K>(), %id, "Created");
        return Ok(Converged::Created);
    };

    desired.meta_mut().resource_version = current.meta().resource_version.clone();
    let updated = store.replace(&desired).await?;
    if updated.meta().resource_version == current.meta().resource_version {
        return Ok(Converged::Unchanged);
    }
    tracing::debug!(kind = %kind::<K>(), %id, "Replaced");
    Ok(Converged::Replaced)
}

/// Creates `desired` unless an object with its name exists. Losing a
/// creation race to another writer counts as success.
pub async fn ensure<S: Store, K: Object>(
    store: &S,
    desired: K,
) -> Result<Converged, StoreError> {
    let id = resource_id(&desired);
    if store.get::<K>(&id).await?.is_some() {
        return Ok(Converged::Existing);
    }
    match store.create(&desired).await {
        Ok(_) => {
            tracing::info!(kind = %kind::<K>(), %id, "Created");
            Ok(Converged::Created)
        }
        Err(StoreError::AlreadyExists { .. }) => Ok(Converged::Existing),
        Err(error) => Err(error),
    }
}
