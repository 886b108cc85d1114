use async_trait::async_trait;
use frpc_controller_k8s_api::{
    self as k8s, Api, DeleteParams, ListParams, NamespaceResourceScope, PostParams, Resource,
    ResourceId,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

/// A namespaced kind the store can read and write.
pub trait Object:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> Object for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// The object store the reconcilers converge against.
///
/// Reads may be stale and there are no transactions across objects. Updates
/// carry the resource version they were derived from and fail with
/// [`StoreError::Conflict`] when it no longer matches.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    async fn get<K: Object>(&self, id: &ResourceId) -> Result<Option<K>, StoreError>;

    async fn list<K: Object>(&self, namespace: &str) -> Result<Vec<K>, StoreError>;

    async fn create<K: Object>(&self, obj: &K) -> Result<K, StoreError>;

    async fn replace<K: Object>(&self, obj: &K) -> Result<K, StoreError>;

    /// Requests deletion. Deleting an absent object succeeds.
    async fn delete<K: Object>(&self, id: &ResourceId) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: ResourceId },

    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: String, id: ResourceId },

    #[error("{kind} {id} was modified concurrently")]
    Conflict { kind: String, id: ResourceId },

    #[error("{kind} {target}: {source}")]
    Api {
        kind: String,
        target: String,
        #[source]
        source: k8s::Error,
    },
}

/// Talks to the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: k8s::Client,
}

// === impl StoreError ===

impl StoreError {
    pub(crate) fn reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Conflict { .. } => "conflict",
            Self::Api { .. } => "api",
        }
    }

    fn from_kube<K: Object>(id: &ResourceId, error: k8s::Error) -> Self {
        let kind = kind::<K>();
        match error {
            k8s::Error::Api(ref rsp) if rsp.code == 404 => Self::NotFound {
                kind,
                id: id.clone(),
            },
            k8s::Error::Api(ref rsp) if rsp.code == 409 && rsp.reason == "AlreadyExists" => {
                Self::AlreadyExists {
                    kind,
                    id: id.clone(),
                }
            }
            k8s::Error::Api(ref rsp) if rsp.code == 409 => Self::Conflict {
                kind,
                id: id.clone(),
            },
            source => Self::Api {
                kind,
                target: id.to_string(),
                source,
            },
        }
    }
}

pub(crate) fn kind<K: Object>() -> String {
    K::kind(&()).to_string()
}

pub(crate) fn resource_id<K: Resource>(obj: &K) -> ResourceId {
    let meta = obj.meta();
    ResourceId::new(
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

// === impl KubeStore ===

impl KubeStore {
    pub fn new(client: k8s::Client) -> Self {
        Self { client }
    }

    fn api<K: Object>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl Store for KubeStore {
    async fn get<K: Object>(&self, id: &ResourceId) -> Result<Option<K>, StoreError> {
        self.api::<K>(&id.namespace)
            .get_opt(&id.name)
            .await
            .map_err(|error| StoreError::from_kube::<K>(id, error))
    }

    async fn list<K: Object>(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|source| StoreError::Api {
                kind: kind::<K>(),
                target: namespace.to_string(),
                source,
            })?;
        Ok(list.items)
    }

    async fn create<K: Object>(&self, obj: &K) -> Result<K, StoreError> {
        let id = resource_id(obj);
        self.api::<K>(&id.namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|error| StoreError::from_kube::<K>(&id, error))
    }

    async fn replace<K: Object>(&self, obj: &K) -> Result<K, StoreError> {
        let id = resource_id(obj);
        self.api::<K>(&id.namespace)
            .replace(&id.name, &PostParams::default(), obj)
            .await
            .map_err(|error| StoreError::from_kube::<K>(&id, error))
    }

    async fn delete<K: Object>(&self, id: &ResourceId) -> Result<(), StoreError> {
        match self
            .api::<K>(&id.namespace)
            .delete(&id.name, &DeleteParams::default())
            .await
            .map_err(|error| StoreError::from_kube::<K>(id, error))
        {
            Ok(_) | Err(StoreError::NotFound { .. }) => Ok(()),
            Err(error) => Err(error),
        }
    }
}
