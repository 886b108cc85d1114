#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod frpc;
pub mod lifecycle;
mod resource_id;

pub use self::{
    frpc::{FrpcClient, Proxy},
    lifecycle::{Lifecycle, FINALIZER},
    resource_id::ResourceId,
};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            ConfigMap, Container, ContainerPort, EmptyDirVolumeSource, EnvVar, EnvVarSource,
            ObjectFieldSelector, PodSpec, PodTemplateSpec, SecurityContext, ServiceAccount, Volume,
            VolumeMount,
        },
        rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject},
    },
    apimachinery::{self, pkg::apis::meta::v1::LabelSelector},
    NamespaceResourceScope,
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, PostParams, ResourceExt},
    core::ErrorResponse,
    Client, CustomResourceExt, Error, Resource,
};
