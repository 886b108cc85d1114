//! The service account the reload sidecar runs as, and read access to the
//! config maps it watches.
//!
//! These objects have fixed names and are shared by every client in a
//! namespace.

use frpc_controller_k8s_api::{
    ObjectMeta, PolicyRule, Role, RoleBinding, RoleRef, ServiceAccount, Subject,
};

pub const SERVICE_ACCOUNT_NAME: &str = "frpc-config-reload";
pub const ROLE_NAME: &str = "frpc-config-reload";
pub const ROLE_BINDING_NAME: &str = "frpc-config-reload-binding";

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

pub fn service_account(namespace: &str) -> ServiceAccount {
    ServiceAccount {
        metadata: meta(namespace, SERVICE_ACCOUNT_NAME),
        ..Default::default()
    }
}

pub fn role(namespace: &str) -> Role {
    Role {
        metadata: meta(namespace, ROLE_NAME),
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec!["".to_string()]),
            resources: Some(vec!["configmaps".to_string(), "secrets".to_string()]),
            verbs: vec!["get".to_string(), "watch".to_string(), "list".to_string()],
            ..Default::default()
        }]),
    }
}

pub fn role_binding(namespace: &str) -> RoleBinding {
    RoleBinding {
        metadata: meta(namespace, ROLE_BINDING_NAME),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: ROLE_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: SERVICE_ACCOUNT_NAME.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    }
}
