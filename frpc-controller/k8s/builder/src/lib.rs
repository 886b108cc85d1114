#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Pure constructors for the objects derived from a `Client`.
//!
//! Every function here computes a desired object from its inputs alone; none
//! of them talk to the API server.

mod config;
mod deployment;
mod rbac;

pub use self::{
    config::{agent_config, config_map, CONFIG_FILE},
    deployment::{deployment, injection_disabled_annotations},
    rbac::{
        role, role_binding, service_account, ROLE_BINDING_NAME, ROLE_NAME, SERVICE_ACCOUNT_NAME,
    },
};
pub use frpc_controller_core::AdminSettings;

/// Value of the `app.kubernetes.io/managed-by` label on derived objects.
pub const MANAGED_BY: &str = "frpc-controller";

/// Inputs to the derived objects that come from the controller's own
/// configuration rather than from any resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentSettings {
    pub agent_image: String,
    pub reload_image: String,
    /// HTTP method the reload sidecar uses against the admin endpoint.
    pub reload_method: String,
    pub admin: AdminSettings,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            agent_image: "fatedier/frpc:v0.44.0".to_string(),
            reload_image: "kiwigrid/k8s-sidecar:1.15.0".to_string(),
            reload_method: "GET".to_string(),
            admin: AdminSettings::default(),
        }
    }
}

/// The label whose presence on a config map marks it for the reload sidecar
/// of the named client.
pub fn config_label(client: &str) -> String {
    format!("{client}-config-as-code")
}
