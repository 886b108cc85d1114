#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The frpc agent configuration model and its INI rendering.
//!
//! Nothing in this crate knows about Kubernetes: callers translate their
//! resources into a [`ClientCommon`] and a list of [`TcpProxy`] rules and
//! get back the text the agent reads at startup and on every reload.

mod render;

pub use self::render::{render, RenderError};

/// The connection settings shared by every proxy of one agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCommon {
    pub server_addr: String,
    pub server_port: u16,
    pub token: String,
}

/// The agent's local admin endpoint, used by the reload sidecar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminSettings {
    pub addr: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Forwards `remote_port` on the server to `local_addr:local_port`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpProxy {
    pub name: String,
    pub local_addr: String,
    pub local_port: u16,
    pub remote_port: u16,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0".to_string(),
            port: 7400,
            username: "frpc-admin".to_string(),
            password: "frpc-password".to_string(),
        }
    }
}
