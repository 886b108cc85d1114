use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const API_GROUP: &str = "frpc.yoogo.top";

/// One frpc agent instance, connected to a single frps server.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "frpc.yoogo.top",
    version = "v1",
    kind = "Client",
    root = "FrpcClient",
    status = "ClientStatus",
    namespaced
)]
pub struct ClientSpec {
    pub common: ClientCommon,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ClientCommon {
    pub server_addr: String,
    pub server_port: u16,
    pub token: TokenValue,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct TokenValue {
    pub value: String,
}

/// Reserved for health reporting; never written by the controller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ClientStatus {}

/// A forwarding rule served by the agent of the `Client` named in `client`.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "frpc.yoogo.top",
    version = "v1",
    kind = "Proxy",
    plural = "proxies",
    status = "ProxyStatus",
    namespaced
)]
pub struct ProxySpec {
    /// Name of the owning `Client` in the same namespace.
    pub client: String,
    pub local_addr: String,
    pub local_port: u16,
    #[serde(flatten)]
    pub kind: ProxyKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ProxyKind {
    #[serde(rename = "tcp_proxy")]
    Tcp(TcpProxy),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct TcpProxy {
    pub remote_port: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ProxyStatus {}

impl Proxy {
    /// Returns true if this rule belongs to the named client and is not
    /// being deleted.
    pub fn is_active_for(&self, client: &str) -> bool {
        self.spec.client == client && self.metadata.deletion_timestamp.is_none()
    }
}
