use crate::{config_label, AgentSettings, MANAGED_BY};
use frpc_controller_core::{self as core, RenderError};
use frpc_controller_k8s_api::{
    frpc::ProxyKind, ConfigMap, FrpcClient, ObjectMeta, Proxy, ResourceExt, ResourceId,
};
use maplit::btreemap;

/// The key under which the rendered config is stored, and the file name the
/// agent reads.
pub const CONFIG_FILE: &str = "config.ini";

/// Renders the agent config for a client and the proxies that belong to it.
///
/// Callers are expected to have filtered `proxies` already.
pub fn agent_config(
    client: &FrpcClient,
    proxies: &[&Proxy],
    settings: &AgentSettings,
) -> Result<String, RenderError> {
    let common = core::ClientCommon {
        server_addr: client.spec.common.server_addr.clone(),
        server_port: client.spec.common.server_port,
        token: client.spec.common.token.value.clone(),
    };
    let rules = proxies
        .iter()
        .map(|proxy| match &proxy.spec.kind {
            ProxyKind::Tcp(tcp) => core::TcpProxy {
                name: proxy.name_any(),
                local_addr: proxy.spec.local_addr.clone(),
                local_port: proxy.spec.local_port,
                remote_port: tcp.remote_port,
            },
        })
        .collect::<Vec<_>>();
    core::render(&common, &settings.admin, &rules)
}

/// Wraps rendered config text in the config map named after its client.
pub fn config_map(id: &ResourceId, config: String) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(id.name.clone()),
            namespace: Some(id.namespace.clone()),
            labels: Some(btreemap! {
                "app".to_string() => id.name.clone(),
                "generated".to_string() => MANAGED_BY.to_string(),
                config_label(&id.name) => "yes".to_string(),
            }),
            ..Default::default()
        },
        data: Some(btreemap! { CONFIG_FILE.to_string() => config }),
        ..Default::default()
    }
}
