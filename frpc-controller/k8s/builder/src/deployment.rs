use crate::{config::CONFIG_FILE, config_label, AgentSettings, MANAGED_BY, SERVICE_ACCOUNT_NAME};
use frpc_controller_k8s_api::{
    Container, ContainerPort, Deployment, DeploymentSpec, EmptyDirVolumeSource, EnvVar,
    EnvVarSource, LabelSelector, ObjectFieldSelector, ObjectMeta, PodSpec, PodTemplateSpec,
    ResourceId, SecurityContext, Volume, VolumeMount,
};
use maplit::btreemap;
use std::collections::BTreeMap;

const CONFIG_VOLUME: &str = "config";
const CONFIG_DIR: &str = "/frp";

/// Builds the agent deployment for a client.
///
/// The pod runs the agent next to a sidecar that copies the labelled config
/// map into a shared `emptyDir` and asks the agent to reload through its
/// admin endpoint.
pub fn deployment(id: &ResourceId, settings: &AgentSettings) -> Deployment {
    let labels = workload_labels(&id.name);

    Deployment {
        metadata: ObjectMeta {
            name: Some(id.name.clone()),
            namespace: Some(id.namespace.clone()),
            labels: Some(labels.clone()),
            annotations: Some(injection_disabled_annotations()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some(injection_disabled_annotations()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(SERVICE_ACCOUNT_NAME.to_string()),
                    containers: vec![reload_container(id, settings), agent_container(settings)],
                    volumes: Some(vec![Volume {
                        name: CONFIG_VOLUME.to_string(),
                        empty_dir: Some(EmptyDirVolumeSource::default()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Opts the pod out of every common mesh sidecar injector.
///
/// An injected proxy would intercept the localhost admin port the reload
/// sidecar relies on.
pub fn injection_disabled_annotations() -> BTreeMap<String, String> {
    btreemap! {
        "sidecar.istio.io/inject".to_string() => "false".to_string(),
        "linkerd.io/inject".to_string() => "disabled".to_string(),
        "kuma.io/sidecar-injection".to_string() => "disabled".to_string(),
        "appmesh.k8s.aws/sidecarInjectorWebhook".to_string() => "disabled".to_string(),
        "injector.nsm.nginx.com/auto-inject".to_string() => "false".to_string(),
    }
}

fn workload_labels(name: &str) -> BTreeMap<String, String> {
    btreemap! {
        "app.kubernetes.io/name".to_string() => name.to_string(),
        "app.kubernetes.io/managed-by".to_string() => MANAGED_BY.to_string(),
        "app.kubernetes.io/created-by".to_string() => name.to_string(),
    }
}

fn config_mount() -> Vec<VolumeMount> {
    vec![VolumeMount {
        name: CONFIG_VOLUME.to_string(),
        mount_path: CONFIG_DIR.to_string(),
        ..Default::default()
    }]
}

fn env(name: &str, value: impl ToString) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn reload_container(id: &ResourceId, settings: &AgentSettings) -> Container {
    let admin = &settings.admin;
    Container {
        name: "config-reload".to_string(),
        image: Some(settings.reload_image.clone()),
        security_context: Some(SecurityContext {
            run_as_user: Some(1000),
            run_as_group: Some(1000),
            read_only_root_filesystem: Some(true),
            allow_privilege_escalation: Some(false),
            ..Default::default()
        }),
        env: Some(vec![
            EnvVar {
                name: "POD_NAME".to_string(),
                value_from: Some(EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        field_path: "metadata.name".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            env("LABEL", config_label(&id.name)),
            env("FOLDER", CONFIG_DIR),
            env("NAMESPACE", &id.namespace),
            env(
                "REQ_URL",
                format!("http://localhost:{}/api/reload", admin.port),
            ),
            env("REQ_METHOD", &settings.reload_method),
            env("REQ_USERNAME", &admin.username),
            env("REQ_PASSWORD", &admin.password),
            env("REQ_RETRY_CONNECT", 10),
            env("SKIP_TLS_VERIFY", true),
        ]),
        volume_mounts: Some(config_mount()),
        ..Default::default()
    }
}

fn agent_container(settings: &AgentSettings) -> Container {
    Container {
        name: "frpc".to_string(),
        image: Some(settings.agent_image.clone()),
        command: Some(vec![
            "frpc".to_string(),
            "-c".to_string(),
            format!("{CONFIG_DIR}/{CONFIG_FILE}"),
        ]),
        ports: Some(vec![ContainerPort {
            name: Some("admin".to_string()),
            container_port: settings.admin.port.into(),
            ..Default::default()
        }]),
        volume_mounts: Some(config_mount()),
        ..Default::default()
    }
}
