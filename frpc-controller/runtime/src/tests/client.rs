use super::{admit_client, id, mk_client, mk_proxy, reconciler, NS};
use crate::{
    reconcile::{Error, Reconciled},
    store::{Store, StoreError},
    tests::store::{write, Fault, Verb},
};
use frpc_controller_k8s_api::{
    lifecycle, ConfigMap, Deployment, FrpcClient, Proxy, Role, RoleBinding, ServiceAccount,
};
use frpc_controller_k8s_builder::CONFIG_FILE;
use pretty_assertions::assert_eq;

fn config_text(store: &super::MemStore, client: &str) -> String {
    let cm = store
        .fetch::<ConfigMap>(&id(client))
        .expect("config map must exist");
    cm.data.expect("config map must have data")[CONFIG_FILE].clone()
}

#[tokio::test]
async fn adds_finalizer_before_deriving_objects() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));

    let reconciled = reconciler.reconcile_client(&id("edge-1")).await.unwrap();
    assert_eq!(reconciled, Reconciled::FinalizerAdded);
    assert_eq!(
        store.take_writes(),
        vec![write(Verb::Replace, "Client", NS, "edge-1")]
    );
    let client = store.fetch::<FrpcClient>(&id("edge-1")).unwrap();
    assert!(lifecycle::has_finalizer(&client));
    assert!(store.fetch::<ConfigMap>(&id("edge-1")).is_none());

    let reconciled = reconciler.reconcile_client(&id("edge-1")).await.unwrap();
    assert_eq!(reconciled, Reconciled::Converged);
    assert_eq!(
        store.take_writes(),
        vec![
            write(Verb::Create, "ConfigMap", NS, "edge-1"),
            write(Verb::Create, "ServiceAccount", NS, "frpc-config-reload"),
            write(Verb::Create, "Role", NS, "frpc-config-reload"),
            write(Verb::Create, "RoleBinding", NS, "frpc-config-reload-binding"),
            write(Verb::Create, "Deployment", NS, "edge-1"),
        ]
    );
}

#[tokio::test]
async fn converged_client_is_left_alone() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));
    store.insert(mk_proxy("web", "edge-1", 8080, 9090));
    admit_client(&reconciler, "edge-1").await;
    store.take_writes();

    for _ in 0..3 {
        let reconciled = reconciler.reconcile_client(&id("edge-1")).await.unwrap();
        assert_eq!(reconciled, Reconciled::Converged);
    }
    assert_eq!(store.take_writes(), vec![]);
}

#[tokio::test]
async fn renders_agent_config() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));
    store.insert(mk_proxy("web", "edge-1", 8080, 9090));
    admit_client(&reconciler, "edge-1").await;

    assert_eq!(
        config_text(&store, "edge-1"),
        "[common]\n\
         server_addr = proxy.example.com\n\
         server_port = 7000\n\
         token = abc\n\
         admin_addr = 0.0.0.0\n\
         admin_port = 7400\n\
         admin_user = frpc-admin\n\
         admin_pwd = frpc-password\n\
         \n\
         [web]\n\
         type = tcp\n\
         local_ip = 127.0.0.1\n\
         local_port = 8080\n\
         remote_port = 9090\n"
    );

    let deployment = store.fetch::<Deployment>(&id("edge-1")).unwrap();
    let labels = deployment.metadata.labels.unwrap_or_default();
    assert_eq!(labels["app.kubernetes.io/name"], "edge-1");
}

#[tokio::test]
async fn config_excludes_terminating_and_foreign_proxies() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));
    store.insert(mk_proxy("a", "edge-1", 8080, 9090));
    store.insert(mk_proxy("b", "edge-1", 8081, 9091));
    store.insert(mk_proxy("c", "edge-2", 8082, 9092));
    store.request_delete::<Proxy>(&id("b"));

    admit_client(&reconciler, "edge-1").await;

    let text = config_text(&store, "edge-1");
    assert!(text.contains("\n[a]\n"), "{text}");
    assert!(!text.contains("[b]"), "{text}");
    assert!(!text.contains("[c]"), "{text}");
}

#[tokio::test]
async fn recovers_from_partial_failure() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));
    reconciler.reconcile_client(&id("edge-1")).await.unwrap();

    store.fail::<Deployment>(Verb::Create, Fault::Unavailable);
    let error = reconciler
        .reconcile_client(&id("edge-1"))
        .await
        .unwrap_err();
    assert!(
        matches!(error, Error::Store(StoreError::Api { .. })),
        "{error}"
    );
    assert!(error.is_retryable());
    assert!(store.fetch::<ConfigMap>(&id("edge-1")).is_some());
    assert!(store.fetch::<Deployment>(&id("edge-1")).is_none());
    store.take_writes();

    store.heal();
    let reconciled = reconciler.reconcile_client(&id("edge-1")).await.unwrap();
    assert_eq!(reconciled, Reconciled::Converged);
    assert_eq!(
        store.take_writes(),
        vec![write(Verb::Create, "Deployment", NS, "edge-1")]
    );
}

#[tokio::test]
async fn tears_down_derived_objects_before_releasing() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));
    store.insert(mk_proxy("web", "edge-1", 8080, 9090));
    admit_client(&reconciler, "edge-1").await;
    store.request_delete::<FrpcClient>(&id("edge-1"));
    store.take_writes();

    let reconciled = reconciler.reconcile_client(&id("edge-1")).await.unwrap();
    assert_eq!(reconciled, Reconciled::TornDown);
    assert_eq!(
        store.take_writes(),
        vec![
            write(Verb::Delete, "Deployment", NS, "edge-1"),
            write(Verb::Delete, "ConfigMap", NS, "edge-1"),
            write(Verb::Replace, "Client", NS, "edge-1"),
        ]
    );
    assert!(store.fetch::<FrpcClient>(&id("edge-1")).is_none());
    assert!(store.fetch::<Proxy>(&id("web")).is_some());
    assert_eq!(store.count::<ServiceAccount>(NS), 1);

    let reconciled = reconciler.reconcile_client(&id("edge-1")).await.unwrap();
    assert_eq!(reconciled, Reconciled::Missing);
}

#[tokio::test]
async fn failed_teardown_keeps_finalizer() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));
    admit_client(&reconciler, "edge-1").await;
    store.request_delete::<FrpcClient>(&id("edge-1"));

    store.fail::<ConfigMap>(Verb::Delete, Fault::Unavailable);
    reconciler
        .reconcile_client(&id("edge-1"))
        .await
        .unwrap_err();
    let client = store.fetch::<FrpcClient>(&id("edge-1")).unwrap();
    assert!(lifecycle::has_finalizer(&client));
    assert!(client.metadata.deletion_timestamp.is_some());

    store.heal();
    let reconciled = reconciler.reconcile_client(&id("edge-1")).await.unwrap();
    assert_eq!(reconciled, Reconciled::TornDown);
    assert!(store.fetch::<ConfigMap>(&id("edge-1")).is_none());
    assert!(store.fetch::<FrpcClient>(&id("edge-1")).is_none());
}

#[tokio::test]
async fn missing_client_is_a_no_op() {
    let (reconciler, store) = reconciler();
    let reconciled = reconciler.reconcile_client(&id("edge-1")).await.unwrap();
    assert_eq!(reconciled, Reconciled::Missing);
    assert_eq!(store.take_writes(), vec![]);
}

#[tokio::test]
async fn clients_share_reload_rbac() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));
    store.insert(mk_client("edge-2"));
    admit_client(&reconciler, "edge-1").await;
    admit_client(&reconciler, "edge-2").await;

    assert_eq!(store.count::<ServiceAccount>(NS), 1);
    assert_eq!(store.count::<Role>(NS), 1);
    assert_eq!(store.count::<RoleBinding>(NS), 1);
    assert_eq!(store.count::<ConfigMap>(NS), 2);
    assert_eq!(store.count::<Deployment>(NS), 2);
}

#[tokio::test]
async fn conflicts_are_retried() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));
    admit_client(&reconciler, "edge-1").await;

    store.fail::<ConfigMap>(Verb::Replace, Fault::Conflict);
    let error = reconciler
        .reconcile_client(&id("edge-1"))
        .await
        .unwrap_err();
    assert!(
        matches!(error, Error::Store(StoreError::Conflict { .. })),
        "{error}"
    );
    assert!(error.is_retryable());
}

#[tokio::test]
async fn unrenderable_config_is_not_retried() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));
    store.insert(mk_proxy("common", "edge-1", 8080, 9090));
    reconciler.reconcile_client(&id("edge-1")).await.unwrap();

    let error = reconciler
        .reconcile_client(&id("edge-1"))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Render { .. }), "{error}");
    assert!(!error.is_retryable());
    assert!(store.fetch::<ConfigMap>(&id("edge-1")).is_none());
}

#[tokio::test]
async fn repeated_pass_restores_deleted_objects() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));
    store.insert(mk_proxy("web", "edge-1", 8080, 9090));
    admit_client(&reconciler, "edge-1").await;
    let config = config_text(&store, "edge-1");

    store.delete::<Deployment>(&id("edge-1")).await.unwrap();
    store.delete::<ConfigMap>(&id("edge-1")).await.unwrap();
    store.take_writes();

    let reconciled = reconciler.reconcile_client(&id("edge-1")).await.unwrap();
    assert_eq!(reconciled, Reconciled::Converged);
    assert_eq!(
        store.take_writes(),
        vec![
            write(Verb::Create, "ConfigMap", NS, "edge-1"),
            write(Verb::Create, "Deployment", NS, "edge-1"),
        ]
    );
    assert_eq!(config_text(&store, "edge-1"), config);
}

#[tokio::test]
async fn repeated_pass_drops_proxy_moved_to_another_client() {
    let (reconciler, store) = reconciler();
    store.insert(mk_client("edge-1"));
    store.insert(mk_proxy("web", "edge-1", 8080, 9090));
    admit_client(&reconciler, "edge-1").await;

    let mut web = store.fetch::<Proxy>(&id("web")).unwrap();
    web.spec.client = "edge-2".to_string();
    store.replace(&web).await.unwrap();

    // The proxy pass only knows its new client, which does not exist.
    let reconciled = reconciler.reconcile_proxy(&id("web")).await.unwrap();
    assert_eq!(reconciled, Reconciled::Orphaned);
    assert!(config_text(&store, "edge-1").contains("[web]"));

    let reconciled = reconciler.reconcile_client(&id("edge-1")).await.unwrap();
    assert_eq!(reconciled, Reconciled::Converged);
    let text = config_text(&store, "edge-1");
    assert!(!text.contains("[web]"), "{text}");
}
