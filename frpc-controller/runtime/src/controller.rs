use crate::{
    metrics::ReconcileMetrics,
    reconcile::{Error, Reconciled, Reconciler},
    store::{KubeStore, Store},
};
use frpc_controller_k8s_api::{self as k8s, FrpcClient, Proxy, Resource, ResourceExt, ResourceId};
use futures::prelude::*;
use kube::runtime::{
    controller::{self, Action, Controller},
    watcher,
};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tokio::time::{self, Duration, Instant};

const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Failure counts not bumped for this long belong to objects that are no
/// longer being retried.
const STALE_FAILURE: Duration = Duration::from_secs(2 * 300);

/// State shared by every reconciliation pass.
pub(crate) struct Context<S = KubeStore> {
    reconciler: Reconciler<S>,
    metrics: ReconcileMetrics,
    timeout: Duration,
    resync: Duration,
    failures: Mutex<HashMap<(String, ResourceId), Failures>>,
}

#[derive(Copy, Clone, Debug)]
struct Failures {
    count: u32,
    last: Instant,
}

impl<S: Store> Context<S> {
    pub(crate) fn new(
        reconciler: Reconciler<S>,
        metrics: ReconcileMetrics,
        timeout: Duration,
        resync: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            reconciler,
            metrics,
            timeout,
            resync,
            failures: Mutex::new(HashMap::new()),
        })
    }

    /// Records a finished pass. Successful passes are revisited after the
    /// resync interval so that drift in derived objects, which are not
    /// watched, is repaired.
    fn complete<K: Resource<DynamicType = ()>>(
        &self,
        id: &ResourceId,
        start: Instant,
        result: Result<Reconciled, Error>,
    ) -> Result<Action, Error> {
        let kind = kind_label::<K>();
        self.metrics.observe(kind, start.elapsed(), &result);
        let outcome = result?;
        self.failures.lock().remove(&(kind.to_string(), id.clone()));
        tracing::debug!(%kind, namespace = %id.namespace, name = %id.name, outcome = outcome.as_str(), "Reconciled");
        match outcome {
            Reconciled::Missing | Reconciled::Gone | Reconciled::TornDown => {
                Ok(Action::await_change())
            }
            _ => Ok(Action::requeue(self.resync)),
        }
    }

    /// Counts consecutive failures per object and picks the next retry.
    fn retry<K: Resource<DynamicType = ()>>(&self, id: ResourceId, error: &Error) -> Action {
        let now = Instant::now();
        let count = {
            let mut failures = self.failures.lock();
            failures.retain(|_, f| now.saturating_duration_since(f.last) < STALE_FAILURE);
            let entry = failures
                .entry((kind_label::<K>().to_string(), id))
                .or_insert(Failures {
                    count: 0,
                    last: now,
                });
            entry.count = entry.count.saturating_add(1);
            entry.last = now;
            entry.count
        };
        if error.is_retryable() {
            Action::requeue(backoff(count))
        } else {
            Action::requeue(MAX_BACKOFF)
        }
    }
}

pub(crate) async fn clients(client: k8s::Client, ctx: Arc<Context>, concurrency: u16) {
    Controller::new(k8s::Api::<FrpcClient>::all(client), watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .run(reconcile_client::<KubeStore>, error_policy::<FrpcClient, KubeStore>, ctx)
        .for_each(log_result)
        .await
}

pub(crate) async fn proxies(client: k8s::Client, ctx: Arc<Context>, concurrency: u16) {
    Controller::new(k8s::Api::<Proxy>::all(client), watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .run(reconcile_proxy::<KubeStore>, error_policy::<Proxy, KubeStore>, ctx)
        .for_each(log_result)
        .await
}

async fn reconcile_client<S: Store>(
    obj: Arc<FrpcClient>,
    ctx: Arc<Context<S>>,
) -> Result<Action, Error> {
    let id = id_of(&*obj);
    let start = Instant::now();
    let result = time::timeout(ctx.timeout, ctx.reconciler.reconcile_client(&id))
        .await
        .unwrap_or(Err(Error::Timeout(ctx.timeout)));
    ctx.complete::<FrpcClient>(&id, start, result)
}

async fn reconcile_proxy<S: Store>(obj: Arc<Proxy>, ctx: Arc<Context<S>>) -> Result<Action, Error> {
    let id = id_of(&*obj);
    let start = Instant::now();
    let result = time::timeout(ctx.timeout, ctx.reconciler.reconcile_proxy(&id))
        .await
        .unwrap_or(Err(Error::Timeout(ctx.timeout)));
    ctx.complete::<Proxy>(&id, start, result)
}

fn error_policy<K, S>(obj: Arc<K>, error: &Error, ctx: Arc<Context<S>>) -> Action
where
    K: Resource<DynamicType = ()>,
    S: Store,
{
    let id = id_of(&*obj);
    tracing::warn!(kind = %K::kind(&()), namespace = %id.namespace, name = %id.name, %error, "Reconciliation failed");
    ctx.retry::<K>(id, error)
}

async fn log_result<T: std::fmt::Debug, E: std::error::Error>(result: Result<T, E>) {
    match result {
        Ok(obj) => tracing::trace!(?obj, "Reconciled"),
        Err(error) => tracing::debug!(%error, "Controller error"),
    }
}

fn id_of<K: Resource>(obj: &K) -> ResourceId {
    ResourceId::new(obj.namespace().unwrap_or_default(), obj.name_any())
}

fn kind_label<K: Resource<DynamicType = ()>>() -> &'static str {
    match &*K::kind(&()) {
        "Client" => "Client",
        "Proxy" => "Proxy",
        _ => "Unknown",
    }
}

/// Doubles from [`BASE_BACKOFF`] with each consecutive failure, up to
/// [`MAX_BACKOFF`].
fn backoff(failures: u32) -> Duration {
    let exp = failures.saturating_sub(1).min(16);
    BASE_BACKOFF.saturating_mul(1 << exp).min(MAX_BACKOFF)
}
