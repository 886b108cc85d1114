use crate::{
    controller::{self, Context},
    metrics::ReconcileMetrics,
    reconcile::Reconciler,
    store::KubeStore,
};
use anyhow::{bail, Result};
use clap::Parser;
use frpc_controller_k8s_api::{CustomResourceExt, FrpcClient, Proxy};
use frpc_controller_k8s_builder::{AdminSettings, AgentSettings};
use prometheus_client::registry::Registry;
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "frpc-controller", about = "Runs frpc agents for Client and Proxy resources")]
pub struct Args {
    #[clap(long, default_value = "frpc=info,warn", env = "FRPC_CONTROLLER_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    #[clap(long, env = "FRPC_CONTROLLER_AGENT_IMAGE", default_value = "fatedier/frpc:v0.44.0")]
    agent_image: String,

    /// Image of the sidecar that syncs the config map and triggers reloads.
    #[clap(
        long,
        env = "FRPC_CONTROLLER_RELOAD_IMAGE",
        default_value = "kiwigrid/k8s-sidecar:1.15.0"
    )]
    reload_image: String,

    /// HTTP method used against the agent's reload endpoint.
    #[clap(long, default_value = "GET")]
    reload_method: String,

    #[clap(long, default_value = "7400")]
    admin_port: u16,

    #[clap(long, default_value = "frpc-admin")]
    admin_username: String,

    #[clap(long, env = "FRPC_CONTROLLER_ADMIN_PASSWORD", default_value = "frpc-password")]
    admin_password: String,

    /// Upper bound on a single reconciliation pass.
    #[clap(long, default_value = "10000")]
    reconcile_timeout_ms: u64,

    /// Interval after which a successfully reconciled object is visited
    /// again, repairing drift in the objects derived from it.
    #[clap(long, default_value = "3600")]
    resync_interval_secs: u64,

    /// Number of objects of each kind reconciled concurrently.
    #[clap(long, default_value = "16")]
    max_concurrent_reconciles: u16,

    /// Print the CustomResourceDefinitions as YAML and exit.
    #[clap(long)]
    print_crds: bool,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            agent_image,
            reload_image,
            reload_method,
            admin_port,
            admin_username,
            admin_password,
            reconcile_timeout_ms,
            resync_interval_secs,
            max_concurrent_reconciles,
            print_crds,
        } = self;

        if print_crds {
            print!("{}", crds()?);
            return Ok(());
        }

        let settings = AgentSettings {
            agent_image,
            reload_image,
            reload_method,
            admin: AdminSettings {
                port: admin_port,
                username: admin_username,
                password: admin_password,
                ..Default::default()
            },
        };

        let mut prom = <Registry>::default();
        let metrics = ReconcileMetrics::register(prom.sub_registry_with_prefix("frpc_controller"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let reconciler = Reconciler::new(KubeStore::new(runtime.client()), settings);
        let ctx = Context::new(
            reconciler,
            metrics,
            Duration::from_millis(reconcile_timeout_ms),
            Duration::from_secs(resync_interval_secs),
        );

        tokio::spawn(
            controller::clients(runtime.client(), ctx.clone(), max_concurrent_reconciles)
                .instrument(info_span!("clients")),
        );
        tokio::spawn(
            controller::proxies(runtime.client(), ctx, max_concurrent_reconciles)
                .instrument(info_span!("proxies")),
        );
        info!("Controllers started");

        // Block the main thread on the shutdown signal.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

fn crds() -> Result<String> {
    let client = serde_yaml::to_string(&FrpcClient::crd())?;
    let proxy = serde_yaml::to_string(&Proxy::crd())?;
    Ok(format!("---\n{client}---\n{proxy}"))
}
