//! Temporal Operator - manages Temporal clusters and namespaces on Kubernetes

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::Config as ControllerConfig;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use temporal_operator::config::{
    ReconcileSettings, DEFAULT_BACKOFF_MAX, DEFAULT_CLUSTER_POLL_INTERVAL, DEFAULT_CONCURRENCY,
    DEFAULT_PASS_TIMEOUT,
};
use temporal_operator::controller::{
    cluster_error_policy, namespace_error_policy, reconcile_cluster, reconcile_namespace, Context,
};
use temporal_operator::crd::{TemporalCluster, TemporalNamespace};
use temporal_operator::index::{propagate, DependencyIndex};
use temporal_operator::retry::{retry_with_backoff, RetryConfig};
use temporal_operator::store::{KubeObjectStore, ObjectStore};
use temporal_operator::FIELD_MANAGER;

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Temporal Operator - manages Temporal clusters and namespaces on Kubernetes
#[derive(Parser, Debug)]
#[command(name = "temporal-operator", version, about, long_about = None)]
struct Cli {
    /// Print the CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Objects reconciled in parallel per controller (0 = unbounded)
    #[arg(long, env = "TEMPORAL_OPERATOR_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: u16,

    /// Deadline for a single reconcile pass, in seconds
    #[arg(long, env = "TEMPORAL_OPERATOR_PASS_TIMEOUT_SECS", default_value_t = DEFAULT_PASS_TIMEOUT.as_secs())]
    pass_timeout_secs: u64,

    /// Poll interval while a namespace waits for its cluster, in seconds
    #[arg(long, env = "TEMPORAL_OPERATOR_CLUSTER_POLL_SECS", default_value_t = DEFAULT_CLUSTER_POLL_INTERVAL.as_secs())]
    cluster_poll_secs: u64,

    /// Upper bound for error backoff, in seconds
    #[arg(long, env = "TEMPORAL_OPERATOR_BACKOFF_MAX_SECS", default_value_t = DEFAULT_BACKOFF_MAX.as_secs())]
    backoff_max_secs: u64,

    /// Log output format
    #[arg(long, env = "TEMPORAL_OPERATOR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn settings(&self) -> ReconcileSettings {
        ReconcileSettings::default()
            .concurrency(self.concurrency)
            .pass_timeout(Duration::from_secs(self.pass_timeout_secs))
            .cluster_poll_interval(Duration::from_secs(self.cluster_poll_secs))
            .backoff_max(Duration::from_secs(self.backoff_max_secs))
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Both kube and reqwest pull in rustls; pick the provider explicitly
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        let cluster_crd = serde_yaml::to_string(&TemporalCluster::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize TemporalCluster CRD: {}", e))?;
        let namespace_crd = serde_yaml::to_string(&TemporalNamespace::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize TemporalNamespace CRD: {}", e))?;
        println!("{cluster_crd}---\n{namespace_crd}");
        return Ok(());
    }

    init_tracing(cli.log_format);
    run_controller(cli.settings()).await
}

/// Ensure the operator's CRDs are installed
///
/// Uses server-side apply so the installed schema always matches this build.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!("Installing TemporalCluster CRD...");
    crds.patch(
        "temporalclusters.temporal.io",
        &params,
        &Patch::Apply(&TemporalCluster::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install TemporalCluster CRD: {}", e))?;

    tracing::info!("Installing TemporalNamespace CRD...");
    crds.patch(
        "temporalnamespaces.temporal.io",
        &params,
        &Patch::Apply(&TemporalNamespace::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install TemporalNamespace CRD: {}", e))?;

    tracing::info!("Temporal CRDs installed/updated");
    Ok(())
}

/// Fill the dependency index from a full scan of TemporalNamespaces
async fn build_index(client: &Client) -> anyhow::Result<Arc<DependencyIndex>> {
    let store = KubeObjectStore::new(client.clone());
    let namespaces = retry_with_backoff(
        &RetryConfig::with_max_attempts(10),
        "list TemporalNamespaces",
        || store.list_namespaces(),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to list TemporalNamespaces: {}", e))?;

    let index = Arc::new(DependencyIndex::new());
    index.rebuild(&namespaces);
    tracing::info!(namespaces = index.len(), "dependency index built");
    Ok(index)
}

/// Run both controllers until a shutdown signal
async fn run_controller(settings: ReconcileSettings) -> anyhow::Result<()> {
    tracing::info!(?settings, "Temporal operator starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    let index = build_index(&client).await?;
    let controller_config = ControllerConfig::default().concurrency(settings.concurrency);
    let ctx = Arc::new(
        Context::builder(client.clone())
            .settings(settings)
            .index(index.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build controller context: {}", e))?,
    );

    let clusters: Api<TemporalCluster> = Api::all(client.clone());
    let namespaces: Api<TemporalNamespace> = Api::all(client.clone());
    let services: Api<Service> = Api::all(client.clone());
    let deployments: Api<Deployment> = Api::all(client.clone());

    tracing::info!("Starting Temporal controllers...");
    tracing::info!("  - TemporalCluster controller");
    tracing::info!("  - TemporalNamespace controller");

    let cluster_controller = Controller::new(clusters.clone(), WatcherConfig::default())
        .owns(services, WatcherConfig::default())
        .owns(deployments, WatcherConfig::default())
        .with_config(controller_config.clone())
        .shutdown_on_signal()
        .run(reconcile_cluster, cluster_error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Cluster reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Cluster reconciliation error");
                }
            }
        });

    // Cluster events wake the namespaces that reference the cluster
    let namespace_controller = Controller::new(namespaces, WatcherConfig::default())
        .watches(clusters, WatcherConfig::default(), move |cluster: TemporalCluster| {
            propagate(&index, &cluster)
        })
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile_namespace, namespace_error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Namespace reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Namespace reconciliation error");
                }
            }
        });

    tokio::select! {
        _ = cluster_controller => {
            tracing::info!("Cluster controller completed");
        }
        _ = namespace_controller => {
            tracing::info!("Namespace controller completed");
        }
    }

    tracing::info!("Temporal operator shutting down");
    Ok(())
}
