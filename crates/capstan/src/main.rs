mod manifest;

use capstan_core::{
    Cluster, ClusterId, Deployment, DeploymentId, DeploymentStatus, NewCluster, NewDeployment,
    Resources, DEFAULT_OWNER, DEFAULT_PRIORITY,
};
use capstan_scheduler::{PassReport, Scheduler, SchedulerConfig};
use capstan_storage::{KvRecordStore, RecordStore};
use clap::{Args, Parser, Subcommand, ValueEnum};
use manifest::Manifest;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "capstan", about = "Capstan deployment scheduler")]
struct Cli {
    /// Path to the redb database file
    #[arg(long, global = true, env = "CAPSTAN_DATA_DIR", default_value = "./capstan.redb")]
    data_dir: PathBuf,

    /// Output format for printed records
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage clusters
    #[command(subcommand)]
    Cluster(ClusterCommand),
    /// Manage deployments
    #[command(subcommand)]
    Deployment(DeploymentCommand),
    /// Create clusters and deployments from a YAML manifest, then schedule
    Apply {
        /// Manifest file
        #[arg(long, short)]
        file: PathBuf,
    },
    /// Run one scheduling pass over every queued deployment
    Schedule,
    /// Run the scheduler until interrupted
    Run {
        /// Seconds between retries of deferred deployments
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
        retry_interval_secs: u64,
    },
}

#[derive(Subcommand)]
enum ClusterCommand {
    /// Register a cluster with its total capacity
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        organization: Option<String>,
        #[command(flatten)]
        capacity: Quantities,
    },
    /// List clusters
    List {
        #[arg(long)]
        organization: Option<String>,
    },
}

#[derive(Subcommand)]
enum DeploymentCommand {
    /// Create a deployment and try to admit it
    Create {
        #[arg(long)]
        name: String,
        /// Target cluster id
        #[arg(long)]
        cluster_id: u64,
        /// Container image
        #[arg(long)]
        image: String,
        #[command(flatten)]
        required: Quantities,
        /// Higher values are admitted first; the default is the lowest allowed
        #[arg(long, default_value_t = DEFAULT_PRIORITY)]
        priority: i32,
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },
    /// List deployments
    List {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Overwrite a deployment's status without going through the scheduler
    SetStatus {
        /// Deployment id
        #[arg(long)]
        id: u64,
        /// One of queued, running or failed
        #[arg(long, value_parser = parse_status)]
        status: DeploymentStatus,
    },
}

fn parse_status(s: &str) -> Result<DeploymentStatus, String> {
    DeploymentStatus::parse(s)
        .ok_or_else(|| format!("unknown status '{}', expected queued, running or failed", s))
}

#[derive(Args)]
struct Quantities {
    /// Memory units
    #[arg(long)]
    memory: u64,
    /// Compute units
    #[arg(long)]
    cpu: u64,
    /// Accelerator units
    #[arg(long, default_value_t = 0)]
    gpu: u64,
}

impl From<Quantities> for Resources {
    fn from(q: Quantities) -> Self {
        Resources::new(q.memory, q.cpu, q.gpu)
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = open_store(&cli.data_dir)?;
    let output = cli.output;

    match cli.command {
        Commands::Cluster(ClusterCommand::Create {
            name,
            organization,
            capacity,
        }) => {
            let mut request = NewCluster::new(name, capacity.into());
            if let Some(organization) = organization {
                request = request.with_organization(organization);
            }
            let cluster = store.create_cluster(request).map_err(miette::Report::new)?;
            info!("Created cluster '{}' with id {}", cluster.name, cluster.id);
            print_clusters(output, &[cluster])
        }
        Commands::Cluster(ClusterCommand::List { organization }) => {
            let clusters: Vec<_> = store
                .list_clusters()
                .map_err(miette::Report::new)?
                .into_iter()
                .filter(|c| organization.is_none() || c.organization == organization)
                .collect();
            print_clusters(output, &clusters)
        }
        Commands::Deployment(DeploymentCommand::Create {
            name,
            cluster_id,
            image,
            required,
            priority,
            owner,
        }) => {
            let request =
                NewDeployment::new(name, ClusterId::new(cluster_id), image, required.into())
                    .with_priority(priority)
                    .with_owner(owner);
            let deployment = store
                .create_deployment(request)
                .map_err(miette::Report::new)?;
            info!("Created deployment '{}' with id {}", deployment.name, deployment.id);

            let scheduler = new_scheduler(&store, SchedulerConfig::default());
            scheduler.recover_queue().map_err(miette::Report::new)?;
            scheduler.run_pass().map_err(miette::Report::new)?;

            let deployment = reload_deployments(&store, &[deployment])?;
            print_deployments(output, &deployment)
        }
        Commands::Deployment(DeploymentCommand::List { owner }) => {
            let deployments: Vec<_> = store
                .list_deployments()
                .map_err(miette::Report::new)?
                .into_iter()
                .filter(|d| owner.as_deref().map_or(true, |o| d.owner == o))
                .collect();
            print_deployments(output, &deployments)
        }
        Commands::Deployment(DeploymentCommand::SetStatus { id, status }) => {
            let deployment = store
                .set_status(DeploymentId::new(id), status)
                .map_err(miette::Report::new)?;
            print_deployments(output, &[deployment])
        }
        Commands::Apply { file } => run_apply(&store, &file, output),
        Commands::Schedule => {
            let scheduler = new_scheduler(&store, SchedulerConfig::default());
            scheduler.recover_queue().map_err(miette::Report::new)?;
            let report = scheduler.run_pass().map_err(miette::Report::new)?;
            print_report(output, &report)
        }
        Commands::Run {
            retry_interval_secs,
        } => {
            let config = SchedulerConfig {
                retry_interval: Duration::from_secs(retry_interval_secs),
            };
            run_worker(&store, config).await
        }
    }
}

/// Open (or create) the record store
fn open_store(data_dir: &Path) -> miette::Result<Arc<KvRecordStore>> {
    let store = KvRecordStore::open(data_dir).map_err(|e| {
        miette::miette!(
            "Failed to open storage at '{}': {}",
            data_dir.display(),
            e
        )
    })?;
    Ok(Arc::new(store))
}

fn new_scheduler(store: &Arc<KvRecordStore>, config: SchedulerConfig) -> Scheduler {
    Scheduler::new(store.clone(), config)
}

/// Apply a manifest and schedule the queued deployments it produced
fn run_apply(
    store: &Arc<KvRecordStore>,
    file: &Path,
    output: OutputFormat,
) -> miette::Result<()> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| miette::miette!("Failed to read manifest '{}': {}", file.display(), e))?;

    let applied = Manifest::from_yaml(&text)?.apply(store.as_ref())?;
    info!(
        "Applied manifest: {} clusters, {} deployments",
        applied.clusters.len(),
        applied.deployments.len()
    );

    let scheduler = new_scheduler(store, SchedulerConfig::default());
    scheduler.recover_queue().map_err(miette::Report::new)?;
    let report = scheduler.run_pass().map_err(miette::Report::new)?;
    info!("Scheduling pass: {}", report);

    let deployments = reload_deployments(store, &applied.deployments)?;
    print_deployments(output, &deployments)
}

/// Run the scheduler worker until ctrl-c
async fn run_worker(store: &Arc<KvRecordStore>, config: SchedulerConfig) -> miette::Result<()> {
    let scheduler = Arc::new(new_scheduler(store, config));
    scheduler.recover_queue().map_err(miette::Report::new)?;

    let token = CancellationToken::new();
    let scheduler_token = token.clone();
    let worker = scheduler.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = worker.run(scheduler_token).await {
            error!("Scheduler error: {}", e);
        }
    });

    info!(
        "Scheduler running with {} queued deployments",
        scheduler.queue_len()
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;

    info!("Shutting down gracefully...");
    token.cancel();

    let shutdown_timeout = Duration::from_secs(5);
    let _ = tokio::time::timeout(shutdown_timeout, scheduler_handle).await;

    info!("Shutdown complete");

    Ok(())
}

/// Read deployments again so printed statuses reflect the pass
fn reload_deployments(
    store: &Arc<KvRecordStore>,
    deployments: &[Deployment],
) -> miette::Result<Vec<Deployment>> {
    let mut current = Vec::with_capacity(deployments.len());
    for deployment in deployments {
        let latest = store
            .get_deployment(deployment.id)
            .map_err(miette::Report::new)?
            .unwrap_or_else(|| deployment.clone());
        current.push(latest);
    }
    Ok(current)
}

fn print_structured<T: Serialize>(output: OutputFormat, value: &T) -> miette::Result<bool> {
    let text = match output {
        OutputFormat::Table => return Ok(false),
        OutputFormat::Json => capstan_core::to_json_pretty(value),
        OutputFormat::Yaml => capstan_core::to_yaml(value),
    }
    .map_err(miette::Report::new)?;
    println!("{}", text.trim_end());
    Ok(true)
}

fn print_clusters(output: OutputFormat, clusters: &[Cluster]) -> miette::Result<()> {
    if print_structured(output, &clusters)? {
        return Ok(());
    }

    println!(
        "{:<6} {:<24} {:<16} {:<28} {:<28}",
        "ID", "NAME", "ORGANIZATION", "TOTAL", "AVAILABLE"
    );
    for cluster in clusters {
        println!(
            "{:<6} {:<24} {:<16} {:<28} {:<28}",
            cluster.id.to_string(),
            cluster.name,
            cluster.organization.as_deref().unwrap_or("-"),
            cluster.total.to_string(),
            cluster.available.to_string()
        );
    }
    Ok(())
}

fn print_deployments(output: OutputFormat, deployments: &[Deployment]) -> miette::Result<()> {
    if print_structured(output, &deployments)? {
        return Ok(());
    }

    println!(
        "{:<6} {:<24} {:<12} {:<8} {:<9} {:<8} {:<28}",
        "ID", "NAME", "OWNER", "CLUSTER", "PRIORITY", "STATUS", "REQUIRED"
    );
    for deployment in deployments {
        println!(
            "{:<6} {:<24} {:<12} {:<8} {:<9} {:<8} {:<28}",
            deployment.id.to_string(),
            deployment.name,
            deployment.owner,
            deployment.cluster_id.to_string(),
            deployment.priority,
            deployment.status.to_string(),
            deployment.required.to_string()
        );
    }
    Ok(())
}

fn print_report(output: OutputFormat, report: &PassReport) -> miette::Result<()> {
    if print_structured(output, report)? {
        return Ok(());
    }
    println!("{}", report);
    Ok(())
}
