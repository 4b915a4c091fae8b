mod commands;
mod session;

use clap::{Args, Parser, Subcommand, ValueEnum};
use hcsync_core::ResourceKind;
use hcsync_core::model::CvmRelKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hcsync")]
#[command(about = "Reconcile the local resource inventory with cloud accounts", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// JSON inventory of the cloud account to reconcile against
    #[arg(long, env = "HCSYNC_CLOUD", global = true)]
    pub cloud: Option<PathBuf>,

    /// Directory holding `.hcsync/store.json`
    #[arg(long, env = "HCSYNC_STATE_DIR", default_value = ".", global = true)]
    pub state_dir: PathBuf,

    /// Debug logging (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Expected vendor of the cloud inventory
    #[arg(long)]
    pub vendor: Option<hcsync_core::Vendor>,

    /// Cloud account id
    #[arg(short, long, env = "HCSYNC_ACCOUNT")]
    pub account: String,

    /// Region to sync
    #[arg(short, long, default_value = "")]
    pub region: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync one resource type
    Sync {
        /// Resource type (vpc, subnet, security-group, disk, cvm, ...)
        resource: ResourceKind,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Only sync these cloud ids
        #[arg(long = "cloud-id")]
        cloud_ids: Vec<String>,
        /// Load balancer cloud id, for listener syncs
        #[arg(long)]
        lb_id: Option<String>,
        /// Security group cloud id, for rule syncs
        #[arg(long)]
        security_group_id: Option<String>,
        /// Disks to mark as instance system disks
        #[arg(long = "boot-disk-id")]
        boot_disk_ids: Vec<String>,
    },
    /// Sync load balancers with their security groups, listeners, rules and backends
    SyncLb {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long = "cloud-id")]
        cloud_ids: Vec<String>,
    },
    /// Sync instances after the resources they use, then their relations
    SyncCvmRel {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long = "cloud-id")]
        cloud_ids: Vec<String>,
        /// Relations to sync; defaults to all the vendor supports
        #[arg(long = "rel", value_enum)]
        rels: Vec<RelArg>,
    },
    /// Delete stored resources the cloud no longer reports
    Sweep {
        resource: ResourceKind,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Load balancer cloud id, for listener sweeps
        #[arg(long)]
        lb_id: Option<String>,
    },
    /// Show the effective configuration
    Config,
    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RelArg {
    SecurityGroup,
    Disk,
    Eip,
}

impl From<RelArg> for CvmRelKind {
    fn from(arg: RelArg) -> Self {
        match arg {
            RelArg::SecurityGroup => CvmRelKind::SecurityGroup,
            RelArg::Disk => CvmRelKind::Disk,
            RelArg::Eip => CvmRelKind::Eip,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match cli.command {
        Commands::Sync {
            resource,
            scope,
            cloud_ids,
            lb_id,
            security_group_id,
            boot_disk_ids,
        } => {
            let target = commands::sync::SyncTarget {
                resource,
                cloud_ids,
                lb_id,
                security_group_id,
                boot_disk_ids,
            };
            commands::sync::handle(&cli.global, &scope, target).await?;
        }
        Commands::SyncLb { scope, cloud_ids } => {
            commands::sync::handle_lb(&cli.global, &scope, cloud_ids).await?;
        }
        Commands::SyncCvmRel {
            scope,
            cloud_ids,
            rels,
        } => {
            let kinds = rels.into_iter().map(CvmRelKind::from).collect();
            commands::sync::handle_cvm_rel(&cli.global, &scope, cloud_ids, kinds).await?;
        }
        Commands::Sweep {
            resource,
            scope,
            lb_id,
        } => {
            commands::sweep::handle(&cli.global, &scope, resource, lb_id.as_deref()).await?;
        }
        Commands::Config => {
            commands::config::handle()?;
        }
        Commands::Version => {
            println!("hcsync {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
