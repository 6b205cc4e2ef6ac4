#![forbid(unsafe_code)]

//! `pod-migrate-ctl` is the initiator-side CLI for `pod-migrate-agent`.
//!
//! Triggers remote checkpoints over verified TLS and prints the resulting
//! artifact manifest as JSON on stdout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use pod_migrate::client::{MigrationTarget, TriggerClient};
use pod_migrate::config::GlobalConfig;
use pod_migrate::models::workload::WorkloadUid;
use pod_migrate::pods::registry::PodRegistry;
use pod_migrate::{AppError, Result};

#[derive(Debug, Parser)]
#[command(
    name = "pod-migrate-ctl",
    about = "Trigger pod live migrations on remote agents",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file (TLS material, timeouts, manifest).
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Checkpoint the clone of a pod listed in the pod manifest.
    Trigger {
        /// Namespace of the pod to migrate.
        #[arg(long, default_value = "default")]
        namespace: String,
        /// Name of the pod to migrate.
        pod: String,
    },

    /// Checkpoint an explicit pod on an explicit host.
    Request {
        /// Node address of the agent.
        #[arg(long)]
        host: String,
        /// Pod uid on that node.
        #[arg(long)]
        uid: String,
        /// Containers to checkpoint; all when omitted.
        #[arg(long, value_delimiter = ',')]
        containers: Vec<String>,
    },

    /// List migrations in flight on an agent.
    List {
        /// Node address of the agent.
        #[arg(long)]
        host: String,
    },
}

fn main() -> ExitCode {
    let args = Cli::parse();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt().with_env_filter(env_filter).with_writer(std::io::stderr).try_init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to build tokio runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<String> {
    let config = GlobalConfig::load_from_path(&args.config)?;

    let registry = Arc::new(PodRegistry::new());
    if let Some(manifest) = &config.pods_manifest {
        registry.load_manifest(manifest)?;
    }
    let client = TriggerClient::new(&config.client, &config.timeouts, Arc::clone(&registry) as _)?;

    let value = match args.command {
        Command::Trigger { namespace, pod } => {
            let workload = registry.find_by_name(&namespace, &pod).ok_or_else(|| {
                AppError::Lookup(format!("pod {namespace}/{pod} is not in the pod manifest"))
            })?;
            to_json(&client.trigger_pod_migration(&workload).await?)?
        }
        Command::Request {
            host,
            uid,
            containers,
        } => {
            let target = MigrationTarget {
                host,
                port: config.client.agent_port,
                pod_uid: WorkloadUid::new(uid),
                containers,
            };
            to_json(&client.request_migration(target.url()?).await?)?
        }
        Command::List { host } => to_json(&client.list_migrations(&host).await?)?,
    };
    Ok(value)
}

fn to_json(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Decode(format!("failed to encode output: {err}")))
}
