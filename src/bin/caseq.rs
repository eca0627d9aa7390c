//! caseq CLI — worker daemon and producer-side job submission.

use caseq::config::Config;
use caseq::dispatch::Dispatcher;
use caseq::job::{Channel, JobPayload};
use caseq::runner::ScriptRunner;
use caseq::telemetry::init_logging;
use caseq::worker::{JobEvent, Worker, WorkerConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    name = "caseq",
    about = "Background job dispatch for the recovery case dashboard"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker daemon
    Serve {
        /// Directory containing the external analytical scripts
        #[arg(long, default_value = ".")]
        script_dir: PathBuf,
        /// Visibility timeout (seconds) for queue reads
        #[arg(long, default_value_t = 60)]
        visibility_timeout: i32,
        /// Poll interval (seconds) when no wakeup arrives
        #[arg(long, default_value_t = 5)]
        poll_interval_secs: u64,
    },
    /// Enqueue a job
    Enqueue {
        #[command(subcommand)]
        job: EnqueueJob,
    },
    /// Check broker connectivity
    Health,
}

#[derive(Subcommand)]
enum EnqueueJob {
    /// Queue a reallocation run for a rejected case
    Reallocate {
        /// Case to reallocate
        #[arg(long)]
        case_id: String,
        /// Agency that rejected the case
        #[arg(long)]
        rejected_by: String,
    },
    /// Queue a portfolio ingestion run
    Ingest,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    init_logging(&config.log_level)?;

    match cli.command {
        Command::Serve {
            script_dir,
            visibility_timeout,
            poll_interval_secs,
        } => cmd_serve(config, script_dir, visibility_timeout, poll_interval_secs).await,
        Command::Enqueue { job } => cmd_enqueue(config, job).await,
        Command::Health => cmd_health(config).await,
    }
}

async fn cmd_serve(
    config: Config,
    script_dir: PathBuf,
    visibility_timeout: i32,
    poll_interval_secs: u64,
) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::connect(config.broker.as_ref()).await?;
    let runner = ScriptRunner::new(config.database_url).with_script_dir(script_dir);
    let worker = Worker::new(
        &dispatcher,
        runner,
        WorkerConfig {
            visibility_timeout,
            poll_interval: Duration::from_secs(poll_interval_secs),
        },
    );

    let worker = match worker {
        Worker::Active(worker) => worker,
        Worker::Disabled => {
            warn!("broker not configured — worker disabled, exiting");
            return Ok(());
        }
    };

    // The host program owns per-job logging and alerting.
    let mut events = worker.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(JobEvent::Completed {
                    channel,
                    job_id,
                    name,
                    status,
                }) => info!(%channel, job_id, name = %name, status = %status, "job finished"),
                Ok(JobEvent::Failed {
                    channel,
                    job_id,
                    name,
                    error,
                }) => error!(%channel, job_id, name = %name, error = %error, "job failed"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event listener lagged")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let handle = worker.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        handle.shutdown();
    });

    worker.run().await?;
    Ok(())
}

async fn cmd_enqueue(config: Config, job: EnqueueJob) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::connect(config.broker.as_ref()).await?;

    let (channel, name, payload) = match job {
        EnqueueJob::Reallocate {
            case_id,
            rejected_by,
        } => (
            Channel::Allocation,
            "reallocate-job",
            JobPayload::new(vec![
                "--mode".to_string(),
                "reallocate".to_string(),
                "--case_id".to_string(),
                case_id.clone(),
                "--rejected_by".to_string(),
                rejected_by.clone(),
            ])
            .with_context("caseId", serde_json::json!(case_id))
            .with_context("rejectedBy", serde_json::json!(rejected_by)),
        ),
        EnqueueJob::Ingest => (
            Channel::Ingestion,
            "ingest-job",
            JobPayload::new(vec!["--mode".to_string(), "ingest".to_string()]),
        ),
    };

    match dispatcher.enqueue(channel, name, payload).await? {
        Some(handle) => println!("Enqueued: {name} (job {} on {})", handle.id, channel),
        None => println!("Queues disabled — job dropped."),
    }

    Ok(())
}

async fn cmd_health(config: Config) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::connect(config.broker.as_ref()).await?;

    match dispatcher.broker() {
        Some(broker) => {
            broker.health_check().await?;
            println!("Broker OK.");
        }
        None => println!("Broker not configured — degraded mode."),
    }

    Ok(())
}
