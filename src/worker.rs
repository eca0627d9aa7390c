//! Worker daemon: dequeue loops, the per-job handler, and the event
//! stream.
//!
//! One serial loop per channel. Each loop claims one job at a time from
//! its queue, runs the channel's fixed script through the script runner,
//! archives the message on success, and leaves it for visibility-timeout
//! redelivery on failure. The broker's redelivery is the only retry
//! policy — no extra count, backoff, or dead-letter routing exists here,
//! and operators must not assume bounded retries.
//!
//! Delivery is at-least-once: a job may run twice after a crash. That is
//! safe exactly when the external script is idempotent, which is a
//! contract on the script, not something this crate enforces.

use crate::broker::Broker;
use crate::broker::pgmq::notify_channel;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::job::{Channel, Job, JobOutcome};
use crate::runner::ScriptRunner;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tracing::{debug, error, info, warn};

/// Configuration for the worker loops.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Visibility timeout (seconds) for queue reads; a failed job
    /// reappears after this long.
    pub visibility_timeout: i32,
    /// Poll interval fallback when no NOTIFY arrives.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: 60,
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Per-job events published to the host program, which owns logging and
/// alerting. No result travels back to the producer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Completed {
        channel: Channel,
        job_id: i64,
        name: String,
        status: String,
    },
    Failed {
        channel: Channel,
        job_id: i64,
        name: String,
        error: String,
    },
}

/// Worker state. Explicitly `Disabled` when the broker is unconfigured,
/// so call sites branch on configuration instead of holding a worker
/// that silently does nothing.
pub enum Worker {
    Active(ActiveWorker),
    Disabled,
}

impl Worker {
    pub fn new(dispatcher: &Dispatcher, runner: ScriptRunner, config: WorkerConfig) -> Self {
        match dispatcher.broker() {
            Some(broker) => Worker::Active(ActiveWorker::new(broker, runner, config)),
            None => Worker::Disabled,
        }
    }
}

/// A worker bound to a live broker.
#[derive(Clone)]
pub struct ActiveWorker {
    broker: Arc<Broker>,
    runner: Arc<ScriptRunner>,
    config: WorkerConfig,
    stopping: Arc<AtomicBool>,
    stop: Arc<Notify>,
    events: broadcast::Sender<JobEvent>,
}

impl ActiveWorker {
    pub fn new(broker: Arc<Broker>, runner: ScriptRunner, config: WorkerConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            broker,
            runner: Arc::new(runner),
            config,
            stopping: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(Notify::new()),
            events,
        }
    }

    /// Subscribe to the per-job event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Signal the worker to stop. Loops exit between jobs; there is no
    /// graceful drain, and an in-flight script may be killed with the
    /// process.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.stop.notify_waiters();
    }

    /// Run the dequeue loops for every channel until shutdown.
    pub async fn run(&self) -> Result<()> {
        info!("worker started");

        let mut tasks = tokio::task::JoinSet::new();
        for channel in Channel::ALL {
            let worker = self.clone();
            tasks.spawn(async move { worker.channel_loop(channel).await });
        }

        let mut first_err = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "channel loop error");
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                Err(e) => error!(error = %e, "channel task panicked"),
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn channel_loop(&self, channel: Channel) -> Result<()> {
        let mut listener = sqlx::postgres::PgListener::connect_with(self.broker.pool()).await?;
        listener
            .listen(&notify_channel(channel.queue_name()))
            .await?;

        info!(%channel, "worker subscribed");

        loop {
            if self.stopping.load(Ordering::SeqCst) {
                info!(%channel, "worker loop stopping");
                return Ok(());
            }

            // Wait for: shutdown, a wakeup from an enqueue, or the poll
            // timeout.
            tokio::select! {
                _ = self.stop.notified() => continue,
                notif = listener.recv() => {
                    if let Err(e) = notif {
                        warn!(%channel, "listener error: {e}, falling back to poll");
                    }
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            // Drain whatever is available, one job at a time.
            loop {
                if self.stopping.load(Ordering::SeqCst) {
                    break;
                }
                match self.process_next(channel).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        error!(%channel, error = %e, "dequeue error");
                        break;
                    }
                }
            }
        }
    }

    /// Claim and handle at most one job. Returns whether a message was
    /// read.
    async fn process_next(&self, channel: Channel) -> Result<bool> {
        let msg = self
            .broker
            .read_job(channel.queue_name(), self.config.visibility_timeout)
            .await?;
        let Some(msg) = msg else {
            return Ok(false);
        };

        let job: Job = match serde_json::from_value(msg.message.clone()) {
            Ok(job) => job,
            Err(e) => {
                // An undecodable payload would redeliver forever; archive
                // it instead of letting it poison the queue.
                error!(%channel, job_id = msg.msg_id, error = %e, "malformed job payload, archiving");
                self.broker
                    .archive_job(channel.queue_name(), msg.msg_id)
                    .await?;
                return Ok(true);
            }
        };

        info!(
            %channel,
            job_id = msg.msg_id,
            name = %job.name,
            attempt = msg.read_ct,
            "processing job"
        );

        match execute_job(&self.runner, channel, &job).await {
            Ok(outcome) => {
                self.broker
                    .archive_job(channel.queue_name(), msg.msg_id)
                    .await?;
                info!(%channel, job_id = msg.msg_id, status = %outcome.status, "job completed");
                let _ = self.events.send(JobEvent::Completed {
                    channel,
                    job_id: msg.msg_id,
                    name: job.name,
                    status: outcome.status,
                });
            }
            Err(e) => {
                // Leave the message unarchived — the visibility timeout
                // will make it reappear for redelivery.
                error!(%channel, job_id = msg.msg_id, error = %e, "job failed");
                let _ = self.events.send(JobEvent::Failed {
                    channel,
                    job_id: msg.msg_id,
                    name: job.name,
                    error: e.to_string(),
                });
            }
        }

        Ok(true)
    }
}

/// The per-job handler: run the channel's fixed script with the job's
/// argument vector, defaulting to no arguments when the payload carries
/// none, and report the channel's completion status.
///
/// Re-running this with the same payload is safe exactly when the
/// external script is idempotent.
pub async fn execute_job(runner: &ScriptRunner, channel: Channel, job: &Job) -> Result<JobOutcome> {
    let stdout = runner.run(channel.script(), &job.payload.args).await?;
    debug!(%channel, name = %job.name, stdout_bytes = stdout.len(), "script finished");
    Ok(JobOutcome {
        status: channel.done_status().to_string(),
    })
}
