//! Queue connection registry and the enqueue contract.
//!
//! The dispatcher is built exactly once at process start and passed by
//! reference to every producer; nothing re-reads live environment state
//! mid-request. When the broker endpoint is unconfigured the dispatcher
//! is explicitly `Disabled` and every enqueue is a silent no-op —
//! producers must not assume delivery in that mode.

use crate::broker::Broker;
use crate::config::BrokerSettings;
use crate::error::Result;
use crate::job::{Channel, Job, JobHandle, JobPayload};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, warn};

pub enum Dispatcher {
    /// Bound to a live broker; both channel queues exist.
    Enabled { broker: Arc<Broker> },
    /// No broker endpoint configured. Degraded mode, not a failure.
    Disabled,
}

impl Dispatcher {
    /// Connect to the broker and create both channel queues, or come up
    /// disabled when no endpoint is configured.
    pub async fn connect(settings: Option<&BrokerSettings>) -> Result<Self> {
        let Some(settings) = settings else {
            warn!("broker not configured — job dispatch disabled");
            return Ok(Dispatcher::Disabled);
        };

        let broker = Broker::connect(settings.url.expose_secret()).await?;
        for channel in Channel::ALL {
            broker.create_queue(channel.queue_name()).await?;
        }
        info!("broker connected, channel queues ready");

        Ok(Dispatcher::Enabled {
            broker: Arc::new(broker),
        })
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Dispatcher::Enabled { .. })
    }

    /// The shared broker handle, if connected.
    pub fn broker(&self) -> Option<Arc<Broker>> {
        match self {
            Dispatcher::Enabled { broker } => Some(Arc::clone(broker)),
            Dispatcher::Disabled => None,
        }
    }

    /// Enqueue a job on a channel. Fire-and-forget: the handle is only
    /// good for log correlation, and callers must not await the job's
    /// outcome through this subsystem.
    ///
    /// Returns `Ok(None)` without touching the network when disabled.
    /// Broker rejection propagates to the caller, who decides whether to
    /// surface it.
    pub async fn enqueue(
        &self,
        channel: Channel,
        name: &str,
        payload: JobPayload,
    ) -> Result<Option<JobHandle>> {
        let broker = match self {
            Dispatcher::Enabled { broker } => broker,
            Dispatcher::Disabled => {
                warn!(%channel, job = name, "broker not configured, dropping job");
                return Ok(None);
            }
        };

        let message = serde_json::to_value(Job::new(name, payload))?;
        let msg_id = broker.send_job(channel.queue_name(), &message).await?;
        info!(%channel, job = name, job_id = msg_id, "job enqueued");

        Ok(Some(JobHandle {
            id: msg_id,
            channel,
        }))
    }
}
