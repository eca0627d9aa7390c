//! Job data model.
//!
//! A job is a unit of dispatch: a channel selecting which worker loop
//! handles it, a free-text name for log correlation, and a payload whose
//! `args` are handed verbatim to the external script. Context fields
//! ride along for audit logging only; dispatch never reads them.

use serde::{Deserialize, Serialize};

/// The named durable channels. Each maps to one pgmq queue and one
/// fixed external script invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Allocation,
    Ingestion,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Allocation, Channel::Ingestion];

    /// The pgmq queue backing this channel.
    pub fn queue_name(self) -> &'static str {
        match self {
            Channel::Allocation => "allocation_queue",
            Channel::Ingestion => "ingestion_queue",
        }
    }

    /// The external script this channel's handler runs. Ingestion routes
    /// through the allocation script with `--mode ingest` in its args.
    pub fn script(self) -> &'static str {
        match self {
            Channel::Allocation => "Allocation.py",
            Channel::Ingestion => "Allocation.py",
        }
    }

    /// Status string reported when a job on this channel completes.
    pub fn done_status(self) -> &'static str {
        match self {
            Channel::Allocation => "completed",
            Channel::Ingestion => "ingested",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Allocation => write!(f, "allocation"),
            Channel::Ingestion => write!(f, "ingestion"),
        }
    }
}

/// A job as it travels over the wire: one flat JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Label for logging and tracing. Not used for dispatch.
    pub name: String,
    #[serde(flatten)]
    pub payload: JobPayload,
}

impl Job {
    pub fn new(name: impl Into<String>, payload: JobPayload) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Job payload: the script argument vector plus opaque context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPayload {
    /// Ordered arguments passed verbatim to the external script.
    /// Absent on the wire means empty.
    #[serde(default)]
    pub args: Vec<String>,

    /// Channel-specific context (e.g. `caseId`, `rejectedBy`), carried
    /// for audit logging only.
    #[serde(flatten)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl JobPayload {
    pub fn new(args: Vec<String>) -> Self {
        Self {
            args,
            context: serde_json::Map::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Handle returned to a producer after a successful enqueue. The id is
/// assigned by the broker and is only good for log correlation — there
/// is no way to await the job's outcome through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub id: i64,
    pub channel: Channel,
}

/// Structured result a channel handler reports on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub status: String,
}
