//! Error types for caseq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("broker error: {0}")]
    Broker(#[from] sqlx::Error),

    #[error("malformed job payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("failed to spawn {script}: {source}")]
    Spawn {
        script: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{script} exited with status {status}: {stderr}")]
    Script {
        script: String,
        status: i32,
        stderr: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
