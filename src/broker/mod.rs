//! Broker connection pool and health check.
//!
//! One shared Postgres pool backs every queue operation. The broker
//! (pgmq) is the sole source of truth for job state; this crate never
//! persists job state itself.

pub mod pgmq;

use crate::error::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Broker handle. Owns the connection pool shared by producers and the
/// worker. Constructed once at process start, never reconfigured.
pub struct Broker {
    pool: PgPool,
}

impl Broker {
    /// Connect to the broker endpoint and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Simple health check — run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool (for submodules and the
    /// worker's NOTIFY listener).
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
