//! pgmq queue operations via direct SQLx.
//!
//! Calls pgmq's SQL functions: pgmq.create, pgmq.send, pgmq.read,
//! pgmq.archive. Delivery is at-least-once: a message read but never
//! archived reappears once its visibility timeout lapses.

use crate::error::Result;

/// A message read from a pgmq queue.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub msg_id: i64,
    /// Delivery attempt count, maintained by the broker.
    pub read_ct: i32,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
    /// Visibility deadline; the message is redelivered after this.
    pub vt: chrono::DateTime<chrono::Utc>,
    pub message: serde_json::Value,
}

/// NOTIFY channel a queue's wakeups are published on. Producers and the
/// worker must agree on this convention.
pub fn notify_channel(queue_name: &str) -> String {
    format!("{queue_name}_ready")
}

impl super::Broker {
    /// Create a pgmq queue (idempotent).
    pub async fn create_queue(&self, queue_name: &str) -> Result<()> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(queue_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Send a job payload to a queue. Returns the broker-assigned
    /// message id.
    ///
    /// The send and its wakeup share a transaction — NOTIFY only fires
    /// on commit, so a listener can never wake before the message is
    /// durably queued. Delay is always zero: the design has no
    /// schedule/delay semantics.
    pub async fn send_job(&self, queue_name: &str, payload: &serde_json::Value) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let row: (i64,) = sqlx::query_as("SELECT pgmq.send($1, $2, $3)")
            .bind(queue_name)
            .bind(payload)
            .bind(0i32)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(notify_channel(queue_name))
            .bind(row.0.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.0)
    }

    /// Read the next message from a queue (visibility timeout in
    /// seconds). Returns None if the queue is empty.
    pub async fn read_job(
        &self,
        queue_name: &str,
        vt_seconds: i32,
    ) -> Result<Option<QueuedMessage>> {
        let row = sqlx::query_as::<
            _,
            (
                i64,
                i32,
                chrono::DateTime<chrono::Utc>,
                chrono::DateTime<chrono::Utc>,
                serde_json::Value,
            ),
        >(
            "SELECT msg_id, read_ct, enqueued_at, vt, message FROM pgmq.read($1, $2, 1)"
        )
        .bind(queue_name)
        .bind(vt_seconds)
        .fetch_optional(&self.pool)
        .await?;

        Ok(
            row.map(|(msg_id, read_ct, enqueued_at, vt, message)| QueuedMessage {
                msg_id,
                read_ct,
                enqueued_at,
                vt,
                message,
            }),
        )
    }

    /// Archive a message (moves to the archive table, preserved for
    /// audit). Called once a job's handler has succeeded.
    pub async fn archive_job(&self, queue_name: &str, msg_id: i64) -> Result<()> {
        sqlx::query("SELECT pgmq.archive($1, $2)")
            .bind(queue_name)
            .bind(msg_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
