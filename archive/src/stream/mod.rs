//! Durable input stream: every user turn is appended here and scored later by
//! the memory worker.
//!
//! The append path must never block a response, so API handlers call
//! [`append_detached`] which fires a task and forgets it. The worker is the
//! stream's single consumer; its cursor is externalized under `LAST_ID_KEY`
//! so a restart resumes where the previous process stopped.

mod in_memory_stream;
mod redis_stream;

pub use in_memory_stream::InMemoryInputStream;
pub use redis_stream::RedisInputStream;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("input stream unavailable: {0}")]
    Unavailable(String),
}

/// One appended turn.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StreamEntry {
    pub message: String,
    pub session_id: String,
    pub timestamp: f64,
}

impl StreamEntry {
    pub fn new(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: session_id.into(),
            timestamp: crate::memory::now_epoch_secs(),
        }
    }
}

/// Cursor position for the single consumer. `Beginning` reads from the
/// oldest retained entry; `Latest` skips history on cold start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cursor {
    Beginning,
    Latest,
    At(String),
}

/// Append-only stream of user turns with a persisted consumer cursor.
#[async_trait]
pub trait InputStream: Send + Sync {
    /// Appends one entry and returns its stream id.
    async fn append(&self, entry: StreamEntry) -> Result<String, StreamError>;

    /// Reads up to `count` entries after `cursor`, blocking at most `block`
    /// when nothing is pending. Returns `(id, entry)` pairs in stream order.
    async fn read_batch(
        &self,
        cursor: &Cursor,
        count: usize,
        block: Duration,
    ) -> Result<Vec<(String, StreamEntry)>, StreamError>;

    /// Trims the stream to approximately `maxlen` newest entries.
    async fn trim(&self, maxlen: usize) -> Result<(), StreamError>;

    /// Persisted consumer cursor, when one has been written.
    async fn read_cursor(&self) -> Result<Option<String>, StreamError>;

    /// Persists the consumer cursor. Only the memory worker calls this.
    async fn write_cursor(&self, id: &str) -> Result<(), StreamError>;

    /// Id of the newest entry, or `None` when the stream is empty.
    async fn latest_id(&self) -> Result<Option<String>, StreamError>;
}

/// Fire-and-forget append used by request handlers: the HTTP response never
/// waits on the stream. Failures are only logged; losing one candidate turn
/// is acceptable, blocking a user reply is not.
pub fn append_detached(stream: Arc<dyn InputStream>, entry: StreamEntry) {
    tokio::spawn(async move {
        if let Err(e) = stream.append(entry).await {
            tracing::warn!(error = %e, "failed to append turn to input stream");
        }
    });
}
