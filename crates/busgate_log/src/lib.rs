//! Request log: one record per inbound request, later stamped with the
//! response time, plus the statistics queries served by `/requests` and
//! `/slowest`.

mod record;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

pub use record::{LogId, RequestLogRecord, UrlCount};
pub use sqlite::SqliteRequestLog;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("request log database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("request log connection lock poisoned")]
    Poisoned,

    #[error("request log task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("no request log record with id {0}")]
    UnknownId(LogId),
}

/// Persistence seam for request records.
#[async_trait]
pub trait RequestLog: Send + Sync {
    /// Persists `(method, url)` and returns the new record id.
    async fn begin(&self, method: &str, url: &str) -> Result<LogId, LogError>;

    /// Sets the record's response time. Repeated calls overwrite; last write wins.
    async fn finish(&self, id: LogId, elapsed_ms: u64) -> Result<(), LogError>;

    /// Request counts per distinct url, ordered by url descending.
    async fn url_counts(&self, limit: usize) -> Result<Vec<UrlCount>, LogError>;

    /// Records with the largest response time first.
    async fn slowest(&self, limit: usize) -> Result<Vec<RequestLogRecord>, LogError>;
}
