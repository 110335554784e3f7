use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use busgate_config::StoreConfig;
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::{LogError, LogId, RequestLog, RequestLogRecord, UrlCount};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS request_logs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    method        TEXT NOT NULL,
    url           TEXT NOT NULL,
    response_time INTEGER
);
CREATE INDEX IF NOT EXISTS idx_request_logs_url ON request_logs (url);
CREATE INDEX IF NOT EXISTS idx_request_logs_response_time ON request_logs (response_time);
";

/// SQLite request log. Queries run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteRequestLog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRequestLog {
    pub fn open(path: &str) -> Result<Self, LogError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        info!(target: "busgate::log", path, journal_mode = %mode, "Opened request log store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, LogError> {
        Self::init(Connection::open_in_memory()?)
    }

    pub fn from_config(cfg: &StoreConfig) -> Result<Self, LogError> {
        if cfg.is_in_memory() {
            Self::open_in_memory()
        } else {
            Self::open(cfg.path())
        }
    }

    fn init(conn: Connection) -> Result<Self, LogError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, LogError>
    where
        F: FnOnce(&Connection) -> Result<T, LogError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| LogError::Poisoned)?;
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl RequestLog for SqliteRequestLog {
    async fn begin(&self, method: &str, url: &str) -> Result<LogId, LogError> {
        let method = method.to_string();
        let url = url.to_string();
        let id = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO request_logs (method, url) VALUES (?1, ?2)",
                    params![method, url],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        debug!(target: "busgate::log", id, "Request log record created");
        Ok(id)
    }

    async fn finish(&self, id: LogId, elapsed_ms: u64) -> Result<(), LogError> {
        let elapsed = i64::try_from(elapsed_ms).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE request_logs SET response_time = ?1 WHERE id = ?2",
                params![elapsed, id],
            )?;
            if changed == 0 {
                return Err(LogError::UnknownId(id));
            }
            Ok(())
        })
        .await
    }

    async fn url_counts(&self, limit: usize) -> Result<Vec<UrlCount>, LogError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT url, COUNT(*) AS num FROM request_logs
                 GROUP BY url ORDER BY url DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(UrlCount {
                    url: row.get(0)?,
                    num: row.get(1)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn slowest(&self, limit: usize) -> Result<Vec<RequestLogRecord>, LogError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, method, url, response_time FROM request_logs
                 ORDER BY response_time DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(RequestLogRecord {
                    id: row.get(0)?,
                    method: row.get(1)?,
                    url: row.get(2)?,
                    response_time: row.get(3)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }
}
