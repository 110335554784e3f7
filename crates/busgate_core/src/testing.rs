use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use busgate_log::{LogError, LogId, RequestLog, RequestLogRecord, UrlCount};
use busgate_upstream::{FetchError, Fetcher, UpstreamQuery};

pub const AGENCY_LIST_XML: &str =
    r#"<body><agency tag="sf-muni" title="San Francisco Muni"/></body>"#;

/// Fake feed that records every query and answers with a canned body.
pub struct RecordingFetcher {
    calls: Mutex<Vec<UpstreamQuery>>,
    body: Mutex<String>,
    failing: AtomicBool,
}

impl RecordingFetcher {
    pub fn new(body: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            body: Mutex::new(body.to_string()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<UpstreamQuery> {
        self.calls.lock().unwrap().clone()
    }

    /// While set, every fetch fails with a 503 from the feed.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn respond_with(&self, body: &str) {
        *self.body.lock().unwrap() = body.to_string();
    }
}

#[async_trait]
impl Fetcher for RecordingFetcher {
    async fn fetch(&self, query: &UpstreamQuery) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(query.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Status(503));
        }
        Ok(self.body.lock().unwrap().clone())
    }
}

/// Request log whose store is broken at one step.
pub struct FailingLog {
    fail_begin: bool,
}

impl FailingLog {
    /// Every `begin` fails.
    pub fn on_begin() -> Self {
        Self { fail_begin: true }
    }

    /// `begin` succeeds, every `finish` fails.
    pub fn on_finish() -> Self {
        Self { fail_begin: false }
    }
}

#[async_trait]
impl RequestLog for FailingLog {
    async fn begin(&self, _method: &str, _url: &str) -> Result<LogId, LogError> {
        if self.fail_begin {
            return Err(LogError::Poisoned);
        }
        Ok(1)
    }

    async fn finish(&self, _id: LogId, _elapsed_ms: u64) -> Result<(), LogError> {
        Err(LogError::Poisoned)
    }

    async fn url_counts(&self, _limit: usize) -> Result<Vec<UrlCount>, LogError> {
        Ok(Vec::new())
    }

    async fn slowest(&self, _limit: usize) -> Result<Vec<RequestLogRecord>, LogError> {
        Ok(Vec::new())
    }
}
