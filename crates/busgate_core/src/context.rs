use std::time::Instant;

use busgate_log::LogId;

/// Per-request state carried through the dispatch pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    log_id: LogId,
    started: Instant,
}

impl RequestContext {
    pub fn new(log_id: LogId, started: Instant) -> Self {
        Self { log_id, started }
    }

    pub fn log_id(&self) -> LogId {
        self.log_id
    }

    /// Whole milliseconds since the request was accepted.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
