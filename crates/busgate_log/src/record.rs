use serde::Serialize;

pub type LogId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestLogRecord {
    pub id: LogId,
    pub method: String,
    pub url: String,
    /// Milliseconds; `None` until the request finished.
    pub response_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlCount {
    pub url: String,
    pub num: i64,
}
