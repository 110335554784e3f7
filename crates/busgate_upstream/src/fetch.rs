use std::time::Duration;

use async_trait::async_trait;
use busgate_config::UpstreamConfig;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::query::UpstreamQuery;
use crate::xml::XmlError;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid upstream base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build upstream http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("failed to read upstream body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("malformed upstream body: {0}")]
    Malformed(#[from] XmlError),
}

/// Feed client seam used by the dispatcher.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Performs one GET and returns the raw (XML) body.
    async fn fetch(&self, query: &UpstreamQuery) -> Result<String, FetchError>;
}

/// reqwest-backed feed client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url).map_err(|source| FetchError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(cfg: &UpstreamConfig) -> Result<Self, FetchError> {
        Self::new(cfg.base_url(), cfg.timeout(), cfg.user_agent())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self, query), fields(command = %query.command()))]
    async fn fetch(&self, query: &UpstreamQuery) -> Result<String, FetchError> {
        let url = query.to_url(&self.base_url);
        debug!(target: "busgate::upstream", %url, "Fetching from transit feed");

        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e)
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(
                target: "busgate::upstream",
                status = status.as_u16(),
                "Transit feed returned non-success status"
            );
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Body(e)
            }
        })?;

        debug!(
            target: "busgate::upstream",
            bytes = body.len(),
            "Transit feed responded"
        );
        Ok(body)
    }
}
