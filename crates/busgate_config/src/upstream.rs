use std::time::Duration;

use serde::Deserialize;

pub const NEXTBUS_FEED_URL: &str = "http://webservices.nextbus.com/service/publicXMLFeed";

// =======================================================
// UPSTREAM (TRANSIT FEED) CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Feed endpoint; `command` and parameters are appended as the query.
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: NEXTBUS_FEED_URL.into(),
            timeout_secs: 10,
            user_agent: concat!("busgate/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl UpstreamConfig {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &UpstreamConfig) {
        if self.base_url.trim().is_empty() {
            self.base_url = defaults.base_url.clone();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = defaults.timeout_secs;
        }
        if self.user_agent.trim().is_empty() {
            self.user_agent = defaults.user_agent.clone();
        }
    }
}
