use serde::Deserialize;

// =======================================================
// GLOBAL CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Maximum number of simultaneously served client connections.
    pub max_connections: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info,busgate=debug".into(),
            max_connections: 1024,
        }
    }
}

impl GlobalConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &GlobalConfig) {
        if self.log_level.trim().is_empty() {
            self.log_level = defaults.log_level.clone();
        }
        if self.max_connections == 0 {
            self.max_connections = defaults.max_connections;
        }
    }
}
