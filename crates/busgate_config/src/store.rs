use serde::Deserialize;

// =======================================================
// REQUEST LOG STORE CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file, or `:memory:`.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "busgate.db".into(),
        }
    }
}

impl StoreConfig {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &StoreConfig) {
        if self.path.trim().is_empty() {
            self.path = defaults.path.clone();
        }
    }
}
