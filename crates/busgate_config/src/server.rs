use serde::Deserialize;

// =======================================================
// SERVER CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".into(),
        }
    }
}

impl ServerConfig {
    pub fn listen(&self) -> &str {
        &self.listen
    }

    pub(crate) fn apply_defaults_from(&mut self, defaults: &ServerConfig) {
        if self.listen.trim().is_empty() {
            self.listen = defaults.listen.clone();
        }
    }
}
