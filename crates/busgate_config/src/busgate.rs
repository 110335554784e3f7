use serde::Deserialize;

use crate::validation::{ConfigReport, validate};
use crate::{CacheConfig, GlobalConfig, ServerConfig, StoreConfig, UpstreamConfig};

/// Prefix for environment overrides, e.g. `BUSGATE_CACHE__TTL_SECS=60`.
const ENV_PREFIX: &str = "BUSGATE";

// =======================================================
// BUSGATE CONFIG: root of busgate.toml
// =======================================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BusgateConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

impl BusgateConfig {
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn upstream(&self) -> &UpstreamConfig {
        &self.upstream
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    /// Reads `file_name` (TOML, optional) and overlays `BUSGATE_*` variables.
    pub fn from_file(file_name: &str) -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::new(file_name, config::FileFormat::Toml).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(built)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, config::ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?;

        Self::finish(built)
    }

    pub fn from_file_or_default(file_name: &str) -> Self {
        match Self::from_file(file_name) {
            Ok(cfg) => {
                let report = cfg.validate();
                if report.has_errors() {
                    eprintln!("Invalid config in '{file_name}':");
                    eprintln!("{}", report.format());
                    eprintln!("Using default config...");
                    BusgateConfig::default()
                } else {
                    if !report.warnings().is_empty() {
                        eprintln!("Config warnings in '{file_name}':");
                        eprintln!("{}", report.format());
                    }
                    cfg
                }
            }
            Err(e) => {
                eprintln!("Error reading config '{file_name}': {e}");
                eprintln!("Using default config...");
                BusgateConfig::default()
            }
        }
    }

    fn finish(built: config::Config) -> Result<Self, config::ConfigError> {
        let mut cfg: BusgateConfig = built.try_deserialize()?;
        cfg.apply_defaults();
        Ok(cfg)
    }

    fn apply_defaults(&mut self) {
        self.global.apply_defaults_from(&GlobalConfig::default());
        self.server.apply_defaults_from(&ServerConfig::default());
        self.upstream.apply_defaults_from(&UpstreamConfig::default());
        self.store.apply_defaults_from(&StoreConfig::default());
    }

    pub fn print(&self) {
        println!("=============== BUSGATE CONFIG ===============");
        println!("\n[global]");
        println!("  log_level            = {}", self.global.log_level);
        println!("  max_connections      = {}", self.global.max_connections);
        println!("\n[server]");
        println!("  listen               = {}", self.server.listen);
        println!("\n[upstream]");
        println!("  base_url             = {}", self.upstream.base_url);
        println!("  timeout_secs         = {}", self.upstream.timeout_secs);
        println!("  user_agent           = {}", self.upstream.user_agent);
        println!("\n[cache]");
        println!("  ttl_secs             = {}", self.cache.ttl_secs);
        println!("  reap_interval_secs   = {}", self.cache.reap_interval_secs);
        println!("\n[store]");
        println!("  path                 = {}", self.store.path);
        println!("==============================================");
    }
}
