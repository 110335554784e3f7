use std::net::SocketAddr;

use url::Url;

use crate::BusgateConfig;

/// Validation output for a loaded busgate configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a busgate configuration and return a report of issues.
pub fn validate(cfg: &BusgateConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_server(cfg, &mut report);
    validate_upstream(cfg, &mut report);
    validate_cache(cfg, &mut report);

    report
}

fn validate_server(cfg: &BusgateConfig, report: &mut ConfigReport) {
    let listen = cfg.server.listen.trim();
    if listen.is_empty() {
        report.error("server.listen is empty");
    } else if listen.parse::<SocketAddr>().is_err() {
        report.warn(format!(
            "server.listen '{listen}' is not a socket address; DNS resolution will be used"
        ));
    }

    if cfg.global.max_connections == 0 {
        report.error("global.max_connections must be greater than 0");
    }
}

fn validate_upstream(cfg: &BusgateConfig, report: &mut ConfigReport) {
    match Url::parse(&cfg.upstream.base_url) {
        Ok(url) => {
            if !matches!(url.scheme(), "http" | "https") {
                report.error(format!(
                    "upstream.base_url '{base}' must use http or https",
                    base = cfg.upstream.base_url
                ));
            }
            if url.query().is_some() {
                report.warn(format!(
                    "upstream.base_url '{base}' already has a query; feed parameters are appended to it",
                    base = cfg.upstream.base_url
                ));
            }
        }
        Err(e) => report.error(format!(
            "upstream.base_url '{base}' is not a valid URL: {e}",
            base = cfg.upstream.base_url
        )),
    }

    if cfg.upstream.timeout_secs > 120 {
        report.warn(format!(
            "upstream.timeout_secs = {} is unusually long",
            cfg.upstream.timeout_secs
        ));
    }
}

fn validate_cache(cfg: &BusgateConfig, report: &mut ConfigReport) {
    if cfg.cache.ttl_secs <= 0 {
        report.warn("cache.ttl_secs <= 0; responses will not be cached");
    }
}
