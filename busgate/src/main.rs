use std::sync::Arc;

use anyhow::Context;
use busgate_cache::{ResponseCache, spawn_reaper};
use busgate_config::BusgateConfig;
use busgate_core::{Dispatcher, Server};
use busgate_log::SqliteRequestLog;
use busgate_upstream::HttpFetcher;
use tracing::info;
use utils::init_tracing;

const DEFAULT_CONFIG_PATH: &str = "busgate.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let cfg = BusgateConfig::from_file_or_default(&config_path);
    init_tracing(cfg.global().log_level());
    cfg.print();

    let cache = Arc::new(ResponseCache::new());
    if let Some(every) = cfg.cache().reap_interval() {
        spawn_reaper(cache.clone(), every);
    }

    let fetcher = HttpFetcher::from_config(cfg.upstream()).context("failed to set up feed client")?;
    let log = SqliteRequestLog::from_config(cfg.store())
        .with_context(|| format!("failed to open request log '{}'", cfg.store().path()))?;

    info!(
        target: "busgate::main",
        feed = %fetcher.base_url(),
        store = %cfg.store().path(),
        ttl_secs = cfg.cache().ttl_secs(),
        "Components ready"
    );

    let dispatcher = Dispatcher::new(
        cache,
        Arc::new(fetcher),
        Arc::new(log),
        cfg.cache().ttl_secs(),
    );

    Server::new(Arc::new(cfg), Arc::new(dispatcher)).run().await
}
