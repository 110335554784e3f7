mod busgate;
mod cache;
mod global;
mod server;
mod store;
mod upstream;
pub mod validation;

pub use busgate::BusgateConfig;
pub use cache::CacheConfig;
pub use global::GlobalConfig;
pub use server::ServerConfig;
pub use store::StoreConfig;
pub use upstream::UpstreamConfig;
pub use validation::ConfigReport;
