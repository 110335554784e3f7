//! Client side of the proxy: the NextBus XML feed.
//!
//! [`UpstreamQuery`] describes one feed call (command plus ordered, possibly
//! repeated parameters), [`Fetcher`] performs it and [`xml::to_json`] converts
//! the XML answer into the JSON body served to clients.

mod fetch;
mod query;
pub mod xml;

pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use query::UpstreamQuery;
pub use xml::XmlError;
