//! Request handling for busgate: route table, per-request dispatcher and the
//! HTTP server that drives it.

pub mod context;
pub mod dispatch;
pub mod responses;
pub mod routing;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use context::RequestContext;
pub use dispatch::{DispatchError, Dispatcher};
pub use routing::{Route, RouteError};
pub use server::Server;
