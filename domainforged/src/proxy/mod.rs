pub mod client;

use futures::future::BoxFuture;

use crate::error::RouteError;

/// Keeps the reverse proxy's routing table in step with the registry.
///
/// There is no removal call: routes added here outlive `remove` and
/// shutdown until the proxy is reconfigured by other means.
pub trait RouteSync: Send + Sync {
    /// Route every domain in `domains` to `localhost:<port>`.
    fn add_route<'a>(
        &'a self,
        domains: &'a [String],
        port: u16,
    ) -> BoxFuture<'a, Result<(), RouteError>>;

    /// Check that the proxy's admin API answers at all.
    fn ping(&self) -> BoxFuture<'_, Result<(), RouteError>>;
}
