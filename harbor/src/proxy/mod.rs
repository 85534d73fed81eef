//! Reverse proxy routing for public apps

pub mod caddy;

use async_trait::async_trait;

use crate::errors::HarborError;

pub use caddy::CaddyProxy;

/// A public address routed to an app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub address: String,

    /// Port the app listens on, the upstream default when unset
    pub target_port: Option<u16>,
}

/// Writes the proxy configuration of an app
#[async_trait]
pub trait ProxyWriter: Send + Sync {
    /// Route `routes` to `upstream`, replacing any previous routes of `app_id`
    async fn write_routes(
        &self,
        app_id: &str,
        upstream: &str,
        routes: &[ProxyRoute],
    ) -> Result<(), HarborError>;

    /// Drop every route of `app_id`
    async fn remove_routes(&self, app_id: &str) -> Result<(), HarborError>;
}
