//! Server configuration.

use std::net::{IpAddr, SocketAddr};

use crate::error::{Result, ServerError};

/// Default max body size for webhook requests (1 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Enable request logging.
    pub request_logging: bool,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], leadline_config::defaults::DEFAULT_PORT)),
            request_logging: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[server]` section of the loaded config.
    pub fn from_settings(settings: &leadline_config::ServerConfig) -> Result<Self> {
        let ip: IpAddr = settings.bind.parse().map_err(|_| {
            ServerError::Config(format!("invalid bind address '{}'", settings.bind))
        })?;
        Ok(Self {
            bind_address: SocketAddr::new(ip, settings.port),
            request_logging: settings.request_logging,
            ..Self::default()
        })
    }

    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }
}
