//! Server configuration

use crate::protocol::constants::{DEFAULT_ADDRESS, DEFAULT_READ_BUFFER_SIZE};

/// Environment variable holding the listen address
pub const LISTEN_ADDRESS_ENV: &str = "LISTEN_ADDRESS";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (host names are resolved)
    pub bind_addr: String,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Size of each socket read
    pub read_buffer_size: usize,

    /// Largest accepted frame payload (None = unlimited)
    pub max_payload_size: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDRESS.to_string(),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_payload_size: None,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            bind_addr: addr.into(),
            ..Default::default()
        }
    }

    /// Build from the `LISTEN_ADDRESS` environment variable
    ///
    /// Unset or empty falls back to `localhost:9261`.
    pub fn from_env() -> Self {
        let addr = std::env::var(LISTEN_ADDRESS_ENV).unwrap_or_default();
        Self::default().bind(&addr)
    }

    /// Set the bind address; an empty address keeps the default
    pub fn bind(mut self, addr: &str) -> Self {
        let addr = addr.trim();
        self.bind_addr = if addr.is_empty() {
            DEFAULT_ADDRESS.to_string()
        } else {
            addr.to_string()
        };
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set read buffer size (minimum 1 byte)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Reject frames whose payload exceeds `max` bytes
    pub fn max_payload_size(mut self, max: u64) -> Self {
        self.max_payload_size = Some(max);
        self
    }
}
