//! Client configuration

use crate::protocol::constants::{DEFAULT_ADDRESS, DEFAULT_READ_BUFFER_SIZE};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Broker address used when `connect` is given an empty address
    pub server_addr: String,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,

    /// Size of each socket read while subscribed
    pub read_buffer_size: usize,

    /// Largest accepted push payload (None = unlimited)
    pub max_payload_size: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_ADDRESS.to_string(),
            tcp_nodelay: true,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_payload_size: None,
        }
    }
}

impl ClientConfig {
    /// Create a config for a broker address
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            ..Default::default()
        }
    }

    /// Address to dial: `addr` if non-empty, otherwise the configured one
    pub fn resolve_addr<'a>(&'a self, addr: &'a str) -> &'a str {
        let addr = addr.trim();
        if !addr.is_empty() {
            addr
        } else if !self.server_addr.is_empty() {
            &self.server_addr
        } else {
            DEFAULT_ADDRESS
        }
    }

    /// Set read buffer size (minimum 1 byte)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Reject push frames whose payload exceeds `max` bytes
    pub fn max_payload_size(mut self, max: u64) -> Self {
        self.max_payload_size = Some(max);
        self
    }
}
