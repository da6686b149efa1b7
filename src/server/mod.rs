//! Broker server
//!
//! - [`listener`] accepts TCP connections and spawns a handler per connection
//! - [`connection`] reads, reassembles and dispatches one connection's frames
//! - [`dispatch`] applies frames to the subscription registry
//! - [`config`] holds server options

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod listener;

pub use config::ServerConfig;
pub use connection::Connection;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use listener::BrokerServer;
