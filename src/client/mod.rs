//! Broker client
//!
//! Provides the client side of the protocol:
//! - Publishing to a channel, broadcast or exclusive
//! - Subscribing to a channel with a per-message callback

pub mod config;
pub mod connector;
pub mod subscription;

pub use config::ClientConfig;
pub use connector::Client;
pub use subscription::{Delivery, UnsubscribeHandle};
