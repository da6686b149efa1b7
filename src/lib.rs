//! juju-rs: a lightweight publish/subscribe broker
//!
//! Clients exchange length-prefixed binary frames with a central broker over
//! TCP. A connection either publishes to named channels or subscribes to
//! them; the broker pushes each published payload to every subscriber of the
//! channel, or to a single one for exclusive publishes.
//!
//! # Server
//! ```no_run
//! use juju_rs::{BrokerServer, ServerConfig};
//!
//! # async fn example() -> juju_rs::Result<()> {
//! let server = BrokerServer::new(ServerConfig::from_env());
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Client
//! ```no_run
//! use juju_rs::{Client, ClientConfig};
//!
//! # async fn example() -> juju_rs::Result<()> {
//! let client = Client::new(ClientConfig::default());
//! client.connect("localhost:9261").await?;
//! client.publish("alerts", b"fire", false).await?;
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use client::{Client, ClientConfig, Delivery, UnsubscribeHandle};
pub use error::{Error, ProtocolError, Result};
pub use protocol::{Command, Frame, FrameDecoder};
pub use registry::{ConnectionId, RegistryConfig, SubscriptionRegistry};
pub use server::{BrokerServer, ServerConfig};
