//! Subscription registry
//!
//! Tracks which connections are subscribed to which channels, and when each
//! subscription last received a message.
//!
//! # Architecture
//!
//! ```text
//!                     Arc<SubscriptionRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ channels: HashMap<String,    │
//!                 │   Mutex<Vec<SubscriberEntry  │
//!                 │     { subscriber,            │
//!                 │       last_delivery }>>      │
//!                 │ >                            │
//!                 └──────────────┬───────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [Connection]            [Connection]            [Connection]
//!   subscribe()          broadcast_targets()     unsubscribe_all()
//!                        least_recently_served()   (on close)
//! ```
//!
//! Exclusive delivery picks the entry with the oldest `last_delivery`, which
//! spreads messages across a pool of workers subscribed to one channel.

pub mod config;
pub mod entry;
pub mod store;
pub mod subscriber;

pub use config::RegistryConfig;
pub use entry::{ChannelStats, SubscriberEntry, SubscriptionId};
pub use store::SubscriptionRegistry;
pub use subscriber::{ConnectionId, Subscriber};
