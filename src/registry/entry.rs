//! Subscriber entries

use std::time::Instant;

use super::subscriber::{ConnectionId, Subscriber};

/// Identifier of one subscription
///
/// Distinct from the connection identity: one connection can hold several
/// subscriptions, including duplicates on the same channel.
pub type SubscriptionId = u64;

/// A connection subscribed to a channel
#[derive(Debug, Clone)]
pub struct SubscriberEntry {
    /// Unique subscription id
    pub id: SubscriptionId,

    /// Outbound handle of the subscribed connection
    pub subscriber: Subscriber,

    /// Time of the last successful delivery (`None` = never served)
    pub last_delivery: Option<Instant>,
}

impl SubscriberEntry {
    pub(super) fn new(id: SubscriptionId, subscriber: Subscriber) -> Self {
        Self {
            id,
            subscriber,
            last_delivery: None,
        }
    }

    /// Identity of the owning connection
    pub fn connection_id(&self) -> &ConnectionId {
        self.subscriber.id()
    }

    /// Whether this entry has received at least one message
    pub fn has_been_served(&self) -> bool {
        self.last_delivery.is_some()
    }
}

/// Per-channel statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStats {
    /// Number of subscriber entries (duplicates included)
    pub subscriber_count: usize,
    /// Entries that have never received a message
    pub unserved_count: usize,
}
