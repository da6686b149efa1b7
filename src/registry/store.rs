//! Subscription registry implementation
//!
//! The channel map is behind an `RwLock` and each channel bucket behind its
//! own `Mutex`, so publishes to different channels never contend. The map
//! lock is only held long enough to look up (or create) a bucket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};

use super::config::RegistryConfig;
use super::entry::{ChannelStats, SubscriberEntry, SubscriptionId};
use super::subscriber::{ConnectionId, Subscriber};

type Bucket = Arc<Mutex<Vec<SubscriberEntry>>>;

/// Registry of channel subscriptions
///
/// All operations are total: unknown channels and unknown connections yield
/// empty results, never errors. Channels are created on first subscribe and
/// persist (possibly empty) for the lifetime of the registry.
pub struct SubscriptionRegistry {
    /// Map of channel identifier to subscriber entries
    channels: RwLock<HashMap<String, Bucket>>,

    /// Source of subscription ids
    next_subscription_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl SubscriptionRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_subscription_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    async fn bucket(&self, channel: &str) -> Option<Bucket> {
        self.channels.read().await.get(channel).cloned()
    }

    /// Register a connection on a channel
    ///
    /// Creates the channel if needed. With duplicate collapsing disabled
    /// (the default) a repeated subscribe adds another entry; with it
    /// enabled the existing entry's id is returned instead.
    pub async fn subscribe(&self, channel: &str, subscriber: Subscriber) -> SubscriptionId {
        let bucket = {
            let mut channels = self.channels.write().await;
            Arc::clone(channels.entry(channel.to_string()).or_default())
        };

        let mut entries = bucket.lock().await;

        if self.config.deduplicate_subscriptions {
            if let Some(existing) = entries
                .iter()
                .find(|e| e.connection_id() == subscriber.id())
            {
                tracing::debug!(
                    channel = channel,
                    peer = %subscriber.id(),
                    "Duplicate subscription ignored"
                );
                return existing.id;
            }
        }

        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            channel = channel,
            peer = %subscriber.id(),
            subscribers = entries.len() + 1,
            "Subscriber added"
        );

        entries.push(SubscriberEntry::new(id, subscriber));
        id
    }

    /// Remove every entry owned by a connection, across all channels
    ///
    /// Returns the number of entries removed; unknown connections are a
    /// no-op.
    pub async fn unsubscribe_all(&self, connection: &ConnectionId) -> usize {
        let buckets: Vec<(String, Bucket)> = {
            let channels = self.channels.read().await;
            channels
                .iter()
                .map(|(name, bucket)| (name.clone(), Arc::clone(bucket)))
                .collect()
        };

        let mut removed = 0;

        for (channel, bucket) in buckets {
            let mut entries = bucket.lock().await;
            let before = entries.len();
            entries.retain(|e| e.connection_id() != connection);
            let count = before - entries.len();

            if count > 0 {
                tracing::debug!(
                    channel = %channel,
                    peer = %connection,
                    removed = count,
                    subscribers = entries.len(),
                    "Subscriber removed"
                );
            }

            removed += count;
        }

        removed
    }

    /// Snapshot of every entry on a channel
    ///
    /// The snapshot is taken under the bucket lock; subscribes and
    /// unsubscribes that race with a publish affect later publishes only.
    pub async fn broadcast_targets(&self, channel: &str) -> Vec<SubscriberEntry> {
        match self.bucket(channel).await {
            Some(bucket) => bucket.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// Entry with the oldest last delivery on a channel
    ///
    /// Never-served entries sort before served ones. Ties go to the entry
    /// that subscribed first.
    pub async fn least_recently_served(&self, channel: &str) -> Option<SubscriberEntry> {
        let bucket = self.bucket(channel).await?;
        let entries = bucket.lock().await;

        entries.iter().min_by_key(|e| e.last_delivery).cloned()
    }

    /// Stamp an entry with the current time
    ///
    /// Returns `false` if the entry is gone (e.g. its connection closed
    /// while the delivery was in flight).
    pub async fn record_delivery(&self, channel: &str, id: SubscriptionId) -> bool {
        let bucket = match self.bucket(channel).await {
            Some(bucket) => bucket,
            None => return false,
        };

        let mut entries = bucket.lock().await;

        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.last_delivery = Some(Instant::now());
                true
            }
            None => false,
        }
    }

    /// Number of entries on a channel
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        match self.bucket(channel).await {
            Some(bucket) => bucket.lock().await.len(),
            None => 0,
        }
    }

    /// Whether a channel has ever been subscribed to
    pub async fn has_channel(&self, channel: &str) -> bool {
        self.channels.read().await.contains_key(channel)
    }

    /// Get channel statistics
    pub async fn channel_stats(&self, channel: &str) -> Option<ChannelStats> {
        let bucket = self.bucket(channel).await?;
        let entries = bucket.lock().await;

        Some(ChannelStats {
            subscriber_count: entries.len(),
            unserved_count: entries.iter().filter(|e| !e.has_been_served()).count(),
        })
    }

    /// Get total number of channels
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber(id: &str) -> Subscriber {
        let (client, _server) = tokio::io::duplex(64);
        Subscriber::new(ConnectionId::new(id), client)
    }

    fn ids(entries: &[SubscriberEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.connection_id().as_str()).collect()
    }

    #[tokio::test]
    async fn test_subscribe_creates_channel() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.has_channel("alerts").await);

        registry.subscribe("alerts", subscriber("a")).await;

        assert!(registry.has_channel("alerts").await);
        assert_eq!(registry.subscriber_count("alerts").await, 1);
        assert_eq!(registry.channel_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_channel_is_empty() {
        let registry = SubscriptionRegistry::new();

        assert!(registry.broadcast_targets("nope").await.is_empty());
        assert!(registry.least_recently_served("nope").await.is_none());
        assert!(!registry.record_delivery("nope", 1).await);
        assert!(registry.channel_stats("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_subscriptions_kept_by_default() {
        let registry = SubscriptionRegistry::new();
        let sub = subscriber("a");

        let first = registry.subscribe("alerts", sub.clone()).await;
        let second = registry.subscribe("alerts", sub).await;

        assert_ne!(first, second);
        assert_eq!(ids(&registry.broadcast_targets("alerts").await), ["a", "a"]);
    }

    #[tokio::test]
    async fn test_duplicate_subscriptions_collapsed() {
        let registry =
            SubscriptionRegistry::with_config(RegistryConfig::default().deduplicate_subscriptions(true));
        let sub = subscriber("a");

        let first = registry.subscribe("alerts", sub.clone()).await;
        let second = registry.subscribe("alerts", sub.clone()).await;
        registry.subscribe("other", sub).await;

        assert_eq!(first, second);
        assert_eq!(registry.subscriber_count("alerts").await, 1);
        assert_eq!(registry.subscriber_count("other").await, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_all_across_channels() {
        let registry = SubscriptionRegistry::new();
        let a = subscriber("a");

        registry.subscribe("x", a.clone()).await;
        registry.subscribe("y", a.clone()).await;
        registry.subscribe("y", a).await;
        registry.subscribe("y", subscriber("b")).await;

        let removed = registry.unsubscribe_all(&ConnectionId::new("a")).await;

        assert_eq!(removed, 3);
        assert!(registry.broadcast_targets("x").await.is_empty());
        assert_eq!(ids(&registry.broadcast_targets("y").await), ["b"]);

        // Emptied channels persist
        assert!(registry.has_channel("x").await);
    }

    #[tokio::test]
    async fn test_unsubscribe_all_unknown_is_noop() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe("x", subscriber("a")).await;

        assert_eq!(registry.unsubscribe_all(&ConnectionId::new("zzz")).await, 0);
        assert_eq!(registry.unsubscribe_all(&ConnectionId::new("a")).await, 1);
        assert_eq!(registry.unsubscribe_all(&ConnectionId::new("a")).await, 0);
    }

    #[tokio::test]
    async fn test_unsubscribed_never_targeted() {
        let registry = SubscriptionRegistry::new();
        let names = ["a", "b", "c", "d"];

        for (i, name) in names.iter().enumerate() {
            registry.subscribe("ch", subscriber(name)).await;
            if i % 2 == 1 {
                registry.unsubscribe_all(&ConnectionId::new(names[i - 1])).await;
            }
        }
        registry.subscribe("ch", subscriber("e")).await;

        assert_eq!(ids(&registry.broadcast_targets("ch").await), ["b", "d", "e"]);
    }

    #[tokio::test]
    async fn test_least_recently_served_rotates() {
        let registry = SubscriptionRegistry::new();
        for name in ["s1", "s2", "s3"] {
            registry.subscribe("jobs", subscriber(name)).await;
        }

        let mut served = Vec::new();
        for _ in 0..3 {
            let entry = registry.least_recently_served("jobs").await.unwrap();
            assert!(registry.record_delivery("jobs", entry.id).await);
            served.push(entry.connection_id().as_str().to_string());
        }

        // Ties among never-served entries go to subscription order
        assert_eq!(served, ["s1", "s2", "s3"]);

        let stats = registry.channel_stats("jobs").await.unwrap();
        assert_eq!(stats.subscriber_count, 3);
        assert_eq!(stats.unserved_count, 0);

        // Fourth pick wraps to the oldest delivery
        let next = registry.least_recently_served("jobs").await.unwrap();
        assert_eq!(next.connection_id().as_str(), "s1");
    }

    #[tokio::test]
    async fn test_new_subscriber_preferred() {
        let registry = SubscriptionRegistry::new();
        let first = registry.subscribe("jobs", subscriber("old")).await;
        registry.record_delivery("jobs", first).await;

        registry.subscribe("jobs", subscriber("new")).await;

        let pick = registry.least_recently_served("jobs").await.unwrap();
        assert_eq!(pick.connection_id().as_str(), "new");
    }

    #[tokio::test]
    async fn test_record_delivery_after_removal() {
        let registry = SubscriptionRegistry::new();
        let id = registry.subscribe("x", subscriber("a")).await;
        registry.unsubscribe_all(&ConnectionId::new("a")).await;

        assert!(!registry.record_delivery("x", id).await);
    }

    #[tokio::test]
    async fn test_concurrent_churn() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let name = format!("conn-{}", i);
                registry.subscribe("shared", subscriber(&name)).await;
                registry.subscribe(&name, subscriber(&name)).await;
                if i % 2 == 0 {
                    registry.unsubscribe_all(&ConnectionId::new(&name)).await;
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let targets = registry.broadcast_targets("shared").await;
        assert_eq!(targets.len(), 8);
        assert!(targets.iter().all(|e| {
            let n: usize = e.connection_id().as_str()[5..].parse().unwrap();
            n % 2 == 1
        }));
        assert_eq!(registry.channel_count().await, 17);
    }
}
