//! Command dispatch
//!
//! Applies one decoded frame to the registry:
//!
//! - Subscribe: register the sending connection (no reply frame)
//! - Publish: push to every subscriber of the channel
//! - ExclusivePublish: push to the least-recently-served subscriber only
//! - anything else: ignored
//!
//! Push frames reuse the subscribe tag and carry the originating channel.
//! A failed write purges the recipient's connection from the registry; the
//! publisher is never told (there are no acknowledgements).

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;

use crate::protocol::{encode, Command, Frame};
use crate::registry::{SubscriberEntry, Subscriber, SubscriptionRegistry};
use crate::stats::BrokerStats;

/// Result of dispatching one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Connection registered on the channel
    Subscribed,
    /// Publish handled; number of subscribers written to
    Delivered(usize),
    /// Unknown command byte
    Ignored,
}

/// Routes decoded frames to subscribers
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    stats: Arc<BrokerStats>,
}

impl Dispatcher {
    /// Create a dispatcher over a shared registry
    pub fn new(registry: Arc<SubscriptionRegistry>, stats: Arc<BrokerStats>) -> Self {
        Self { registry, stats }
    }

    /// Get a reference to the subscription registry
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Get a reference to the broker counters
    pub fn stats(&self) -> &Arc<BrokerStats> {
        &self.stats
    }

    /// Apply a frame received from `origin`
    pub async fn dispatch(&self, origin: &Subscriber, frame: Frame) -> DispatchOutcome {
        match frame.command() {
            Some(Command::Subscribe) => {
                self.registry.subscribe(&frame.channel, origin.clone()).await;
                self.stats.record_subscription();
                DispatchOutcome::Subscribed
            }
            Some(Command::Publish) => {
                DispatchOutcome::Delivered(self.publish(&frame.channel, frame.payload).await)
            }
            Some(Command::ExclusivePublish) => {
                let delivered = self.publish_exclusive(&frame.channel, frame.payload).await;
                DispatchOutcome::Delivered(usize::from(delivered))
            }
            None => {
                tracing::debug!(
                    peer = %origin.id(),
                    command = frame.command,
                    channel = %frame.channel,
                    "Ignoring unknown command"
                );
                DispatchOutcome::Ignored
            }
        }
    }

    /// Push a payload to every subscriber of a channel
    ///
    /// Writes run concurrently, one task per entry, over the snapshot taken
    /// when the publish starts. Returns the number of successful writes.
    pub async fn publish(&self, channel: &str, payload: Bytes) -> usize {
        self.stats.record_publish();

        let targets = self.registry.broadcast_targets(channel).await;
        if targets.is_empty() {
            tracing::debug!(channel = channel, "Publish to channel without subscribers");
            return 0;
        }

        let push = encode(Command::Subscribe, channel, &payload);
        let mut writes = JoinSet::new();

        for entry in targets {
            let push = push.clone();
            writes.spawn(async move {
                let result = entry.subscriber.send(&push).await;
                (entry, result)
            });
        }

        let mut delivered = 0;

        while let Some(joined) = writes.join_next().await {
            match joined {
                Ok((entry, Ok(()))) => {
                    self.delivery_succeeded(channel, &entry).await;
                    delivered += 1;
                }
                Ok((entry, Err(e))) => self.delivery_failed(channel, &entry, &e).await,
                Err(e) => tracing::warn!(channel = channel, error = %e, "Delivery task failed"),
            }
        }

        tracing::debug!(
            channel = channel,
            bytes = payload.len(),
            delivered = delivered,
            "Broadcast publish"
        );

        delivered
    }

    /// Push a payload to the least-recently-served subscriber of a channel
    ///
    /// If the chosen subscriber's write fails it is purged and the next
    /// candidate is tried, so the message reaches at most one live
    /// subscriber. Returns `true` if some subscriber received it.
    pub async fn publish_exclusive(&self, channel: &str, payload: Bytes) -> bool {
        self.stats.record_publish();

        let push = encode(Command::Subscribe, channel, &payload);

        while let Some(entry) = self.registry.least_recently_served(channel).await {
            match entry.subscriber.send(&push).await {
                Ok(()) => {
                    self.delivery_succeeded(channel, &entry).await;
                    tracing::debug!(
                        channel = channel,
                        peer = %entry.connection_id(),
                        bytes = payload.len(),
                        "Exclusive publish"
                    );
                    return true;
                }
                Err(e) => self.delivery_failed(channel, &entry, &e).await,
            }
        }

        tracing::debug!(channel = channel, "Exclusive publish to channel without subscribers");
        false
    }

    async fn delivery_succeeded(&self, channel: &str, entry: &SubscriberEntry) {
        self.registry.record_delivery(channel, entry.id).await;
        self.stats.record_delivery();
    }

    async fn delivery_failed(&self, channel: &str, entry: &SubscriberEntry, error: &io::Error) {
        self.stats.record_failed_delivery();

        let removed = self.registry.unsubscribe_all(entry.connection_id()).await;

        tracing::warn!(
            channel = channel,
            peer = %entry.connection_id(),
            error = %error,
            removed = removed,
            "Delivery failed, subscriber purged"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::HEADER_SIZE;
    use crate::protocol::FrameDecoder;
    use crate::registry::ConnectionId;
    use tokio::io::{AsyncReadExt, DuplexStream};

    fn setup() -> Dispatcher {
        Dispatcher::new(
            Arc::new(SubscriptionRegistry::new()),
            Arc::new(BrokerStats::new()),
        )
    }

    fn peer(id: &str) -> (Subscriber, DuplexStream) {
        let (broker_side, client_side) = tokio::io::duplex(64 * 1024);
        (Subscriber::new(ConnectionId::new(id), broker_side), client_side)
    }

    async fn read_push(stream: &mut DuplexStream, payload_len: usize) -> Frame {
        let mut buf = vec![0u8; HEADER_SIZE + payload_len];
        stream.read_exact(&mut buf).await.unwrap();

        let mut decoder = FrameDecoder::new();
        let mut frames = decoder.decode(&buf).unwrap();
        assert_eq!(frames.len(), 1);
        frames.remove(0)
    }

    async fn subscribe(dispatcher: &Dispatcher, sub: &Subscriber, channel: &str) {
        let outcome = dispatcher
            .dispatch(sub, Frame::new(Command::Subscribe, channel, Bytes::new()))
            .await;
        assert_eq!(outcome, DispatchOutcome::Subscribed);
    }

    #[tokio::test]
    async fn test_subscribe_sends_no_reply() {
        let dispatcher = setup();
        let (sub, mut stream) = peer("a");

        subscribe(&dispatcher, &sub, "alerts").await;
        assert_eq!(dispatcher.registry().subscriber_count("alerts").await, 1);

        // Nothing written back
        let mut buf = [0u8; 1];
        let read = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            stream.read(&mut buf),
        )
        .await;
        assert!(read.is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all() {
        let dispatcher = setup();
        let (a, mut a_stream) = peer("a");
        let (b, mut b_stream) = peer("b");
        let (publisher, _p_stream) = peer("p");

        subscribe(&dispatcher, &a, "alerts").await;
        subscribe(&dispatcher, &b, "alerts").await;

        let outcome = dispatcher
            .dispatch(&publisher, Frame::new(Command::Publish, "alerts", &b"fire"[..]))
            .await;
        assert_eq!(outcome, DispatchOutcome::Delivered(2));

        for stream in [&mut a_stream, &mut b_stream] {
            let push = read_push(stream, 4).await;
            assert_eq!(push.command(), Some(Command::Subscribe));
            assert_eq!(push.channel, "alerts");
            assert_eq!(&push.payload[..], b"fire");
        }

        let stats = dispatcher.registry().channel_stats("alerts").await.unwrap();
        assert_eq!(stats.unserved_count, 0);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let dispatcher = setup();
        let (publisher, _stream) = peer("p");

        let outcome = dispatcher
            .dispatch(&publisher, Frame::new(Command::Publish, "empty", &b"x"[..]))
            .await;
        assert_eq!(outcome, DispatchOutcome::Delivered(0));

        let outcome = dispatcher
            .dispatch(
                &publisher,
                Frame::new(Command::ExclusivePublish, "empty", &b"x"[..]),
            )
            .await;
        assert_eq!(outcome, DispatchOutcome::Delivered(0));
    }

    #[tokio::test]
    async fn test_duplicate_subscription_gets_two_copies() {
        let dispatcher = setup();
        let (a, mut stream) = peer("a");

        subscribe(&dispatcher, &a, "dup").await;
        subscribe(&dispatcher, &a, "dup").await;

        assert_eq!(dispatcher.publish("dup", Bytes::from_static(b"hi")).await, 2);

        read_push(&mut stream, 2).await;
        read_push(&mut stream, 2).await;
    }

    #[tokio::test]
    async fn test_exclusive_round_robin() {
        let dispatcher = setup();
        let mut streams = Vec::new();

        for name in ["w1", "w2", "w3"] {
            let (sub, stream) = peer(name);
            subscribe(&dispatcher, &sub, "jobs").await;
            streams.push(stream);
        }

        for i in 0..3u8 {
            assert!(dispatcher.publish_exclusive("jobs", Bytes::from(vec![i])).await);
        }

        // Each worker got exactly one job, in subscription order
        for (i, stream) in streams.iter_mut().enumerate() {
            let push = read_push(stream, 1).await;
            assert_eq!(push.payload[0], i as u8);
        }
    }

    #[tokio::test]
    async fn test_failed_write_purges_subscriber() {
        let dispatcher = setup();
        let (dead, dead_stream) = peer("dead");
        let (live, mut live_stream) = peer("live");

        subscribe(&dispatcher, &dead, "x").await;
        subscribe(&dispatcher, &dead, "y").await;
        subscribe(&dispatcher, &live, "x").await;
        drop(dead_stream);

        assert_eq!(dispatcher.publish("x", Bytes::from_static(b"m")).await, 1);
        read_push(&mut live_stream, 1).await;

        let registry = dispatcher.registry();
        assert_eq!(registry.subscriber_count("x").await, 1);
        assert_eq!(registry.subscriber_count("y").await, 0);

        let snapshot = dispatcher.stats().snapshot();
        assert_eq!(snapshot.deliveries, 1);
        assert_eq!(snapshot.failed_deliveries, 1);
    }

    #[tokio::test]
    async fn test_exclusive_skips_dead_subscriber() {
        let dispatcher = setup();
        let (dead, dead_stream) = peer("dead");
        let (live, mut live_stream) = peer("live");

        subscribe(&dispatcher, &dead, "jobs").await;
        subscribe(&dispatcher, &live, "jobs").await;
        drop(dead_stream);

        assert!(dispatcher.publish_exclusive("jobs", Bytes::from_static(b"j")).await);
        let push = read_push(&mut live_stream, 1).await;
        assert_eq!(&push.payload[..], b"j");
        assert_eq!(dispatcher.registry().subscriber_count("jobs").await, 1);
    }

    #[tokio::test]
    async fn test_unknown_command_ignored() {
        let dispatcher = setup();
        let (a, _stream) = peer("a");

        let frame = Frame {
            command: b'?',
            channel: "x".into(),
            payload: Bytes::new(),
        };

        assert_eq!(dispatcher.dispatch(&a, frame).await, DispatchOutcome::Ignored);
        assert!(!dispatcher.registry().has_channel("x").await);
    }
}
