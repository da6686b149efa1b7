//! Subscription handles and delivered messages

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;

/// A message pushed by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel the message was published to
    pub channel: String,
    /// Published payload
    pub payload: Bytes,
}

/// Subscription id meaning "not subscribed"
pub(super) const NO_SUBSCRIPTION: u64 = 0;

/// Ends a running subscription from another task or a callback
///
/// The subscription loop checks the flag after each read returns, so it
/// stops once the next chunk (or end-of-stream) arrives rather than
/// immediately.
#[derive(Debug, Clone)]
pub struct UnsubscribeHandle {
    subscription: Arc<AtomicU64>,
}

impl UnsubscribeHandle {
    pub(super) fn new(subscription: Arc<AtomicU64>) -> Self {
        Self { subscription }
    }

    /// Signal the subscription loop to exit
    pub fn unsubscribe(&self) {
        self.subscription.store(NO_SUBSCRIPTION, Ordering::Release);
    }

    /// Whether the client currently holds a subscription
    pub fn is_subscribed(&self) -> bool {
        self.subscription.load(Ordering::Acquire) != NO_SUBSCRIPTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_flips_shared_flag() {
        let flag = Arc::new(AtomicU64::new(7));
        let handle = UnsubscribeHandle::new(Arc::clone(&flag));
        let other = handle.clone();

        assert!(other.is_subscribed());
        handle.unsubscribe();

        assert!(!other.is_subscribed());
        assert_eq!(flag.load(Ordering::Acquire), NO_SUBSCRIPTION);
    }
}
