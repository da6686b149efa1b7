//! Registry configuration

/// Subscription registry options
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Collapse repeated subscriptions from one connection to one channel.
    ///
    /// Off by default: every Subscribe frame adds an entry and each entry
    /// receives its own copy of broadcast messages.
    pub deduplicate_subscriptions: bool,
}

impl RegistryConfig {
    /// Enable or disable duplicate-subscription collapsing
    pub fn deduplicate_subscriptions(mut self, enabled: bool) -> Self {
        self.deduplicate_subscriptions = enabled;
        self
    }
}
