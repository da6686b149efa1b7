//! Connection and broker statistics

pub mod metrics;

pub use metrics::{BrokerStats, BrokerStatsSnapshot, SessionStats};
