//! Broker-side session tracking

pub mod state;

pub use state::{SessionPhase, SessionState};
