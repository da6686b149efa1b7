//! Connection state machine
//!
//! Tracks a broker-side connection from accept to close.
//!
//! ```text
//! Accepted ──► Active ──► Closed
//!     │                     ▲
//!     └─────────────────────┘
//! ```

use std::time::Instant;

use crate::registry::ConnectionId;
use crate::stats::SessionStats;

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Accepted, handling context not yet reading
    Accepted,
    /// Reading and dispatching frames
    Active,
    /// Stream closed and subscriptions purged
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Identity used for registry cleanup
    pub connection_id: ConnectionId,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Bytes read from the stream
    pub bytes_received: u64,

    /// Complete frames decoded
    pub frames_received: u64,

    /// Frames with an unknown command byte
    pub frames_ignored: u64,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, connection_id: ConnectionId) -> Self {
        Self {
            id,
            connection_id,
            phase: SessionPhase::Accepted,
            connected_at: Instant::now(),
            bytes_received: 0,
            frames_received: 0,
            frames_ignored: 0,
        }
    }

    /// Start reading
    pub fn activate(&mut self) {
        if self.phase == SessionPhase::Accepted {
            self.phase = SessionPhase::Active;
        }
    }

    /// Mark closed
    ///
    /// Returns `false` if the session was already closed, so cleanup runs
    /// once.
    pub fn close(&mut self) -> bool {
        if self.phase == SessionPhase::Closed {
            return false;
        }
        self.phase = SessionPhase::Closed;
        true
    }

    pub fn add_bytes_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
    }

    pub fn add_frame(&mut self, known_command: bool) {
        self.frames_received += 1;
        if !known_command {
            self.frames_ignored += 1;
        }
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }

    /// Current statistics
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            bytes_received: self.bytes_received,
            frames_received: self.frames_received,
            frames_ignored: self.frames_ignored,
            duration: self.duration(),
        }
    }
}
