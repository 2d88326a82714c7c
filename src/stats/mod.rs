//! Session statistics

/// Per-connection counters
///
/// Updated by the broker's connection task and logged when the session
/// closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    /// Frames read from the peer
    pub frames_received: u64,
    /// Client requests served on this connection
    pub requests: u64,
    /// Outbound endpoint calls relayed through this connection
    pub calls_relayed: u64,
}

impl SessionStats {
    /// Create a zeroed counter set
    pub fn new() -> Self {
        Self::default()
    }
}
