//! Registry configuration

use std::time::Duration;

/// Room registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Largest room id handed out; ids are drawn from `1..=max_room_id`
    pub max_room_id: u32,

    /// Random draws attempted before giving up on a free id
    pub max_id_attempts: usize,

    /// Per-side cap on buffered ICE candidates
    pub max_buffered_candidates: usize,

    /// Remove rooms that stay pending this long (None = never)
    pub pending_room_timeout: Option<Duration>,

    /// How often the cleanup task runs
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_room_id: 999_999, // six digits, easy to read out loud
            max_id_attempts: 32,
            max_buffered_candidates: 64,
            pending_room_timeout: Some(Duration::from_secs(600)),
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    /// Set the largest room id (at least 1)
    pub fn max_room_id(mut self, max: u32) -> Self {
        self.max_room_id = max.max(1);
        self
    }

    /// Set the number of id draws per room creation (at least 1)
    pub fn max_id_attempts(mut self, attempts: usize) -> Self {
        self.max_id_attempts = attempts.max(1);
        self
    }

    /// Set the per-side candidate buffer size
    pub fn max_buffered_candidates(mut self, max: usize) -> Self {
        self.max_buffered_candidates = max;
        self
    }

    /// Set the pending room timeout
    pub fn pending_room_timeout(mut self, timeout: Duration) -> Self {
        self.pending_room_timeout = Some(timeout);
        self
    }

    /// Never expire pending rooms
    pub fn disable_room_expiry(mut self) -> Self {
        self.pending_room_timeout = None;
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
