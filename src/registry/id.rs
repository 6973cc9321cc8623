//! Room and connection identifiers
//!
//! Room ids travel on the wire as plain integers and are often shared by
//! hand, so they stay short. Connection ids never leave the process.

use serde::{Deserialize, Serialize};

/// Identifier of a live room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl RoomId {
    /// Get the raw numeric value
    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for RoomId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of an accepted connection
///
/// Issued from a monotonically increasing counter at accept time and never
/// reused, so comparing handles is how the router decides who is the offerer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
