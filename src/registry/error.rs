//! Registry error types
//!
//! Error types for room registry operations.

use super::id::RoomId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Room not found (stale or never-issued id)
    RoomNotFound(RoomId),
    /// No unique room id could be allocated
    Exhausted,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::RoomNotFound(id) => write!(f, "Room not found: {}", id),
            RegistryError::Exhausted => write!(f, "Room id space exhausted"),
        }
    }
}

impl std::error::Error for RegistryError {}
