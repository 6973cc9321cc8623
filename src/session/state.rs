//! Connection state machine
//!
//! Tracks which room, if any, a connection owns as offerer. Rooms a
//! connection merely answered are not tracked here.

use crate::registry::RoomId;

/// Per-connection signaling state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Owns no room
    #[default]
    Idle,
    /// Sent an offer and owns the resulting room
    OfferSent(RoomId),
}

impl ConnectionState {
    /// Room owned by this connection
    pub fn owned_room(&self) -> Option<RoomId> {
        match self {
            ConnectionState::Idle => None,
            ConnectionState::OfferSent(id) => Some(*id),
        }
    }

    /// Check if the connection owns no room
    pub fn is_idle(&self) -> bool {
        *self == ConnectionState::Idle
    }

    /// Record ownership of a freshly created room
    pub fn on_offer(&mut self, room: RoomId) {
        *self = ConnectionState::OfferSent(room);
    }

    /// Give up ownership, returning the room that was owned
    pub fn release(&mut self) -> Option<RoomId> {
        std::mem::take(self).owned_room()
    }
}
