//! Room entry and state types
//!
//! This module defines the per-room state stored in the registry.

use std::time::Instant;

use crate::protocol::{IceCandidateInit, RoomListEntry, SessionDescription};

use super::id::{ConnectionId, RoomId};

/// State of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Offerer present, waiting for an answer
    Pending,
    /// Offerer and answerer both present
    Paired,
}

/// Which side of a room a connection is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    Offerer,
    Answerer,
}

impl PeerRole {
    /// The other side
    pub fn counterpart(self) -> Self {
        match self {
            PeerRole::Offerer => PeerRole::Answerer,
            PeerRole::Answerer => PeerRole::Offerer,
        }
    }
}

impl std::fmt::Display for PeerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerRole::Offerer => write!(f, "offerer"),
            PeerRole::Answerer => write!(f, "answerer"),
        }
    }
}

/// A single offerer/answerer negotiation
#[derive(Debug)]
pub struct Room {
    /// Room id
    pub id: RoomId,

    /// Connection that created the room
    pub offerer: ConnectionId,

    /// Connection that answered, if any
    pub answerer: Option<ConnectionId>,

    /// Offerer's session description
    pub offerer_description: SessionDescription,

    /// Answerer's session description
    pub answerer_description: Option<SessionDescription>,

    /// Candidates sent by the offerer, in arrival order
    pub offerer_candidates: Vec<IceCandidateInit>,

    /// Candidates sent by the answerer, in arrival order
    pub answerer_candidates: Vec<IceCandidateInit>,

    /// When the room was created
    pub created_at: Instant,

    /// Last offer, answer or candidate touching the room
    pub last_activity: Instant,

    /// Set under the room lock when the registry drops the room
    removed: bool,
}

impl Room {
    pub(super) fn new(
        id: RoomId,
        offerer: ConnectionId,
        offerer_description: SessionDescription,
    ) -> Self {
        let now = Instant::now();

        Self {
            id,
            offerer,
            answerer: None,
            offerer_description,
            answerer_description: None,
            offerer_candidates: Vec::new(),
            answerer_candidates: Vec::new(),
            created_at: now,
            last_activity: now,
            removed: false,
        }
    }

    /// Current state
    pub fn state(&self) -> RoomState {
        if self.answerer.is_some() {
            RoomState::Paired
        } else {
            RoomState::Pending
        }
    }

    /// Whether the room has been deleted from the registry
    ///
    /// A handler that looked the room up before deletion must treat it as
    /// not found.
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub(super) fn mark_removed(&mut self) {
        self.removed = true;
    }

    /// Role of `conn` in this room, if it participates
    pub fn role_of(&self, conn: ConnectionId) -> Option<PeerRole> {
        if conn == self.offerer {
            Some(PeerRole::Offerer)
        } else if self.answerer == Some(conn) {
            Some(PeerRole::Answerer)
        } else {
            None
        }
    }

    /// Connection currently holding `role`
    pub fn connection(&self, role: PeerRole) -> Option<ConnectionId> {
        match role {
            PeerRole::Offerer => Some(self.offerer),
            PeerRole::Answerer => self.answerer,
        }
    }

    /// Set the answerer
    ///
    /// Returns `true` when the answerer is new (the room just became paired),
    /// `false` when the same connection answered again.
    pub fn set_answerer(&mut self, conn: ConnectionId, description: SessionDescription) -> bool {
        let joined = self.answerer != Some(conn);
        self.answerer = Some(conn);
        self.answerer_description = Some(description);
        self.touch();
        joined
    }

    /// Drop the answerer, returning the room to pending
    pub fn clear_answerer(&mut self) {
        self.answerer = None;
        self.answerer_description = None;
        self.answerer_candidates.clear();
        self.touch();
    }

    /// Record a candidate sent by `role`
    ///
    /// Returns `false` if that side's buffer already holds `max` candidates.
    ///
    /// Offerer candidates stay recorded after they are forwarded: if the
    /// answerer leaves, the next one is replayed the whole list, so each of
    /// them still counts against `max`. Answerer candidates are dropped
    /// together with their answerer in [`Room::clear_answerer`].
    pub fn record_candidate(
        &mut self,
        role: PeerRole,
        candidate: IceCandidateInit,
        max: usize,
    ) -> bool {
        self.touch();

        let buffer = match role {
            PeerRole::Offerer => &mut self.offerer_candidates,
            PeerRole::Answerer => &mut self.answerer_candidates,
        };

        if buffer.len() >= max {
            return false;
        }
        buffer.push(candidate);
        true
    }

    /// Candidates recorded for `role`
    pub fn candidates(&self, role: PeerRole) -> &[IceCandidateInit] {
        match role {
            PeerRole::Offerer => &self.offerer_candidates,
            PeerRole::Answerer => &self.answerer_candidates,
        }
    }

    /// Row for the room list; answerer fields are never exposed
    pub fn summary(&self) -> RoomListEntry {
        RoomListEntry {
            room_id: self.id,
            offerer_description: self.offerer_description.clone(),
        }
    }

    pub(super) fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Registry-wide statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Total live rooms
    pub rooms: usize,
    /// Rooms waiting for an answer
    pub pending: usize,
    /// Rooms with both sides present
    pub paired: usize,
}
