//! Connection context
//!
//! Identity and bookkeeping for one accepted connection.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::registry::ConnectionId;

/// Information about an accepted connection
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Handle issued at accept time
    pub connection_id: ConnectionId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Accept time
    pub connected_at: Instant,

    /// Envelopes received
    pub messages_received: u64,

    /// Envelopes dropped by the router
    pub messages_rejected: u64,
}

impl ConnectionContext {
    /// Create a new context
    pub fn new(connection_id: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self {
            connection_id,
            peer_addr,
            connected_at: Instant::now(),
            messages_received: 0,
            messages_rejected: 0,
        }
    }

    /// Get connection duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
