//! Per-connection signaling sessions
//!
//! This module provides:
//! - The connection state machine (idle / owns a room)
//! - The signaling router that turns envelopes into registry changes
//! - The outbox seam through which routers reach other connections

pub mod context;
pub mod outbox;
pub mod router;
pub mod state;

pub use context::ConnectionContext;
pub use outbox::{ConnectionHub, Outbox};
pub use router::SignalingRouter;
pub use state::ConnectionState;
