//! WebRTC signaling coordinator
//!
//! A rendezvous service that lets two browsers exchange session
//! descriptions and ICE candidates over a WebSocket so they can open a
//! direct peer-to-peer connection. No media passes through the server.
//!
//! # Protocol
//!
//! 1. The offerer sends `offer`; the server creates a room and replies
//!    `offerAck` with the room id.
//! 2. Anyone can send `rooms` to list pending and paired rooms.
//! 3. The answerer sends `answer` with the room id; the server forwards it
//!    verbatim to the offerer and replays candidates the offerer sent
//!    before the answerer arrived.
//! 4. Both sides exchange `candidate` messages, forwarded verbatim.
//!
//! A room lives until its offerer disconnects, sends a new offer, or
//! answers someone else's room. Rooms left pending for too long are swept.
//!
//! # Example
//!
//! ```no_run
//! use webrtc_signaling::{ServerConfig, SignalingServer};
//!
//! # async fn example() -> webrtc_signaling::Result<()> {
//! let server = SignalingServer::new(ServerConfig::default());
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use error::{Error, Result, SignalError};
pub use protocol::{Envelope, IceCandidateInit, SessionDescription};
pub use registry::{ConnectionId, RegistryConfig, RoomId, RoomRegistry};
pub use server::{ServerConfig, SignalingServer};
pub use session::{ConnectionHub, Outbox, SignalingRouter};
