//! Signaling wire protocol
//!
//! JSON envelopes exchanged between browsers and the coordinator:
//!
//! ```text
//! client                         server                        client
//!   │ {"type":"offer",...}         │                              │
//!   ├─────────────────────────────►│                              │
//!   │◄──── {"type":"offerAck"} ────┤                              │
//!   │                              │◄──── {"type":"answer"} ──────┤
//!   │◄──── answer (verbatim) ──────┤                              │
//!   │ {"type":"candidate"}         │                              │
//!   ├─────────────────────────────►├──── candidate (verbatim) ───►│
//! ```

pub mod message;

pub use message::{
    kind, AnswerPayload, CandidatePayload, Envelope, ErrorPayload, IceCandidateInit,
    OfferAckPayload, OfferPayload, RoomListEntry, RoomListPayload, SessionDescription,
    SignalMessage,
};
