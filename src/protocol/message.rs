//! Signaling envelopes and payloads
//!
//! Every frame on the wire is an [`Envelope`]: a `type` string plus a
//! kind-specific `payload`. Inbound envelopes are kept as raw JSON so that
//! answers and candidates can be forwarded to the other peer byte-for-byte;
//! [`SignalMessage::parse`] gives the router a typed view of the same data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SignalError;
use crate::registry::RoomId;

/// Envelope `type` values
pub mod kind {
    /// Room list request and response
    pub const ROOMS: &str = "rooms";
    /// Offer that creates a room
    pub const OFFER: &str = "offer";
    /// Server acknowledgement carrying the new room id
    pub const OFFER_ACK: &str = "offerAck";
    /// Answer to an existing room's offer
    pub const ANSWER: &str = "answer";
    /// ICE candidate for the other side of a room
    pub const CANDIDATE: &str = "candidate";
    /// Server-side failure report
    pub const ERROR: &str = "error";
}

/// A single signaling frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind (see [`kind`])
    #[serde(rename = "type")]
    pub kind: String,

    /// Kind-specific payload, `null` when absent
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Create an envelope from an already-encoded payload
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Create an envelope by encoding a typed payload
    pub fn with_payload<T: Serialize>(kind: &str, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Room list request (empty payload)
    pub fn rooms_request() -> Self {
        Self::new(kind::ROOMS, Value::Null)
    }

    /// Room list response
    pub fn rooms(rooms: Vec<RoomListEntry>) -> Result<Self, serde_json::Error> {
        Self::with_payload(kind::ROOMS, &RoomListPayload { rooms })
    }

    /// Offer request
    pub fn offer(description: SessionDescription) -> Result<Self, serde_json::Error> {
        Self::with_payload(kind::OFFER, &OfferPayload { description })
    }

    /// Offer acknowledgement
    pub fn offer_ack(room_id: RoomId) -> Result<Self, serde_json::Error> {
        Self::with_payload(kind::OFFER_ACK, &OfferAckPayload { room_id })
    }

    /// Answer request
    pub fn answer(
        room_id: RoomId,
        description: SessionDescription,
    ) -> Result<Self, serde_json::Error> {
        Self::with_payload(
            kind::ANSWER,
            &AnswerPayload {
                room_id,
                description,
            },
        )
    }

    /// Candidate message, also used when replaying buffered candidates
    pub fn candidate(
        room_id: RoomId,
        candidate: IceCandidateInit,
    ) -> Result<Self, serde_json::Error> {
        Self::with_payload(kind::CANDIDATE, &CandidatePayload { room_id, candidate })
    }

    /// Failure report
    pub fn error(reason: &str, message: impl Into<String>) -> Result<Self, serde_json::Error> {
        Self::with_payload(
            kind::ERROR,
            &ErrorPayload {
                reason: reason.to_string(),
                message: message.into(),
            },
        )
    }

    /// Decode an envelope from a JSON text frame
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encode the envelope as a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode the payload into a typed value
    pub fn decode_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// Session description (`RTCSessionDescriptionInit`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// `offer`, `answer`, `pranswer` or `rollback`
    #[serde(rename = "type")]
    pub kind: String,

    /// SDP blob
    pub sdp: String,
}

impl SessionDescription {
    /// Create a description of the given type
    pub fn new(kind: impl Into<String>, sdp: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            sdp: sdp.into(),
        }
    }
}

/// ICE candidate (`RTCIceCandidateInit`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidateInit {
    /// Candidate line; empty signals end-of-candidates
    #[serde(default)]
    pub candidate: String,

    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,

    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

impl IceCandidateInit {
    /// Candidate with only the candidate line set
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            ..Default::default()
        }
    }
}

/// Payload of `offer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferPayload {
    #[serde(rename = "rtcSessionDescription")]
    pub description: SessionDescription,
}

/// Payload of `offerAck`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAckPayload {
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
}

/// Payload of `answer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPayload {
    #[serde(rename = "roomID")]
    pub room_id: RoomId,

    #[serde(rename = "rtcSessionDescription")]
    pub description: SessionDescription,
}

/// Payload of `candidate`
///
/// Browsers in the wild send the candidate under a few different keys; all
/// of them are accepted, replays always use `rtcIceCandidateInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePayload {
    #[serde(rename = "roomID")]
    pub room_id: RoomId,

    #[serde(
        rename = "rtcIceCandidateInit",
        alias = "RTCIceCandidateInit",
        alias = "iceCandidate"
    )]
    pub candidate: IceCandidateInit,
}

/// One row of the room list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListEntry {
    #[serde(rename = "roomID")]
    pub room_id: RoomId,

    #[serde(rename = "offererDesc")]
    pub offerer_description: SessionDescription,
}

/// Payload of the `rooms` response
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomListPayload {
    pub rooms: Vec<RoomListEntry>,
}

/// Payload of `error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable reason
    pub reason: String,
    /// Human-readable detail
    pub message: String,
}

/// Typed view of an inbound envelope
#[derive(Debug, Clone, PartialEq)]
pub enum SignalMessage {
    /// Room list request
    ListRooms,
    /// Offer that creates a room
    Offer(OfferPayload),
    /// Answer to a room
    Answer(AnswerPayload),
    /// ICE candidate for a room
    Candidate(CandidatePayload),
    /// Any other `type`
    Unknown(String),
}

impl SignalMessage {
    /// Interpret an envelope
    ///
    /// A payload that does not match its kind's schema is reported as
    /// [`SignalError::InvalidPayload`]; an unknown kind is not an error here.
    pub fn parse(envelope: &Envelope) -> Result<Self, SignalError> {
        let invalid = |source| SignalError::InvalidPayload {
            kind: envelope.kind.clone(),
            source,
        };

        match envelope.kind.as_str() {
            kind::ROOMS => Ok(SignalMessage::ListRooms),
            kind::OFFER => envelope
                .decode_payload()
                .map(SignalMessage::Offer)
                .map_err(invalid),
            kind::ANSWER => envelope
                .decode_payload()
                .map(SignalMessage::Answer)
                .map_err(invalid),
            kind::CANDIDATE => envelope
                .decode_payload()
                .map(SignalMessage::Candidate)
                .map_err(invalid),
            other => Ok(SignalMessage::Unknown(other.to_string())),
        }
    }
}
