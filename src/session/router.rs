//! Signaling router
//!
//! One [`SignalingRouter`] is bound to each accepted connection. It
//! interprets that connection's envelopes against the room registry and
//! hands derived or forwarded envelopes to the [`Outbox`].
//!
//! Every "look up room, mutate, forward" sequence runs under the room's
//! lock, and a room deleted in the meantime is treated as not found.

use std::sync::Arc;

use crate::error::SignalError;
use crate::protocol::{
    AnswerPayload, CandidatePayload, Envelope, SessionDescription, SignalMessage,
};
use crate::registry::{ConnectionId, PeerRole, Room, RoomRegistry};

use super::outbox::Outbox;
use super::state::ConnectionState;

/// Per-connection protocol handler
pub struct SignalingRouter<O: Outbox> {
    connection: ConnectionId,
    state: ConnectionState,
    registry: Arc<RoomRegistry>,
    outbox: O,
}

impl<O: Outbox> SignalingRouter<O> {
    /// Create a router for `connection`
    pub fn new(connection: ConnectionId, registry: Arc<RoomRegistry>, outbox: O) -> Self {
        Self {
            connection,
            state: ConnectionState::Idle,
            registry,
            outbox,
        }
    }

    /// Connection this router serves
    pub fn connection_id(&self) -> ConnectionId {
        self.connection
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Handle one inbound envelope
    ///
    /// Errors describe why the message was dropped; none of them affect the
    /// connection itself.
    pub async fn handle(&mut self, envelope: Envelope) -> Result<(), SignalError> {
        match SignalMessage::parse(&envelope)? {
            SignalMessage::ListRooms => self.list_rooms().await,
            SignalMessage::Offer(payload) => self.offer(payload.description).await,
            SignalMessage::Answer(payload) => self.answer(payload, envelope).await,
            SignalMessage::Candidate(payload) => self.candidate(payload, envelope).await,
            SignalMessage::Unknown(kind) => Err(SignalError::UnknownType(kind)),
        }
    }

    /// Tear down after the transport closed
    ///
    /// Deletes the owned room. Rooms this connection answered stay alive
    /// and go back to pending.
    pub async fn disconnect(&mut self) {
        self.discard_owned_room("disconnect").await;

        let detached = self.registry.detach_answerer(self.connection).await;
        if !detached.is_empty() {
            tracing::debug!(
                connection = %self.connection,
                rooms = ?detached,
                "Answerer detached from rooms"
            );
        }
    }

    async fn list_rooms(&self) -> Result<(), SignalError> {
        let rooms = self.registry.list_rooms().await;

        tracing::debug!(connection = %self.connection, rooms = rooms.len(), "Room list requested");

        self.outbox
            .deliver(self.connection, Envelope::rooms(rooms)?)
    }

    async fn offer(&mut self, description: SessionDescription) -> Result<(), SignalError> {
        self.discard_owned_room("re-offer").await;

        let room_id = match self
            .registry
            .create_room(self.connection, description)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                let err = SignalError::from(e);
                let report = Envelope::error("registryExhausted", err.to_string())?;
                if let Err(e) = self.outbox.deliver(self.connection, report) {
                    tracing::debug!(connection = %self.connection, error = %e, "Failed to report offer failure");
                }
                return Err(err);
            }
        };

        self.state.on_offer(room_id);

        self.outbox
            .deliver(self.connection, Envelope::offer_ack(room_id)?)
    }

    async fn answer(
        &mut self,
        payload: AnswerPayload,
        envelope: Envelope,
    ) -> Result<(), SignalError> {
        let handle = self.registry.get_room(payload.room_id).await?;

        let forwarded = {
            let mut room = handle.lock().await;
            check_answerable(&room, self.connection)?;

            let joined = room.set_answerer(self.connection, payload.description);

            tracing::info!(
                room = %room.id,
                offerer = %room.offerer,
                answerer = %self.connection,
                "Room paired"
            );

            let forwarded = self.outbox.deliver(room.offerer, envelope);

            if joined {
                self.replay_candidates(&room);
            }

            forwarded
        };

        // Own room goes only once the answer is accepted, and never while
        // the target room is locked
        self.discard_owned_room("answered another room").await;

        forwarded
    }

    async fn candidate(
        &mut self,
        payload: CandidatePayload,
        envelope: Envelope,
    ) -> Result<(), SignalError> {
        let handle = self.registry.get_room(payload.room_id).await?;
        let mut room = handle.lock().await;

        if room.is_removed() {
            return Err(SignalError::RoomNotFound(room.id));
        }

        let role = room
            .role_of(self.connection)
            .ok_or(SignalError::ProtocolViolation(
                "candidate from a connection outside the room",
            ))?;

        let max = self.registry.config().max_buffered_candidates;
        let recorded = room.record_candidate(role, payload.candidate, max);

        match room.connection(role.counterpart()) {
            Some(peer) => {
                if !recorded {
                    tracing::debug!(room = %room.id, role = %role, "Candidate buffer full, forwarding only");
                }
                self.outbox.deliver(peer, envelope)
            }
            None if recorded => {
                tracing::debug!(
                    room = %room.id,
                    role = %role,
                    buffered = room.candidates(role).len(),
                    "Candidate buffered until answer"
                );
                Ok(())
            }
            None => Err(SignalError::CandidateBufferFull(room.id)),
        }
    }

    /// Send the offerer's buffered candidates to a newly joined answerer
    fn replay_candidates(&self, room: &Room) {
        let Some(answerer) = room.answerer else {
            return;
        };

        let buffered = room.candidates(PeerRole::Offerer);
        if buffered.is_empty() {
            return;
        }

        let mut delivered = 0;
        for candidate in buffered {
            let result = Envelope::candidate(room.id, candidate.clone())
                .map_err(SignalError::from)
                .and_then(|envelope| self.outbox.deliver(answerer, envelope));

            if let Err(e) = result {
                tracing::warn!(room = %room.id, answerer = %answerer, error = %e, "Candidate replay aborted");
                break;
            }
            delivered += 1;
        }

        tracing::debug!(
            room = %room.id,
            answerer = %answerer,
            delivered = delivered,
            buffered = buffered.len(),
            "Replayed offerer candidates"
        );
    }

    async fn discard_owned_room(&mut self, reason: &'static str) {
        let Some(room_id) = self.state.release() else {
            return;
        };

        match self.registry.delete_owned_room(room_id, self.connection).await {
            Ok(()) => {
                tracing::debug!(connection = %self.connection, room = %room_id, reason = reason, "Owned room discarded");
            }
            Err(e) => {
                // Swept by cleanup; the id may already belong to another room
                tracing::debug!(connection = %self.connection, room = %room_id, error = %e, "Owned room already gone");
            }
        }
    }
}

fn check_answerable(room: &Room, conn: ConnectionId) -> Result<(), SignalError> {
    if room.is_removed() {
        return Err(SignalError::RoomNotFound(room.id));
    }
    if room.offerer == conn {
        return Err(SignalError::ProtocolViolation("cannot answer own offer"));
    }
    match room.answerer {
        Some(answerer) if answerer != conn => Err(SignalError::ProtocolViolation(
            "room already has an answerer",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::protocol::{kind, IceCandidateInit, OfferAckPayload, RoomListPayload};
    use crate::registry::{RegistryConfig, RoomId, RoomState};
    use crate::session::outbox::ConnectionHub;

    type Router = SignalingRouter<Arc<ConnectionHub>>;

    struct Harness {
        registry: Arc<RoomRegistry>,
        hub: Arc<ConnectionHub>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(RegistryConfig::default())
        }

        fn with_config(config: RegistryConfig) -> Self {
            Self {
                registry: Arc::new(RoomRegistry::with_config(config)),
                hub: Arc::new(ConnectionHub::new(64)),
            }
        }

        fn connect(&self, id: u64) -> (Router, mpsc::Receiver<Envelope>) {
            let conn = ConnectionId(id);
            let rx = self.hub.register(conn);
            let router = SignalingRouter::new(conn, Arc::clone(&self.registry), Arc::clone(&self.hub));
            (router, rx)
        }
    }

    fn offer(sdp: &str) -> Envelope {
        Envelope::offer(SessionDescription::new("offer", sdp)).unwrap()
    }

    fn answer(room: RoomId, sdp: &str) -> Envelope {
        Envelope::answer(room, SessionDescription::new("answer", sdp)).unwrap()
    }

    fn candidate(room: RoomId, line: &str) -> Envelope {
        Envelope::candidate(room, IceCandidateInit::new(line)).unwrap()
    }

    fn recv(rx: &mut mpsc::Receiver<Envelope>) -> Envelope {
        rx.try_recv().expect("expected an envelope")
    }

    fn assert_silent(rx: &mut mpsc::Receiver<Envelope>) {
        assert!(rx.try_recv().is_err(), "unexpected envelope");
    }

    async fn open_room(router: &mut Router, rx: &mut mpsc::Receiver<Envelope>, sdp: &str) -> RoomId {
        router.handle(offer(sdp)).await.unwrap();
        let ack = recv(rx);
        assert_eq!(ack.kind, kind::OFFER_ACK);
        ack.decode_payload::<OfferAckPayload>().unwrap().room_id
    }

    #[tokio::test]
    async fn test_offer_answer_candidate_scenario() {
        let h = Harness::new();
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut answerer, mut answerer_rx) = h.connect(2);

        let room = open_room(&mut offerer, &mut offerer_rx, "a").await;
        assert_eq!(offerer.state(), ConnectionState::OfferSent(room));

        let answer_env = answer(room, "b");
        answerer.handle(answer_env.clone()).await.unwrap();
        assert_eq!(recv(&mut offerer_rx), answer_env);

        let c1 = candidate(room, "c1");
        offerer.handle(c1.clone()).await.unwrap();
        assert_eq!(recv(&mut answerer_rx), c1);

        let c2 = candidate(room, "c2");
        answerer.handle(c2.clone()).await.unwrap();
        assert_eq!(recv(&mut offerer_rx), c2);

        // Room list still only carries offerer data
        answerer.handle(Envelope::rooms_request()).await.unwrap();
        let list = recv(&mut answerer_rx);
        assert_eq!(
            list.payload,
            json!({ "rooms": [ { "roomID": room.get(), "offererDesc": { "type": "offer", "sdp": "a" } } ] })
        );

        // Answering does not give the answerer ownership
        assert!(answerer.state().is_idle());
    }

    #[tokio::test]
    async fn test_forwarding_is_verbatim() {
        let h = Harness::new();
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut answerer, _answerer_rx) = h.connect(2);
        let room = open_room(&mut offerer, &mut offerer_rx, "a").await;

        // Extra fields survive forwarding untouched
        let raw = Envelope::new(
            kind::ANSWER,
            json!({
                "roomID": room.get(),
                "rtcSessionDescription": { "type": "answer", "sdp": "b" },
                "client": "test-suite"
            }),
        );
        answerer.handle(raw.clone()).await.unwrap();
        assert_eq!(recv(&mut offerer_rx), raw);
    }

    #[tokio::test]
    async fn test_cannot_answer_own_offer() {
        let h = Harness::new();
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let room = open_room(&mut offerer, &mut offerer_rx, "a").await;

        let err = offerer.handle(answer(room, "b")).await.unwrap_err();
        assert!(matches!(err, SignalError::ProtocolViolation(_)));

        // Room untouched and still owned
        let handle = h.registry.get_room(room).await.unwrap();
        let state = handle.lock().await;
        assert_eq!(state.state(), RoomState::Pending);
        assert!(state.answerer_description.is_none());
        assert_eq!(offerer.state(), ConnectionState::OfferSent(room));
        assert_silent(&mut offerer_rx);
    }

    #[tokio::test]
    async fn test_answer_unknown_room() {
        let h = Harness::new();
        let (mut answerer, mut answerer_rx) = h.connect(2);

        let err = answerer.handle(answer(RoomId(77), "b")).await.unwrap_err();
        assert!(matches!(err, SignalError::RoomNotFound(RoomId(77))));
        assert!(err.is_benign());
        assert_silent(&mut answerer_rx);
    }

    #[tokio::test]
    async fn test_reoffer_replaces_owned_room() {
        let h = Harness::new();
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut other, mut other_rx) = h.connect(2);
        open_room(&mut other, &mut other_rx, "x").await;

        let first = open_room(&mut offerer, &mut offerer_rx, "a").await;
        assert_eq!(h.registry.room_count().await, 2);

        let second = open_room(&mut offerer, &mut offerer_rx, "b").await;
        assert_ne!(first, second);
        assert_eq!(h.registry.room_count().await, 2);
        assert!(h.registry.get_room(first).await.is_err());
        assert_eq!(offerer.state(), ConnectionState::OfferSent(second));
    }

    #[tokio::test]
    async fn test_answer_discards_answerers_own_room() {
        let h = Harness::new();
        let (mut a, mut a_rx) = h.connect(1);
        let (mut b, mut b_rx) = h.connect(2);

        let room_a = open_room(&mut a, &mut a_rx, "a").await;
        let room_b = open_room(&mut b, &mut b_rx, "b").await;

        b.handle(answer(room_a, "b-answer")).await.unwrap();

        assert!(h.registry.get_room(room_b).await.is_err());
        assert!(h.registry.get_room(room_a).await.is_ok());
        assert!(b.state().is_idle());
        assert_eq!(recv(&mut a_rx).kind, kind::ANSWER);
    }

    #[tokio::test]
    async fn test_rejected_answer_keeps_own_room() {
        let h = Harness::new();
        let (mut b, mut b_rx) = h.connect(2);
        let room_b = open_room(&mut b, &mut b_rx, "b").await;

        assert!(b.handle(answer(RoomId(0), "b-answer")).await.is_err());
        assert!(h.registry.get_room(room_b).await.is_ok());
        assert_eq!(b.state(), ConnectionState::OfferSent(room_b));
    }

    #[tokio::test]
    async fn test_answer_keeps_own_room_until_accepted() {
        let h = Harness::new();
        let (mut a, mut a_rx) = h.connect(1);
        let (mut b, mut b_rx) = h.connect(2);
        let (mut c, _c_rx) = h.connect(3);

        let room_a = open_room(&mut a, &mut a_rx, "a").await;
        let room_b = open_room(&mut b, &mut b_rx, "b").await;

        // C takes room A first, so B's answer must fail without touching room B
        c.handle(answer(room_a, "c-answer")).await.unwrap();
        recv(&mut a_rx);

        let own = h.registry.get_room(room_b).await.unwrap();
        let guard = own.lock().await;

        let task = tokio::spawn(async move {
            let result = b.handle(answer(room_a, "b-answer")).await;
            (b, result)
        });
        let (b, result) = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("rejected answer must not wait on the own room")
            .unwrap();
        drop(guard);

        assert!(matches!(result, Err(SignalError::ProtocolViolation(_))));
        assert_eq!(b.state(), ConnectionState::OfferSent(room_b));
        assert!(!own.lock().await.is_removed());
        assert!(h.registry.get_room(room_b).await.is_ok());
        assert_silent(&mut a_rx);
    }

    #[tokio::test]
    async fn test_stale_owner_leaves_reused_id_alone() {
        let h = Harness::with_config(
            RegistryConfig::default()
                .max_room_id(1)
                .pending_room_timeout(Duration::ZERO),
        );
        let (mut a, mut a_rx) = h.connect(1);
        let (mut b, mut b_rx) = h.connect(2);

        let swept = open_room(&mut a, &mut a_rx, "a").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(h.registry.cleanup().await, 1);

        let reused = open_room(&mut b, &mut b_rx, "b").await;
        assert_eq!(swept, reused);

        // A still believes it owns that id
        assert_eq!(a.state(), ConnectionState::OfferSent(swept));
        a.disconnect().await;
        assert!(a.state().is_idle());

        let handle = h.registry.get_room(reused).await.unwrap();
        let room = handle.lock().await;
        assert!(!room.is_removed());
        assert_eq!(room.offerer, ConnectionId(2));
        assert_eq!(b.state(), ConnectionState::OfferSent(reused));
    }

    #[tokio::test]
    async fn test_second_answerer_rejected() {
        let h = Harness::new();
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut first, _first_rx) = h.connect(2);
        let (mut second, _second_rx) = h.connect(3);
        let room = open_room(&mut offerer, &mut offerer_rx, "a").await;

        first.handle(answer(room, "b")).await.unwrap();
        recv(&mut offerer_rx);

        let err = second.handle(answer(room, "c")).await.unwrap_err();
        assert!(matches!(err, SignalError::ProtocolViolation(_)));
        assert_silent(&mut offerer_rx);

        let handle = h.registry.get_room(room).await.unwrap();
        assert_eq!(handle.lock().await.answerer, Some(ConnectionId(2)));

        // The same answerer may answer again
        first.handle(answer(room, "b2")).await.unwrap();
        assert_eq!(recv(&mut offerer_rx).kind, kind::ANSWER);
    }

    #[tokio::test]
    async fn test_buffered_candidates_replayed_on_answer() {
        let h = Harness::new();
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut answerer, mut answerer_rx) = h.connect(2);
        let room = open_room(&mut offerer, &mut offerer_rx, "a").await;

        offerer.handle(candidate(room, "c1")).await.unwrap();
        offerer.handle(candidate(room, "c2")).await.unwrap();
        assert_silent(&mut answerer_rx);

        answerer.handle(answer(room, "b")).await.unwrap();

        let replayed: Vec<_> = (0..2)
            .map(|_| {
                let env = recv(&mut answerer_rx);
                assert_eq!(env.kind, kind::CANDIDATE);
                env.decode_payload::<CandidatePayload>()
                    .unwrap()
                    .candidate
                    .candidate
            })
            .collect();
        assert_eq!(replayed, ["c1", "c2"]);
        assert_silent(&mut answerer_rx);

        // Re-answer does not replay again
        answerer.handle(answer(room, "b2")).await.unwrap();
        assert_silent(&mut answerer_rx);
    }

    #[tokio::test]
    async fn test_candidate_from_outsider_rejected() {
        let h = Harness::new();
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut outsider, _outsider_rx) = h.connect(3);
        let room = open_room(&mut offerer, &mut offerer_rx, "a").await;

        let err = outsider.handle(candidate(room, "evil")).await.unwrap_err();
        assert!(matches!(err, SignalError::ProtocolViolation(_)));
        assert_silent(&mut offerer_rx);

        let handle = h.registry.get_room(room).await.unwrap();
        let state = handle.lock().await;
        assert!(state.answerer_candidates.is_empty());
        assert!(state.offerer_candidates.is_empty());
    }

    #[tokio::test]
    async fn test_candidate_buffer_full() {
        let h = Harness::with_config(RegistryConfig::default().max_buffered_candidates(1));
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut answerer, mut answerer_rx) = h.connect(2);
        let room = open_room(&mut offerer, &mut offerer_rx, "a").await;

        offerer.handle(candidate(room, "c1")).await.unwrap();
        let err = offerer.handle(candidate(room, "c2")).await.unwrap_err();
        assert!(matches!(err, SignalError::CandidateBufferFull(_)));

        // Once paired, candidates are forwarded even with a full buffer
        answerer.handle(answer(room, "b")).await.unwrap();
        assert_eq!(recv(&mut answerer_rx).kind, kind::CANDIDATE);
        offerer.handle(candidate(room, "c3")).await.unwrap();
        assert_eq!(recv(&mut answerer_rx), candidate(room, "c3"));
    }

    #[tokio::test]
    async fn test_forwarded_candidates_replayed_to_replacement_answerer() {
        let h = Harness::with_config(RegistryConfig::default().max_buffered_candidates(2));
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut first, mut first_rx) = h.connect(2);
        let room = open_room(&mut offerer, &mut offerer_rx, "a").await;

        first.handle(answer(room, "b")).await.unwrap();
        recv(&mut offerer_rx);

        offerer.handle(candidate(room, "c1")).await.unwrap();
        offerer.handle(candidate(room, "c2")).await.unwrap();
        assert_eq!(recv(&mut first_rx), candidate(room, "c1"));
        assert_eq!(recv(&mut first_rx), candidate(room, "c2"));

        first.disconnect().await;

        // Both forwarded candidates are still owed to the next answerer
        let err = offerer.handle(candidate(room, "c3")).await.unwrap_err();
        assert!(matches!(err, SignalError::CandidateBufferFull(_)));

        let (mut second, mut second_rx) = h.connect(3);
        second.handle(answer(room, "c")).await.unwrap();
        assert_eq!(recv(&mut second_rx), candidate(room, "c1"));
        assert_eq!(recv(&mut second_rx), candidate(room, "c2"));
        assert_silent(&mut second_rx);

        // Answerer side starts empty for the new answerer
        let handle = h.registry.get_room(room).await.unwrap();
        assert!(handle.lock().await.answerer_candidates.is_empty());
    }

    #[tokio::test]
    async fn test_candidate_for_unknown_room() {
        let h = Harness::new();
        let (mut peer, _rx) = h.connect(1);

        let err = peer.handle(candidate(RoomId(5), "c1")).await.unwrap_err();
        assert!(matches!(err, SignalError::RoomNotFound(RoomId(5))));
    }

    #[tokio::test]
    async fn test_offerer_disconnect_removes_room() {
        let h = Harness::new();
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut lister, mut lister_rx) = h.connect(2);
        open_room(&mut offerer, &mut offerer_rx, "a").await;

        offerer.disconnect().await;
        assert!(offerer.state().is_idle());

        lister.handle(Envelope::rooms_request()).await.unwrap();
        let list: RoomListPayload = recv(&mut lister_rx).decode_payload().unwrap();
        assert!(list.rooms.is_empty());
    }

    #[tokio::test]
    async fn test_answerer_disconnect_keeps_room() {
        let h = Harness::new();
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut answerer, _answerer_rx) = h.connect(2);
        let room = open_room(&mut offerer, &mut offerer_rx, "a").await;

        answerer.handle(answer(room, "b")).await.unwrap();
        recv(&mut offerer_rx);

        answerer.disconnect().await;

        let handle = h.registry.get_room(room).await.unwrap();
        assert_eq!(handle.lock().await.state(), RoomState::Pending);
        assert_eq!(h.registry.list_rooms().await.len(), 1);

        // Offerer candidates are buffered again instead of sent to a dead peer
        offerer.handle(candidate(room, "c1")).await.unwrap();

        // A new answerer can join
        let (mut late, mut late_rx) = h.connect(3);
        late.handle(answer(room, "c")).await.unwrap();
        assert_eq!(recv(&mut offerer_rx).kind, kind::ANSWER);
        assert_eq!(recv(&mut late_rx).kind, kind::CANDIDATE);
    }

    #[tokio::test]
    async fn test_room_deleted_while_handler_waits() {
        let h = Harness::new();
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut answerer, _answerer_rx) = h.connect(2);
        let room = open_room(&mut offerer, &mut offerer_rx, "a").await;

        // Hold the room lock so the answer blocks after lookup
        let handle = h.registry.get_room(room).await.unwrap();
        let guard = handle.lock().await;

        let task = tokio::spawn(async move {
            let result = answerer.handle(answer(room, "b")).await;
            (answerer, result)
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let registry = Arc::clone(&h.registry);
        let delete = tokio::spawn(async move { registry.delete_room(room).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        assert!(delete.await.unwrap().is_ok());
        let (_answerer, result) = task.await.unwrap();
        assert!(matches!(result, Err(SignalError::RoomNotFound(_))));
        assert_silent(&mut offerer_rx);
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_messages() {
        let h = Harness::new();
        let (mut peer, mut rx) = h.connect(1);

        let err = peer
            .handle(Envelope::new("test", serde_json::Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::UnknownType(ref k) if k == "test"));

        let err = peer
            .handle(Envelope::new(kind::OFFER, json!({ "sdp": "a" })))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::InvalidPayload { .. }));

        assert!(peer.state().is_idle());
        assert_eq!(h.registry.room_count().await, 0);
        assert_silent(&mut rx);
    }

    #[tokio::test]
    async fn test_offer_failure_reported() {
        let h = Harness::with_config(RegistryConfig::default().max_room_id(1));
        let (mut a, mut a_rx) = h.connect(1);
        let (mut b, mut b_rx) = h.connect(2);
        open_room(&mut a, &mut a_rx, "a").await;

        let err = b.handle(offer("b")).await.unwrap_err();
        assert!(matches!(err, SignalError::RegistryExhausted));
        assert!(b.state().is_idle());

        let report = recv(&mut b_rx);
        assert_eq!(report.kind, kind::ERROR);
        assert_eq!(report.payload["reason"], "registryExhausted");
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_state() {
        let h = Harness::new();
        let (mut offerer, mut offerer_rx) = h.connect(1);
        let (mut answerer, _answerer_rx) = h.connect(2);
        let room = open_room(&mut offerer, &mut offerer_rx, "a").await;

        // Offerer's transport is gone but its router has not run cleanup yet
        h.hub.unregister(ConnectionId(1));

        let err = answerer.handle(answer(room, "b")).await.unwrap_err();
        assert!(matches!(err, SignalError::DeliveryFailure(ConnectionId(1))));

        let handle = h.registry.get_room(room).await.unwrap();
        assert_eq!(handle.lock().await.answerer, Some(ConnectionId(2)));
    }
}
