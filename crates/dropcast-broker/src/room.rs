//! Room state and the room table — `spec.md` §3 "Room" and §4.1
//! "Rendezvous Broker".
//!
//! Grounded on `tallow-relay`'s `RoomManager` (a `DashMap`-backed table
//! with `Entry`-based create/join), generalized from its binary-room
//! model to the two-role, JSON-signaling model this system needs. Unlike
//! that source, expiry here is anchored to `created_at`, not
//! `last_activity` — `spec.md` §3 and §8 both phrase the expiry
//! invariant strictly in terms of room age ("Age > `ROOM_EXPIRY`",
//! "`created_at ≥ t − ROOM_EXPIRY`"), so an idle-but-young room must
//! still expire on schedule and a chatty-but-old one must not survive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::code;
use crate::error::{BrokerError, Result};
use crate::protocol::{Role, SignalingMessage};

/// Maximum peers a room may hold. `spec.md` §6: "The design assumes
/// this value is exactly 2; other values are undefined behavior for the
/// protocol," so it is a constant, not a tunable.
pub const MAX_ROOM_SIZE: usize = 2;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique identifier for one attached signaling session.
pub type SessionId = u64;

/// Allocate a fresh session id.
pub fn next_session_id() -> SessionId {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// A handle the room table uses to deliver frames to an attached
/// session, without holding a reference to its WebSocket transport.
/// Sending never blocks: the channel is unbounded, so a room's lock can
/// be held across a `send` per the discipline in `spec.md` §5.
#[derive(Clone)]
pub struct PeerHandle {
    pub id: SessionId,
    pub role: Role,
    tx: mpsc::UnboundedSender<SignalingMessage>,
    close: std::sync::Arc<tokio::sync::Notify>,
}

impl PeerHandle {
    /// Create a handle paired with a receiver the session's write task
    /// drains. Used in tests that don't run a full session loop.
    pub fn new(role: Role) -> (Self, mpsc::UnboundedReceiver<SignalingMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: next_session_id(),
                role,
                tx,
                close: std::sync::Arc::new(tokio::sync::Notify::new()),
            },
            rx,
        )
    }

    /// Build a handle from an already-open outbound channel and close
    /// signal. Used once a session's role is known (at join time) to
    /// attach it to the room table without re-pairing its write task's
    /// channel.
    pub fn from_parts(
        id: SessionId,
        role: Role,
        tx: mpsc::UnboundedSender<SignalingMessage>,
        close: std::sync::Arc<tokio::sync::Notify>,
    ) -> Self {
        Self { id, role, tx, close }
    }

    /// Deliver a frame to this peer. Fails with [`BrokerError::TransportDown`]
    /// only if the session's write task has already exited.
    pub fn send(&self, message: SignalingMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| BrokerError::TransportDown(self.id))
    }

    /// Force this session's task to close its transport. Used for room
    /// teardown on expiry, where every attached peer must be
    /// disconnected regardless of transport liveness (`spec.md` §4.1
    /// "Room lifecycle: Expiry").
    pub fn close_session(&self) {
        self.close.notify_one();
    }
}

/// A room's mutable state (`spec.md` §3 "Room").
pub struct Room {
    code: String,
    peers: Vec<PeerHandle>,
    created_at: Instant,
    pending_offer: Option<Value>,
    pending_answer: Option<Value>,
}

impl Room {
    fn new(code: String, creator: PeerHandle) -> Self {
        Self {
            code,
            peers: vec![creator],
            created_at: Instant::now(),
            pending_offer: None,
            pending_answer: None,
        }
    }

    /// This room's age.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Number of attached peers (`0..=2`).
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    fn peer_with_role(&self, role: Role) -> Option<&PeerHandle> {
        self.peers.iter().find(|p| p.role == role)
    }

    fn counterpart_of(&self, id: SessionId) -> Option<&PeerHandle> {
        self.peers.iter().find(|p| p.id != id)
    }
}

/// Outcome of a successful join, carrying everything the caller needs
/// to notify both peers per `spec.md` §4.1's join protocol.
pub struct JoinOutcome {
    pub peer_count: usize,
    pub sender: PeerHandle,
    pub pending_offer: Option<Value>,
}

/// The shared room table, indexed by canonical room code.
pub struct RoomManager {
    rooms: DashMap<String, Room>,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomManager {
    /// Create an empty room table.
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Number of rooms currently in the table.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Total number of attached peers across all rooms.
    pub fn connection_count(&self) -> usize {
        self.rooms.iter().map(|r| r.peer_count()).sum()
    }

    /// Create a new room for `creator` (`peers[0]`, role `sender`),
    /// retrying on the astronomically unlikely room-code collision.
    pub fn create_room(&self, creator: PeerHandle) -> String {
        loop {
            let candidate = code::generate();
            if let Entry::Vacant(slot) = self.rooms.entry(candidate.clone()) {
                slot.insert(Room::new(candidate.clone(), creator));
                return candidate;
            }
        }
    }

    /// Attempt to join an existing room as `peers[1]`, role `receiver`
    /// (`spec.md` §4.1 "Join protocol").
    pub fn join_room(&self, room_id: &str, joiner: PeerHandle) -> Result<JoinOutcome> {
        let canonical = code::canonicalize(room_id);
        let mut room = self
            .rooms
            .get_mut(&canonical)
            .ok_or_else(|| BrokerError::UnknownRoom(canonical.clone()))?;

        if room.peer_count() >= MAX_ROOM_SIZE {
            return Err(BrokerError::RoomFull(canonical));
        }

        room.peers.push(joiner);
        let pending_offer = room.pending_offer.take();
        let sender = room
            .peer_with_role(Role::Sender)
            .cloned()
            .expect("a room always has a sender at peers[0]");

        Ok(JoinOutcome {
            peer_count: room.peer_count(),
            sender,
            pending_offer,
        })
    }

    /// Forward an `offer` to the receiver, or buffer it if the receiver
    /// has not attached yet.
    pub fn forward_offer(&self, room_id: &str, offer: Value) -> Result<()> {
        let mut room = self.room_mut(room_id)?;
        match room.peer_with_role(Role::Receiver) {
            Some(receiver) => receiver.send(SignalingMessage::Offer { offer })?,
            None => room.pending_offer = Some(offer),
        }
        Ok(())
    }

    /// Forward an `answer` to the sender, or buffer it if the sender
    /// has somehow detached in the interim.
    pub fn forward_answer(&self, room_id: &str, answer: Value) -> Result<()> {
        let mut room = self.room_mut(room_id)?;
        match room.peer_with_role(Role::Sender) {
            Some(sender) => sender.send(SignalingMessage::Answer { answer })?,
            None => room.pending_answer = Some(answer),
        }
        Ok(())
    }

    /// Forward an ICE candidate to whichever peer didn't send it.
    /// Dropped (never buffered) if the counterpart isn't attached yet
    /// (`spec.md` §4.1 "Forwarding rules").
    pub fn forward_ice_candidate(&self, room_id: &str, from: SessionId, candidate: Value) -> Result<()> {
        let room = self.room_mut(room_id)?;
        if let Some(peer) = room.counterpart_of(from) {
            peer.send(SignalingMessage::IceCandidate { candidate })?;
        }
        Ok(())
    }

    /// Remove a session from its room, notifying any remaining peer.
    /// Removes the room entirely once it holds no peers.
    pub fn detach(&self, room_id: &str, session_id: SessionId) {
        let canonical = code::canonicalize(room_id);
        let remove_room = match self.rooms.get_mut(&canonical) {
            Some(mut room) => {
                room.peers.retain(|p| p.id != session_id);
                if let Some(remaining) = room.peers.first() {
                    let _ = remaining.send(SignalingMessage::PeerDisconnected);
                }
                room.peers.is_empty()
            }
            None => false,
        };
        if remove_room {
            self.rooms.remove(&canonical);
        }
    }

    fn room_mut(&self, room_id: &str) -> Result<dashmap::mapref::one::RefMut<'_, String, Room>> {
        let canonical = code::canonicalize(room_id);
        self.rooms
            .get_mut(&canonical)
            .ok_or(BrokerError::UnknownRoom(canonical))
    }

    /// Tear down every room older than `max_age`, notifying each
    /// attached peer with `room-expired` exactly once, then dropping the
    /// room from the table (`spec.md` §4.1 "Room lifecycle" and §8
    /// "Expiry").
    pub fn sweep_expired(&self, max_age: Duration) -> Vec<String> {
        let expired: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.age() > max_age)
            .map(|entry| entry.key().clone())
            .collect();

        for code in &expired {
            if let Some((_, room)) = self.rooms.remove(code) {
                for peer in &room.peers {
                    let _ = peer.send(SignalingMessage::RoomExpired);
                    peer.close_session();
                }
            }
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(role: Role) -> (PeerHandle, mpsc::UnboundedReceiver<SignalingMessage>) {
        PeerHandle::new(role)
    }

    #[test]
    fn create_then_join_assigns_roles_by_position() {
        let manager = RoomManager::new();
        let (creator, _creator_rx) = peer(Role::Sender);
        let code = manager.create_room(creator);

        let (joiner, _joiner_rx) = peer(Role::Receiver);
        let outcome = manager.join_room(&code, joiner).unwrap();
        assert_eq!(outcome.peer_count, 2);
    }

    #[test]
    fn room_full_rejects_a_third_peer() {
        let manager = RoomManager::new();
        let (creator, _rx1) = peer(Role::Sender);
        let code = manager.create_room(creator);
        let (joiner, _rx2) = peer(Role::Receiver);
        manager.join_room(&code, joiner).unwrap();

        let (third, _rx3) = peer(Role::Receiver);
        let err = manager.join_room(&code, third).unwrap_err();
        assert!(matches!(err, BrokerError::RoomFull(_)));
    }

    #[test]
    fn join_unknown_room_is_an_error_without_side_effects() {
        let manager = RoomManager::new();
        let (joiner, _rx) = peer(Role::Receiver);
        let err = manager.join_room("ZZZZZZ", joiner).unwrap_err();
        assert!(matches!(err, BrokerError::UnknownRoom(_)));
        assert_eq!(manager.room_count(), 0);
    }

    #[test]
    fn pending_offer_buffers_then_clears_on_join() {
        let manager = RoomManager::new();
        let (creator, _rx1) = peer(Role::Sender);
        let code = manager.create_room(creator);

        manager
            .forward_offer(&code, serde_json::json!({"sdp": "v=0"}))
            .unwrap();

        let (joiner, mut rx2) = peer(Role::Receiver);
        let outcome = manager.join_room(&code, joiner).unwrap();

        assert!(outcome.pending_offer.is_some());
        // The caller is responsible for delivering the drained pending
        // offer; simulate that here and confirm it's the same offer.
        if let Some(offer) = outcome.pending_offer {
            assert_eq!(offer, serde_json::json!({"sdp": "v=0"}));
        }
        assert!(rx2.try_recv().is_err(), "offer should not double-deliver via the channel");
    }

    #[test]
    fn ice_candidate_is_dropped_when_counterpart_absent() {
        let manager = RoomManager::new();
        let (creator, _rx1) = peer(Role::Sender);
        let creator_id = creator.id;
        let code = manager.create_room(creator);

        // No receiver attached yet; this must not error and must not panic.
        manager
            .forward_ice_candidate(&code, creator_id, serde_json::json!({"candidate": "x"}))
            .unwrap();
    }

    #[test]
    fn detach_notifies_survivor_and_removes_empty_room() {
        let manager = RoomManager::new();
        let (creator, _rx1) = peer(Role::Sender);
        let creator_id = creator.id;
        let code = manager.create_room(creator);
        let (joiner, mut rx2) = peer(Role::Receiver);
        manager.join_room(&code, joiner).unwrap();

        manager.detach(&code, creator_id);
        let msg = rx2.try_recv().expect("survivor should be notified");
        assert!(matches!(msg, SignalingMessage::PeerDisconnected));

        // Detaching the last peer removes the room.
        let joiner_id = {
            let room = manager.rooms.get(&code).unwrap();
            room.peers[0].id
        };
        manager.detach(&code, joiner_id);
        assert_eq!(manager.room_count(), 0);
    }

    #[test]
    fn expired_rooms_are_removed_and_notified_exactly_once() {
        let manager = RoomManager::new();
        let (creator, mut rx1) = peer(Role::Sender);
        let code = manager.create_room(creator);

        std::thread::sleep(Duration::from_millis(20));
        let expired = manager.sweep_expired(Duration::from_millis(10));

        assert_eq!(expired, vec![code]);
        assert_eq!(manager.room_count(), 0);
        let mut count = 0;
        while let Ok(msg) = rx1.try_recv() {
            assert!(matches!(msg, SignalingMessage::RoomExpired));
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn young_rooms_survive_a_sweep() {
        let manager = RoomManager::new();
        let (creator, _rx1) = peer(Role::Sender);
        let code = manager.create_room(creator);

        let expired = manager.sweep_expired(Duration::from_secs(600));
        assert!(expired.is_empty());
        assert_eq!(manager.room_count(), 1);
        let _ = code;
    }
}
