//! Room store: members of each room and the call running in it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use huddle_common::{PeerId, RosterEntry, WireTimestamp};

/// Outbound queue of one connection. Frames are pre-encoded JSON text.
pub type MemberTx = mpsc::Sender<String>;

struct Member {
    user_name: String,
    tx: MemberTx,
}

/// The call currently running in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCall {
    pub owner: PeerId,
    pub started_at: WireTimestamp,
}

#[derive(Default)]
struct Room {
    members: BTreeMap<PeerId, Member>,
    call: Option<ActiveCall>,
}

impl Room {
    fn senders_except(&self, peer: &PeerId) -> Vec<MemberTx> {
        self.members
            .iter()
            .filter(|(id, _)| *id != peer)
            .map(|(_, m)| m.tx.clone())
            .collect()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("room is full ({0} members)")]
    RoomFull(usize),
}

/// What a new member needs to hear, and who must hear about it.
pub struct JoinOutcome {
    /// Everyone already in the room.
    pub others: Vec<RosterEntry>,
    pub others_tx: Vec<MemberTx>,
    pub active_call: Option<ActiveCall>,
}

/// Result of a `videoCall:start`.
pub enum StartOutcome {
    /// The sender now owns the call; the senders are the other members.
    Started(ActiveCall, Vec<MemberTx>),
    /// A call was already running; the start was refused.
    AlreadyActive(ActiveCall),
    NotInRoom,
}

/// Thread-safe room store.
#[derive(Clone, Default)]
pub struct RoomStore {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member, creating the room on first join.
    pub async fn join(
        &self,
        room_id: &str,
        peer: PeerId,
        user_name: String,
        tx: MemberTx,
        max_room_size: usize,
    ) -> Result<JoinOutcome, JoinError> {
        let mut map = self.rooms.write().await;
        let room = map.entry(room_id.to_string()).or_default();
        if !room.members.contains_key(&peer) && room.members.len() >= max_room_size {
            return Err(JoinError::RoomFull(room.members.len()));
        }
        let outcome = JoinOutcome {
            others: room
                .members
                .iter()
                .filter(|(id, _)| **id != peer)
                .map(|(id, m)| RosterEntry {
                    socket_id: id.clone(),
                    user_name: m.user_name.clone(),
                })
                .collect(),
            others_tx: room.senders_except(&peer),
            active_call: room.call.clone(),
        };
        room.members.insert(peer, Member { user_name, tx });
        Ok(outcome)
    }

    /// Remove a member. Returns the remaining members' senders. An emptied
    /// room is removed together with its call.
    pub async fn leave(&self, room_id: &str, peer: &PeerId) -> Vec<MemberTx> {
        let mut map = self.rooms.write().await;
        let Some(room) = map.get_mut(room_id) else {
            return Vec::new();
        };
        if room.members.remove(peer).is_none() {
            return Vec::new();
        }
        if room.members.is_empty() {
            if room.call.is_some() {
                tracing::info!(room = %room_id, "room emptied, dropping its call");
            }
            map.remove(room_id);
            return Vec::new();
        }
        room.senders_except(peer)
    }

    /// Sender of one member, for directed `signal` forwarding.
    pub async fn sender(&self, room_id: &str, peer: &PeerId) -> Option<MemberTx> {
        let map = self.rooms.read().await;
        map.get(room_id)?.members.get(peer).map(|m| m.tx.clone())
    }

    /// Compare-and-set the room's call.
    pub async fn start_call(&self, room_id: &str, peer: &PeerId) -> StartOutcome {
        let mut map = self.rooms.write().await;
        let Some(room) = map.get_mut(room_id) else {
            return StartOutcome::NotInRoom;
        };
        if !room.members.contains_key(peer) {
            return StartOutcome::NotInRoom;
        }
        if let Some(call) = &room.call {
            return StartOutcome::AlreadyActive(call.clone());
        }
        let call = ActiveCall {
            owner: peer.clone(),
            started_at: WireTimestamp::now(),
        };
        room.call = Some(call.clone());
        StartOutcome::Started(call, room.senders_except(peer))
    }

    /// Clear the room's call. Returns the other members' senders, or `None`
    /// if no call was running.
    pub async fn end_call(&self, room_id: &str, peer: &PeerId) -> Option<Vec<MemberTx>> {
        let mut map = self.rooms.write().await;
        let room = map.get_mut(room_id)?;
        if !room.members.contains_key(peer) {
            return None;
        }
        room.call.take()?;
        Some(room.senders_except(peer))
    }

    pub async fn active_call(&self, room_id: &str) -> Option<ActiveCall> {
        self.rooms.read().await.get(room_id)?.call.clone()
    }

    pub async fn member_count(&self, room_id: &str) -> usize {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map_or(0, |room| room.members.len())
    }

    /// Number of non-empty rooms.
    pub async fn count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
