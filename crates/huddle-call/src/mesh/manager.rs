use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde_json::Value;
use tokio::sync::mpsc;

use huddle_common::PeerId;

use super::link::{LinkSpec, PeerConnector, PeerEvent, PeerLink, RemoteStream};
use crate::error::PeerNegotiationError;
use crate::media::MediaTrack;

/// Whether the mesh holds links, queues signals, or ignores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshMode {
    /// No call: signals are dropped.
    Off,
    /// A call is known but local media is not ready: signals are queued.
    Buffering,
    /// Links exist for every known peer.
    Live,
}

/// What happened to an inbound signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Applied,
    Buffered,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Inactive,
    FromSelf,
    Departed,
    QueueFull,
}

/// What a backend event means for the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshUpdate {
    /// Relay this payload to `to`.
    Forward { to: PeerId, signal: Value },
    Connected { peer: PeerId },
    StreamAdded { peer: PeerId },
    LinkFailed(PeerNegotiationError),
    /// The event's link no longer exists.
    Ignored,
}

/// Full mesh of peer links, one per known remote participant.
///
/// Signals from peers without a link are queued until the peer becomes
/// known, unless the peer already left during this call. Leaving wins over
/// any signal still in flight.
pub struct PeerMeshManager {
    self_id: PeerId,
    connector: Box<dyn PeerConnector>,
    event_tx: mpsc::UnboundedSender<PeerEvent>,
    mode: MeshMode,
    links: BTreeMap<PeerId, PeerLink>,
    pending: HashMap<PeerId, VecDeque<Value>>,
    departed: HashSet<PeerId>,
    max_pending: usize,
}

impl PeerMeshManager {
    /// Create the manager and the receiver for backend events.
    pub fn new(
        self_id: PeerId,
        connector: Box<dyn PeerConnector>,
        max_pending: usize,
    ) -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let manager = Self {
            self_id,
            connector,
            event_tx,
            mode: MeshMode::Off,
            links: BTreeMap::new(),
            pending: HashMap::new(),
            departed: HashSet::new(),
            max_pending,
        };
        (manager, event_rx)
    }

    pub fn mode(&self) -> MeshMode {
        self.mode
    }

    /// Start queueing signals ahead of activation.
    pub fn arm(&mut self) {
        if self.mode == MeshMode::Off {
            self.mode = MeshMode::Buffering;
        }
    }

    /// Go live: a link to every known peer, replaying queued signals.
    ///
    /// The local side initiates unless the peer already signalled first,
    /// in which case it answers the queued offer.
    pub fn activate(&mut self, known: &[PeerId], local: &[MediaTrack]) -> Vec<PeerNegotiationError> {
        self.mode = MeshMode::Live;
        tracing::info!(peers = known.len(), "mesh active");
        known
            .iter()
            .filter_map(|peer| {
                let initiator = self.pending_count(peer) == 0;
                self.open_link(peer, initiator, local).err()
            })
            .collect()
    }

    /// A peer joined the room. Creates a non-initiator link when live.
    ///
    /// Returns `true` if a link was created.
    pub fn peer_joined(&mut self, peer: &PeerId, local: &[MediaTrack]) -> Result<bool, PeerNegotiationError> {
        self.departed.remove(peer);
        if self.mode != MeshMode::Live || self.links.contains_key(peer) {
            return Ok(false);
        }
        self.open_link(peer, false, local).map(|_| true)
    }

    /// A peer left the room. Its link and queued signals are dropped and
    /// later signals from it are ignored.
    ///
    /// Returns `true` if a link was destroyed.
    pub fn peer_left(&mut self, peer: &PeerId) -> bool {
        self.pending.remove(peer);
        if self.mode != MeshMode::Off {
            self.departed.insert(peer.clone());
        }
        self.destroy(peer)
    }

    /// Route an inbound signal to its link, or queue it.
    pub fn handle_signal(&mut self, from: &PeerId, signal: Value) -> Result<SignalOutcome, PeerNegotiationError> {
        if *from == self.self_id {
            tracing::debug!("dropping signal from self");
            return Ok(SignalOutcome::Dropped(DropReason::FromSelf));
        }
        if self.mode == MeshMode::Off {
            tracing::debug!(peer = %from, "dropping signal outside a call");
            return Ok(SignalOutcome::Dropped(DropReason::Inactive));
        }
        if self.departed.contains(from) {
            tracing::debug!(peer = %from, "dropping signal from departed peer");
            return Ok(SignalOutcome::Dropped(DropReason::Departed));
        }

        if let Some(link) = self.links.get_mut(from) {
            tracing::debug!(peer = %from, "applying signal");
            if let Err(err) = link.connection.apply_signal(signal) {
                self.fail(from);
                return Err(err);
            }
            return Ok(SignalOutcome::Applied);
        }

        let queue = self.pending.entry(from.clone()).or_default();
        if queue.len() >= self.max_pending {
            tracing::warn!(
                peer = %from,
                limit = self.max_pending,
                "pending signal queue full, dropping signal"
            );
            return Ok(SignalOutcome::Dropped(DropReason::QueueFull));
        }
        queue.push_back(signal);
        tracing::debug!(peer = %from, queued = queue.len(), "buffered signal for unlinked peer");
        Ok(SignalOutcome::Buffered)
    }

    /// Fold a backend event into the mesh.
    pub fn handle_event(&mut self, event: PeerEvent) -> MeshUpdate {
        let Some(link) = self.links.get_mut(event.remote()) else {
            tracing::debug!(peer = %event.remote(), "ignoring event for closed link");
            return MeshUpdate::Ignored;
        };
        match event {
            PeerEvent::Signal { remote, signal } => MeshUpdate::Forward { to: remote, signal },
            PeerEvent::Connected { remote } => {
                link.negotiated = true;
                tracing::info!(peer = %remote, "peer link connected");
                MeshUpdate::Connected { peer: remote }
            }
            PeerEvent::RemoteStream { remote, stream } => {
                link.remote_stream = Some(stream);
                MeshUpdate::StreamAdded { peer: remote }
            }
            PeerEvent::Failed { remote, reason } => {
                tracing::warn!(peer = %remote, %reason, "peer link failed");
                self.fail(&remote);
                MeshUpdate::LinkFailed(PeerNegotiationError::Failed { peer: remote, reason })
            }
        }
    }

    /// Substitute the outbound video on every link. Links that refuse are
    /// reported and left as they are.
    pub fn replace_video_track(&mut self, track: Option<&MediaTrack>) -> Vec<PeerNegotiationError> {
        let mut errors = Vec::new();
        for link in self.links.values_mut() {
            if let Err(err) = link.connection.replace_video_track(track) {
                tracing::warn!(peer = %link.remote, error = %err, "video track replacement failed");
                errors.push(err);
            }
        }
        errors
    }

    /// Leave the call: close every link and forget queues and departures.
    pub fn deactivate(&mut self) {
        let count = self.links.len();
        for (_, mut link) in std::mem::take(&mut self.links) {
            link.connection.close();
        }
        self.pending.clear();
        self.departed.clear();
        if self.mode != MeshMode::Off {
            tracing::info!(links = count, "mesh torn down");
        }
        self.mode = MeshMode::Off;
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Remote peers with a link, ordered by id.
    pub fn links(&self) -> Vec<PeerId> {
        self.links.keys().cloned().collect()
    }

    pub fn has_link(&self, peer: &PeerId) -> bool {
        self.links.contains_key(peer)
    }

    pub fn link(&self, peer: &PeerId) -> Option<&PeerLink> {
        self.links.get(peer)
    }

    pub fn pending_count(&self, peer: &PeerId) -> usize {
        self.pending.get(peer).map_or(0, VecDeque::len)
    }

    pub fn remote_streams(&self) -> Vec<(PeerId, RemoteStream)> {
        self.links
            .values()
            .filter_map(|link| link.remote_stream.clone().map(|s| (link.remote.clone(), s)))
            .collect()
    }

    /// Track id each link's video sender carries.
    pub fn video_track_ids(&self) -> Vec<(PeerId, Option<String>)> {
        self.links
            .values()
            .map(|link| (link.remote.clone(), link.connection.video_track_id()))
            .collect()
    }

    fn open_link(&mut self, peer: &PeerId, initiator: bool, local: &[MediaTrack]) -> Result<(), PeerNegotiationError> {
        if *peer == self.self_id || self.links.contains_key(peer) || self.departed.contains(peer) {
            return Ok(());
        }
        let spec = LinkSpec::new(&self.self_id, peer.clone(), initiator);
        let connection = match self.connector.connect(&spec, local, self.event_tx.clone()) {
            Ok(connection) => connection,
            Err(err) => {
                tracing::warn!(peer = %peer, error = %err, "could not create peer link");
                self.pending.remove(peer);
                self.departed.insert(peer.clone());
                return Err(err);
            }
        };
        tracing::info!(peer = %peer, initiator, polite = spec.polite, "peer link created");
        self.links.insert(
            peer.clone(),
            PeerLink {
                remote: peer.clone(),
                initiator,
                negotiated: false,
                remote_stream: None,
                connection,
            },
        );
        self.replay(peer)
    }

    fn replay(&mut self, peer: &PeerId) -> Result<(), PeerNegotiationError> {
        let Some(queue) = self.pending.remove(peer) else {
            return Ok(());
        };
        tracing::debug!(peer = %peer, count = queue.len(), "replaying buffered signals");
        for signal in queue {
            let Some(link) = self.links.get_mut(peer) else {
                break;
            };
            if let Err(err) = link.connection.apply_signal(signal) {
                self.fail(peer);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Destroy a broken link and ignore the peer for the rest of the call.
    fn fail(&mut self, peer: &PeerId) {
        self.destroy(peer);
        self.pending.remove(peer);
        self.departed.insert(peer.clone());
    }

    fn destroy(&mut self, peer: &PeerId) -> bool {
        match self.links.remove(peer) {
            Some(mut link) => {
                link.connection.close();
                tracing::info!(peer = %peer, "peer link destroyed");
                true
            }
            None => false,
        }
    }
}
