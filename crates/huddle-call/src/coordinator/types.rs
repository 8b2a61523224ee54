//! Configuration, observable state and notices for the coordinator.

use huddle_common::PeerId;
use huddle_config::HuddleConfig;

use crate::error::{CallError, ErrorKind};
use crate::media::{MediaConstraints, MediaTrack};
use crate::mesh::RemoteStream;
use crate::registry::Participant;
use crate::session::{CallSession, CallState, Ticket};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Devices captured on start/join.
    pub constraints: MediaConstraints,
    /// Signals held per peer before the peer is linked.
    pub max_pending_signals_per_peer: usize,
    /// Capacity of the runtime's command queue.
    pub event_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from_config(&HuddleConfig::default())
    }
}

impl CoordinatorConfig {
    pub fn from_config(config: &HuddleConfig) -> Self {
        Self {
            constraints: MediaConstraints::from(&config.media),
            max_pending_signals_per_peer: config.call.max_pending_signals_per_peer as usize,
            event_buffer: config.call.event_buffer as usize,
        }
    }
}

// ---------------------------------------------------------------------------
// Async work tickets
// ---------------------------------------------------------------------------

/// Camera/microphone capture the caller must perform and report back
/// through `Coordinator::complete_media`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRequest {
    pub ticket: Ticket,
    pub constraints: MediaConstraints,
}

/// Outcome of toggling screen sharing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenShareAction {
    /// Sharing stopped; the camera is back on every link.
    Stopped,
    /// A display capture must be performed and reported through
    /// `Coordinator::complete_screen_share`.
    Capture(Ticket),
}

// ---------------------------------------------------------------------------
// Observable state
// ---------------------------------------------------------------------------

/// Everything the UI renders, published after every processed event.
#[derive(Debug, Clone)]
pub struct CallSnapshot {
    pub session: CallSession,
    /// Local participant first.
    pub roster: Vec<Participant>,
    pub links: Vec<PeerId>,
    pub remote_streams: Vec<(PeerId, RemoteStream)>,
    pub local_preview: Vec<MediaTrack>,
    pub camera_enabled: bool,
    pub mic_enabled: bool,
    pub screen_sharing: bool,
    pub connected: bool,
    pub can_start: bool,
    pub can_end: bool,
    /// "Call started by" label; `None` while idle.
    pub owner_name: Option<String>,
}

impl CallSnapshot {
    pub fn state(&self) -> CallState {
        self.session.state
    }
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

/// User-visible happenings, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallNotice {
    StateChanged { from: CallState, to: CallState },
    CallAnnounced { owner: PeerId, owner_name: String },
    ParticipantJoined { peer: PeerId, display_name: String },
    ParticipantLeft { peer: PeerId, display_name: String },
    RemoteStreamAdded { peer: PeerId },
    RemoteStreamRemoved { peer: PeerId },
    Error { kind: ErrorKind, message: String },
}

impl From<&CallError> for CallNotice {
    fn from(err: &CallError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
