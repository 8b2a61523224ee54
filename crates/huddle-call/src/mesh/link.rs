//! Peer connection seam.
//!
//! The mesh manager never touches SDP or ICE. It hands opaque signals to a
//! [`PeerConnection`] and forwards whatever the connection emits.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use huddle_common::PeerId;

use crate::error::PeerNegotiationError;
use crate::media::MediaTrack;

/// How to create one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    pub remote: PeerId,
    /// Initiators make the first offer.
    pub initiator: bool,
    /// Polite peers roll back their own offer when offers cross.
    pub polite: bool,
}

impl LinkSpec {
    pub fn new(self_id: &PeerId, remote: PeerId, initiator: bool) -> Self {
        Self {
            polite: *self_id > remote,
            remote,
            initiator,
        }
    }
}

/// Media received from a remote peer, as an opaque handle for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStream {
    pub id: String,
    pub has_video: bool,
    pub has_audio: bool,
}

/// Everything a connection backend reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// An outbound negotiation payload to relay to `remote`.
    Signal { remote: PeerId, signal: Value },
    /// Negotiation completed.
    Connected { remote: PeerId },
    RemoteStream { remote: PeerId, stream: RemoteStream },
    /// The connection is unusable.
    Failed { remote: PeerId, reason: String },
}

impl PeerEvent {
    pub fn remote(&self) -> &PeerId {
        match self {
            Self::Signal { remote, .. }
            | Self::Connected { remote }
            | Self::RemoteStream { remote, .. }
            | Self::Failed { remote, .. } => remote,
        }
    }
}

/// One live connection to a remote peer.
pub trait PeerConnection: Send {
    /// Feed an inbound negotiation payload.
    fn apply_signal(&mut self, signal: Value) -> Result<(), PeerNegotiationError>;

    /// Swap the outbound video sender's track without renegotiating.
    fn replace_video_track(&mut self, track: Option<&MediaTrack>) -> Result<(), PeerNegotiationError>;

    /// Id of the track the video sender currently carries.
    fn video_track_id(&self) -> Option<String>;

    /// Release the connection. Events emitted afterwards are ignored.
    fn close(&mut self);
}

/// Creates connection backends.
pub trait PeerConnector: Send {
    fn connect(
        &mut self,
        spec: &LinkSpec,
        local_tracks: &[MediaTrack],
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>, PeerNegotiationError>;
}

/// One entry of the mesh.
pub struct PeerLink {
    pub remote: PeerId,
    pub initiator: bool,
    pub negotiated: bool,
    pub remote_stream: Option<RemoteStream>,
    pub(crate) connection: Box<dyn PeerConnection>,
}

impl std::fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerLink")
            .field("remote", &self.remote)
            .field("initiator", &self.initiator)
            .field("negotiated", &self.negotiated)
            .field("remote_stream", &self.remote_stream)
            .finish_non_exhaustive()
    }
}
