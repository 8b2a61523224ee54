//! Error taxonomy for the call coordinator.
//!
//! Each failure class has its own type so the blast radius is visible in
//! signatures: a [`PeerNegotiationError`] only ever costs one link, a
//! [`ScreenShareError`] only the share attempt, while a
//! [`SignalingTransportError`] ends the call.

use huddle_common::{ConfigError, PeerId, ProtocolError};

use crate::session::CallState;

/// Camera/microphone could not be captured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaAccessError {
    #[error("camera/microphone permission denied")]
    PermissionDenied,

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("media capture failed: {0}")]
    Other(String),
}

/// The relay connection could not be established or was lost.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalingTransportError {
    #[error("failed to connect to signaling relay: {0}")]
    Connect(String),

    #[error("signaling relay timed out during {0}")]
    Timeout(&'static str),

    #[error("signaling handshake failed: {0}")]
    Handshake(String),

    #[error("signaling relay connection lost")]
    Lost,
}

/// A single peer connection failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerNegotiationError {
    #[error("could not create connection to {peer}: {reason}")]
    Create { peer: PeerId, reason: String },

    #[error("connection to {peer} failed: {reason}")]
    Failed { peer: PeerId, reason: String },

    #[error("could not replace outbound video for {peer}: {reason}")]
    TrackReplace { peer: PeerId, reason: String },
}

impl PeerNegotiationError {
    pub fn peer(&self) -> &PeerId {
        match self {
            Self::Create { peer, .. } | Self::Failed { peer, .. } | Self::TrackReplace { peer, .. } => {
                peer
            }
        }
    }
}

/// Display capture was refused or is not available.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScreenShareError {
    #[error("screen capture permission denied")]
    PermissionDenied,

    #[error("screen capture is not supported here")]
    Unsupported,

    #[error("screen capture failed: {0}")]
    Other(String),
}

/// Anything a coordinator command can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    Media(#[from] MediaAccessError),

    #[error(transparent)]
    Signaling(#[from] SignalingTransportError),

    #[error(transparent)]
    Peer(#[from] PeerNegotiationError),

    #[error(transparent)]
    ScreenShare(#[from] ScreenShareError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot {action} while {from:?}")]
    InvalidTransition { from: CallState, action: &'static str },

    #[error("not permitted: {0}")]
    NotPermitted(String),

    #[error("not connected to the signaling relay")]
    NotConnected,

    #[error("operation was cancelled because the call moved on")]
    Cancelled,
}

/// Coarse class of a surfaced error, for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    Media,
    Signaling,
    Peer,
    ScreenShare,
    Call,
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Media(_) => ErrorKind::Media,
            Self::Signaling(_) | Self::NotConnected | Self::Protocol(_) => ErrorKind::Signaling,
            Self::Peer(_) => ErrorKind::Peer,
            Self::ScreenShare(_) => ErrorKind::ScreenShare,
            Self::Config(_) | Self::InvalidTransition { .. } | Self::NotPermitted(_) | Self::Cancelled => {
                ErrorKind::Call
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_error_wraps_each_class() {
        let err: CallError = MediaAccessError::PermissionDenied.into();
        assert!(matches!(err, CallError::Media(_)));
        assert_eq!(err.to_string(), "camera/microphone permission denied");

        let err: CallError = ScreenShareError::Unsupported.into();
        assert!(matches!(err, CallError::ScreenShare(_)));

        let err: CallError = SignalingTransportError::Lost.into();
        assert_eq!(err.to_string(), "signaling relay connection lost");
        assert_eq!(err.kind(), ErrorKind::Signaling);
    }

    #[test]
    fn invalid_transition_names_state_and_action() {
        let err = CallError::InvalidTransition {
            from: CallState::Idle,
            action: "join",
        };
        assert_eq!(err.to_string(), "cannot join while Idle");
    }

    #[test]
    fn peer_error_knows_its_peer() {
        let err = PeerNegotiationError::Failed {
            peer: "b".into(),
            reason: "ice failed".into(),
        };
        assert_eq!(err.peer(), &PeerId::from("b"));
        assert_eq!(err.to_string(), "connection to b failed: ice failed");
    }
}
