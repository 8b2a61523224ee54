//! Capture device access.

use async_trait::async_trait;

use huddle_config::MediaConfig;

use super::track::LocalStream;
use crate::error::{MediaAccessError, ScreenShareError};

/// Which devices a capture request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

impl From<&MediaConfig> for MediaConstraints {
    fn from(config: &MediaConfig) -> Self {
        Self {
            video: config.video,
            audio: config.audio,
        }
    }
}

/// Platform capture backend.
///
/// Implementations prompt for permission as needed. A returned stream is
/// owned by the caller, which must stop it when done.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Camera and/or microphone.
    async fn user_media(&self, constraints: MediaConstraints)
        -> Result<LocalStream, MediaAccessError>;

    /// A display/window capture with one video track.
    async fn display_media(&self) -> Result<LocalStream, ScreenShareError>;
}
