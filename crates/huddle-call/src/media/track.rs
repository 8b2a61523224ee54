//! Local media track handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadyState {
    Live,
    Ended,
}

/// Shared handle to one captured track.
///
/// Clones refer to the same track: disabling or stopping through one clone
/// is visible through all of them. Equality is by track id.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    enabled: AtomicBool,
    state: watch::Sender<ReadyState>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), kind, label)
    }

    /// Wrap a track whose id was assigned by the capture backend.
    pub fn with_id(id: impl Into<String>, kind: TrackKind, label: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ReadyState::Live);
        Self {
            inner: Arc::new(TrackInner {
                id: id.into(),
                kind,
                label: label.into(),
                enabled: AtomicBool::new(true),
                state,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Mute/unmute in place. The track keeps flowing as silence/black.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn ready_state(&self) -> ReadyState {
        *self.inner.state.borrow()
    }

    pub fn is_live(&self) -> bool {
        self.ready_state() == ReadyState::Live
    }

    /// Stop capture and release the device. Idempotent.
    pub fn stop(&self) {
        self.finish("stopped");
    }

    /// The capture source ended the track on its own, e.g. the user
    /// clicked the platform's "stop sharing" control.
    pub fn end_from_source(&self) {
        self.finish("ended by source");
    }

    /// Resolves once the track has ended, however that happened.
    pub async fn ended(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|state| *state == ReadyState::Ended).await;
    }

    fn finish(&self, how: &str) {
        let was_live = self.inner.state.send_if_modified(|state| {
            let live = *state == ReadyState::Live;
            *state = ReadyState::Ended;
            live
        });
        if was_live {
            tracing::debug!(track = %self.inner.id, kind = ?self.inner.kind, "track {how}");
        }
    }
}

impl PartialEq for MediaTrack {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for MediaTrack {}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("enabled", &self.is_enabled())
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

/// Tracks returned by one capture request.
#[derive(Debug, Clone, Default)]
pub struct LocalStream {
    pub tracks: Vec<MediaTrack>,
}

impl LocalStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Video)
    }

    pub fn audio_track(&self) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Audio)
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}
