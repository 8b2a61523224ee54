use super::devices::{MediaConstraints, MediaDevices};
use super::track::{LocalStream, MediaTrack};
use crate::error::{MediaAccessError, ScreenShareError};

/// The local client's captured tracks.
#[derive(Debug, Clone, Default)]
pub struct MediaBundle {
    pub camera: Option<MediaTrack>,
    pub mic: Option<MediaTrack>,
    /// Present only while screen sharing.
    pub screen: Option<MediaTrack>,
}

impl MediaBundle {
    fn all(&self) -> impl Iterator<Item = &MediaTrack> {
        self.camera.iter().chain(self.mic.iter()).chain(self.screen.iter())
    }
}

/// Owns local capture: camera, microphone and the optional screen track.
///
/// Every track handed to the controller is stopped by it eventually, either
/// when screen sharing stops or in [`release_all`](Self::release_all).
#[derive(Debug, Default)]
pub struct MediaTrackController {
    bundle: Option<MediaBundle>,
}

impl MediaTrackController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request camera/microphone capture.
    ///
    /// A stream missing a requested device is stopped and reported as
    /// unavailable.
    pub async fn acquire(
        devices: &dyn MediaDevices,
        constraints: MediaConstraints,
    ) -> Result<LocalStream, MediaAccessError> {
        let stream = devices.user_media(constraints).await?;
        let missing = if constraints.video && stream.video_track().is_none() {
            Some("camera")
        } else if constraints.audio && stream.audio_track().is_none() {
            Some("microphone")
        } else {
            None
        };
        if let Some(device) = missing {
            stream.stop_all();
            return Err(MediaAccessError::DeviceUnavailable(device.into()));
        }
        Ok(stream)
    }

    /// Request a display capture.
    pub async fn capture_screen(devices: &dyn MediaDevices) -> Result<LocalStream, ScreenShareError> {
        let stream = devices.display_media().await?;
        if stream.video_track().is_none() {
            stream.stop_all();
            return Err(ScreenShareError::Unsupported);
        }
        Ok(stream)
    }

    /// Take ownership of an acquired camera/microphone stream.
    pub fn attach(&mut self, stream: LocalStream) {
        self.release_all();
        let bundle = MediaBundle {
            camera: stream.video_track().cloned(),
            mic: stream.audio_track().cloned(),
            screen: None,
        };
        for extra in stream.tracks.iter().filter(|t| !bundle.all().any(|b| b == *t)) {
            extra.stop();
        }
        tracing::info!(
            camera = bundle.camera.is_some(),
            mic = bundle.mic.is_some(),
            "local media attached"
        );
        self.bundle = Some(bundle);
    }

    pub fn has_media(&self) -> bool {
        self.bundle.is_some()
    }

    pub fn bundle(&self) -> Option<&MediaBundle> {
        self.bundle.as_ref()
    }

    pub fn camera_track(&self) -> Option<&MediaTrack> {
        self.bundle.as_ref().and_then(|b| b.camera.as_ref())
    }

    pub fn mic_track(&self) -> Option<&MediaTrack> {
        self.bundle.as_ref().and_then(|b| b.mic.as_ref())
    }

    pub fn screen_track(&self) -> Option<&MediaTrack> {
        self.bundle.as_ref().and_then(|b| b.screen.as_ref())
    }

    /// The video currently sent to peers: the screen while sharing, else the camera.
    pub fn outbound_video(&self) -> Option<&MediaTrack> {
        self.screen_track().or_else(|| self.camera_track())
    }

    /// Tracks a new peer link is seeded with.
    pub fn outbound_tracks(&self) -> Vec<MediaTrack> {
        self.mic_track()
            .into_iter()
            .chain(self.outbound_video())
            .cloned()
            .collect()
    }

    /// Tracks rendered in the local preview: microphone plus the outbound video.
    pub fn local_preview(&self) -> Vec<MediaTrack> {
        self.outbound_video()
            .into_iter()
            .chain(self.mic_track())
            .cloned()
            .collect()
    }

    /// `true` when there is no media yet, so the controls start "on".
    pub fn camera_enabled(&self) -> bool {
        match &self.bundle {
            None => true,
            Some(b) => b.camera.as_ref().is_some_and(MediaTrack::is_enabled),
        }
    }

    pub fn mic_enabled(&self) -> bool {
        match &self.bundle {
            None => true,
            Some(b) => b.mic.as_ref().is_some_and(MediaTrack::is_enabled),
        }
    }

    pub fn screen_sharing(&self) -> bool {
        self.screen_track().is_some()
    }

    /// Flip the camera track's enabled flag. Returns the new state.
    pub fn toggle_camera(&mut self) -> bool {
        match self.camera_track() {
            Some(track) => {
                track.set_enabled(!track.is_enabled());
                tracing::debug!(enabled = track.is_enabled(), "camera toggled");
                track.is_enabled()
            }
            None => self.camera_enabled(),
        }
    }

    /// Flip the microphone track's enabled flag. Returns the new state.
    pub fn toggle_mic(&mut self) -> bool {
        match self.mic_track() {
            Some(track) => {
                track.set_enabled(!track.is_enabled());
                tracing::debug!(enabled = track.is_enabled(), "mic toggled");
                track.is_enabled()
            }
            None => self.mic_enabled(),
        }
    }

    /// Install a display capture as the screen track. Returns the track to
    /// substitute on every link.
    ///
    /// Without attached media, or while already sharing, the stream is
    /// stopped and refused.
    pub fn start_screen_share(&mut self, stream: LocalStream) -> Result<MediaTrack, ScreenShareError> {
        let bundle = match self.bundle.as_mut() {
            Some(bundle) if bundle.screen.is_none() => bundle,
            _ => {
                stream.stop_all();
                return Err(ScreenShareError::Other("no call media to share into".into()));
            }
        };
        let Some(screen) = stream.video_track().cloned() else {
            stream.stop_all();
            return Err(ScreenShareError::Unsupported);
        };
        for extra in stream.tracks.iter().filter(|t| **t != screen) {
            extra.stop();
        }
        tracing::info!(track = %screen.id(), "screen share started");
        bundle.screen = Some(screen.clone());
        Ok(screen)
    }

    /// Stop and release the screen track. Returns `false` if not sharing.
    pub fn stop_screen_share(&mut self) -> bool {
        match self.bundle.as_mut().and_then(|b| b.screen.take()) {
            Some(screen) => {
                screen.stop();
                tracing::info!(track = %screen.id(), "screen share stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every local track and forget the bundle.
    pub fn release_all(&mut self) {
        if let Some(bundle) = self.bundle.take() {
            for track in bundle.all() {
                track.stop();
            }
            tracing::debug!("local media released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::track::{ReadyState, TrackKind};
    use crate::testing::FakeDevices;

    fn camera_and_mic() -> LocalStream {
        LocalStream::new(vec![
            MediaTrack::new(TrackKind::Video, "cam"),
            MediaTrack::new(TrackKind::Audio, "mic"),
        ])
    }

    fn screen() -> LocalStream {
        LocalStream::new(vec![MediaTrack::new(TrackKind::Video, "screen")])
    }

    #[test]
    fn toggles_without_media_are_noops() {
        let mut media = MediaTrackController::new();
        assert!(media.toggle_camera());
        assert!(media.toggle_mic());
        assert!(media.camera_enabled() && media.mic_enabled());
    }

    #[test]
    fn toggle_camera_twice_restores_state() {
        let mut media = MediaTrackController::new();
        media.attach(camera_and_mic());
        let cam = media.camera_track().cloned().unwrap();

        assert!(!media.toggle_camera());
        assert!(!cam.is_enabled());
        assert!(media.toggle_camera());
        assert!(cam.is_enabled());
        assert!(cam.is_live());
        assert!(media.mic_enabled());
    }

    #[test]
    fn screen_share_swaps_preview_and_back() {
        let mut media = MediaTrackController::new();
        media.attach(camera_and_mic());
        let cam = media.camera_track().cloned().unwrap();
        let mic = media.mic_track().cloned().unwrap();

        let screen = media.start_screen_share(screen()).unwrap();
        assert!(media.screen_sharing());
        assert_eq!(media.outbound_video(), Some(&screen));
        assert_eq!(media.local_preview(), vec![screen.clone(), mic.clone()]);

        assert!(media.stop_screen_share());
        assert_eq!(screen.ready_state(), ReadyState::Ended);
        assert!(!media.screen_sharing());
        assert_eq!(media.local_preview(), vec![cam.clone(), mic]);
        assert!(cam.is_live());
        assert!(!media.stop_screen_share());
    }

    #[test]
    fn second_share_is_refused_and_stopped() {
        let mut media = MediaTrackController::new();
        media.attach(camera_and_mic());
        media.start_screen_share(screen()).unwrap();

        let extra = screen();
        assert!(media.start_screen_share(extra.clone()).is_err());
        assert!(!extra.tracks[0].is_live());
    }

    #[test]
    fn share_without_media_is_refused() {
        let mut media = MediaTrackController::new();
        let stream = screen();
        assert!(media.start_screen_share(stream.clone()).is_err());
        assert!(!stream.tracks[0].is_live());
    }

    #[test]
    fn release_all_ends_every_track() {
        let mut media = MediaTrackController::new();
        media.attach(camera_and_mic());
        media.toggle_mic();
        let screen = media.start_screen_share(screen()).unwrap();
        let bundle = media.bundle().cloned().unwrap();

        media.release_all();
        assert!(!media.has_media());
        for track in [bundle.camera.unwrap(), bundle.mic.unwrap(), screen] {
            assert_eq!(track.ready_state(), ReadyState::Ended);
        }
        assert!(media.mic_enabled());
    }

    #[tokio::test]
    async fn acquire_rejects_stream_missing_requested_device() {
        let devices = FakeDevices::new();
        devices.omit_camera();
        let err = MediaTrackController::acquire(&devices, MediaConstraints::default())
            .await
            .unwrap_err();
        assert_eq!(err, MediaAccessError::DeviceUnavailable("camera".into()));
        assert!(devices.issued().iter().all(|t| !t.is_live()));
    }

    #[tokio::test]
    async fn acquire_passes_permission_denial_through() {
        let devices = FakeDevices::new();
        devices.deny_user_media();
        let err = MediaTrackController::acquire(&devices, MediaConstraints::default())
            .await
            .unwrap_err();
        assert_eq!(err, MediaAccessError::PermissionDenied);
    }

    #[tokio::test]
    async fn audio_only_constraints_skip_camera() {
        let devices = FakeDevices::new();
        let constraints = MediaConstraints {
            video: false,
            audio: true,
        };
        let stream = MediaTrackController::acquire(&devices, constraints).await.unwrap();
        assert!(stream.video_track().is_none());

        let mut media = MediaTrackController::new();
        media.attach(stream);
        assert!(!media.camera_enabled());
        assert!(!media.toggle_camera());
    }
}
