//! In-memory doubles for the coordinator's seams.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};

use huddle_common::{OutboundEvent, PeerId, SignalPayload};

use crate::error::{MediaAccessError, PeerNegotiationError, ScreenShareError};
use crate::media::{LocalStream, MediaConstraints, MediaDevices, MediaTrack, TrackKind};
use crate::mesh::{LinkSpec, PeerConnection, PeerConnector, PeerEvent};
use crate::signaling::SignalSink;

// ---------------------------------------------------------------------------
// Signal sink
// ---------------------------------------------------------------------------

/// Records everything sent to the relay.
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    sent: Arc<Mutex<Vec<OutboundEvent>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn signals(&self) -> Vec<SignalPayload> {
        self.sent()
            .into_iter()
            .filter_map(|ev| match ev {
                OutboundEvent::Signal(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sent().iter().map(OutboundEvent::name).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl SignalSink for RecordingSink {
    fn send(&self, event: OutboundEvent) {
        self.sent.lock().unwrap().push(event);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DeviceState {
    deny_user: bool,
    deny_display: Option<ScreenShareError>,
    omit_camera: bool,
    issued: Vec<MediaTrack>,
}

/// Capture devices that hand out fresh live tracks.
#[derive(Clone, Default)]
pub(crate) struct FakeDevices {
    state: Arc<Mutex<DeviceState>>,
    gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_user_media(&self) {
        self.state.lock().unwrap().deny_user = true;
    }

    pub fn deny_display_media(&self, err: ScreenShareError) {
        self.state.lock().unwrap().deny_display = Some(err);
    }

    pub fn omit_camera(&self) {
        self.state.lock().unwrap().omit_camera = true;
    }

    /// Hold `user_media` until the returned notify is signalled.
    pub fn hold_user_media(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    /// Every track ever handed out.
    pub fn issued(&self) -> Vec<MediaTrack> {
        self.state.lock().unwrap().issued.clone()
    }

    pub fn camera_and_mic(&self) -> LocalStream {
        self.issue(vec![
            MediaTrack::new(TrackKind::Video, "camera"),
            MediaTrack::new(TrackKind::Audio, "microphone"),
        ])
    }

    pub fn screen(&self) -> LocalStream {
        self.issue(vec![MediaTrack::new(TrackKind::Video, "screen")])
    }

    fn issue(&self, tracks: Vec<MediaTrack>) -> LocalStream {
        self.state.lock().unwrap().issued.extend(tracks.iter().cloned());
        LocalStream::new(tracks)
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn user_media(&self, constraints: MediaConstraints) -> Result<LocalStream, MediaAccessError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let (deny, omit_camera) = {
            let state = self.state.lock().unwrap();
            (state.deny_user, state.omit_camera)
        };
        if deny {
            return Err(MediaAccessError::PermissionDenied);
        }
        let mut tracks = Vec::new();
        if constraints.video && !omit_camera {
            tracks.push(MediaTrack::new(TrackKind::Video, "camera"));
        }
        if constraints.audio {
            tracks.push(MediaTrack::new(TrackKind::Audio, "microphone"));
        }
        Ok(self.issue(tracks))
    }

    async fn display_media(&self) -> Result<LocalStream, ScreenShareError> {
        let denied = self.state.lock().unwrap().deny_display.clone();
        match denied {
            Some(err) => Err(err),
            None => Ok(self.screen()),
        }
    }
}

// ---------------------------------------------------------------------------
// Peer connections
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FakeConnState {
    pub applied: Vec<Value>,
    pub video_track: Option<String>,
    pub seeded: Vec<String>,
    pub closed: bool,
    pub reject_signals: bool,
    pub reject_replace: bool,
}

struct LinkRecord {
    state: Arc<Mutex<FakeConnState>>,
    events: mpsc::UnboundedSender<PeerEvent>,
}

#[derive(Default)]
struct ConnectorLog {
    specs: Vec<LinkSpec>,
    links: HashMap<PeerId, LinkRecord>,
    refuse: HashSet<PeerId>,
    offer_on_connect: bool,
}

/// Creates [`FakeConnection`]s and records them for a [`ConnectorProbe`].
pub(crate) struct FakeConnector {
    log: Arc<Mutex<ConnectorLog>>,
}

impl FakeConnector {
    pub fn new() -> (Self, ConnectorProbe) {
        let log = Arc::new(Mutex::new(ConnectorLog::default()));
        (Self { log: log.clone() }, ConnectorProbe { log })
    }
}

impl PeerConnector for FakeConnector {
    fn connect(
        &mut self,
        spec: &LinkSpec,
        local_tracks: &[MediaTrack],
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>, PeerNegotiationError> {
        let mut log = self.log.lock().unwrap();
        if log.refuse.contains(&spec.remote) {
            return Err(PeerNegotiationError::Create {
                peer: spec.remote.clone(),
                reason: "refused".into(),
            });
        }
        let state = Arc::new(Mutex::new(FakeConnState {
            video_track: local_tracks
                .iter()
                .find(|t| t.kind() == TrackKind::Video)
                .map(|t| t.id().to_string()),
            seeded: local_tracks.iter().map(|t| t.id().to_string()).collect(),
            ..Default::default()
        }));
        if log.offer_on_connect && spec.initiator {
            let _ = events.send(PeerEvent::Signal {
                remote: spec.remote.clone(),
                signal: serde_json::json!({"type": "offer"}),
            });
        }
        log.specs.push(spec.clone());
        log.links.insert(
            spec.remote.clone(),
            LinkRecord {
                state: state.clone(),
                events,
            },
        );
        Ok(Box::new(FakeConnection {
            remote: spec.remote.clone(),
            state,
        }))
    }
}

pub(crate) struct FakeConnection {
    remote: PeerId,
    state: Arc<Mutex<FakeConnState>>,
}

impl PeerConnection for FakeConnection {
    fn apply_signal(&mut self, signal: Value) -> Result<(), PeerNegotiationError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_signals {
            return Err(PeerNegotiationError::Failed {
                peer: self.remote.clone(),
                reason: "bad signal".into(),
            });
        }
        state.applied.push(signal);
        Ok(())
    }

    fn replace_video_track(&mut self, track: Option<&MediaTrack>) -> Result<(), PeerNegotiationError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_replace {
            return Err(PeerNegotiationError::TrackReplace {
                peer: self.remote.clone(),
                reason: "sender gone".into(),
            });
        }
        state.video_track = track.map(|t| t.id().to_string());
        Ok(())
    }

    fn video_track_id(&self) -> Option<String> {
        self.state.lock().unwrap().video_track.clone()
    }

    fn close(&mut self) {
        self.state.lock().unwrap().closed = true;
    }
}

/// Test-side view of everything a [`FakeConnector`] created.
#[derive(Clone)]
pub(crate) struct ConnectorProbe {
    log: Arc<Mutex<ConnectorLog>>,
}

impl ConnectorProbe {
    pub fn specs(&self) -> Vec<LinkSpec> {
        self.log.lock().unwrap().specs.clone()
    }

    pub fn spec_for(&self, peer: &str) -> Option<LinkSpec> {
        let peer = PeerId::from(peer);
        self.specs().into_iter().rev().find(|s| s.remote == peer)
    }

    pub fn applied(&self, peer: &str) -> Vec<Value> {
        self.with_state(peer, |s| s.applied.clone()).unwrap_or_default()
    }

    pub fn seeded(&self, peer: &str) -> Vec<String> {
        self.with_state(peer, |s| s.seeded.clone()).unwrap_or_default()
    }

    /// Id of the video track the link to `peer` currently sends.
    pub fn video_track(&self, peer: &str) -> Option<String> {
        self.with_state(peer, |s| s.video_track.clone()).flatten()
    }

    pub fn is_closed(&self, peer: &str) -> bool {
        self.with_state(peer, |s| s.closed).unwrap_or(false)
    }

    /// Initiating links emit an offer as soon as they are created.
    pub fn offer_on_connect(&self) {
        self.log.lock().unwrap().offer_on_connect = true;
    }

    pub fn refuse(&self, peer: &str) {
        self.log.lock().unwrap().refuse.insert(peer.into());
    }

    pub fn reject_signals(&self, peer: &str) {
        self.with_state(peer, |s| s.reject_signals = true);
    }

    pub fn reject_replace(&self, peer: &str) {
        self.with_state(peer, |s| s.reject_replace = true);
    }

    /// Emit a backend event on the link to `peer`.
    pub fn emit(&self, peer: &str, event: PeerEvent) {
        let log = self.log.lock().unwrap();
        if let Some(record) = log.links.get(&PeerId::from(peer)) {
            let _ = record.events.send(event);
        }
    }

    fn with_state<T>(&self, peer: &str, f: impl FnOnce(&mut FakeConnState) -> T) -> Option<T> {
        let log = self.log.lock().unwrap();
        log.links
            .get(&PeerId::from(peer))
            .map(|record| f(&mut record.state.lock().unwrap()))
    }
}
