use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use huddle_common::{
    CallEndPayload, CallStartPayload, InboundEvent, OutboundEvent, PeerId, RosterEntry,
    SignalPayload,
};

use super::types::{CallNotice, CallSnapshot, CoordinatorConfig, MediaRequest, ScreenShareAction};
use crate::error::{CallError, ErrorKind, MediaAccessError, ScreenShareError, SignalingTransportError};
use crate::media::{LocalStream, MediaTrack, MediaTrackController};
use crate::mesh::{MeshUpdate, PeerConnector, PeerEvent, PeerMeshManager, SignalOutcome};
use crate::registry::{MembershipRegistry, Participant};
use crate::session::{CallSessionStateMachine, CallState, Ticket};
use crate::signaling::SignalSink;

/// Synchronous heart of a call client.
///
/// Owns the roster, session, local media and mesh, and is driven one event
/// at a time: relay events, peer backend events, user commands and the
/// completions of capture requests it handed out. Nothing here awaits, so
/// every call observes a consistent state.
pub struct Coordinator {
    config: CoordinatorConfig,
    room_id: String,
    sink: Box<dyn SignalSink>,
    registry: MembershipRegistry,
    session: CallSessionStateMachine,
    media: MediaTrackController,
    mesh: PeerMeshManager,
    connected: bool,
    pending_media: Option<Ticket>,
    pending_share: Option<Ticket>,
    notice_tx: mpsc::UnboundedSender<CallNotice>,
}

impl Coordinator {
    /// Returns `(coordinator, peer_events, notices)`. Peer backend events
    /// must be fed back through [`handle_peer_event`](Self::handle_peer_event).
    pub fn new(
        config: CoordinatorConfig,
        room_id: impl Into<String>,
        self_id: PeerId,
        display_name: impl Into<String>,
        sink: Box<dyn SignalSink>,
        connector: Box<dyn PeerConnector>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<PeerEvent>,
        mpsc::UnboundedReceiver<CallNotice>,
    ) {
        let (mesh, peer_rx) =
            PeerMeshManager::new(self_id.clone(), connector, config.max_pending_signals_per_peer);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            config,
            room_id: room_id.into(),
            sink,
            registry: MembershipRegistry::new(self_id.clone(), display_name),
            session: CallSessionStateMachine::new(self_id),
            media: MediaTrackController::new(),
            mesh,
            connected: true,
            pending_media: None,
            pending_share: None,
            notice_tx,
        };
        (coordinator, peer_rx, notice_rx)
    }

    // -- Observation --------------------------------------------------------

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn self_id(&self) -> &PeerId {
        self.registry.self_id()
    }

    pub fn state(&self) -> CallState {
        self.session.state()
    }

    pub fn registry(&self) -> &MembershipRegistry {
        &self.registry
    }

    pub fn media(&self) -> &MediaTrackController {
        &self.media
    }

    pub fn mesh(&self) -> &PeerMeshManager {
        &self.mesh
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn snapshot(&self) -> CallSnapshot {
        let session = self.session.session().clone();
        let owner_name = (session.state != CallState::Idle)
            .then(|| self.registry.owner_display_name(session.owner_id.as_ref()));
        CallSnapshot {
            roster: self.registry.participants(),
            links: self.mesh.links(),
            remote_streams: self.mesh.remote_streams(),
            local_preview: self.media.local_preview(),
            camera_enabled: self.media.camera_enabled(),
            mic_enabled: self.media.mic_enabled(),
            screen_sharing: self.media.screen_sharing(),
            connected: self.connected,
            can_start: self.connected && self.session.can_start(&self.registry),
            can_end: self.session.can_end(&self.registry),
            owner_name,
            session,
        }
    }

    // -- Commands -----------------------------------------------------------

    /// Start a call as its owner. Only a lone member may start.
    pub fn start(&mut self) -> Result<MediaRequest, CallError> {
        self.ensure_connected()?;
        let before = self.state();
        let ticket = self.session.start_call(&self.registry)?;
        self.sink.send(OutboundEvent::CallStart(CallStartPayload {
            workspace_id: self.room_id.clone(),
            started_by: self.self_id().clone(),
        }));
        self.mesh.arm();
        self.pending_media = Some(ticket);
        self.notify_transition(before);
        Ok(self.media_request(ticket))
    }

    /// Join the announced call.
    pub fn join(&mut self) -> Result<MediaRequest, CallError> {
        self.ensure_connected()?;
        let before = self.state();
        let ticket = self.session.begin_join()?;
        self.pending_media = Some(ticket);
        self.notify_transition(before);
        Ok(self.media_request(ticket))
    }

    /// Apply the result of a capture requested by [`start`](Self::start) or
    /// [`join`](Self::join).
    ///
    /// A stream arriving after the session moved on is stopped and
    /// [`CallError::Cancelled`] returned.
    pub fn complete_media(
        &mut self,
        ticket: Ticket,
        result: Result<LocalStream, MediaAccessError>,
    ) -> Result<(), CallError> {
        if self.pending_media != Some(ticket) || !self.session.is_current(ticket) {
            if let Ok(stream) = &result {
                stream.stop_all();
            }
            debug!(?ticket, "discarding stale media acquisition");
            return Err(CallError::Cancelled);
        }
        self.pending_media = None;
        let before = self.state();

        let stream = match result {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "local media unavailable");
                if self.session.media_failed()? {
                    self.sink.send(OutboundEvent::CallEnd(CallEndPayload {
                        workspace_id: self.room_id.clone(),
                    }));
                    self.finish_ending();
                }
                self.notify_transition(before);
                let err = CallError::from(err);
                self.surface(&err);
                return Err(err);
            }
        };

        if before == CallState::Joining {
            self.session.media_ready()?;
        }
        self.media.attach(stream);
        let errors = self
            .mesh
            .activate(&self.registry.other_ids(), &self.media.outbound_tracks());
        for err in errors {
            self.surface(&err.into());
        }
        self.notify_transition(before);
        Ok(())
    }

    /// End the call for everyone. Subject to ending authority.
    pub fn end(&mut self) -> Result<(), CallError> {
        let before = self.state();
        self.session.begin_end(&self.registry)?;
        self.sink.send(OutboundEvent::CallEnd(CallEndPayload {
            workspace_id: self.room_id.clone(),
        }));
        self.finish_ending();
        self.notify_transition(before);
        Ok(())
    }

    /// Returns the new camera state. Never signals.
    pub fn toggle_camera(&mut self) -> bool {
        self.media.toggle_camera()
    }

    /// Returns the new microphone state. Never signals.
    pub fn toggle_mic(&mut self) -> bool {
        self.media.toggle_mic()
    }

    pub fn toggle_screen_share(&mut self) -> Result<ScreenShareAction, CallError> {
        if self.media.screen_sharing() {
            self.stop_screen_share();
            Ok(ScreenShareAction::Stopped)
        } else {
            self.begin_screen_share().map(ScreenShareAction::Capture)
        }
    }

    /// Ask for a display capture. Only in the call with media attached.
    pub fn begin_screen_share(&mut self) -> Result<Ticket, CallError> {
        if self.state() != CallState::Active || !self.media.has_media() {
            return Err(CallError::InvalidTransition {
                from: self.state(),
                action: "share screen",
            });
        }
        if self.media.screen_sharing() || self.pending_share.is_some() {
            return Err(ScreenShareError::Other("screen share already in progress".into()).into());
        }
        let ticket = self.session.issue_ticket();
        self.pending_share = Some(ticket);
        Ok(ticket)
    }

    /// Apply a display capture: substitute it for the camera on every link.
    /// Returns the screen track so its end can be watched.
    pub fn complete_screen_share(
        &mut self,
        ticket: Ticket,
        result: Result<LocalStream, ScreenShareError>,
    ) -> Result<MediaTrack, CallError> {
        if self.pending_share != Some(ticket)
            || !self.session.is_current(ticket)
            || self.state() != CallState::Active
        {
            if let Ok(stream) = &result {
                stream.stop_all();
            }
            debug!(?ticket, "discarding stale screen capture");
            return Err(CallError::Cancelled);
        }
        self.pending_share = None;

        let screen = match result.and_then(|stream| self.media.start_screen_share(stream)) {
            Ok(screen) => screen,
            Err(err) => {
                warn!(error = %err, "screen share failed");
                let err = CallError::from(err);
                self.surface(&err);
                return Err(err);
            }
        };
        for err in self.mesh.replace_video_track(Some(&screen)) {
            self.surface(&err.into());
        }
        Ok(screen)
    }

    /// Put the camera back on every link and release the screen track.
    pub fn stop_screen_share(&mut self) {
        if !self.media.stop_screen_share() {
            return;
        }
        let camera = self.media.camera_track().cloned();
        for err in self.mesh.replace_video_track(camera.as_ref()) {
            self.surface(&err.into());
        }
    }

    /// The screen track ended at its source ("stop sharing" in the platform UI).
    pub fn screen_track_ended(&mut self, track_id: &str) {
        if self.media.screen_track().is_some_and(|t| t.id() == track_id) {
            info!("screen capture ended by the user");
            self.stop_screen_share();
        }
    }

    /// Leave the room: tear down locally and close the channel. The call
    /// itself continues for the others.
    pub fn shutdown(&mut self) {
        let before = self.state();
        self.teardown();
        self.session.transport_lost();
        self.registry.clear_remote();
        if self.connected {
            self.connected = false;
            self.sink.close();
        }
        self.notify_transition(before);
    }

    // -- Relay events -------------------------------------------------------

    pub fn handle_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Connected { socket_id } => {
                debug!(socket_id = %socket_id, "late handshake ignored");
            }
            InboundEvent::AllUsers(entries) => self.apply_roster(entries),
            InboundEvent::UserConnected(entry) => {
                if let Some(participant) = self.registry.join(entry) {
                    self.peer_joined(participant);
                }
            }
            InboundEvent::UserDisconnected { socket_id } => self.peer_left(&socket_id),
            InboundEvent::Signal(payload) => self.route_signal(payload),
            InboundEvent::CallStarted(payload) => {
                let before = self.state();
                let announced = self
                    .session
                    .remote_started(payload.started_by.clone(), payload.started_at());
                if announced {
                    self.mesh.arm();
                    self.notify(CallNotice::CallAnnounced {
                        owner_name: self.registry.owner_display_name(Some(&payload.started_by)),
                        owner: payload.started_by,
                    });
                }
                self.notify_transition(before);
            }
            InboundEvent::CallEnded => {
                let before = self.session.remote_ended();
                match before {
                    CallState::Active => self.finish_ending(),
                    CallState::Announced | CallState::Joining => self.teardown(),
                    CallState::Idle | CallState::Ending => {}
                }
                info!(from = ?before, "call ended remotely");
                self.notify_transition(before);
            }
            InboundEvent::RelayError { message } => {
                warn!(%message, "relay reported an error");
                self.notify(CallNotice::Error {
                    kind: ErrorKind::Signaling,
                    message,
                });
            }
            InboundEvent::Disconnected => self.transport_lost(),
            InboundEvent::Unknown { event } => debug!(%event, "ignoring unknown event"),
        }
    }

    // -- Peer backend events ------------------------------------------------

    pub fn handle_peer_event(&mut self, event: PeerEvent) {
        match self.mesh.handle_event(event) {
            MeshUpdate::Forward { to, signal } => {
                debug!(peer = %to, "forwarding signal");
                self.sink.send(OutboundEvent::Signal(SignalPayload {
                    to,
                    from: self.self_id().clone(),
                    signal,
                }));
            }
            MeshUpdate::StreamAdded { peer } => self.notify(CallNotice::RemoteStreamAdded { peer }),
            MeshUpdate::LinkFailed(err) => {
                let peer = err.peer().clone();
                self.surface(&err.into());
                self.notify(CallNotice::RemoteStreamRemoved { peer });
            }
            MeshUpdate::Connected { .. } | MeshUpdate::Ignored => {}
        }
    }

    // -- Internals ----------------------------------------------------------

    fn apply_roster(&mut self, entries: Vec<RosterEntry>) {
        let diff = self.registry.apply_snapshot(entries);
        for participant in diff.left {
            self.unlink(&participant.peer_id);
            self.notify(CallNotice::ParticipantLeft {
                peer: participant.peer_id,
                display_name: participant.display_name,
            });
        }
        for participant in diff.joined {
            self.peer_joined(participant);
        }
    }

    fn peer_joined(&mut self, participant: Participant) {
        info!(peer = %participant.peer_id, name = %participant.display_name, "participant joined");
        if let Err(err) = self
            .mesh
            .peer_joined(&participant.peer_id, &self.media.outbound_tracks())
        {
            self.surface(&err.into());
        }
        self.notify(CallNotice::ParticipantJoined {
            peer: participant.peer_id,
            display_name: participant.display_name,
        });
    }

    fn peer_left(&mut self, peer: &PeerId) {
        let left = self.registry.leave(peer);
        self.unlink(peer);
        if let Some(participant) = left {
            info!(peer = %peer, name = %participant.display_name, "participant left");
            self.notify(CallNotice::ParticipantLeft {
                peer: participant.peer_id,
                display_name: participant.display_name,
            });
        }
    }

    fn unlink(&mut self, peer: &PeerId) {
        let had_stream = self
            .mesh
            .link(peer)
            .is_some_and(|link| link.remote_stream.is_some());
        self.mesh.peer_left(peer);
        if had_stream {
            self.notify(CallNotice::RemoteStreamRemoved { peer: peer.clone() });
        }
    }

    fn route_signal(&mut self, payload: SignalPayload) {
        if payload.to != *self.self_id() {
            debug!(to = %payload.to, "dropping signal addressed to another peer");
            return;
        }
        match self.mesh.handle_signal(&payload.from, payload.signal) {
            Ok(SignalOutcome::Dropped(reason)) => {
                debug!(peer = %payload.from, ?reason, "signal dropped");
            }
            Ok(_) => {}
            Err(err) => self.surface(&err.into()),
        }
    }

    /// Close every link, stop every track, forget pending captures.
    fn teardown(&mut self) {
        self.mesh.deactivate();
        self.media.release_all();
        self.pending_media = None;
        self.pending_share = None;
    }

    fn finish_ending(&mut self) {
        self.teardown();
        self.session.cleanup_complete();
    }

    fn transport_lost(&mut self) {
        let before = self.state();
        self.teardown();
        self.session.transport_lost();
        self.registry.clear_remote();
        self.connected = false;
        self.notify_transition(before);
        self.surface(&SignalingTransportError::Lost.into());
    }

    fn ensure_connected(&self) -> Result<(), CallError> {
        if self.connected {
            Ok(())
        } else {
            Err(CallError::NotConnected)
        }
    }

    fn media_request(&self, ticket: Ticket) -> MediaRequest {
        MediaRequest {
            ticket,
            constraints: self.config.constraints,
        }
    }

    fn notify_transition(&self, before: CallState) {
        let after = self.state();
        if before != after {
            info!(from = ?before, to = ?after, room = %self.room_id, "call state changed");
            self.notify(CallNotice::StateChanged {
                from: before,
                to: after,
            });
        }
    }

    fn surface(&self, err: &CallError) {
        warn!(error = %err, "call error");
        self.notify(err.into());
    }

    fn notify(&self, notice: CallNotice) {
        let _ = self.notice_tx.send(notice);
    }
}
