//! Async driver around a [`Coordinator`]: one task owns it and serializes
//! relay events, peer backend events, user commands and capture completions.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use huddle_common::InboundEvent;
use huddle_config::HuddleConfig;

use super::engine::Coordinator;
use super::types::{CallNotice, CallSnapshot, CoordinatorConfig, MediaRequest, ScreenShareAction};
use crate::error::{CallError, MediaAccessError, ScreenShareError};
use crate::identity::Identity;
use crate::media::{LocalStream, MediaDevices, MediaTrack, MediaTrackController};
use crate::mesh::{PeerConnector, PeerEvent};
use crate::session::Ticket;
use crate::signaling::{ChannelConfig, SignalingChannel};

type Reply<T> = oneshot::Sender<T>;

/// User commands sent from a [`CallHandle`] to the runtime task.
enum Command {
    Start(Reply<Result<(), CallError>>),
    Join(Reply<Result<(), CallError>>),
    End(Reply<Result<(), CallError>>),
    ToggleCamera(Reply<bool>),
    ToggleMic(Reply<bool>),
    /// Answers whether sharing is on afterwards.
    ToggleScreenShare(Reply<Result<bool, CallError>>),
    Shutdown(Reply<()>),
}

/// Results of work the runtime spawned on the coordinator's behalf.
enum Completion {
    Media {
        ticket: Ticket,
        result: Result<LocalStream, MediaAccessError>,
    },
    Screen {
        ticket: Ticket,
        result: Result<LocalStream, ScreenShareError>,
    },
    ScreenTrackEnded {
        track_id: String,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cheap, cloneable front end of a running call client.
///
/// Every method resolves once the runtime has processed the command; start
/// and join resolve only after local media was captured and the mesh built.
#[derive(Clone, Debug)]
pub struct CallHandle {
    command_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<CallSnapshot>,
}

impl CallHandle {
    pub async fn start(&self) -> Result<(), CallError> {
        self.request(Command::Start).await?
    }

    pub async fn join(&self) -> Result<(), CallError> {
        self.request(Command::Join).await?
    }

    pub async fn end(&self) -> Result<(), CallError> {
        self.request(Command::End).await?
    }

    /// Returns whether the camera is now enabled.
    pub async fn toggle_camera(&self) -> Result<bool, CallError> {
        self.request(Command::ToggleCamera).await
    }

    /// Returns whether the microphone is now enabled.
    pub async fn toggle_mic(&self) -> Result<bool, CallError> {
        self.request(Command::ToggleMic).await
    }

    /// Returns whether the screen is now being shared.
    pub async fn toggle_screen_share(&self) -> Result<bool, CallError> {
        self.request(Command::ToggleScreenShare).await?
    }

    /// Leave the room and stop the runtime. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.request(Command::Shutdown).await;
    }

    /// Latest published state.
    pub fn snapshot(&self) -> CallSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that wakes on every published state change.
    pub fn subscribe(&self) -> watch::Receiver<CallSnapshot> {
        self.snapshot_rx.clone()
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, CallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| CallError::NotConnected)?;
        reply_rx.await.map_err(|_| CallError::NotConnected)
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Task that owns a [`Coordinator`].
pub struct CallRuntime {
    coordinator: Coordinator,
    devices: Arc<dyn MediaDevices>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    snapshot_tx: watch::Sender<CallSnapshot>,
    media_reply: Option<(Ticket, Reply<Result<(), CallError>>)>,
    share_reply: Option<(Ticket, Reply<Result<bool, CallError>>)>,
}

impl CallRuntime {
    /// Connect to the relay named in `config`, join `room_id` and spawn the
    /// runtime.
    pub async fn connect(
        config: &HuddleConfig,
        identity: &Identity,
        room_id: &str,
        devices: Arc<dyn MediaDevices>,
        connector: Box<dyn PeerConnector>,
    ) -> Result<(CallHandle, mpsc::UnboundedReceiver<CallNotice>), CallError> {
        huddle_config::validation::validate(config)?;
        let channel_config = ChannelConfig::from_config(config);
        let display_name = identity.display_name();
        let (channel, inbound) = SignalingChannel::open(&channel_config, room_id, &display_name).await?;
        let self_id = channel.self_id().clone();
        info!(room = %room_id, socket_id = %self_id, "call client connected");

        let (coordinator, peer_events, notices) = Coordinator::new(
            CoordinatorConfig::from_config(config),
            room_id,
            self_id,
            display_name,
            Box::new(channel),
            connector,
        );
        let (handle, _task) = Self::spawn(coordinator, peer_events, inbound, devices);
        Ok((handle, notices))
    }

    /// Drive an already built coordinator until shutdown.
    pub fn spawn(
        coordinator: Coordinator,
        peer_events: mpsc::UnboundedReceiver<PeerEvent>,
        inbound: mpsc::Receiver<InboundEvent>,
        devices: Arc<dyn MediaDevices>,
    ) -> (CallHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(coordinator.config().event_buffer.max(1));
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(coordinator.snapshot());

        let runtime = Self {
            coordinator,
            devices,
            completion_tx,
            snapshot_tx,
            media_reply: None,
            share_reply: None,
        };
        let task = tokio::spawn(runtime.run(inbound, peer_events, command_rx, completion_rx));
        let handle = CallHandle {
            command_tx,
            snapshot_rx,
        };
        (handle, task)
    }

    async fn run(
        mut self,
        mut inbound: mpsc::Receiver<InboundEvent>,
        mut peer_events: mpsc::UnboundedReceiver<PeerEvent>,
        mut command_rx: mpsc::Receiver<Command>,
        mut completion_rx: mpsc::UnboundedReceiver<Completion>,
    ) {
        let mut inbound_open = true;
        loop {
            tokio::select! {
                event = inbound.recv(), if inbound_open => match event {
                    Some(event) => self.coordinator.handle_inbound(event),
                    None => {
                        inbound_open = false;
                        if self.coordinator.is_connected() {
                            self.coordinator.handle_inbound(InboundEvent::Disconnected);
                        }
                    }
                },
                Some(event) = peer_events.recv() => self.coordinator.handle_peer_event(event),
                Some(done) = completion_rx.recv() => self.handle_completion(done),
                command = command_rx.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        debug!("all call handles dropped");
                        self.shutdown();
                        break;
                    }
                },
            }
            self.publish();
        }
        info!("call runtime stopped");
    }

    // ---- Commands ----

    /// Returns `false` once the runtime should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start(reply) => match self.coordinator.start() {
                Ok(request) => self.acquire(request, reply),
                Err(err) => {
                    let _ = reply.send(Err(err));
                }
            },
            Command::Join(reply) => match self.coordinator.join() {
                Ok(request) => self.acquire(request, reply),
                Err(err) => {
                    let _ = reply.send(Err(err));
                }
            },
            Command::End(reply) => {
                let _ = reply.send(self.coordinator.end());
            }
            Command::ToggleCamera(reply) => {
                let _ = reply.send(self.coordinator.toggle_camera());
            }
            Command::ToggleMic(reply) => {
                let _ = reply.send(self.coordinator.toggle_mic());
            }
            Command::ToggleScreenShare(reply) => match self.coordinator.toggle_screen_share() {
                Ok(ScreenShareAction::Stopped) => {
                    let _ = reply.send(Ok(false));
                }
                Ok(ScreenShareAction::Capture(ticket)) => self.capture_screen(ticket, reply),
                Err(err) => {
                    let _ = reply.send(Err(err));
                }
            },
            Command::Shutdown(reply) => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn shutdown(&mut self) {
        self.coordinator.shutdown();
        if let Some((_, reply)) = self.media_reply.take() {
            let _ = reply.send(Err(CallError::Cancelled));
        }
        if let Some((_, reply)) = self.share_reply.take() {
            let _ = reply.send(Err(CallError::Cancelled));
        }
        self.publish();
    }

    // ---- Spawned work ----

    fn acquire(&mut self, request: MediaRequest, reply: Reply<Result<(), CallError>>) {
        if let Some((_, superseded)) = self.media_reply.replace((request.ticket, reply)) {
            let _ = superseded.send(Err(CallError::Cancelled));
        }
        let devices = Arc::clone(&self.devices);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = MediaTrackController::acquire(devices.as_ref(), request.constraints).await;
            let done = Completion::Media {
                ticket: request.ticket,
                result,
            };
            if let Err(mpsc::error::SendError(Completion::Media { result: Ok(stream), .. })) =
                completion_tx.send(done)
            {
                stream.stop_all();
            }
        });
    }

    fn capture_screen(&mut self, ticket: Ticket, reply: Reply<Result<bool, CallError>>) {
        self.share_reply = Some((ticket, reply));
        let devices = Arc::clone(&self.devices);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = MediaTrackController::capture_screen(devices.as_ref()).await;
            if let Err(mpsc::error::SendError(Completion::Screen { result: Ok(stream), .. })) =
                completion_tx.send(Completion::Screen { ticket, result })
            {
                stream.stop_all();
            }
        });
    }

    /// Report the screen track ending, whoever ended it.
    fn watch_screen(&self, track: MediaTrack) {
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            track.ended().await;
            let _ = completion_tx.send(Completion::ScreenTrackEnded {
                track_id: track.id().to_string(),
            });
        });
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Media { ticket, result } => {
                let outcome = self.coordinator.complete_media(ticket, result);
                if let Some((_, reply)) = self.media_reply.take_if(|(t, _)| *t == ticket) {
                    let _ = reply.send(outcome);
                }
            }
            Completion::Screen { ticket, result } => {
                let outcome = self.coordinator.complete_screen_share(ticket, result);
                if let Ok(track) = &outcome {
                    self.watch_screen(track.clone());
                }
                if let Some((_, reply)) = self.share_reply.take_if(|(t, _)| *t == ticket) {
                    let _ = reply.send(outcome.map(|_| true));
                }
            }
            Completion::ScreenTrackEnded { track_id } => {
                self.coordinator.screen_track_ended(&track_id);
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.coordinator.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use huddle_common::{CallStartedPayload, RosterEntry, WireTimestamp};

    use super::*;
    use crate::session::CallState;
    use crate::testing::{ConnectorProbe, FakeConnector, FakeDevices, RecordingSink};

    struct Harness {
        handle: CallHandle,
        inbound: mpsc::Sender<InboundEvent>,
        devices: FakeDevices,
        sink: RecordingSink,
        probe: ConnectorProbe,
        task: JoinHandle<()>,
    }

    fn harness() -> Harness {
        let sink = RecordingSink::new();
        let devices = FakeDevices::new();
        let (connector, probe) = FakeConnector::new();
        let (coordinator, peer_events, _notices) = Coordinator::new(
            CoordinatorConfig::default(),
            "room-1",
            "me".into(),
            "Me",
            Box::new(sink.clone()),
            Box::new(connector),
        );
        let (inbound, inbound_rx) = mpsc::channel(16);
        let (handle, task) = CallRuntime::spawn(
            coordinator,
            peer_events,
            inbound_rx,
            Arc::new(devices.clone()),
        );
        Harness {
            handle,
            inbound,
            devices,
            sink,
            probe,
            task,
        }
    }

    impl Harness {
        async fn send(&self, event: InboundEvent) {
            self.inbound.send(event).await.unwrap();
        }

        async fn announce(&self) {
            self.send(InboundEvent::UserConnected(RosterEntry {
                socket_id: "owner".into(),
                user_name: "Olive".into(),
            }))
            .await;
            self.send(InboundEvent::CallStarted(CallStartedPayload {
                started_by: "owner".into(),
                timestamp: Some(WireTimestamp::now()),
            }))
            .await;
            self.wait_for(|s| s.state() == CallState::Announced).await;
        }

        async fn wait_for(&self, f: impl Fn(&CallSnapshot) -> bool) {
            let mut rx = self.handle.subscribe();
            tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| f(s)))
                .await
                .expect("timed out waiting for state")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn join_builds_links_once_media_is_ready() {
        let h = harness();
        h.announce().await;
        h.handle.join().await.unwrap();

        let snap = h.handle.snapshot();
        assert_eq!(snap.state(), CallState::Active);
        assert_eq!(snap.links, vec!["owner".into()]);
        assert_eq!(snap.owner_name.as_deref(), Some("Olive"));
        assert!(h.probe.spec_for("owner").unwrap().initiator);
    }

    #[tokio::test]
    async fn start_alone_reports_active() {
        let h = harness();
        h.handle.start().await.unwrap();
        assert_eq!(h.handle.snapshot().state(), CallState::Active);
        assert_eq!(h.sink.names(), vec!["videoCall:start"]);
        assert!(h.handle.snapshot().can_end);
    }

    #[tokio::test]
    async fn denied_permission_returns_error_and_announced() {
        let h = harness();
        h.announce().await;
        h.devices.deny_user_media();

        let err = h.handle.join().await.unwrap_err();
        assert!(matches!(err, CallError::Media(MediaAccessError::PermissionDenied)));
        let snap = h.handle.snapshot();
        assert_eq!(snap.state(), CallState::Announced);
        assert!(snap.links.is_empty());
    }

    #[tokio::test]
    async fn missing_camera_is_device_unavailable() {
        let h = harness();
        h.announce().await;
        h.devices.omit_camera();
        let err = h.handle.join().await.unwrap_err();
        assert!(matches!(err, CallError::Media(MediaAccessError::DeviceUnavailable(_))));
        assert!(h.devices.issued().iter().all(|t| !t.is_live()));
    }

    #[tokio::test]
    async fn capture_finishing_after_call_end_is_released() {
        let h = harness();
        h.announce().await;
        let gate = h.devices.hold_user_media();

        let handle = h.handle.clone();
        let join = tokio::spawn(async move { handle.join().await });
        h.wait_for(|s| s.state() == CallState::Joining).await;

        h.send(InboundEvent::CallEnded).await;
        h.wait_for(|s| s.state() == CallState::Idle).await;
        gate.notify_one();

        let result = join.await.unwrap();
        assert!(matches!(result, Err(CallError::Cancelled)));
        assert!(!h.devices.issued().is_empty());
        assert!(h.devices.issued().iter().all(|t| !t.is_live()));
        assert!(h.handle.snapshot().links.is_empty());
    }

    #[tokio::test]
    async fn screen_ended_at_source_restores_camera() {
        let h = harness();
        h.announce().await;
        h.handle.join().await.unwrap();
        let camera = h.handle.snapshot().local_preview[0].clone();

        assert!(h.handle.toggle_screen_share().await.unwrap());
        let snap = h.handle.snapshot();
        assert!(snap.screen_sharing);
        let screen = snap.local_preview[0].clone();
        assert_ne!(screen, camera);
        assert_eq!(h.probe.video_track("owner").as_deref(), Some(screen.id()));

        screen.end_from_source();
        h.wait_for(|s| !s.screen_sharing).await;
        assert_eq!(h.probe.video_track("owner").as_deref(), Some(camera.id()));
        assert!(h.sink.signals().is_empty());
    }

    #[tokio::test]
    async fn toggling_screen_share_off_answers_false() {
        let h = harness();
        h.announce().await;
        h.handle.join().await.unwrap();
        assert!(h.handle.toggle_screen_share().await.unwrap());
        assert!(!h.handle.toggle_screen_share().await.unwrap());
        assert!(!h.handle.snapshot().screen_sharing);
    }

    #[tokio::test]
    async fn denied_screen_share_keeps_call() {
        let h = harness();
        h.announce().await;
        h.handle.join().await.unwrap();
        h.devices.deny_display_media(ScreenShareError::PermissionDenied);

        let err = h.handle.toggle_screen_share().await.unwrap_err();
        assert!(matches!(err, CallError::ScreenShare(ScreenShareError::PermissionDenied)));
        assert_eq!(h.handle.snapshot().state(), CallState::Active);
    }

    #[tokio::test]
    async fn toggles_answer_new_state() {
        let h = harness();
        h.announce().await;
        h.handle.join().await.unwrap();
        assert!(!h.handle.toggle_camera().await.unwrap());
        assert!(h.handle.toggle_camera().await.unwrap());
        assert!(!h.handle.toggle_mic().await.unwrap());
        assert!(!h.handle.snapshot().mic_enabled);
    }

    #[tokio::test]
    async fn closed_transport_forces_idle() {
        let h = harness();
        h.announce().await;
        h.handle.join().await.unwrap();

        let Harness {
            handle, inbound, devices, ..
        } = h;
        drop(inbound);
        let mut rx = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| !s.connected))
            .await
            .unwrap()
            .unwrap();

        let snap = handle.snapshot();
        assert_eq!(snap.state(), CallState::Idle);
        assert!(snap.links.is_empty());
        assert!(devices.issued().iter().all(|t| !t.is_live()));
        assert!(matches!(handle.join().await, Err(CallError::NotConnected)));
    }

    #[tokio::test]
    async fn shutdown_stops_runtime_and_closes_channel() {
        let h = harness();
        h.handle.shutdown().await;
        tokio::time::timeout(Duration::from_secs(5), h.task).await.unwrap().unwrap();
        assert!(h.sink.is_closed());
        assert!(matches!(h.handle.start().await, Err(CallError::NotConnected)));
    }
}
