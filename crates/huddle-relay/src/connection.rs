//! Per-connection handler: handshake, join a room, then dispatch events.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use huddle_common::{
    new_socket_id, CallStartedPayload, Envelope, InboundEvent, JoinRoomPayload, OutboundEvent,
    PeerId, SignalPayload,
};

use crate::rooms::{MemberTx, RoomStore, StartOutcome};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsRead = SplitStream<WebSocketStream<TcpStream>>;

/// Limits applied to every connection.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub max_room_size: usize,
    /// Time a fresh connection has to send `joinRoom`.
    pub join_timeout: Duration,
    /// Frames queued per member. Frames for a member whose queue is full
    /// are dropped.
    pub member_buffer: usize,
}

impl RelaySettings {
    pub fn from_config(config: &huddle_config::RelayConfig) -> Self {
        Self {
            max_room_size: config.max_room_size as usize,
            join_timeout: Duration::from_secs(config.join_timeout_secs),
            member_buffer: 256,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from_config(&huddle_config::RelayConfig::default())
    }
}

/// Handle a single WebSocket connection.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    store: RoomStore,
    settings: RelaySettings,
) {
    let (mut sink, mut stream) = ws.split();
    let socket_id = new_socket_id();

    // 1. Handshake: tell the client its socket id.
    let hello = InboundEvent::Connected {
        socket_id: socket_id.clone(),
    };
    if send_event(&mut sink, &hello).await.is_err() {
        return;
    }

    // 2. Wait for joinRoom.
    let Some(join) = read_join(&mut sink, &mut stream, addr, settings.join_timeout).await else {
        return;
    };
    let room_id = join.room_id;

    // 3. Register and announce.
    let (tx, mut rx) = mpsc::channel::<String>(settings.member_buffer.max(1));
    let outcome = match store
        .join(
            &room_id,
            socket_id.clone(),
            join.user_name.clone(),
            tx,
            settings.max_room_size,
        )
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(peer = %addr, room = %room_id, error = %e, "join refused");
            let _ = send_event(
                &mut sink,
                &InboundEvent::RelayError {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    tracing::info!(
        peer = %addr,
        room = %room_id,
        socket_id = %socket_id,
        name = %join.user_name,
        "member joined"
    );

    if send_event(&mut sink, &InboundEvent::AllUsers(outcome.others)).await.is_err() {
        store.leave(&room_id, &socket_id).await;
        return;
    }
    let connected = InboundEvent::UserConnected(huddle_common::RosterEntry {
        socket_id: socket_id.clone(),
        user_name: join.user_name,
    });
    broadcast(&outcome.others_tx, &connected);
    if let Some(call) = outcome.active_call {
        let started = InboundEvent::CallStarted(CallStartedPayload {
            started_by: call.owner,
            timestamp: Some(call.started_at),
        });
        let _ = send_event(&mut sink, &started).await;
    }

    // 4. Dispatch loop.
    loop {
        tokio::select! {
            Some(msg) = rx.recv() => {
                if sink.send(Message::Text(msg.into())).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let Some(event) = decode(&text, addr) else { continue };
                        match event {
                            OutboundEvent::LeaveRoom { .. } => break,
                            event => dispatch(event, &room_id, &socket_id, &store, &mut sink).await,
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // 5. Cleanup.
    tracing::info!(peer = %addr, room = %room_id, socket_id = %socket_id, "member left");
    let remaining = store.leave(&room_id, &socket_id).await;
    broadcast(
        &remaining,
        &InboundEvent::UserDisconnected {
            socket_id: socket_id.clone(),
        },
    );
    let _ = sink.close().await;
}

async fn dispatch(
    event: OutboundEvent,
    room_id: &str,
    socket_id: &PeerId,
    store: &RoomStore,
    sink: &mut WsSink,
) {
    match event {
        OutboundEvent::Signal(payload) => {
            let Some(target) = store.sender(room_id, &payload.to).await else {
                tracing::debug!(room = %room_id, to = %payload.to, "signal for unknown member dropped");
                return;
            };
            let forwarded = InboundEvent::Signal(SignalPayload {
                to: payload.to,
                from: socket_id.clone(),
                signal: payload.signal,
            });
            broadcast(&[target], &forwarded);
        }
        OutboundEvent::CallStart(payload) => {
            if payload.workspace_id != room_id {
                tracing::debug!(room = %room_id, workspace = %payload.workspace_id, "call start names another room");
            }
            match store.start_call(room_id, socket_id).await {
                StartOutcome::Started(call, others) => {
                    tracing::info!(room = %room_id, owner = %call.owner, "call started");
                    let started = InboundEvent::CallStarted(CallStartedPayload {
                        started_by: call.owner,
                        timestamp: Some(call.started_at),
                    });
                    broadcast(&others, &started);
                }
                StartOutcome::AlreadyActive(call) => {
                    tracing::info!(
                        room = %room_id,
                        owner = %call.owner,
                        refused = %socket_id,
                        "call already active, start refused"
                    );
                    let started = InboundEvent::CallStarted(CallStartedPayload {
                        started_by: call.owner,
                        timestamp: Some(call.started_at),
                    });
                    let _ = send_event(sink, &started).await;
                }
                StartOutcome::NotInRoom => {}
            }
        }
        OutboundEvent::CallEnd(_) => match store.end_call(room_id, socket_id).await {
            Some(others) => {
                tracing::info!(room = %room_id, by = %socket_id, "call ended");
                broadcast(&others, &InboundEvent::CallEnded);
            }
            None => tracing::debug!(room = %room_id, "end without an active call"),
        },
        OutboundEvent::JoinRoom(p) => {
            tracing::warn!(room = %room_id, requested = %p.room_id, "already joined, ignoring joinRoom");
        }
        OutboundEvent::LeaveRoom { .. } => {}
    }
}

/// Read frames until `joinRoom` arrives.
async fn read_join(
    sink: &mut WsSink,
    stream: &mut WsRead,
    addr: SocketAddr,
    timeout: Duration,
) -> Option<JoinRoomPayload> {
    let wait = async {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match decode(&text, addr) {
                    Some(OutboundEvent::JoinRoom(join)) => return Some(join),
                    Some(other) => {
                        tracing::debug!(peer = %addr, event = other.name(), "event before joinRoom ignored");
                    }
                    None => {}
                },
                Ok(Message::Ping(data)) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(peer = %addr, error = %e, "WS error before join");
                    return None;
                }
            }
        }
        tracing::debug!(peer = %addr, "connection closed before join");
        None
    };
    match tokio::time::timeout(timeout, wait).await {
        Ok(join) => join,
        Err(_) => {
            tracing::warn!(peer = %addr, ?timeout, "join timeout");
            None
        }
    }
}

fn decode(text: &str, addr: SocketAddr) -> Option<OutboundEvent> {
    let parsed = Envelope::parse(text).and_then(|envelope| OutboundEvent::from_envelope(&envelope));
    match parsed {
        Ok(Some(event)) => Some(event),
        Ok(None) => {
            tracing::debug!(peer = %addr, "unknown client event ignored");
            None
        }
        Err(e) => {
            tracing::warn!(peer = %addr, error = %e, "malformed client frame");
            None
        }
    }
}

fn encode(event: &InboundEvent) -> Option<String> {
    match event.to_envelope().and_then(|envelope| envelope.to_text()) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode relay event");
            None
        }
    }
}

async fn send_event(
    sink: &mut WsSink,
    event: &InboundEvent,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    match encode(event) {
        Some(text) => sink.send(Message::Text(text.into())).await,
        None => Ok(()),
    }
}

/// Queue a frame for each target without waiting. A full queue drops it.
fn broadcast(targets: &[MemberTx], event: &InboundEvent) {
    let Some(text) = encode(event) else { return };
    for tx in targets {
        match tx.try_send(text.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("member queue full, frame dropped");
            }
            Err(TrySendError::Closed(_)) => tracing::debug!("member channel closed"),
        }
    }
}
