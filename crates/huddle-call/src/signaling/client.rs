//! Public handle for one room-scoped relay connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info};

use huddle_common::{InboundEvent, JoinRoomPayload, OutboundEvent, PeerId};

use super::connection::connection_loop;
use super::handler::{await_handshake, encode};
use super::types::{redacted_url, ChannelConfig, SignalSink, SignalingCommand};
use crate::error::SignalingTransportError;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Handle to an open relay connection joined to one room.
///
/// Sending never blocks: commands are queued to a background writer.
/// Clones share the same connection.
#[derive(Clone)]
pub struct SignalingChannel {
    command_tx: mpsc::UnboundedSender<SignalingCommand>,
    connected: Arc<AtomicBool>,
    self_id: PeerId,
    room_id: String,
}

impl SignalingChannel {
    /// Connect, wait for the relay handshake and join `room_id`.
    ///
    /// Returns `(channel, inbound_events)`. The receiver ends after a
    /// single [`InboundEvent::Disconnected`] if the transport drops.
    pub async fn open(
        config: &ChannelConfig,
        room_id: &str,
        display_name: &str,
    ) -> Result<(Self, mpsc::Receiver<InboundEvent>), SignalingTransportError> {
        info!(url = %redacted_url(&config.url), room = %room_id, "connecting to signaling relay");

        let (ws_stream, _) = tokio::time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(config.url.as_str()),
        )
        .await
        .map_err(|_| SignalingTransportError::Timeout("connect"))?
        .map_err(|e| SignalingTransportError::Connect(e.to_string()))?;

        let (mut ws_write, mut ws_read) = ws_stream.split();

        let self_id = tokio::time::timeout(config.handshake_timeout, await_handshake(&mut ws_read))
            .await
            .map_err(|_| SignalingTransportError::Timeout("handshake"))??;
        debug!(socket_id = %self_id, "relay handshake complete");

        let join = OutboundEvent::JoinRoom(JoinRoomPayload {
            room_id: room_id.to_string(),
            user_name: display_name.to_string(),
        });
        let text = encode(&join).map_err(|e| SignalingTransportError::Handshake(e.to_string()))?;
        ws_write
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| SignalingTransportError::Connect(e.to_string()))?;
        info!(room = %room_id, socket_id = %self_id, "joined room");

        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(connection_loop(
            ws_write,
            ws_read,
            config.heartbeat_interval,
            Arc::clone(&connected),
            event_tx,
            command_rx,
        ));

        let channel = Self {
            command_tx,
            connected,
            self_id,
            room_id: room_id.to_string(),
        };
        Ok((channel, event_rx))
    }

    /// Our relay-assigned socket id.
    pub fn self_id(&self) -> &PeerId {
        &self.self_id
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl SignalSink for SignalingChannel {
    fn send(&self, event: OutboundEvent) {
        let name = event.name();
        if self.command_tx.send(SignalingCommand::Send(event)).is_err() {
            debug!(event = name, "signaling channel closed, dropping event");
        }
    }

    fn close(&self) {
        let _ = self.command_tx.send(SignalingCommand::Close {
            room_id: self.room_id.clone(),
        });
    }
}
