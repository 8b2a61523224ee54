//! Background reader, writer and heartbeat for one relay connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use huddle_common::{InboundEvent, OutboundEvent};

use super::handler::{decode_frame, encode};
use super::types::{SignalingCommand, WsRead, WsWrite};

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Read frames until the socket ends, then report the loss once.
///
/// A close requested through [`SignalingCommand::Close`] (or by dropping
/// every handle) ends the loop without reporting `Disconnected`.
pub(crate) async fn connection_loop(
    write: WsWrite,
    mut read: WsRead,
    heartbeat_interval: Duration,
    connected: Arc<AtomicBool>,
    event_tx: mpsc::Sender<InboundEvent>,
    command_rx: mpsc::UnboundedReceiver<SignalingCommand>,
) {
    let write = Arc::new(Mutex::new(write));
    let closing = Arc::new(AtomicBool::new(false));

    let heartbeat_handle = tokio::spawn(heartbeat_task(Arc::clone(&write), heartbeat_interval));
    let cmd_handle = tokio::spawn(command_forwarder(
        command_rx,
        Arc::clone(&write),
        Arc::clone(&closing),
    ));

    while let Some(msg_result) = read.next().await {
        match msg_result {
            Ok(WsMessage::Text(text)) => {
                let Some(event) = decode_frame(&text) else {
                    continue;
                };
                if event_tx.send(event).await.is_err() {
                    debug!("inbound receiver dropped, stopping reader");
                    break;
                }
            }
            Ok(WsMessage::Ping(data)) => {
                let mut writer = write.lock().await;
                let _ = writer.send(WsMessage::Pong(data)).await;
            }
            Ok(WsMessage::Close(_)) => {
                info!("signaling relay closed connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "signaling socket error");
                break;
            }
            _ => {}
        }
    }

    heartbeat_handle.abort();
    cmd_handle.abort();
    connected.store(false, Ordering::SeqCst);

    if closing.load(Ordering::SeqCst) {
        debug!("signaling connection closed");
    } else {
        warn!("signaling connection lost");
        let _ = event_tx.send(InboundEvent::Disconnected).await;
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

async fn heartbeat_task<S>(ws_write: Arc<Mutex<S>>, interval: Duration)
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    loop {
        ticker.tick().await;
        let mut writer = ws_write.lock().await;
        if writer.send(WsMessage::Ping(Default::default())).await.is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Command Forwarder
// ---------------------------------------------------------------------------

async fn command_forwarder<S>(
    mut cmd_rx: mpsc::UnboundedReceiver<SignalingCommand>,
    cmd_write: Arc<Mutex<S>>,
    closing: Arc<AtomicBool>,
) where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            SignalingCommand::Send(event) => {
                debug!(event = event.name(), "sending to relay");
                if write_event(&cmd_write, &event).await.is_err() {
                    warn!(event = event.name(), "failed to write to relay");
                    return;
                }
            }
            SignalingCommand::Close { room_id } => {
                closing.store(true, Ordering::SeqCst);
                info!(room = %room_id, "leaving room");
                let _ = write_event(&cmd_write, &OutboundEvent::LeaveRoom { room_id }).await;
                let mut writer = cmd_write.lock().await;
                let _ = writer.send(WsMessage::Close(None)).await;
                return;
            }
        }
    }

    // Every handle dropped without an explicit close.
    closing.store(true, Ordering::SeqCst);
    let mut writer = cmd_write.lock().await;
    let _ = writer.send(WsMessage::Close(None)).await;
}

async fn write_event<S>(ws_write: &Arc<Mutex<S>>, event: &OutboundEvent) -> Result<(), ()>
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let text = match encode(event) {
        Ok(text) => text,
        Err(e) => {
            warn!(event = event.name(), error = %e, "could not encode outbound event");
            return Ok(());
        }
    };
    let mut writer = ws_write.lock().await;
    writer.send(WsMessage::Text(text.into())).await.map_err(|_| ())
}
