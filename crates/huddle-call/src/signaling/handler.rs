//! Frame decoding and the connect handshake.

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use huddle_common::{InboundEvent, OutboundEvent, PeerId, ProtocolError};

use super::types::WsRead;
use crate::error::SignalingTransportError;

/// Decode one text frame. Malformed frames are logged and skipped.
pub(crate) fn decode_frame(text: &str) -> Option<InboundEvent> {
    match InboundEvent::parse(text) {
        Ok(InboundEvent::Unknown { event }) => {
            debug!(event = %event, "ignoring unknown relay event");
            None
        }
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "dropping malformed relay frame");
            None
        }
    }
}

pub(crate) fn encode(event: &OutboundEvent) -> Result<String, ProtocolError> {
    event.to_envelope()?.to_text()
}

/// Wait for the relay's `connect` frame and return our socket id.
pub(crate) async fn await_handshake(read: &mut WsRead) -> Result<PeerId, SignalingTransportError> {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => match InboundEvent::parse(&text) {
                Ok(InboundEvent::Connected { socket_id }) => return Ok(socket_id),
                Ok(other) => debug!(event = ?other, "ignoring frame before handshake"),
                Err(e) => return Err(SignalingTransportError::Handshake(e.to_string())),
            },
            Ok(WsMessage::Close(_)) => {
                return Err(SignalingTransportError::Handshake(
                    "relay closed the connection".into(),
                ))
            }
            Err(e) => return Err(SignalingTransportError::Connect(e.to_string())),
            _ => {}
        }
    }
    Err(SignalingTransportError::Handshake(
        "connection ended before handshake".into(),
    ))
}
