//! Configuration, command enum and the outbound seam for the signaling client.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use huddle_common::OutboundEvent;
use huddle_config::HuddleConfig;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings for one [`SignalingChannel`](super::SignalingChannel).
#[derive(Clone)]
pub struct ChannelConfig {
    /// Relay WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Capacity of the inbound event queue.
    pub event_buffer: usize,
}

impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("url", &redacted_url(&self.url))
            .field("connect_timeout", &self.connect_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("event_buffer", &self.event_buffer)
            .finish()
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::from_config(&HuddleConfig::default())
    }
}

impl ChannelConfig {
    pub fn from_config(config: &HuddleConfig) -> Self {
        Self {
            url: config.signaling.url.clone(),
            connect_timeout: Duration::from_secs(config.signaling.connect_timeout_secs),
            handshake_timeout: Duration::from_secs(config.signaling.handshake_timeout_secs),
            heartbeat_interval: Duration::from_secs(config.signaling.heartbeat_interval_secs),
            event_buffer: config.call.event_buffer as usize,
        }
    }

    /// Same settings pointed at another relay.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Relay URL without its query string, which may carry a token.
pub(crate) fn redacted_url(url: &str) -> &str {
    url.split('?').next().unwrap_or("")
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Instructions from the channel handle to the writer task.
#[derive(Debug)]
pub(crate) enum SignalingCommand {
    Send(OutboundEvent),
    /// Announce `leaveRoom`, then close the socket.
    Close { room_id: String },
}

// ---------------------------------------------------------------------------
// Socket halves
// ---------------------------------------------------------------------------

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsWrite = SplitSink<WsStream, WsMessage>;
pub(crate) type WsRead = SplitStream<WsStream>;

// ---------------------------------------------------------------------------
// Outbound seam
// ---------------------------------------------------------------------------

/// Where the coordinator publishes outbound events.
///
/// Both calls are fire-and-forget and must not block.
pub trait SignalSink: Send {
    fn send(&self, event: OutboundEvent);

    /// Leave the room and release the transport.
    fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_query_string() {
        let config = ChannelConfig::default().with_url("wss://relay.example.com/ws?token=secret");
        let dbg = format!("{config:?}");
        assert!(dbg.contains("wss://relay.example.com/ws"));
        assert!(!dbg.contains("secret"));
    }

    #[test]
    fn built_from_config_sections() {
        let mut config = HuddleConfig::default();
        config.signaling.handshake_timeout_secs = 3;
        config.call.event_buffer = 64;
        let channel = ChannelConfig::from_config(&config);
        assert_eq!(channel.handshake_timeout, Duration::from_secs(3));
        assert_eq!(channel.event_buffer, 64);
        assert_eq!(channel.url, "ws://127.0.0.1:8080");
    }
}
