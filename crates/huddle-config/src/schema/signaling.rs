use serde::{Deserialize, Serialize};

/// Where and how the call client reaches the signaling relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// WebSocket URL of the relay.
    pub url: String,
    /// Upper bound on establishing the WebSocket, in seconds.
    pub connect_timeout_secs: u64,
    /// Upper bound on receiving the relay's `connect` handshake, in seconds.
    pub handshake_timeout_secs: u64,
    /// Interval between keepalive pings, in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080".into(),
            connect_timeout_secs: 15,
            handshake_timeout_secs: 10,
            heartbeat_interval_secs: 25,
        }
    }
}
