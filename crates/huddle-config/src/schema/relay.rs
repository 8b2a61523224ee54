use serde::{Deserialize, Serialize};

/// Configuration for the signaling relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Interface to bind.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Members allowed in one room.
    pub max_room_size: u32,
    /// Seconds a fresh connection may take to send `joinRoom`.
    pub join_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            max_room_size: 16,
            join_timeout_secs: 30,
        }
    }
}
