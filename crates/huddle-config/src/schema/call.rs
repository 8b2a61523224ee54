//! Call coordination and local media configuration types.

use serde::{Deserialize, Serialize};

/// Call coordinator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Signals held for a peer we have not heard `user-connected` for yet.
    pub max_pending_signals_per_peer: u32,
    /// Capacity of the runtime's command and notice queues.
    pub event_buffer: u32,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            max_pending_signals_per_peer: 32,
            event_buffer: 256,
        }
    }
}

/// Which local devices a call captures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub video: bool,
    pub audio: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}
