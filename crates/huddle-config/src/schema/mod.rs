//! Configuration schema types for Huddle.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod call;
mod relay;
mod signaling;
mod system;

pub use call::*;
pub use relay::*;
pub use signaling::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration shared by the call client and the relay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub signaling: SignalingConfig,
    pub call: CallConfig,
    pub media: MediaConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}
