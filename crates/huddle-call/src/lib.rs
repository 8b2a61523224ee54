//! Client side of a small multi-party video call.
//!
//! A client joins a room on the signaling relay, learns who else is there,
//! and when a call runs it keeps one direct peer link to every other member
//! (a full mesh). The relay only forwards JSON events; media never passes
//! through it.
//!
//! The platform's capture devices and peer-connection stack plug in through
//! [`media::MediaDevices`] and [`mesh::PeerConnector`].

pub mod coordinator;
pub mod error;
pub mod identity;
pub mod media;
pub mod mesh;
pub mod registry;
pub mod session;
pub mod signaling;

#[cfg(test)]
mod testing;

pub use coordinator::{CallHandle, CallNotice, CallRuntime, CallSnapshot, Coordinator};
pub use error::{CallError, ErrorKind};
pub use identity::Identity;
pub use session::{CallSession, CallState};
