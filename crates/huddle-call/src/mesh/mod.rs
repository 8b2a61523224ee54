//! Full-mesh peer link management.

mod link;
mod manager;

pub use link::{LinkSpec, PeerConnection, PeerConnector, PeerEvent, PeerLink, RemoteStream};
pub use manager::{DropReason, MeshMode, MeshUpdate, PeerMeshManager, SignalOutcome};
