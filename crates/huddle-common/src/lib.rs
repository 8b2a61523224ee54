//! Types shared by the huddle call client and the signaling relay.

pub mod errors;
pub mod id;
pub mod protocol;

pub use errors::{ConfigError, ProtocolError};
pub use id::{new_socket_id, PeerId};
pub use protocol::{
    CallEndPayload, CallStartPayload, CallStartedPayload, Envelope, InboundEvent,
    JoinRoomPayload, OutboundEvent, RosterEntry, SignalPayload, WireTimestamp,
};
