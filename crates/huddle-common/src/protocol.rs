//! Signaling wire catalogue.
//!
//! Every frame on the relay WebSocket is a JSON text message of the form
//! `{"event": <name>, "data": <payload>}`. Event names and payload field
//! names are the compatibility contract with the relay and must not change.
//!
//! Direction is named from the call client's point of view: the client
//! sends [`OutboundEvent`]s and receives [`InboundEvent`]s. The relay uses
//! the same enums the other way round.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;
use crate::id::PeerId;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub mod events {
    /// Transport handshake carrying the relay-assigned socket id.
    pub const CONNECT: &str = "connect";
    pub const JOIN_ROOM: &str = "joinRoom";
    pub const LEAVE_ROOM: &str = "leaveRoom";
    pub const ALL_USERS: &str = "all-users";
    pub const USER_CONNECTED: &str = "user-connected";
    pub const USER_DISCONNECTED: &str = "user-disconnected";
    pub const SIGNAL: &str = "signal";
    pub const CALL_START: &str = "videoCall:start";
    pub const CALL_STARTED: &str = "videoCall:started";
    pub const CALL_END: &str = "videoCall:end";
    pub const CALL_ENDED: &str = "videoCall:ended";
    pub const ERROR: &str = "error";
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(event: &str, data: serde_json::Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    pub fn to_text(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    fn payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(self.data.clone()).map_err(|e| ProtocolError::Payload {
            event: self.event.clone(),
            reason: e.to_string(),
        })
    }
}

fn to_data<T: Serialize>(event: &str, payload: &T) -> Result<Envelope, ProtocolError> {
    let data = serde_json::to_value(payload).map_err(|e| ProtocolError::Payload {
        event: event.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Envelope::new(event, data))
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPayload {
    pub socket_id: PeerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    pub room_id: String,
    pub user_name: String,
}

/// One remote room member as listed by `all-users` / `user-connected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub socket_id: PeerId,
    pub user_name: String,
}

/// Opaque connection-negotiation payload routed between two peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPayload {
    pub to: PeerId,
    pub from: PeerId,
    pub signal: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStartPayload {
    pub workspace_id: String,
    pub started_by: PeerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStartedPayload {
    pub started_by: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<WireTimestamp>,
}

impl CallStartedPayload {
    /// Start time, if the relay sent a readable one.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_ref().and_then(WireTimestamp::to_datetime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEndPayload {
    pub workspace_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Call start time as sent by the relay: epoch milliseconds or RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(i64),
    Text(String),
}

impl WireTimestamp {
    pub fn now() -> Self {
        Self::Millis(Utc::now().timestamp_millis())
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound (relay -> client)
// ---------------------------------------------------------------------------

/// Every event a call client can receive, as one tagged variant.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Handshake: the relay tells us our own socket id.
    Connected { socket_id: PeerId },
    /// Snapshot of the other room members, sent in reply to `joinRoom`.
    AllUsers(Vec<RosterEntry>),
    UserConnected(RosterEntry),
    UserDisconnected { socket_id: PeerId },
    Signal(SignalPayload),
    CallStarted(CallStartedPayload),
    CallEnded,
    RelayError { message: String },
    /// Synthesized locally when the transport drops; never on the wire.
    Disconnected,
    /// An event name outside the catalogue.
    Unknown { event: String },
}

impl InboundEvent {
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        let event = match envelope.event.as_str() {
            events::CONNECT => {
                let p: ConnectPayload = envelope.payload()?;
                Self::Connected {
                    socket_id: p.socket_id,
                }
            }
            events::ALL_USERS => Self::AllUsers(envelope.payload()?),
            events::USER_CONNECTED => Self::UserConnected(envelope.payload()?),
            events::USER_DISCONNECTED => Self::UserDisconnected {
                socket_id: envelope.payload()?,
            },
            events::SIGNAL => Self::Signal(envelope.payload()?),
            events::CALL_STARTED => Self::CallStarted(envelope.payload()?),
            events::CALL_ENDED => Self::CallEnded,
            events::ERROR => {
                let p: ErrorPayload = envelope.payload()?;
                Self::RelayError { message: p.message }
            }
            other => Self::Unknown {
                event: other.to_string(),
            },
        };
        Ok(event)
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Self::from_envelope(&Envelope::parse(text)?)
    }

    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        match self {
            Self::Connected { socket_id } => to_data(
                events::CONNECT,
                &ConnectPayload {
                    socket_id: socket_id.clone(),
                },
            ),
            Self::AllUsers(users) => to_data(events::ALL_USERS, users),
            Self::UserConnected(entry) => to_data(events::USER_CONNECTED, entry),
            Self::UserDisconnected { socket_id } => to_data(events::USER_DISCONNECTED, socket_id),
            Self::Signal(payload) => to_data(events::SIGNAL, payload),
            Self::CallStarted(payload) => to_data(events::CALL_STARTED, payload),
            Self::CallEnded => Ok(Envelope::new(events::CALL_ENDED, serde_json::json!({}))),
            Self::RelayError { message } => to_data(
                events::ERROR,
                &ErrorPayload {
                    message: message.clone(),
                },
            ),
            Self::Disconnected => Err(ProtocolError::NotEncodable("Disconnected")),
            Self::Unknown { .. } => Err(ProtocolError::NotEncodable("Unknown")),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound (client -> relay)
// ---------------------------------------------------------------------------

/// Every event a call client can send.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    JoinRoom(JoinRoomPayload),
    LeaveRoom { room_id: String },
    Signal(SignalPayload),
    CallStart(CallStartPayload),
    CallEnd(CallEndPayload),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => events::JOIN_ROOM,
            Self::LeaveRoom { .. } => events::LEAVE_ROOM,
            Self::Signal(_) => events::SIGNAL,
            Self::CallStart(_) => events::CALL_START,
            Self::CallEnd(_) => events::CALL_END,
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        let name = self.name();
        match self {
            Self::JoinRoom(p) => to_data(name, p),
            Self::LeaveRoom { room_id } => to_data(name, room_id),
            Self::Signal(p) => to_data(name, p),
            Self::CallStart(p) => to_data(name, p),
            Self::CallEnd(p) => to_data(name, p),
        }
    }

    /// Decode a client frame. Unknown event names yield `Ok(None)`.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>, ProtocolError> {
        let event = match envelope.event.as_str() {
            events::JOIN_ROOM => Self::JoinRoom(envelope.payload()?),
            events::LEAVE_ROOM => Self::LeaveRoom {
                room_id: envelope.payload()?,
            },
            events::SIGNAL => Self::Signal(envelope.payload()?),
            events::CALL_START => Self::CallStart(envelope.payload()?),
            events::CALL_END => Self::CallEnd(envelope.payload()?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}
