//! Room-scoped WebSocket transport to the signaling relay.
//!
//! Carries the JSON event catalogue from `huddle_common::protocol` and
//! nothing else: no call logic lives here. A transport loss is reported
//! once as [`InboundEvent::Disconnected`](huddle_common::InboundEvent) and
//! never retried; reconnecting is a fresh [`SignalingChannel::open`].

mod client;
mod connection;
mod handler;
mod types;

pub use client::SignalingChannel;
pub use types::{ChannelConfig, SignalSink};
