//! Per-section validators.

use crate::schema::HuddleConfig;

use super::helpers::validate_range;

pub(crate) fn validate_signaling(errors: &mut Vec<String>, config: &HuddleConfig) {
    let url = &config.signaling.url;
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(format!("signaling.url = {url:?} must start with ws:// or wss://"));
    }
    validate_range(
        errors,
        "signaling.connect_timeout_secs",
        config.signaling.connect_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "signaling.handshake_timeout_secs",
        config.signaling.handshake_timeout_secs,
        1,
        60,
    );
    validate_range(
        errors,
        "signaling.heartbeat_interval_secs",
        config.signaling.heartbeat_interval_secs,
        5,
        300,
    );
}

pub(crate) fn validate_call(errors: &mut Vec<String>, config: &HuddleConfig) {
    validate_range(
        errors,
        "call.max_pending_signals_per_peer",
        config.call.max_pending_signals_per_peer.into(),
        1,
        1024,
    );
    validate_range(
        errors,
        "call.event_buffer",
        config.call.event_buffer.into(),
        16,
        65536,
    );
}

/// A call needs at least one captured device.
pub(crate) fn validate_media(errors: &mut Vec<String>, config: &HuddleConfig) {
    if !config.media.video && !config.media.audio {
        errors.push("media: at least one of video or audio must be enabled".into());
    }
}

pub(crate) fn validate_relay(errors: &mut Vec<String>, config: &HuddleConfig) {
    if config.relay.port == 0 {
        errors.push("relay.port = 0 is not a listenable port".into());
    }
    validate_range(
        errors,
        "relay.max_room_size",
        config.relay.max_room_size.into(),
        2,
        256,
    );
    validate_range(
        errors,
        "relay.join_timeout_secs",
        config.relay.join_timeout_secs,
        1,
        600,
    );
}
