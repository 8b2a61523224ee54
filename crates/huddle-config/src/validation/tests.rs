//! Tests for the full validation pipeline.

use super::*;

#[test]
fn default_config_validates() {
    assert!(validate(&HuddleConfig::default()).is_ok());
}

#[test]
fn rejects_http_signaling_url() {
    let mut config = HuddleConfig::default();
    config.signaling.url = "http://relay.example.com".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("signaling.url"));
}

#[test]
fn accepts_secure_websocket_url() {
    let mut config = HuddleConfig::default();
    config.signaling.url = "wss://relay.example.com/ws".into();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_zero_connect_timeout() {
    let mut config = HuddleConfig::default();
    config.signaling.connect_timeout_secs = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("signaling.connect_timeout_secs"));
}

#[test]
fn catches_pending_signal_limit_out_of_range() {
    let mut config = HuddleConfig::default();
    config.call.max_pending_signals_per_peer = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("call.max_pending_signals_per_peer"));
}

#[test]
fn catches_media_with_nothing_enabled() {
    let mut config = HuddleConfig::default();
    config.media.video = false;
    config.media.audio = false;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("media"));
}

#[test]
fn audio_only_is_valid() {
    let mut config = HuddleConfig::default();
    config.media.video = false;
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_single_member_rooms() {
    let mut config = HuddleConfig::default();
    config.relay.max_room_size = 1;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("relay.max_room_size"));
}

#[test]
fn collects_every_error() {
    let mut config = HuddleConfig::default();
    config.relay.port = 0;
    config.call.event_buffer = 1;
    config.signaling.handshake_timeout_secs = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("relay.port"));
    assert!(err.contains("call.event_buffer"));
    assert!(err.contains("signaling.handshake_timeout_secs"));
    assert_eq!(err.matches("; ").count(), 2);
}
