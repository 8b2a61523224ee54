//! Default TOML config template with inline documentation comments.

pub(crate) fn default_config_toml() -> String {
    r##"# Huddle Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[signaling]
# url = "ws://127.0.0.1:8080"
# connect_timeout_secs = 15     # 1-120
# handshake_timeout_secs = 10   # 1-60
# heartbeat_interval_secs = 25  # 5-300

[call]
# max_pending_signals_per_peer = 32   # 1-1024
# event_buffer = 256                  # 16-65536

[media]
# video = true
# audio = true

[relay]
# bind = "0.0.0.0"
# port = 8080
# max_room_size = 16            # 2-256
# join_timeout_secs = 30        # 1-600

[logging]
# level = "info"                # trace, debug, info, warn, error
"##
    .to_string()
}
