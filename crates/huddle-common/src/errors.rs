use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// A frame that could not be decoded into (or encoded from) the wire catalogue.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("malformed payload for '{event}': {reason}")]
    Payload { event: String, reason: String },

    #[error("event '{0}' has no wire form")]
    NotEncodable(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("relay.port = 0".into());
        assert_eq!(err.to_string(), "config validation error: relay.port = 0");
    }

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::Payload {
            event: "signal".into(),
            reason: "missing field `to`".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed payload for 'signal': missing field `to`"
        );

        let err = ProtocolError::NotEncodable("Disconnected");
        assert_eq!(err.to_string(), "event 'Disconnected' has no wire form");
    }
}
