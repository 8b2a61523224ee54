use serde::{Deserialize, Serialize};
use std::fmt;

/// Fresh relay-assigned connection id.
pub fn new_socket_id() -> PeerId {
    PeerId(uuid::Uuid::new_v4().to_string())
}

/// Identifies one connection to the relay (the `socketId` on the wire).
///
/// A client that reconnects gets a new id, so ids are never reused within
/// a room.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_id_is_uuid() {
        let id = new_socket_id();
        assert!(uuid::Uuid::parse_str(id.as_str()).is_ok());
        assert_ne!(id, new_socket_id());
    }

    #[test]
    fn peer_id_serializes_as_plain_string() {
        let id = PeerId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        let back: PeerId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn peer_ids_order_lexicographically() {
        let mut ids = vec![PeerId::from("c"), PeerId::from("a"), PeerId::from("b")];
        ids.sort();
        assert_eq!(ids, vec!["a".into(), "b".into(), PeerId::from("c")]);
    }
}
