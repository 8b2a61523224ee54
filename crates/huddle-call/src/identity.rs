use serde::{Deserialize, Serialize};

/// Fallback when the identity provider supplies neither a username nor an e-mail.
pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// The signed-in user as supplied by the identity provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            email: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Name shown to the room: username, then e-mail, then [`DEFAULT_DISPLAY_NAME`].
    pub fn display_name(&self) -> String {
        [self.username.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_wins() {
        let id = Identity::new("u1")
            .with_username("alice")
            .with_email("alice@example.com");
        assert_eq!(id.display_name(), "alice");
    }

    #[test]
    fn email_when_no_username() {
        let id = Identity::new("u1").with_email("bob@example.com");
        assert_eq!(id.display_name(), "bob@example.com");
    }

    #[test]
    fn blank_username_falls_through() {
        let id = Identity::new("u1").with_username("  ").with_email("bob@example.com");
        assert_eq!(id.display_name(), "bob@example.com");
    }

    #[test]
    fn falls_back_to_user() {
        assert_eq!(Identity::new("u1").display_name(), "User");
    }

    #[test]
    fn debug_redacts_email() {
        let id = Identity::new("u1").with_email("secret@example.com");
        let dbg = format!("{id:?}");
        assert!(!dbg.contains("secret@example.com"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn deserializes_provider_payload() {
        let id: Identity =
            serde_json::from_str(r#"{"id":"42","username":null,"email":"c@example.com"}"#).unwrap();
        assert_eq!(id.display_name(), "c@example.com");
    }
}
