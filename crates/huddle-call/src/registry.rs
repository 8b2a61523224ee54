//! Room membership as seen by this client.

use std::collections::BTreeMap;

use huddle_common::{PeerId, RosterEntry};

/// Shown when a call owner is no longer in the room.
pub const UNKNOWN_PARTICIPANT: &str = "Unknown";

/// One room member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub peer_id: PeerId,
    pub display_name: String,
    pub is_local: bool,
}

/// What an `all-users` snapshot changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RosterDiff {
    pub joined: Vec<Participant>,
    pub left: Vec<Participant>,
}

/// Tracks who is in the room.
///
/// Always holds the local participant. Roster events that name the local
/// peer are ignored, so self can never appear as a remote member.
#[derive(Debug)]
pub struct MembershipRegistry {
    local: Participant,
    remote: BTreeMap<PeerId, String>,
}

impl MembershipRegistry {
    /// Registry seeded with the local participant only.
    pub fn new(self_id: PeerId, display_name: impl Into<String>) -> Self {
        Self {
            local: Participant {
                peer_id: self_id,
                display_name: display_name.into(),
                is_local: true,
            },
            remote: BTreeMap::new(),
        }
    }

    pub fn self_id(&self) -> &PeerId {
        &self.local.peer_id
    }

    pub fn self_participant(&self) -> &Participant {
        &self.local
    }

    /// Replace the remote roster with a relay snapshot.
    pub fn apply_snapshot(&mut self, entries: Vec<RosterEntry>) -> RosterDiff {
        let mut next = BTreeMap::new();
        for entry in entries {
            if entry.socket_id == self.local.peer_id {
                continue;
            }
            next.insert(entry.socket_id, entry.user_name);
        }

        let left = self
            .remote
            .iter()
            .filter(|(id, _)| !next.contains_key(*id))
            .map(|(id, name)| remote_participant(id, name))
            .collect();
        let joined = next
            .iter()
            .filter(|(id, _)| !self.remote.contains_key(*id))
            .map(|(id, name)| remote_participant(id, name))
            .collect();

        self.remote = next;
        RosterDiff { joined, left }
    }

    /// Record a newly connected member. Returns the participant if it is new.
    pub fn join(&mut self, entry: RosterEntry) -> Option<Participant> {
        if entry.socket_id == self.local.peer_id {
            tracing::debug!("ignoring roster join for self");
            return None;
        }
        match self.remote.insert(entry.socket_id.clone(), entry.user_name) {
            Some(_) => None,
            None => self
                .remote
                .get_key_value(&entry.socket_id)
                .map(|(id, name)| remote_participant(id, name)),
        }
    }

    /// Remove a member. Returns who left, if they were known.
    pub fn leave(&mut self, peer: &PeerId) -> Option<Participant> {
        if *peer == self.local.peer_id {
            tracing::debug!("ignoring roster leave for self");
            return None;
        }
        self.remote
            .remove(peer)
            .map(|name| remote_participant(peer, &name))
    }

    /// Forget every remote member (transport lost).
    pub fn clear_remote(&mut self) {
        self.remote.clear();
    }

    /// Remote members ordered by peer id.
    pub fn others(&self) -> Vec<Participant> {
        self.remote
            .iter()
            .map(|(id, name)| remote_participant(id, name))
            .collect()
    }

    pub fn other_ids(&self) -> Vec<PeerId> {
        self.remote.keys().cloned().collect()
    }

    /// Local participant first, then the others.
    pub fn participants(&self) -> Vec<Participant> {
        std::iter::once(self.local.clone())
            .chain(self.others())
            .collect()
    }

    /// Members including self.
    pub fn count(&self) -> usize {
        1 + self.remote.len()
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        *peer == self.local.peer_id || self.remote.contains_key(peer)
    }

    pub fn display_name(&self, peer: &PeerId) -> Option<&str> {
        if *peer == self.local.peer_id {
            return Some(&self.local.display_name);
        }
        self.remote.get(peer).map(String::as_str)
    }

    /// Name of the call owner, or [`UNKNOWN_PARTICIPANT`] once they left.
    pub fn owner_display_name(&self, owner: Option<&PeerId>) -> String {
        owner
            .and_then(|id| self.display_name(id))
            .unwrap_or(UNKNOWN_PARTICIPANT)
            .to_string()
    }
}

fn remote_participant(id: &PeerId, name: &str) -> Participant {
    Participant {
        peer_id: id.clone(),
        display_name: name.to_string(),
        is_local: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str) -> RosterEntry {
        RosterEntry {
            socket_id: id.into(),
            user_name: name.into(),
        }
    }

    fn registry() -> MembershipRegistry {
        MembershipRegistry::new("a".into(), "alice")
    }

    #[test]
    fn starts_with_self_only() {
        let reg = registry();
        assert_eq!(reg.count(), 1);
        assert!(reg.others().is_empty());
        assert!(reg.self_participant().is_local);
        assert!(reg.contains(&"a".into()));
    }

    #[test]
    fn snapshot_reports_diff_and_skips_self() {
        let mut reg = registry();
        reg.join(entry("x", "xavier"));

        let diff = reg.apply_snapshot(vec![
            entry("c", "carol"),
            entry("a", "alice-again"),
            entry("b", "bob"),
        ]);
        let joined: Vec<_> = diff.joined.iter().map(|p| p.peer_id.as_str()).collect();
        assert_eq!(joined, vec!["b", "c"]);
        assert_eq!(diff.left.len(), 1);
        assert_eq!(diff.left[0].peer_id, PeerId::from("x"));
        assert_eq!(diff.left[0].display_name, "xavier");
        assert_eq!(reg.count(), 3);
        assert_eq!(reg.display_name(&"a".into()), Some("alice"));
    }

    #[test]
    fn join_is_idempotent() {
        let mut reg = registry();
        assert!(reg.join(entry("b", "bob")).is_some());
        assert!(reg.join(entry("b", "bob")).is_none());
        assert_eq!(reg.count(), 2);
    }

    #[test]
    fn self_roster_events_are_ignored() {
        let mut reg = registry();
        assert!(reg.join(entry("a", "imposter")).is_none());
        assert!(reg.leave(&"a".into()).is_none());
        assert_eq!(reg.count(), 1);
        assert_eq!(reg.display_name(&"a".into()), Some("alice"));
    }

    #[test]
    fn leave_of_unknown_peer_is_noop() {
        let mut reg = registry();
        assert!(reg.leave(&"ghost".into()).is_none());
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn others_are_sorted() {
        let mut reg = registry();
        reg.join(entry("d", "dan"));
        reg.join(entry("b", "bob"));
        reg.join(entry("c", "carol"));
        let ids: Vec<_> = reg.others().into_iter().map(|p| p.peer_id).collect();
        assert_eq!(ids, vec!["b".into(), "c".into(), PeerId::from("d")]);
        assert_eq!(reg.participants()[0].peer_id, PeerId::from("a"));
    }

    #[test]
    fn owner_name_falls_back_to_unknown() {
        let mut reg = registry();
        reg.join(entry("b", "bob"));
        assert_eq!(reg.owner_display_name(Some(&"b".into())), "bob");
        assert_eq!(reg.owner_display_name(Some(&"a".into())), "alice");
        reg.leave(&"b".into());
        assert_eq!(reg.owner_display_name(Some(&"b".into())), "Unknown");
        assert_eq!(reg.owner_display_name(None), "Unknown");
    }
}
