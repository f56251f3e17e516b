//! Channel records in the network mirror.

use std::collections::{BTreeMap, BTreeSet};

/// A channel on the network.
///
/// Channels are ephemeral: a channel whose member set becomes empty is
/// deleted immediately by the store mutator that emptied it. There is no
/// registration or reservation at this layer.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Channel name as first seen on the wire (lookup is casemapped).
    pub name: String,
    /// Creation timestamp from the first join burst naming this channel.
    pub ts: i64,
    /// Set channel modes as `(letter, argument)` pairs. Prefix modes are
    /// tracked in `prefix_modes`, never here.
    pub modes: BTreeSet<(char, Option<String>)>,
    /// Member UIDs.
    pub users: BTreeSet<String>,
    /// Role name (op, voice, ...) to the member UIDs holding it.
    pub prefix_modes: BTreeMap<String, BTreeSet<String>>,
}

impl Channel {
    pub fn new(name: impl Into<String>, ts: i64) -> Self {
        Self {
            name: name.into(),
            ts,
            modes: BTreeSet::new(),
            users: BTreeSet::new(),
            prefix_modes: BTreeMap::new(),
        }
    }

    /// Grant `role` to a member.
    pub fn grant_role(&mut self, role: &str, uid: &str) {
        self.prefix_modes
            .entry(role.to_string())
            .or_default()
            .insert(uid.to_string());
    }

    /// Revoke `role` from a member. Empty role sets are dropped.
    pub fn revoke_role(&mut self, role: &str, uid: &str) {
        if let Some(holders) = self.prefix_modes.get_mut(role) {
            holders.remove(uid);
            if holders.is_empty() {
                self.prefix_modes.remove(role);
            }
        }
    }

    /// Whether a member holds `role`.
    pub fn has_role(&self, role: &str, uid: &str) -> bool {
        self.prefix_modes
            .get(role)
            .is_some_and(|holders| holders.contains(uid))
    }

    /// Remove a member and every role it held.
    pub fn remove_member(&mut self, uid: &str) {
        self.users.remove(uid);
        self.prefix_modes.retain(|_, holders| {
            holders.remove(uid);
            !holders.is_empty()
        });
    }

    /// Whether the channel has no members left.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_follow_membership() {
        let mut chan = Channel::new("#chat", 1000);
        chan.users.insert("70MAAAAAB".into());
        chan.grant_role("op", "70MAAAAAB");
        chan.grant_role("voice", "70MAAAAAB");
        assert!(chan.has_role("op", "70MAAAAAB"));

        chan.remove_member("70MAAAAAB");
        assert!(!chan.has_role("op", "70MAAAAAB"));
        assert!(chan.prefix_modes.is_empty());
        assert!(chan.is_empty());
    }

    #[test]
    fn test_revoke_single_role() {
        let mut chan = Channel::new("#chat", 1000);
        chan.users.insert("70MAAAAAB".into());
        chan.grant_role("op", "70MAAAAAB");
        chan.revoke_role("op", "70MAAAAAB");
        assert!(!chan.has_role("op", "70MAAAAAB"));
        // Membership is unaffected by role changes.
        assert!(!chan.is_empty());
    }
}
