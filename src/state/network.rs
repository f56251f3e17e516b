//! The per-session network mirror.
//!
//! One [`Network`] holds everything we know about one IRC network: its
//! server tree, users, and channels, plus the immutable mode capability
//! tables negotiated for the session. It is pure data with
//! invariant-preserving mutators; all I/O lives in the protocol session
//! that owns it.

use std::collections::HashMap;

use svclink_proto::{Casemapping, ModeTables};
use tracing::{debug, warn};

use crate::error::DesyncError;
use crate::state::channel::Channel;
use crate::state::server::Server;
use crate::state::user::User;

/// Everything removed by one server detach.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DetachedSubtree {
    /// SIDs of the removed servers, the detach target first.
    pub servers: Vec<String>,
    /// UIDs of the removed users.
    pub users: Vec<String>,
}

/// The network-wide state aggregate for one session.
#[derive(Debug)]
pub struct Network {
    /// Human-readable network name, used in log output.
    pub name: String,
    /// Our own SID; the root of the server tree.
    pub sid: String,
    pub casemapping: Casemapping,
    /// Mode capability tables, loaded once at link time.
    pub tables: ModeTables,
    /// Users by UID.
    pub users: HashMap<String, User>,
    /// Channels by casemapped name.
    pub channels: HashMap<String, Channel>,
    /// Servers by SID.
    pub servers: HashMap<String, Server>,
    /// UID of the designated service pseudoclient, once spawned.
    pub pseudoclient: Option<String>,
    /// When this session linked, Unix seconds.
    pub start_ts: i64,
}

impl Network {
    pub fn new(
        name: impl Into<String>,
        sid: impl Into<String>,
        casemapping: Casemapping,
        tables: ModeTables,
        start_ts: i64,
    ) -> Self {
        let sid = sid.into();
        let mut servers = HashMap::new();
        servers.insert(sid.clone(), Server::new(sid.clone(), None));
        Self {
            name: name.into(),
            sid,
            casemapping,
            tables,
            users: HashMap::new(),
            channels: HashMap::new(),
            servers,
            pseudoclient: None,
            start_ts,
        }
    }

    /// Casemapped canonical form of a nick or channel name.
    pub fn lower(&self, s: &str) -> String {
        self.casemapping.lower(s)
    }

    /// The SID prefix of a UID.
    pub fn owning_sid(uid: &str) -> &str {
        &uid[..uid.len().min(3)]
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Register a user and record it under its owning server.
    ///
    /// Fails if the UID is already present. If the owning server is not yet
    /// known the record is created implicitly (logged as a possible desync)
    /// so the ownership invariant holds.
    pub fn add_user(&mut self, user: User) -> Result<(), DesyncError> {
        if self.users.contains_key(&user.uid) {
            return Err(DesyncError::DuplicateUser(user.uid.clone()));
        }
        let sid = Self::owning_sid(&user.uid).to_string();
        let server = self.servers.entry(sid.clone()).or_insert_with(|| {
            warn!(
                network = %self.name,
                sid = %sid,
                "possible desync: user introduced by unknown server, creating record"
            );
            Server::new(sid.clone(), Some(self.sid.clone()))
        });
        server.users.push(user.uid.clone());
        self.users.insert(user.uid.clone(), user);
        Ok(())
    }

    /// Remove a user from the store entirely: from every channel's
    /// membership and role sets (deleting channels that become empty), from
    /// its owning server's user list, and from the user index.
    pub fn remove_user(&mut self, uid: &str) -> Result<User, DesyncError> {
        let user = self
            .users
            .remove(uid)
            .ok_or_else(|| DesyncError::UnknownUser(uid.to_string()))?;

        let emptied: Vec<String> = self
            .channels
            .iter_mut()
            .filter_map(|(key, chan)| {
                chan.remove_member(uid);
                chan.is_empty().then(|| key.clone())
            })
            .collect();
        for key in emptied {
            debug!(network = %self.name, channel = %key, "removing empty channel");
            self.channels.remove(&key);
        }

        if let Some(server) = self.servers.get_mut(Self::owning_sid(uid)) {
            server.users.retain(|u| u != uid);
        }

        if self.pseudoclient.as_deref() == Some(uid) {
            self.pseudoclient = None;
        }
        Ok(user)
    }

    /// Resolve a nickname to a UID under the session casemapping.
    pub fn nick_to_uid(&self, nick: &str) -> Option<String> {
        let folded = self.lower(nick);
        self.users
            .values()
            .find(|u| self.lower(&u.nick) == folded)
            .map(|u| u.uid.clone())
    }

    /// Whether a UID is a client owned by the local server.
    pub fn is_internal_client(&self, uid: &str) -> bool {
        self.servers
            .get(&self.sid)
            .is_some_and(|s| s.users.iter().any(|u| u == uid))
    }

    /// Whether a UID is an internal client that oper interactions may touch.
    pub fn is_manipulatable_client(&self, uid: &str) -> bool {
        self.is_internal_client(uid)
            && self.users.get(uid).is_some_and(|u| u.manipulatable)
    }

    /// `nick!ident@host` for a user, with placeholders when unknown.
    pub fn hostmask(&self, uid: &str) -> String {
        match self.users.get(uid) {
            Some(user) => user.hostmask(),
            None => format!("<unknown>!<unknown>@<unknown> ({uid})"),
        }
    }

    // ========================================================================
    // Channels
    // ========================================================================

    /// Look up a channel by (casemapped) name.
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&self.lower(name))
    }

    /// Mutable channel lookup by (casemapped) name.
    pub fn channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        let key = self.lower(name);
        self.channels.get_mut(&key)
    }

    /// Add a user to a channel, creating the channel on first join.
    ///
    /// `ts` is used as the channel's creation timestamp when it does not
    /// exist yet. `roles` are initial role names from a burst message
    /// carrying prefix-annotated member lists.
    pub fn join_channel(
        &mut self,
        uid: &str,
        name: &str,
        ts: i64,
        roles: &[String],
    ) -> Result<(), DesyncError> {
        if !self.users.contains_key(uid) {
            return Err(DesyncError::UnknownUser(uid.to_string()));
        }
        let key = self.lower(name);
        let chan = self
            .channels
            .entry(key)
            .or_insert_with(|| Channel::new(name, ts));
        chan.users.insert(uid.to_string());
        for role in roles {
            chan.grant_role(role, uid);
        }
        Ok(())
    }

    /// Remove a user's membership; deletes the channel if now empty.
    pub fn part_channel(&mut self, uid: &str, name: &str) -> Result<(), DesyncError> {
        let key = self.lower(name);
        let chan = self
            .channels
            .get_mut(&key)
            .ok_or_else(|| DesyncError::UnknownChannel(name.to_string()))?;
        chan.remove_member(uid);
        if chan.is_empty() {
            debug!(network = %self.name, channel = %name, "removing empty channel");
            self.channels.remove(&key);
        }
        Ok(())
    }

    // ========================================================================
    // Servers
    // ========================================================================

    /// Register a server under its uplink.
    pub fn add_server(&mut self, sid: impl Into<String>, uplink: Option<String>) {
        let sid = sid.into();
        self.servers
            .insert(sid.clone(), Server::new(sid, uplink));
    }

    /// Detach a server and everything behind it.
    ///
    /// Collapses the subtree rooted at `sid` with an explicit work stack
    /// (the tree is finite, so the walk is bounded by the server count),
    /// then removes every user owned by the detached servers and finally
    /// the server records themselves. This implements netsplit
    /// propagation: splitting an upstream server implicitly splits every
    /// downstream leaf.
    pub fn detach_server(&mut self, sid: &str) -> Result<DetachedSubtree, DesyncError> {
        if !self.servers.contains_key(sid) {
            return Err(DesyncError::UnknownServer(sid.to_string()));
        }

        let mut detached = DetachedSubtree::default();
        let mut stack = vec![sid.to_string()];
        while let Some(current) = stack.pop() {
            if detached.servers.contains(&current) {
                continue;
            }
            for (other, server) in &self.servers {
                if server.uplink.as_deref() == Some(current.as_str())
                    && !detached.servers.contains(other)
                {
                    stack.push(other.clone());
                }
            }
            detached.servers.push(current);
        }

        for doomed in &detached.servers {
            let uids = self
                .servers
                .get(doomed)
                .map(|s| s.users.clone())
                .unwrap_or_default();
            for uid in uids {
                debug!(
                    network = %self.name,
                    uid = %uid,
                    nick = %self.users.get(&uid).map(|u| u.nick.clone()).unwrap_or_default(),
                    "removing client lost in split"
                );
                if self.remove_user(&uid).is_ok() {
                    detached.users.push(uid);
                }
            }
        }
        for doomed in &detached.servers {
            self.servers.remove(doomed);
        }
        Ok(detached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> Network {
        Network::new(
            "testnet",
            "0AL",
            Casemapping::Rfc1459,
            ModeTables::inspircd(),
            1000,
        )
    }

    fn user(uid: &str, nick: &str) -> User {
        User::new(uid, nick, 1000, "ident", "host", "host", "1.2.3.4", nick)
    }

    /// Every user present in the store appears in exactly one server's user
    /// list, matching its SID prefix.
    fn assert_ownership_invariant(net: &Network) {
        for uid in net.users.keys() {
            let owners: Vec<&String> = net
                .servers
                .values()
                .flat_map(|s| s.users.iter().filter(|u| *u == uid))
                .collect();
            assert_eq!(owners.len(), 1, "user {uid} owned by {} servers", owners.len());
            let sid = Network::owning_sid(uid);
            assert!(
                net.servers
                    .get(sid)
                    .is_some_and(|s| s.users.iter().any(|u| u == uid)),
                "user {uid} missing from server {sid}"
            );
        }
    }

    #[test]
    fn test_add_remove_user_keeps_server_lists_consistent() {
        let mut net = network();
        net.add_server("70M", Some("0AL".into()));
        net.add_user(user("70MAAAAAB", "Alice")).unwrap();
        net.add_user(user("70MAAAAAC", "Bob")).unwrap();
        net.add_user(user("0ALAAAAAA", "Svc")).unwrap();
        assert_ownership_invariant(&net);

        net.remove_user("70MAAAAAB").unwrap();
        assert_ownership_invariant(&net);
        assert!(!net.users.contains_key("70MAAAAAB"));
        assert_eq!(net.servers["70M"].users, vec!["70MAAAAAC".to_string()]);
    }

    #[test]
    fn test_duplicate_user_rejected() {
        let mut net = network();
        net.add_user(user("0ALAAAAAA", "Svc")).unwrap();
        assert_eq!(
            net.add_user(user("0ALAAAAAA", "Svc2")),
            Err(DesyncError::DuplicateUser("0ALAAAAAA".into()))
        );
    }

    #[test]
    fn test_remove_unknown_user_is_desync_not_panic() {
        let mut net = network();
        assert_eq!(
            net.remove_user("70MAAAAAB"),
            Err(DesyncError::UnknownUser("70MAAAAAB".into()))
        );
    }

    #[test]
    fn test_user_under_unknown_server_creates_record() {
        let mut net = network();
        net.add_user(user("9ZZAAAAAA", "Stray")).unwrap();
        assert!(net.servers.contains_key("9ZZ"));
        assert_ownership_invariant(&net);
    }

    #[test]
    fn test_empty_channel_deleted_on_part() {
        let mut net = network();
        net.add_user(user("0ALAAAAAA", "Svc")).unwrap();
        net.join_channel("0ALAAAAAA", "#Chat", 1000, &[]).unwrap();
        assert!(net.channel("#chat").is_some());

        net.part_channel("0ALAAAAAA", "#CHAT").unwrap();
        assert!(net.channel("#chat").is_none());
    }

    #[test]
    fn test_empty_channel_deleted_on_quit() {
        let mut net = network();
        net.add_user(user("0ALAAAAAA", "Svc")).unwrap();
        net.add_user(user("0ALAAAAAB", "Other")).unwrap();
        net.join_channel("0ALAAAAAA", "#chat", 1000, &[]).unwrap();
        net.join_channel("0ALAAAAAB", "#chat", 1000, &[]).unwrap();

        net.remove_user("0ALAAAAAA").unwrap();
        assert!(net.channel("#chat").is_some());
        net.remove_user("0ALAAAAAB").unwrap();
        assert!(net.channel("#chat").is_none());
    }

    #[test]
    fn test_join_with_burst_roles() {
        let mut net = network();
        net.add_user(user("0ALAAAAAA", "Svc")).unwrap();
        net.join_channel("0ALAAAAAA", "#chat", 1000, &["op".into(), "voice".into()])
            .unwrap();
        let chan = net.channel("#chat").unwrap();
        assert!(chan.has_role("op", "0ALAAAAAA"));
        assert!(chan.has_role("voice", "0ALAAAAAA"));
    }

    #[test]
    fn test_detach_server_cascades() {
        let mut net = network();
        // 0AL -> 70M -> 1ML, plus 70M -> 9ZZ
        net.add_server("70M", Some("0AL".into()));
        net.add_server("1ML", Some("70M".into()));
        net.add_server("9ZZ", Some("70M".into()));
        net.add_user(user("70MAAAAAB", "Alice")).unwrap();
        net.add_user(user("1MLAAAAAA", "Bob")).unwrap();
        net.add_user(user("9ZZAAAAAA", "Carol")).unwrap();
        net.add_user(user("0ALAAAAAA", "Svc")).unwrap();
        net.join_channel("70MAAAAAB", "#chat", 1000, &[]).unwrap();
        net.join_channel("1MLAAAAAA", "#chat", 1000, &[]).unwrap();

        let detached = net.detach_server("70M").unwrap();
        assert_eq!(detached.servers.len(), 3);
        assert_eq!(detached.users.len(), 3);

        // No reference to any removed id survives anywhere in the store.
        for sid in ["70M", "1ML", "9ZZ"] {
            assert!(!net.servers.contains_key(sid));
        }
        for uid in ["70MAAAAAB", "1MLAAAAAA", "9ZZAAAAAA"] {
            assert!(!net.users.contains_key(uid));
            assert!(net
                .channels
                .values()
                .all(|c| !c.users.contains(uid)));
        }
        assert!(net.channel("#chat").is_none());
        assert!(net.users.contains_key("0ALAAAAAA"));
        assert_ownership_invariant(&net);
    }

    #[test]
    fn test_detach_unknown_server() {
        let mut net = network();
        assert_eq!(
            net.detach_server("XXX"),
            Err(DesyncError::UnknownServer("XXX".into()))
        );
    }

    #[test]
    fn test_nick_to_uid_is_casemapped() {
        let mut net = network();
        net.add_user(user("70MAAAAAB", "Alice[1]")).unwrap();
        assert_eq!(
            net.nick_to_uid("alice{1}").as_deref(),
            Some("70MAAAAAB")
        );
        assert_eq!(net.nick_to_uid("nobody"), None);
    }

    #[test]
    fn test_internal_client_checks() {
        let mut net = network();
        net.add_user(user("0ALAAAAAA", "Svc")).unwrap();
        net.add_user(user("70MAAAAAB", "Alice")).unwrap();
        assert!(net.is_internal_client("0ALAAAAAA"));
        assert!(!net.is_internal_client("70MAAAAAB"));

        assert!(net.is_manipulatable_client("0ALAAAAAA"));
        net.users.get_mut("0ALAAAAAA").unwrap().manipulatable = false;
        assert!(!net.is_manipulatable_client("0ALAAAAAA"));
    }
}
