//! User records in the network mirror.

use std::collections::BTreeSet;

/// A user on the network, local or remote.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Unique identifier, prefixed by the owning server's SID.
    pub uid: String,
    pub nick: String,
    /// Creation (signon) timestamp, Unix seconds.
    pub ts: i64,
    pub ident: String,
    /// Displayed hostname.
    pub host: String,
    /// Real hostname behind any cloak.
    pub realhost: String,
    pub ip: String,
    pub realname: String,
    /// Set user modes as `(letter, argument)` pairs. Ordered so debug
    /// output and tests stay deterministic.
    pub modes: BTreeSet<(char, Option<String>)>,
    /// Whether the user has authenticated to the service.
    pub identified: bool,
    /// Whether oper interactions (mode changes etc.) may touch this client.
    /// Automatically spawned service clients set this false so such
    /// interactions don't desync the mirror.
    pub manipulatable: bool,
}

impl User {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uid: impl Into<String>,
        nick: impl Into<String>,
        ts: i64,
        ident: impl Into<String>,
        host: impl Into<String>,
        realhost: impl Into<String>,
        ip: impl Into<String>,
        realname: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            nick: nick.into(),
            ts,
            ident: ident.into(),
            host: host.into(),
            realhost: realhost.into(),
            ip: ip.into(),
            realname: realname.into(),
            modes: BTreeSet::new(),
            identified: false,
            manipulatable: true,
        }
    }

    /// Whether a mode letter is set, with any argument.
    pub fn has_mode(&self, letter: char) -> bool {
        self.modes.iter().any(|(l, _)| *l == letter)
    }

    /// `nick!ident@host` using the displayed hostname.
    pub fn hostmask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.ident, self.host)
    }

    /// The SID prefix of this user's identifier.
    pub fn owning_sid(&self) -> &str {
        &self.uid[..self.uid.len().min(3)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User::new(
            "70MAAAAAB",
            "Alice",
            1000,
            "alice",
            "cloak.example",
            "real.example",
            "1.2.3.4",
            "Alice Example",
        )
    }

    #[test]
    fn test_hostmask_uses_displayed_host() {
        assert_eq!(alice().hostmask(), "Alice!alice@cloak.example");
    }

    #[test]
    fn test_owning_sid() {
        assert_eq!(alice().owning_sid(), "70M");
    }

    #[test]
    fn test_has_mode() {
        let mut u = alice();
        assert!(!u.has_mode('o'));
        u.modes.insert(('o', None));
        assert!(u.has_mode('o'));
    }
}
