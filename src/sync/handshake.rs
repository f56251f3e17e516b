//! Link lifecycle state machine and credential verification.

use crate::error::LinkError;

/// The lifecycle of one uplink connection.
///
/// ```text
/// Disconnected -> Connecting -> Handshaking -> Bursting -> Linked
///                                                             |
///                        Disconnected <- Splitting <----------+
/// ```
///
/// `Splitting` is transient: it is entered while processing an `ERROR` or
/// an `SQUIT` that names the local link, after which the read loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No socket.
    Disconnected,
    /// Socket being opened.
    Connecting,
    /// Capability negotiation and SERVER introduction in flight.
    Handshaking,
    /// Sending our initial state.
    Bursting,
    /// Steady state: the sequential read loop is processing messages.
    Linked,
    /// Tearing down after a link-fatal event.
    Splitting,
}

impl LinkState {
    /// Whether the session has completed its burst.
    pub fn is_linked(&self) -> bool {
        matches!(self, Self::Linked)
    }
}

/// The peer's identity from its `SERVER` introduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIntro {
    pub name: String,
    pub sid: String,
    pub description: String,
}

/// Verify the uplink's unprefixed `SERVER` introduction line:
///
/// ```text
/// SERVER <name> <password> <hops> <sid> :<description>
/// ```
///
/// A credential mismatch is link-fatal.
pub fn verify_server_intro(args: &[String], recv_password: &str) -> Result<PeerIntro, LinkError> {
    let name = args.first().cloned().unwrap_or_default();
    let password = args.get(1).map(String::as_str).unwrap_or_default();
    let sid = match args.get(3) {
        Some(sid) => sid.clone(),
        None => {
            return Err(LinkError::BadCredentials { server: name });
        }
    };
    if password != recv_password {
        return Err(LinkError::BadCredentials { server: name });
    }
    Ok(PeerIntro {
        name,
        sid,
        description: args.get(4).cloned().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intro_args() -> Vec<String> {
        ["hub.example.net", "sekrit", "0", "70M", "Example Hub"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_good_credentials() {
        let intro = verify_server_intro(&intro_args(), "sekrit").unwrap();
        assert_eq!(intro.name, "hub.example.net");
        assert_eq!(intro.sid, "70M");
        assert_eq!(intro.description, "Example Hub");
    }

    #[test]
    fn test_credential_mismatch_is_fatal() {
        let result = verify_server_intro(&intro_args(), "other");
        assert!(matches!(result, Err(LinkError::BadCredentials { .. })));
    }

    #[test]
    fn test_truncated_intro_is_fatal() {
        let result = verify_server_intro(&intro_args()[..2], "sekrit");
        assert!(matches!(result, Err(LinkError::BadCredentials { .. })));
    }

    #[test]
    fn test_state_machine_helpers() {
        assert!(LinkState::Linked.is_linked());
        assert!(!LinkState::Bursting.is_linked());
        assert_ne!(LinkState::Splitting, LinkState::Disconnected);
    }
}
