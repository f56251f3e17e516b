//! Server records in the network mirror.

/// A server on the network.
///
/// Servers form a tree rooted at the local session's own SID. Every user's
/// owning server is determined by the SID prefix of its UID and must appear
/// in that server's user list.
#[derive(Debug, Clone)]
pub struct Server {
    /// Three-character server identifier.
    pub sid: String,
    /// SID of the server that introduced this one. `None` only for the
    /// local root server.
    pub uplink: Option<String>,
    /// UIDs of the users this server directly owns, in introduction order.
    pub users: Vec<String>,
}

impl Server {
    pub fn new(sid: impl Into<String>, uplink: Option<String>) -> Self {
        Self {
            sid: sid.into(),
            uplink,
            users: Vec::new(),
        }
    }
}
