//! Unified error handling for svclinkd.
//!
//! The error types here mirror the failure classes the session core has to
//! discriminate: link-fatal conditions, desync warnings, malformed input,
//! and invalid outbound operation requests. Plugin command failures are a
//! separate concern contained at the dispatch boundary.

use thiserror::Error;

use crate::state::uid::UidError;

// ============================================================================
// Link-fatal errors (terminate the session)
// ============================================================================

/// Errors that end a network session. There is no retry inside the core;
/// the process owner decides what happens next.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("uplink credential mismatch from {server}")]
    BadCredentials { server: String },

    #[error("received ERROR from uplink: {0}")]
    Remote(String),

    #[error("local link split by SQUIT of {0}")]
    LocalSplit(String),

    #[error("uplink connection closed")]
    ConnectionClosed,

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("burst failed: {0}")]
    Burst(String),

    #[error(transparent)]
    Uid(#[from] UidError),
}

// ============================================================================
// Desync warnings (logged, operation becomes a no-op)
// ============================================================================

/// A state operation referenced an entity the local mirror does not know.
///
/// These indicate the mirror has drifted from the network's true state.
/// Callers log them and continue; they are never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesyncError {
    #[error("user {0} already exists")]
    DuplicateUser(String),

    #[error("unknown user {0}")]
    UnknownUser(String),

    #[error("unknown channel {0}")]
    UnknownChannel(String),

    #[error("unknown server {0}")]
    UnknownServer(String),
}

// ============================================================================
// Invalid outbound operation requests (all-or-nothing, reported to caller)
// ============================================================================

/// An outbound pseudoclient operation failed validation or could not be
/// delivered. Validation failures happen before any wire send and before
/// any state mutation.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("no such internal client: {0}")]
    NotInternalClient(String),

    #[error("invalid nickname {0:?}")]
    InvalidNick(String),

    #[error("invalid channel name {0:?}")]
    InvalidChannel(String),

    #[error("unknown mode target {0}")]
    UnknownTarget(String),

    #[error(transparent)]
    Uid(#[from] UidError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

// ============================================================================
// Inbound handler errors
// ============================================================================

/// Result of one inbound command handler invocation.
///
/// All handlers are contained by the read loop: only errors that unwrap to
/// a [`LinkError`] terminate the session, everything else is logged and the
/// loop continues with the next line.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed {command} message: {detail}")]
    Malformed {
        command: &'static str,
        detail: String,
    },

    #[error(transparent)]
    Desync(#[from] DesyncError),

    #[error(transparent)]
    Op(#[from] OpError),

    #[error(transparent)]
    Fatal(#[from] LinkError),
}

impl HandlerError {
    /// Shorthand for a malformed-message error.
    pub fn malformed(command: &'static str, detail: impl Into<String>) -> Self {
        Self::Malformed {
            command,
            detail: detail.into(),
        }
    }

    /// Split off the link-fatal cases.
    ///
    /// Returns `Err` with the fatal error when the session must end, or
    /// `Ok(self)` when the error is containable.
    pub fn into_fatal(self) -> Result<Self, LinkError> {
        match self {
            Self::Fatal(e) => Err(e),
            Self::Op(OpError::Link(e)) => Err(e),
            Self::Op(OpError::Uid(e)) => Err(LinkError::Uid(e)),
            other => Ok(other),
        }
    }
}

/// Result type for inbound command handlers.
pub type HandlerResult = Result<(), HandlerError>;

// ============================================================================
// Configuration errors
// ============================================================================

/// Errors loading or validating the daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid mode tables: {0}")]
    Modes(#[from] svclink_proto::ModeTableError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_unwrapping() {
        let err = HandlerError::Fatal(LinkError::Remote("bye".into()));
        assert!(err.into_fatal().is_err());

        let err = HandlerError::Op(OpError::Uid(UidError::SpaceExhausted {
            sid: "0AL".into(),
        }));
        assert!(matches!(err.into_fatal(), Err(LinkError::Uid(_))));

        let err = HandlerError::Desync(DesyncError::UnknownUser("70MAAAAAB".into()));
        assert!(err.into_fatal().is_ok());
    }

    #[test]
    fn test_op_error_display() {
        let err = OpError::InvalidNick("123abc".into());
        assert_eq!(err.to_string(), "invalid nickname \"123abc\"");
    }
}
