//! svclinkd - a service link daemon.
//!
//! svclinkd links to an IRC network's uplink server as a peer, mirrors the
//! network's user/channel/server state, and drives a service pseudoclient
//! whose commands come from a process-wide dispatch registry.
//!
//! The library crate exists so integration tests can drive a real
//! [`sync::Session`] against a scripted uplink; the `svclinkd` binary is a
//! thin wrapper around it.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod modes;
pub mod state;
pub mod sync;

pub use config::Config;
pub use dispatch::{CommandEffect, Dispatcher, HookPayload};
pub use error::{ConfigError, DesyncError, HandlerError, LinkError, OpError};
pub use state::{Network, UidGenerator};
pub use sync::{LinkState, Session};
