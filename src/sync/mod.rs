//! The protocol session: server-to-server link handling.
//!
//! This module owns the socket, the handshake and burst sequence, the
//! sequential read loop, and the inbound command handlers that keep the
//! network mirror synchronized. Outbound pseudoclient operations live in
//! [`client`].

pub mod client;
mod commands;
pub mod handshake;
pub mod session;
pub mod stream;

pub use handshake::LinkState;
pub use session::Session;
