//! # svclink-proto
//!
//! Protocol primitives shared by the svclinkd session core.
//!
//! This crate holds the pieces of the server-to-server dialect that do not
//! depend on session state:
//!
//! - Wire-line tokenization (source prefix, command, trailing argument)
//! - IRC casemapping (`rfc1459` and `ascii`)
//! - Nickname and channel name validation
//! - Mode grammar tables (parameter-arity classes, prefix modes) and
//!   mode-change serialization

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod chan;
pub mod line;
pub mod mode;
pub mod nick;

pub use self::casemap::Casemapping;
pub use self::chan::ChannelExt;
pub use self::line::WireLine;
pub use self::mode::{
    join_modes, ModeChange, ModeClass, ModeSign, ModeTableError, ModeTables, PrefixMode,
};
pub use self::nick::{NickExt, DEFAULT_NICK_MAX_LEN};
