//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions and loading (Config, NetworkConfig)
//! - [`uplink`]: Uplink connection configuration (UplinkBlock)
//! - [`modes`]: Per-network mode capability table overrides (ModeTableConfig)

mod modes;
mod types;
mod uplink;

pub use modes::{ModeTableConfig, PrefixEntry};
pub use types::{BotBlock, Config, NetworkConfig, ServerBlock};
pub use uplink::UplinkBlock;
