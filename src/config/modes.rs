//! Per-network mode capability table configuration.
//!
//! The mode grammar is configuration, not code: which letters fall into
//! which parameter-arity class varies per network. When a `[networks.modes]`
//! section is present, each given field replaces the corresponding class of
//! the built-in InspIRCd-flavoured defaults.

use serde::Deserialize;
use svclink_proto::{ModeTableError, ModeTables, PrefixMode};

/// One prefix (status) mode entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PrefixEntry {
    /// Role name, e.g. "op".
    pub name: String,
    /// Mode letter on the wire, e.g. "o".
    pub letter: char,
    /// Display symbol, e.g. "@".
    pub symbol: char,
}

/// Overrides for the mode capability tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModeTableConfig {
    /// Class A channel modes (list; always parameterized, multi-valued).
    pub chan_list: Option<String>,
    /// Class B channel modes (setting; always parameterized).
    pub chan_setting: Option<String>,
    /// Class C channel modes (setting; parameterized only when set).
    pub chan_param_when_set: Option<String>,
    /// Class D channel modes (flag; never parameterized).
    pub chan_flag: Option<String>,
    /// Class A user modes.
    pub user_list: Option<String>,
    /// Class B user modes.
    pub user_setting: Option<String>,
    /// Class C user modes.
    pub user_param_when_set: Option<String>,
    /// Class D user modes.
    pub user_flag: Option<String>,
    /// Prefix mode table. Replaces the default table entirely when given.
    pub prefixes: Option<Vec<PrefixEntry>>,
}

impl ModeTableConfig {
    /// Build the session's tables, overlaying any configured classes on the
    /// defaults.
    pub fn build(&self) -> Result<ModeTables, ModeTableError> {
        let defaults = ModeTables::inspircd();

        let letters = |over: &Option<String>, set: &std::collections::BTreeSet<char>| -> String {
            match over {
                Some(s) => s.clone(),
                None => set.iter().collect(),
            }
        };

        let chan = [
            letters(&self.chan_list, defaults.chan_list_letters()),
            letters(&self.chan_setting, defaults.chan_setting_letters()),
            letters(&self.chan_param_when_set, defaults.chan_param_when_set_letters()),
            letters(&self.chan_flag, defaults.chan_flag_letters()),
        ];
        let user = [
            letters(&self.user_list, defaults.user_list_letters()),
            letters(&self.user_setting, defaults.user_setting_letters()),
            letters(&self.user_param_when_set, defaults.user_param_when_set_letters()),
            letters(&self.user_flag, defaults.user_flag_letters()),
        ];
        let prefixes = match &self.prefixes {
            Some(entries) => entries
                .iter()
                .map(|e| PrefixMode::new(&e.name, e.letter, e.symbol))
                .collect(),
            None => defaults.prefixes().to_vec(),
        };

        ModeTables::new(
            [&chan[0], &chan[1], &chan[2], &chan[3]].map(|s| s.as_str()),
            [&user[0], &user[1], &user[2], &user[3]].map(|s| s.as_str()),
            prefixes,
        )
    }
}
