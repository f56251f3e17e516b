//! Mode grammar tables and mode-change serialization.
//!
//! IRC mode letters fall into four parameter-arity classes, advertised by
//! servers as `CHANMODES=A,B,C,D`:
//!
//! - **A** - list mode; always takes a parameter, multiple entries with
//!   distinct parameters coexist (e.g. ban masks).
//! - **B** - setting; always takes a parameter, one entry per letter.
//! - **C** - setting; parameter only when being set.
//! - **D** - flag; never takes a parameter.
//!
//! Prefix modes (op, voice, ...) grant a status to a member rather than
//! changing a channel-wide setting. They share the wire letter namespace
//! with channel modes but are tracked separately.
//!
//! Which letter belongs to which class is per-network configuration, so the
//! tables here are data, not code.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

/// Direction of a mode change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModeSign {
    /// The mode is being set (`+`).
    Plus,
    /// The mode is being unset (`-`).
    Minus,
}

impl ModeSign {
    /// The opposite sign.
    pub fn flip(self) -> Self {
        match self {
            Self::Plus => Self::Minus,
            Self::Minus => Self::Plus,
        }
    }
}

impl fmt::Display for ModeSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
        }
    }
}

/// A single signed mode change with its optional argument.
///
/// Parsed mode strings become ordered sequences of these; the order is
/// significant and preserved through serialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeChange {
    /// Whether the mode is being set or unset.
    pub sign: ModeSign,
    /// The mode letter.
    pub letter: char,
    /// The consumed argument, if the letter's class takes one.
    pub arg: Option<String>,
}

impl ModeChange {
    /// Convenience constructor.
    pub fn new(sign: ModeSign, letter: char, arg: Option<&str>) -> Self {
        Self {
            sign,
            letter,
            arg: arg.map(String::from),
        }
    }

    /// A `+letter [arg]` change.
    pub fn set(letter: char, arg: Option<&str>) -> Self {
        Self::new(ModeSign::Plus, letter, arg)
    }

    /// A `-letter [arg]` change.
    pub fn unset(letter: char, arg: Option<&str>) -> Self {
        Self::new(ModeSign::Minus, letter, arg)
    }

    /// The unsigned `(letter, argument)` pair, as stored on a target.
    pub fn pair(&self) -> (char, Option<String>) {
        (self.letter, self.arg.clone())
    }
}

impl fmt::Display for ModeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.sign, self.letter)?;
        if let Some(arg) = &self.arg {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Parameter-arity class of a mode letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeClass {
    /// Class A: list mode, always parameterized, multi-valued.
    List,
    /// Class B: setting, always parameterized, single-valued.
    Setting,
    /// Class C: setting, parameterized only when set.
    SettingParamWhenSet,
    /// Class D: flag, never parameterized.
    Flag,
}

/// A prefix (status) mode: a role name, its mode letter, and the symbol
/// shown before nicknames holding it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixMode {
    /// Role name, e.g. `"op"` or `"voice"`.
    pub name: String,
    /// Mode letter on the wire, e.g. `'o'`.
    pub letter: char,
    /// Display symbol, e.g. `'@'`.
    pub symbol: char,
}

impl PrefixMode {
    /// Convenience constructor.
    pub fn new(name: &str, letter: char, symbol: char) -> Self {
        Self {
            name: name.to_string(),
            letter,
            symbol,
        }
    }
}

/// Errors building a mode table from configuration.
#[derive(Debug, Error)]
pub enum ModeTableError {
    /// A letter was assigned to more than one class of the same table.
    #[error("mode letter '{0}' appears in more than one class")]
    OverlappingClasses(char),
    /// A prefix letter collides with a channel mode class.
    #[error("prefix mode letter '{0}' also appears in a channel mode class")]
    PrefixCollision(char),
    /// Two prefix entries share a letter or role name.
    #[error("duplicate prefix mode entry for '{0}'")]
    DuplicatePrefix(String),
}

/// Per-network mode capability tables.
///
/// Loaded once at link time and immutable thereafter.
#[derive(Clone, Debug)]
pub struct ModeTables {
    chan_list: BTreeSet<char>,
    chan_setting: BTreeSet<char>,
    chan_setting_param_when_set: BTreeSet<char>,
    chan_flag: BTreeSet<char>,
    user_list: BTreeSet<char>,
    user_setting: BTreeSet<char>,
    user_setting_param_when_set: BTreeSet<char>,
    user_flag: BTreeSet<char>,
    prefixes: Vec<PrefixMode>,
}

impl ModeTables {
    /// Build a table set from class letter strings.
    ///
    /// `chan` and `user` are the four class strings in A, B, C, D order.
    /// Fails if a letter appears in more than one class of the same table,
    /// or a prefix letter collides with a channel class.
    pub fn new(
        chan: [&str; 4],
        user: [&str; 4],
        prefixes: Vec<PrefixMode>,
    ) -> Result<Self, ModeTableError> {
        let tables = Self {
            chan_list: chan[0].chars().collect(),
            chan_setting: chan[1].chars().collect(),
            chan_setting_param_when_set: chan[2].chars().collect(),
            chan_flag: chan[3].chars().collect(),
            user_list: user[0].chars().collect(),
            user_setting: user[1].chars().collect(),
            user_setting_param_when_set: user[2].chars().collect(),
            user_flag: user[3].chars().collect(),
            prefixes,
        };
        tables.validate()?;
        Ok(tables)
    }

    /// The default tables for the InspIRCd-style dialect we link with.
    pub fn inspircd() -> Self {
        Self {
            chan_list: "beI".chars().collect(),
            chan_setting: "k".chars().collect(),
            chan_setting_param_when_set: "fjl".chars().collect(),
            chan_flag: "cimnprstzCDKMNOPRST".chars().collect(),
            user_list: BTreeSet::new(),
            user_setting: BTreeSet::new(),
            user_setting_param_when_set: "s".chars().collect(),
            user_flag: "iorwxBDHIRSW".chars().collect(),
            prefixes: vec![
                PrefixMode::new("founder", 'q', '~'),
                PrefixMode::new("admin", 'a', '&'),
                PrefixMode::new("op", 'o', '@'),
                PrefixMode::new("halfop", 'h', '%'),
                PrefixMode::new("voice", 'v', '+'),
            ],
        }
    }

    fn validate(&self) -> Result<(), ModeTableError> {
        for sets in [
            [
                &self.chan_list,
                &self.chan_setting,
                &self.chan_setting_param_when_set,
                &self.chan_flag,
            ],
            [
                &self.user_list,
                &self.user_setting,
                &self.user_setting_param_when_set,
                &self.user_flag,
            ],
        ] {
            let mut seen = BTreeSet::new();
            for set in sets {
                for &c in set {
                    if !seen.insert(c) {
                        return Err(ModeTableError::OverlappingClasses(c));
                    }
                }
            }
        }

        let mut names = BTreeSet::new();
        let mut letters = BTreeSet::new();
        for p in &self.prefixes {
            if !names.insert(p.name.clone()) || !letters.insert(p.letter) {
                return Err(ModeTableError::DuplicatePrefix(p.name.clone()));
            }
            if self.chan_class(p.letter).is_some() {
                return Err(ModeTableError::PrefixCollision(p.letter));
            }
        }
        Ok(())
    }

    /// Class of a channel mode letter, if known. Prefix letters are not
    /// channel modes and return `None` here.
    pub fn chan_class(&self, c: char) -> Option<ModeClass> {
        if self.chan_list.contains(&c) {
            Some(ModeClass::List)
        } else if self.chan_setting.contains(&c) {
            Some(ModeClass::Setting)
        } else if self.chan_setting_param_when_set.contains(&c) {
            Some(ModeClass::SettingParamWhenSet)
        } else if self.chan_flag.contains(&c) {
            Some(ModeClass::Flag)
        } else {
            None
        }
    }

    /// Class of a user mode letter, if known.
    pub fn user_class(&self, c: char) -> Option<ModeClass> {
        if self.user_list.contains(&c) {
            Some(ModeClass::List)
        } else if self.user_setting.contains(&c) {
            Some(ModeClass::Setting)
        } else if self.user_setting_param_when_set.contains(&c) {
            Some(ModeClass::SettingParamWhenSet)
        } else if self.user_flag.contains(&c) {
            Some(ModeClass::Flag)
        } else {
            None
        }
    }

    /// All configured prefix modes, in precedence order.
    pub fn prefixes(&self) -> &[PrefixMode] {
        &self.prefixes
    }

    /// Look up a prefix mode by its wire letter.
    pub fn prefix_by_letter(&self, c: char) -> Option<&PrefixMode> {
        self.prefixes.iter().find(|p| p.letter == c)
    }

    /// Look up a prefix mode by its role name.
    pub fn prefix_by_name(&self, name: &str) -> Option<&PrefixMode> {
        self.prefixes.iter().find(|p| p.name == name)
    }

    /// Channel mode letters in class A (list modes).
    pub fn chan_list_letters(&self) -> &BTreeSet<char> {
        &self.chan_list
    }

    /// Channel mode letters in class B (parameterized settings).
    pub fn chan_setting_letters(&self) -> &BTreeSet<char> {
        &self.chan_setting
    }

    /// Channel mode letters in class C (parameter only when set).
    pub fn chan_param_when_set_letters(&self) -> &BTreeSet<char> {
        &self.chan_setting_param_when_set
    }

    /// Channel mode letters in class D (flags).
    pub fn chan_flag_letters(&self) -> &BTreeSet<char> {
        &self.chan_flag
    }

    /// User mode letters in class D (flags).
    pub fn user_flag_letters(&self) -> &BTreeSet<char> {
        &self.user_flag
    }

    /// User mode letters in class A (list modes).
    pub fn user_list_letters(&self) -> &BTreeSet<char> {
        &self.user_list
    }

    /// User mode letters in class B (parameterized settings).
    pub fn user_setting_letters(&self) -> &BTreeSet<char> {
        &self.user_setting
    }

    /// User mode letters in class C (parameter only when set).
    pub fn user_param_when_set_letters(&self) -> &BTreeSet<char> {
        &self.user_setting_param_when_set
    }
}

impl Default for ModeTables {
    fn default() -> Self {
        Self::inspircd()
    }
}

/// Serialize an ordered sequence of mode changes into a compact
/// mode-change string.
///
/// A sign marker is only re-emitted when it differs from the previous
/// entry's sign, so `+n +t -l -k key` serializes as `+nt-lk key` rather
/// than `+n+t-l-k key`. Arguments are appended space-joined in encounter
/// order. An empty sequence yields an empty string.
pub fn join_modes(ops: &[ModeChange]) -> String {
    let mut modestring = String::new();
    let mut args: Vec<&str> = Vec::new();
    let mut prev: Option<ModeSign> = None;

    for op in ops {
        if prev != Some(op.sign) {
            modestring.push_str(&op.sign.to_string());
            prev = Some(op.sign);
        }
        modestring.push(op.letter);
        if let Some(arg) = &op.arg {
            args.push(arg);
        }
    }

    if !args.is_empty() {
        modestring.push(' ');
        modestring.push_str(&args.join(" "));
    }
    modestring
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_classes() {
        let t = ModeTables::inspircd();
        assert_eq!(t.chan_class('b'), Some(ModeClass::List));
        assert_eq!(t.chan_class('k'), Some(ModeClass::Setting));
        assert_eq!(t.chan_class('l'), Some(ModeClass::SettingParamWhenSet));
        assert_eq!(t.chan_class('m'), Some(ModeClass::Flag));
        // Prefix letters are not channel modes.
        assert_eq!(t.chan_class('o'), None);
        assert!(t.prefix_by_letter('o').is_some());

        assert_eq!(t.user_class('i'), Some(ModeClass::Flag));
        assert_eq!(t.user_class('s'), Some(ModeClass::SettingParamWhenSet));
    }

    #[test]
    fn test_prefix_lookups() {
        let t = ModeTables::inspircd();
        let op = t.prefix_by_name("op").unwrap();
        assert_eq!(op.letter, 'o');
        assert_eq!(op.symbol, '@');
        assert_eq!(t.prefix_by_letter('v').unwrap().name, "voice");
        assert!(t.prefix_by_letter('z').is_none());
    }

    #[test]
    fn test_overlapping_classes_rejected() {
        let err = ModeTables::new(["b", "b", "", ""], ["", "", "", ""], vec![]);
        assert!(matches!(err, Err(ModeTableError::OverlappingClasses('b'))));
    }

    #[test]
    fn test_prefix_collision_rejected() {
        let err = ModeTables::new(
            ["", "", "", "o"],
            ["", "", "", ""],
            vec![PrefixMode::new("op", 'o', '@')],
        );
        assert!(matches!(err, Err(ModeTableError::PrefixCollision('o'))));
    }

    #[test]
    fn test_join_modes_compacts_sign_runs() {
        let ops = vec![
            ModeChange::set('n', None),
            ModeChange::set('t', None),
            ModeChange::unset('l', None),
            ModeChange::unset('k', Some("key")),
        ];
        assert_eq!(join_modes(&ops), "+nt-lk key");
    }

    #[test]
    fn test_join_modes_args_in_order() {
        let ops = vec![
            ModeChange::set('m', None),
            ModeChange::set('i', None),
            ModeChange::set('t', None),
            ModeChange::set('l', Some("3")),
            ModeChange::unset('o', Some("person")),
        ];
        assert_eq!(join_modes(&ops), "+mitl-o 3 person");
    }

    #[test]
    fn test_join_modes_empty() {
        assert_eq!(join_modes(&[]), "");
    }

    #[test]
    fn test_mode_change_display() {
        assert_eq!(ModeChange::set('o', Some("nick")).to_string(), "+o nick");
        assert_eq!(ModeChange::unset('i', None).to_string(), "-i");
    }
}
