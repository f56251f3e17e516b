//! The mode engine: parsing, applying, and inverting mode changes against
//! the network mirror.
//!
//! Parsing and inversion need live state (current mode arguments, nick
//! resolution), so they live here rather than in `svclink-proto`; the
//! grammar tables and string serialization they build on come from that
//! crate.

use std::collections::BTreeSet;

use svclink_proto::{ChannelExt, ModeChange, ModeClass, ModeSign, ModeTables};
use tracing::{debug, warn};

use crate::state::Network;

pub use svclink_proto::mode::join_modes as serialize;

/// The unsigned `(letter, argument)` pairs a target currently carries.
pub type ModeSet = BTreeSet<(char, Option<String>)>;

/// Parse a raw mode-change token list against a target.
///
/// `tokens[0]` is the mode-change string; remaining tokens are positional
/// arguments consumed left to right. An argument is consumed iff the mode
/// is class A or B, a prefix mode on a channel target, or class C being
/// set. Unsetting a class-B mode with the literal argument `*` substitutes
/// the recorded argument on the target, when one exists.
///
/// A mode entry whose required argument is unavailable is dropped (logged)
/// without aborting the rest of the string. An unknown target yields an
/// empty result.
pub fn parse(net: &Network, target: &str, tokens: &[&str]) -> Vec<ModeChange> {
    let Some((modestring, rest)) = tokens.split_first() else {
        return Vec::new();
    };
    let is_channel = target.is_channel_name();

    let old_modes: ModeSet = if is_channel {
        match net.channel(target) {
            Some(chan) => chan.modes.clone(),
            None => {
                warn!(
                    network = %net.name,
                    target = %target,
                    "possible desync: mode target is not in the channel index"
                );
                return Vec::new();
            }
        }
    } else {
        match net.users.get(target) {
            Some(user) => user.modes.clone(),
            None => {
                warn!(
                    network = %net.name,
                    target = %target,
                    "possible desync: mode target is not in the user index"
                );
                return Vec::new();
            }
        }
    };

    let mut args = rest.iter();
    let mut sign = ModeSign::Plus;
    let mut res = Vec::new();

    for c in modestring.chars() {
        match c {
            '+' => sign = ModeSign::Plus,
            '-' => sign = ModeSign::Minus,
            letter => {
                let class = if is_channel {
                    net.tables.chan_class(letter)
                } else {
                    net.tables.user_class(letter)
                };
                let is_prefix = is_channel && net.tables.prefix_by_letter(letter).is_some();

                let arg: Option<String>;
                if matches!(class, Some(ModeClass::List) | Some(ModeClass::Setting)) {
                    // Must have a parameter.
                    match args.next() {
                        Some(raw) => {
                            let mut value = (*raw).to_string();
                            if sign == ModeSign::Minus
                                && class == Some(ModeClass::Setting)
                                && value == "*"
                            {
                                // Some networks permit unsetting a keyed mode
                                // without knowing the key by sending "*"; use
                                // the argument we recorded for it.
                                if let Some((_, Some(old))) =
                                    old_modes.iter().find(|(l, a)| *l == letter && a.is_some())
                                {
                                    debug!(mode = %letter, arg = %old, "coercing '*' argument to recorded value");
                                    value = old.clone();
                                }
                            }
                            arg = Some(value);
                        }
                        None => {
                            warn!(
                                network = %net.name,
                                target = %target,
                                mode = %letter,
                                modestring = %modestring,
                                "mode requires an argument but none was found; dropping entry"
                            );
                            continue;
                        }
                    }
                } else if is_prefix {
                    // Prefix mode: the argument is a nickname, resolved to a
                    // UID. If the target doesn't resolve, drop the whole
                    // entry, not just the argument.
                    match args.next() {
                        Some(raw) => {
                            let resolved = net.nick_to_uid(raw).or_else(|| {
                                net.users.contains_key(*raw).then(|| (*raw).to_string())
                            });
                            match resolved {
                                Some(uid) => arg = Some(uid),
                                None => {
                                    debug!(
                                        network = %net.name,
                                        mode = %letter,
                                        arg = %raw,
                                        "skipping prefix mode: target doesn't seem to exist"
                                    );
                                    continue;
                                }
                            }
                        }
                        None => {
                            warn!(
                                network = %net.name,
                                target = %target,
                                mode = %letter,
                                "prefix mode requires a nickname but none was found; dropping entry"
                            );
                            continue;
                        }
                    }
                } else if sign == ModeSign::Plus && class == Some(ModeClass::SettingParamWhenSet) {
                    // Only has a parameter when being set.
                    match args.next() {
                        Some(raw) => arg = Some((*raw).to_string()),
                        None => {
                            warn!(
                                network = %net.name,
                                target = %target,
                                mode = %letter,
                                "mode requires an argument when set but none was found; dropping entry"
                            );
                            continue;
                        }
                    }
                } else {
                    arg = None;
                }

                res.push(ModeChange { sign, letter, arg });
            }
        }
    }
    res
}

/// Apply parsed mode changes to a target's mode state.
///
/// For channels, prefix modes route into the role membership sets and
/// never touch the general mode set. Setting a parameterized non-list mode
/// replaces any existing pair with the same letter and a different
/// argument; unsetting without an argument removes every pair sharing the
/// letter, unsetting with an argument removes only the exact pair.
pub fn apply(net: &mut Network, target: &str, ops: &[ModeChange]) {
    let is_channel = target.is_channel_name();
    let tables = net.tables.clone();

    if is_channel {
        let name = net.name.clone();
        let Some(chan) = net.channel_mut(target) else {
            warn!(network = %name, target = %target, "possible desync: mode target is unknown");
            return;
        };
        for op in ops {
            if let Some(prefix) = tables.prefix_by_letter(op.letter) {
                if let Some(uid) = &op.arg {
                    match op.sign {
                        ModeSign::Plus => chan.grant_role(&prefix.name, uid),
                        ModeSign::Minus => chan.revoke_role(&prefix.name, uid),
                    }
                }
                continue;
            }
            apply_to_set(&mut chan.modes, op, tables.chan_list_letters());
        }
    } else {
        let name = net.name.clone();
        let Some(user) = net.users.get_mut(target) else {
            warn!(network = %name, target = %target, "possible desync: mode target is unknown");
            return;
        };
        let no_list_modes = BTreeSet::new();
        for op in ops {
            apply_to_set(&mut user.modes, op, &no_list_modes);
        }
    }
}

fn apply_to_set(modes: &mut ModeSet, op: &ModeChange, list_letters: &BTreeSet<char>) {
    match op.sign {
        ModeSign::Plus => {
            if op.arg.is_some() && !list_letters.contains(&op.letter) {
                // Single-valued parameterized mode: the new value replaces
                // any old pair using the same letter.
                modes.retain(|(l, a)| *l != op.letter || *a == op.arg);
            }
            modes.insert(op.pair());
        }
        ModeSign::Minus => match &op.arg {
            None => {
                modes.retain(|(l, _)| *l != op.letter);
            }
            Some(_) => {
                modes.remove(&op.pair());
            }
        },
    }
}

/// Snapshot a target's full mode state, suitable as the `reference` for
/// [`invert`]. For channels this includes the prefix-mode grants as
/// `(letter, uid)` pairs.
pub fn snapshot(net: &Network, target: &str) -> ModeSet {
    if target.is_channel_name() {
        match net.channel(target) {
            Some(chan) => {
                let mut set = chan.modes.clone();
                for (role, holders) in &chan.prefix_modes {
                    if let Some(prefix) = net.tables.prefix_by_name(role) {
                        for uid in holders {
                            set.insert((prefix.letter, Some(uid.clone())));
                        }
                    }
                }
                set
            }
            None => ModeSet::new(),
        }
    } else {
        net.users
            .get(target)
            .map(|u| u.modes.clone())
            .unwrap_or_default()
    }
}

/// Compute the operations that undo `ops` relative to `reference`, or to
/// the target's live state when no reference is given.
///
/// For parameterized settings (classes B and C) the inverse of a set
/// restores the previously recorded argument when one existed, as a full
/// replace rather than a bare unset. Operations that are no-ops relative
/// to the reference (setting a value already set, or unsetting a
/// list/prefix entry that was never present) produce no inverse.
pub fn invert(
    net: &Network,
    target: &str,
    ops: &[ModeChange],
    reference: Option<&ModeSet>,
) -> Vec<ModeChange> {
    let is_channel = target.is_channel_name();
    let old_modes: ModeSet = match reference {
        Some(set) => set.clone(),
        None => snapshot(net, target),
    };

    // Letters that behave like list modes for the never-set check; for
    // channels this includes the prefix letters.
    let (setting, param_when_set, list_like) = mode_class_sets(&net.tables, is_channel);

    let mut res = Vec::new();
    for op in ops {
        let letter = op.letter;
        let inverse = if setting.contains(&letter) || param_when_set.contains(&letter) {
            // Restore the recorded argument when there was one, so e.g.
            // inverting "+l 30" over an existing "+l 50" yields "+l 50",
            // not "-l".
            match old_modes.iter().find(|(l, _)| *l == letter) {
                Some((_, old_arg)) => ModeChange {
                    sign: ModeSign::Plus,
                    letter,
                    arg: old_arg.clone(),
                },
                None => {
                    let mut arg = op.arg.clone();
                    if param_when_set.contains(&letter) && op.sign == ModeSign::Plus {
                        // Takes no argument when unsetting.
                        arg = None;
                    }
                    ModeChange {
                        sign: op.sign.flip(),
                        letter,
                        arg,
                    }
                }
            }
        } else {
            ModeChange {
                sign: op.sign.flip(),
                letter,
                arg: op.arg.clone(),
            }
        };

        if op.sign == ModeSign::Plus && old_modes.contains(&op.pair()) {
            debug!(op = %op, "skipping inverse: mode already set");
            continue;
        }
        if op.sign == ModeSign::Minus
            && !old_modes.contains(&op.pair())
            && list_like.contains(&letter)
        {
            debug!(op = %op, "skipping inverse: entry was never set");
            continue;
        }
        res.push(inverse);
    }
    res
}

fn mode_class_sets(
    tables: &ModeTables,
    is_channel: bool,
) -> (BTreeSet<char>, BTreeSet<char>, BTreeSet<char>) {
    if is_channel {
        let setting = tables.chan_setting_letters().clone();
        let param_when_set = tables.chan_param_when_set_letters().clone();
        let mut list_like = tables.chan_list_letters().clone();
        list_like.extend(tables.prefixes().iter().map(|p| p.letter));
        (setting, param_when_set, list_like)
    } else {
        (
            tables.user_setting_letters().clone(),
            tables.user_param_when_set_letters().clone(),
            tables.user_list_letters().clone(),
        )
    }
}
