//! Wire-line tokenization for the server-to-server dialect.
//!
//! Lines look like:
//!
//! ```text
//! :70M FJOIN #chat 1423790411 +nt :o,1SRAABIT4 v,1IOAAF53R
//! ```
//!
//! The first token, when it begins with `:`, names the originating
//! SID/UID. Any later token beginning with `:` starts the trailing
//! argument, which consumes the remainder of the line verbatim.

/// A tokenized wire line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireLine {
    /// Originating SID or UID, with the `:` marker stripped.
    ///
    /// `None` for unprefixed lines (handshake-time `SERVER`/`CAPAB`).
    pub source: Option<String>,
    /// Command name as received. Commands are matched case-insensitively;
    /// use [`WireLine::command_upper`] when dispatching.
    pub command: String,
    /// Positional arguments, with any trailing argument as the final entry.
    pub args: Vec<String>,
}

impl WireLine {
    /// Command name folded to uppercase for case-insensitive dispatch.
    pub fn command_upper(&self) -> String {
        self.command.to_ascii_uppercase()
    }
}

/// Tokenize one wire line.
///
/// Returns `None` when the line carries no command at all (empty line, or a
/// bare source prefix) - such lines are skipped, not errors.
pub fn tokenize(line: &str) -> Option<WireLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut rest = line.trim_start_matches(' ');
    if rest.is_empty() {
        return None;
    }

    let mut tokens: Vec<String> = Vec::new();
    let mut first = true;
    while !rest.is_empty() {
        if !first {
            if let Some(trailing) = rest.strip_prefix(':') {
                // Trailing argument: the rest of the line, verbatim.
                tokens.push(trailing.to_string());
                break;
            }
        }
        match rest.split_once(' ') {
            Some((tok, tail)) => {
                tokens.push(tok.to_string());
                rest = tail.trim_start_matches(' ');
            }
            None => {
                tokens.push(rest.to_string());
                rest = "";
            }
        }
        first = false;
    }

    let mut iter = tokens.into_iter();
    let head = iter.next()?;
    let (source, command) = match head.strip_prefix(':') {
        Some(src) => (Some(src.to_string()), iter.next()?),
        None => (None, head),
    };

    Some(WireLine {
        source,
        command,
        args: iter.collect(),
    })
}
