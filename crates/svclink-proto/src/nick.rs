//! Nickname validation utilities.
//!
//! Validation rules follow RFC 2812 nicknames as the dialect's uplinks
//! enforce them: a leading letter or "special" character, then letters,
//! digits, specials, or hyphens.

/// Extension trait for checking if a string is a valid IRC nickname.
pub trait NickExt {
    /// Check if this string is a valid IRC nickname.
    ///
    /// Valid nicknames:
    /// - First character: letter (a-z, A-Z) or special character `[\]^_`{|}`
    /// - Subsequent characters: letter, digit (0-9), special, or hyphen (-)
    /// - Maximum length: [`DEFAULT_NICK_MAX_LEN`] characters
    ///
    /// # Examples
    ///
    /// ```
    /// use svclink_proto::NickExt;
    ///
    /// assert!("nick".is_valid_nick());
    /// assert!("[cool]".is_valid_nick());
    ///
    /// assert!(!"123nick".is_valid_nick());  // Can't start with digit
    /// assert!(!"nick name".is_valid_nick()); // Contains space
    /// ```
    fn is_valid_nick(&self) -> bool;

    /// Check if this string is a valid IRC nickname with a custom max length.
    fn is_valid_nick_len(&self, max_len: usize) -> bool;
}

/// Default maximum nickname length; matches the NICKMAX we advertise in
/// capability negotiation.
pub const DEFAULT_NICK_MAX_LEN: usize = 32;

/// Check if a character is a "special" character allowed in nicknames.
///
/// Per RFC 2812: `[ ] \ ` ^ _ { | }`
#[inline]
fn is_special(c: char) -> bool {
    matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}')
}

impl NickExt for &str {
    fn is_valid_nick(&self) -> bool {
        self.is_valid_nick_len(DEFAULT_NICK_MAX_LEN)
    }

    fn is_valid_nick_len(&self, max_len: usize) -> bool {
        if self.is_empty() || self.len() > max_len {
            return false;
        }

        let mut chars = self.chars();

        let first = match chars.next() {
            Some(c) => c,
            None => return false,
        };

        if !first.is_ascii_alphabetic() && !is_special(first) {
            return false;
        }

        chars.all(|c| c.is_ascii_alphanumeric() || is_special(c) || c == '-')
    }
}

impl NickExt for String {
    fn is_valid_nick(&self) -> bool {
        self.as_str().is_valid_nick()
    }

    fn is_valid_nick_len(&self, max_len: usize) -> bool {
        self.as_str().is_valid_nick_len(max_len)
    }
}
