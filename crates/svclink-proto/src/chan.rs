//! Channel name utilities.

/// Maximum channel name length; matches the CHANMAX we advertise in
/// capability negotiation.
pub const DEFAULT_CHAN_MAX_LEN: usize = 64;

/// Extension trait for checking if a string is a valid IRC channel name.
pub trait ChannelExt {
    /// Check if this string is a valid channel name on this dialect.
    ///
    /// Valid channel names:
    /// - Start with `#`
    /// - Do not contain space, comma, or control characters
    /// - Are at most [`DEFAULT_CHAN_MAX_LEN`] characters long
    fn is_channel_name(&self) -> bool;
}

impl ChannelExt for &str {
    fn is_channel_name(&self) -> bool {
        let mut chars = self.chars();

        match chars.next() {
            Some('#') => {}
            _ => return false,
        }

        if self.chars().count() > DEFAULT_CHAN_MAX_LEN {
            return false;
        }

        for c in chars {
            if c == ' ' || c == ',' || c.is_control() {
                return false;
            }
        }

        true
    }
}

impl ChannelExt for String {
    fn is_channel_name(&self) -> bool {
        self.as_str().is_channel_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_channels() {
        assert!("#channel".is_channel_name());
        assert!("#a".is_channel_name());
        assert!("#chan-nel[1]".is_channel_name());
    }

    #[test]
    fn test_invalid_channels() {
        assert!(!"channel".is_channel_name()); // no prefix
        assert!(!"&local".is_channel_name()); // not a shared channel
        assert!(!"#chan nel".is_channel_name()); // space
        assert!(!"#chan,nel".is_channel_name()); // comma
        assert!(!"".is_channel_name()); // empty
    }

    #[test]
    fn test_length_limit() {
        let name = format!("#{}", "a".repeat(DEFAULT_CHAN_MAX_LEN - 1));
        assert!(name.is_channel_name());
        let name = format!("#{}", "a".repeat(DEFAULT_CHAN_MAX_LEN));
        assert!(!name.is_channel_name());
    }
}
