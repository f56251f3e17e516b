//! Core configuration types and loading.

use std::path::Path;

use serde::Deserialize;
use svclink_proto::{Casemapping, ChannelExt, NickExt};

use crate::config::{ModeTableConfig, UplinkBlock};
use crate::error::ConfigError;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// One session is run per network block.
    pub networks: Vec<NetworkConfig>,
}

/// Configuration for one network session.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Network name, used in log output.
    pub name: String,
    /// Our server identity on this network.
    pub server: ServerBlock,
    /// How to reach the uplink.
    pub uplink: UplinkBlock,
    /// The service pseudoclient.
    pub bot: BotBlock,
    /// Case-folding rule for nick/channel comparison.
    #[serde(default)]
    pub casemapping: Casemapping,
    /// Mode capability table overrides.
    #[serde(default)]
    pub modes: ModeTableConfig,
}

/// Our own server identity as introduced to the uplink.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerBlock {
    /// Server name (e.g., "services.example.net").
    pub name: String,
    /// Three-character server ID.
    pub sid: String,
    /// Server description.
    pub description: String,
}

/// The service pseudoclient presented to the network.
#[derive(Debug, Clone, Deserialize)]
pub struct BotBlock {
    /// Nickname.
    pub nick: String,
    /// Ident (username).
    pub ident: String,
    /// Realname / gecos.
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Channels the pseudoclient sits in.
    #[serde(default)]
    pub channels: Vec<String>,
}

fn default_realname() -> String {
    "svclink service".to_string()
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.networks.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[networks]] block is required".into(),
            ));
        }
        for net in &self.networks {
            net.validate()?;
        }
        Ok(())
    }
}

impl NetworkConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let sid = &self.server.sid;
        if sid.len() != 3 || !sid.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid(format!(
                "network {:?}: SID must be exactly three alphanumeric characters, got {:?}",
                self.name, sid
            )));
        }
        for (label, pass) in [
            ("send_password", &self.uplink.send_password),
            ("recv_password", &self.uplink.recv_password),
        ] {
            if pass.is_empty() || pass == "changeme" {
                return Err(ConfigError::Invalid(format!(
                    "network {:?}: {} is not set; refusing to link with a default credential",
                    self.name, label
                )));
            }
        }
        if !self.bot.nick.as_str().is_valid_nick() {
            return Err(ConfigError::Invalid(format!(
                "network {:?}: invalid bot nick {:?}",
                self.name, self.bot.nick
            )));
        }
        for chan in &self.bot.channels {
            if !chan.as_str().is_channel_name() {
                return Err(ConfigError::Invalid(format!(
                    "network {:?}: invalid channel name {:?}",
                    self.name, chan
                )));
            }
        }
        // Surface bad mode tables at startup rather than at link time.
        self.modes.build()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GOOD: &str = r##"
[[networks]]
name = "testnet"

[networks.server]
name = "services.test.net"
sid = "0AL"
description = "Test services"

[networks.uplink]
hostname = "127.0.0.1"
port = 7000
send_password = "sekrit-out"
recv_password = "sekrit-in"

[networks.bot]
nick = "TestServ"
ident = "testserv"
channels = ["#services"]
"##;

    #[test]
    fn test_load_good_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(GOOD.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.networks.len(), 1);
        let net = &config.networks[0];
        assert_eq!(net.server.sid, "0AL");
        assert_eq!(net.casemapping, Casemapping::Rfc1459);
        assert!(!net.uplink.tls);
        assert!(net.uplink.verify_cert);
    }

    #[test]
    fn test_default_credential_rejected() {
        let bad = GOOD.replace("sekrit-out", "changeme");
        let config: Config = toml::from_str(&bad).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_sid_rejected() {
        let bad = GOOD.replace("\"0AL\"", "\"0ALX\"");
        let config: Config = toml::from_str(&bad).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_channel_rejected() {
        let bad = GOOD.replace("\"#services\"", "\"services\"");
        let config: Config = toml::from_str(&bad).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_casemapping_parse() {
        let with_cm = GOOD.replace(
            "name = \"testnet\"",
            "name = \"testnet\"\ncasemapping = \"ascii\"",
        );
        let config: Config = toml::from_str(&with_cm).unwrap();
        assert_eq!(config.networks[0].casemapping, Casemapping::Ascii);
    }
}
