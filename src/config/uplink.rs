//! Uplink connection configuration.

use serde::Deserialize;

fn default_true() -> bool {
    true
}

/// Where and how to reach the network's uplink server.
#[derive(Debug, Clone, Deserialize)]
pub struct UplinkBlock {
    /// Uplink IP/hostname to connect to.
    pub hostname: String,
    /// Uplink port.
    pub port: u16,
    /// Password we send in our SERVER introduction.
    pub send_password: String,
    /// Password we require in the uplink's SERVER introduction.
    pub recv_password: String,
    /// Whether to use TLS for this link.
    #[serde(default)]
    pub tls: bool,
    /// Whether to verify the uplink certificate (only applies when tls = true).
    /// Defaults to true. Set to false only for testing or self-signed certs.
    #[serde(default = "default_true")]
    pub verify_cert: bool,
}
