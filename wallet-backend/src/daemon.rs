use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coin::CoinParams;
use crate::errors::{WalletError, WalletResult};

/// Remote node the wallet library talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Daemon {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
}

impl Daemon {
    pub fn new(host: impl Into<String>, port: u16, ssl: bool) -> Self {
        Self {
            host: host.into(),
            port,
            ssl,
        }
    }

    /// Parse a `host[:port]` connection string as typed into the node changer.
    ///
    /// A missing port falls back to the default daemon port. The port is the
    /// only part that is validated.
    pub fn parse_connection_string(input: &str) -> WalletResult<Self> {
        let trimmed = input.trim();
        let mut parts = trimmed.splitn(2, ':');
        let host = parts.next().unwrap_or_default().trim();
        if host.is_empty() {
            return Err(WalletError::ValidationError(
                "Node host cannot be empty".to_string(),
            ));
        }

        let port = match parts.next() {
            Some(port) => parse_port(port)?,
            None => CoinParams::DEFAULT_DAEMON_PORT,
        };

        Ok(Self::new(host, port, false))
    }

    /// True when `other` points at the same host and port.
    pub fn same_endpoint(&self, other: &Daemon) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl fmt::Display for Daemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Default for Daemon {
    fn default() -> Self {
        CoinParams::default().default_daemon
    }
}

/// Leading digits are accepted the way the node changer accepts them (`"14001abc"` → 14001).
pub fn parse_port(input: &str) -> WalletResult<u16> {
    let digits: String = input
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return Err(crate::wallet_error!(InvalidPort, input.trim()));
    }
    digits
        .parse::<u16>()
        .map_err(|_| crate::wallet_error!(InvalidPort, input.trim()))
}

/// Connection details reported by the wallet library after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConnectionInfo {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    #[serde(default)]
    pub ssl_detected: bool,
    #[serde(default)]
    pub daemon_type: String,
    #[serde(default)]
    pub daemon_type_detected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_and_port() {
        let daemon = Daemon::parse_connection_string(" node.example.org:11898 ").unwrap();
        assert_eq!(daemon, Daemon::new("node.example.org", 11898, false));
    }

    #[test]
    fn missing_port_uses_default() {
        let daemon = Daemon::parse_connection_string("node.example.org").unwrap();
        assert_eq!(daemon.port, CoinParams::DEFAULT_DAEMON_PORT);
    }

    #[test]
    fn non_numeric_port_rejected() {
        let err = Daemon::parse_connection_string("node.example.org:abc").unwrap_err();
        assert!(matches!(err, WalletError::InvalidPort(p) if p == "abc"));
        assert!(Daemon::parse_connection_string(":14001").is_err());
        assert!(Daemon::parse_connection_string("host:70000").is_err());
    }

    #[test]
    fn leading_digits_accepted() {
        assert_eq!(parse_port("14001abc").unwrap(), 14001);
    }

    #[test]
    fn same_endpoint_ignores_ssl() {
        let a = Daemon::new("h", 1, true);
        let b = Daemon::new("h", 1, false);
        assert!(a.same_endpoint(&b));
        assert_eq!(a.to_string(), "h:1");
    }
}
