use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

/// Failure to parse a canonical `host_port` address string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    /// No `_` separator between host and port
    #[error("address '{0}' has no host/port separator")]
    MissingSeparator(String),

    /// The port segment is not a valid port number
    #[error("invalid port '{1}' in address '{0}'")]
    InvalidPort(String, String),
}

/// `(host, port)` identity of a peer
///
/// The canonical string form is `host_port`. A colon cannot be used here: it
/// is the wire message delimiter, and per-peer manifest files are named after
/// the address, where a colon is unsafe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    /// IP address (or host name) of the peer
    pub host: String,

    /// Port the peer's file server answers on
    pub port: u16,
}

impl PeerAddress {
    /// Create a peer address from its parts
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Derive the address from a connection's remote endpoint
    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.host, self.port)
    }
}

impl FromStr for PeerAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split on the last separator; hosts never contain `_`, but this keeps
        // the port segment unambiguous either way.
        let (host, port) = s
            .rsplit_once('_')
            .ok_or_else(|| AddressParseError::MissingSeparator(s.to_string()))?;

        let port = port
            .parse::<u16>()
            .map_err(|_| AddressParseError::InvalidPort(s.to_string(), port.to_string()))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}
