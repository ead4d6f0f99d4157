use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Network configuration for the node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Local address the file server binds to
    pub bind_addr: SocketAddr,

    /// Known peers to connect to at startup
    pub seed_peers: Vec<SocketAddr>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8890".parse().expect("valid default bind address"),
            seed_peers: vec![],
        }
    }
}
