use std::net::SocketAddr;

use dashmap::DashMap;
use log::{debug, warn};
use tokio::sync::mpsc;

use crate::network::types::peer_address::PeerAddress;

/// A live connection to a peer
///
/// `outbox` feeds the connection's write task; dropping the last sender closes
/// the connection.
#[derive(Debug, Clone)]
pub struct PeerConnection {
    /// Remote endpoint, when the transport could resolve one
    pub remote: Option<SocketAddr>,

    /// Channel carrying encoded wire messages to the peer
    pub outbox: mpsc::Sender<String>,
}

impl PeerConnection {
    /// Create a connection handle
    pub fn new(remote: Option<SocketAddr>, outbox: mpsc::Sender<String>) -> Self {
        Self { remote, outbox }
    }
}

/// Registry of currently open peer connections
///
/// The registry is the only place ownership of live connection handles is
/// asserted: components needing to address a peer look it up here rather than
/// holding their own reference. Nothing survives a restart; the map is rebuilt
/// purely from join/leave notifications.
pub struct PeerRegistry {
    /// Map of canonical `host_port` strings to connections
    peers: DashMap<String, PeerConnection>,
}

impl PeerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }

    /// Handle a peer-join notification
    ///
    /// Derives the peer's address from the connection's remote endpoint.
    /// Returns `None` when no remote endpoint was resolvable, in which case
    /// the join is ignored (logged, not fatal).
    pub fn on_peer_joined(&self, conn: PeerConnection) -> Option<PeerAddress> {
        let remote = match conn.remote {
            Some(remote) => remote,
            None => {
                warn!("Ignoring peer join without a resolvable remote endpoint");
                return None;
            }
        };

        let address = PeerAddress::from_socket_addr(&remote);
        debug!("Peer joined: {}", address);
        self.peers.insert(address.to_string(), conn);
        Some(address)
    }

    /// Handle a peer-leave notification; removing an absent address is a no-op
    pub fn on_peer_left(&self, address: &PeerAddress) {
        if self.peers.remove(&address.to_string()).is_some() {
            debug!("Peer left: {}", address);
        }
    }

    /// Look up the connection registered for an address
    pub fn lookup(&self, address: &PeerAddress) -> Option<PeerConnection> {
        self.peers.get(&address.to_string()).map(|entry| entry.clone())
    }

    /// Reverse lookup: the address a connection handle was registered under
    ///
    /// Linear scan; peer sets are small enough that no secondary index is kept.
    pub fn address_of(&self, outbox: &mpsc::Sender<String>) -> Option<PeerAddress> {
        self.peers
            .iter()
            .find(|entry| entry.outbox.same_channel(outbox))
            .and_then(|entry| entry.key().parse().ok())
    }

    /// Addresses of all currently connected peers
    pub fn addresses(&self) -> Vec<PeerAddress> {
        self.peers
            .iter()
            .filter_map(|entry| entry.key().parse().ok())
            .collect()
    }

    /// Snapshot of `(address, connection)` pairs for broadcasting
    pub fn connections(&self) -> Vec<(String, PeerConnection)> {
        self.peers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of currently connected peers
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
