//! Manifest record types shared by the collector, responder, and reconciler.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::network::types::peer_address::PeerAddress;

/// One entry of the locally editable request list
///
/// The list is read fresh on every broadcast so a user can edit it without
/// restarting the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRequestEntry {
    /// Logical path of a file the node wants resolved
    #[serde(rename = "filePath")]
    pub file_path: String,
}

/// One row of a peer's reported manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerManifestEntry {
    #[serde(rename = "FilePath")]
    pub file_path: String,

    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Reconciled freshest-wins record for one logical file
///
/// Invariant: the merged output holds at most one record per path, carrying
/// the maximum timestamp observed across all peers and the peer that holds
/// the authoritative copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalFileRecord {
    pub relative_path: String,

    /// Peer currently holding the freshest copy
    pub peer: PeerAddress,

    pub timestamp: DateTime<Utc>,
}

impl CanonicalFileRecord {
    /// Render the record in the exact line shape the downstream clone tooling
    /// consumes.
    pub fn to_output_line(&self) -> String {
        format!(
            "{{ \"filePath\": {}, IP Address: {}, Port: {}, Timestamp: {}, \"fromWhichServer\": \"{}\" }}",
            self.relative_path,
            self.peer.host,
            self.peer.port,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.peer,
        )
    }
}
