use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::manifest::{FileRequestEntry, PeerManifestEntry};
use crate::network::transport::Transport;
use crate::network::types::message::{self, Header};

/// Answers `FILE_REQUEST` broadcasts with this node's view of the requested
/// files: one `(path, modification time)` row per requested file that exists
/// locally.
pub struct ManifestResponder {
    transport: Arc<dyn Transport>,
}

impl ManifestResponder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Handle one file request
    ///
    /// An unparseable request is logged and dropped. Send failures are
    /// diagnostics only; the requester simply never hears from us.
    pub async fn on_request(&self, sender: String, payload: String) {
        let requests: Vec<FileRequestEntry> = match serde_json::from_str(&payload) {
            Ok(requests) => requests,
            Err(e) => {
                warn!("Dropping file request from {}: {}", sender, e);
                return;
            }
        };

        let entries = local_manifest(&requests);
        let payload = match serde_json::to_string(&entries) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Could not serialize manifest for {}: {}", sender, e);
                return;
            }
        };

        let my_address = self.transport.local_address().to_string();
        let raw = message::encode(&Header::AckFileRequest, &my_address, &payload);

        // The requester may be registered under an ephemeral address on our
        // side of the connection; fall back to a broadcast so the answer still
        // reaches it.
        let delivered = match sender.parse() {
            Ok(target) => self.transport.send_to(&target, raw.clone()).await.is_ok(),
            Err(_) => false,
        };
        if !delivered {
            self.transport.broadcast(raw).await;
        }

        debug!(
            "Answered file request from {} with {} entries",
            sender,
            entries.len()
        );
    }
}

/// Report `(path, modification time)` for every requested file present
/// locally. Paths this node does not hold are omitted, not errors.
fn local_manifest(requests: &[FileRequestEntry]) -> Vec<PeerManifestEntry> {
    let mut entries = Vec::new();

    for request in requests {
        let metadata = match std::fs::metadata(Path::new(&request.file_path)) {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };

        match metadata.modified() {
            Ok(modified) => entries.push(PeerManifestEntry {
                file_path: request.file_path.clone(),
                timestamp: DateTime::<Utc>::from(modified),
            }),
            Err(e) => warn!("Could not read mtime of {}: {}", request.file_path, e),
        }
    }

    entries
}
