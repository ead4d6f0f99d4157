use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::manifest::{FileRequestEntry, PeerManifestEntry};
use crate::network::transport::Transport;
use crate::network::types::message::{self, Header};

/// Collection state of the local node
///
/// There is no automatic transition out of `CollectingAcks`: peer set size and
/// liveness are not guaranteed, so deciding when collection is "done enough"
/// is the caller's policy (the daemon uses a configured window).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Broadcasting,
    CollectingAcks,
    Reconciled,
}

/// Why one acknowledgement was dropped
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The payload does not parse as a manifest sequence
    #[error("payload is not a manifest sequence: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// The per-peer file could not be created or written
    #[error("could not write per-peer manifest: {0}")]
    Persistence(#[from] std::io::Error),
}

/// Broadcasts file-availability requests and persists each peer's
/// acknowledgement to an isolated per-peer manifest file.
pub struct ManifestCollector {
    transport: Arc<dyn Transport>,

    /// User-editable request list, re-read on every broadcast
    request_list: PathBuf,

    /// Directory holding one `host_port.json` file per answering peer
    diff_dir: PathBuf,

    state: std::sync::Mutex<CollectorState>,

    /// Guards writes under the reconciliation output; shared with the reconciler
    output_lock: Arc<Mutex<()>>,
}

impl ManifestCollector {
    /// Create a collector in the `Idle` state
    pub fn new(
        transport: Arc<dyn Transport>,
        request_list: PathBuf,
        diff_dir: PathBuf,
        output_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            transport,
            request_list,
            diff_dir,
            state: std::sync::Mutex::new(CollectorState::Idle),
            output_lock,
        }
    }

    /// Current collection state
    pub fn state(&self) -> CollectorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: CollectorState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// External trigger marking this collection round done
    pub fn mark_reconciled(&self) {
        self.set_state(CollectorState::Reconciled);
    }

    /// Reload the request list and broadcast a `FILE_REQUEST` to every peer
    /// the transport currently reaches.
    ///
    /// Each call overwrites the in-memory request list; there is no
    /// incremental merge with a prior call.
    pub async fn request_files(&self) {
        self.set_state(CollectorState::Broadcasting);

        let requests = self.load_file_requests();
        let payload = serde_json::to_string(&requests).unwrap_or_else(|e| {
            warn!("Could not serialize request list: {}", e);
            String::from("[]")
        });

        let sender = self.transport.local_address().to_string();
        let raw = message::encode(&Header::FileRequest, &sender, &payload);
        self.transport.broadcast(raw).await;

        self.set_state(CollectorState::CollectingAcks);
        info!("Requested {} files from all reachable peers", requests.len());
    }

    /// Read the request list fresh
    ///
    /// A missing or unreadable list means an empty request (the first run has
    /// no file yet); the file is (re)created so the user has something to
    /// edit. Neither case is fatal.
    fn load_file_requests(&self) -> Vec<FileRequestEntry> {
        let content = match fs::read_to_string(&self.request_list) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Could not read request list {}: {}",
                    self.request_list.display(),
                    e
                );
                if let Err(e) = fs::write(&self.request_list, "[]") {
                    warn!(
                        "Could not create request list {}: {}",
                        self.request_list.display(),
                        e
                    );
                }
                return Vec::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Request list {} is malformed: {}",
                    self.request_list.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Handle an `ACK_FILE_REQUEST` payload from `sender`
    ///
    /// Persistence runs on its own task so a slow disk never blocks reception
    /// of further inbound messages. A failed acknowledgement is logged and
    /// dropped; it is not retried and does not affect other acknowledgements.
    pub fn on_acknowledgement(&self, sender: String, payload: String) {
        let path = self.diff_dir.join(format!("{}.json", sender));
        let output_lock = self.output_lock.clone();

        tokio::spawn(async move {
            match persist_acknowledgement(&path, &payload, output_lock).await {
                Ok(entries) => debug!("Persisted {} manifest entries from {}", entries, sender),
                Err(e) => warn!("Dropping acknowledgement from {}: {}", sender, e),
            }
        });
    }

    /// Per-peer manifest files collected so far
    ///
    /// Sorted so reconciliation tie-breaking sees a deterministic scan order.
    pub fn collected_manifests(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.diff_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not scan {}: {}", self.diff_dir.display(), e);
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();
        paths
    }
}

/// Validate and write one peer's reported manifest, overwriting any earlier
/// answer from the same peer. Nothing is written when the payload is
/// malformed.
async fn persist_acknowledgement(
    path: &Path,
    payload: &str,
    output_lock: Arc<Mutex<()>>,
) -> Result<usize, CollectError> {
    let entries: Vec<PeerManifestEntry> = serde_json::from_str(payload)?;

    let _guard = output_lock.lock().await;
    fs::write(path, payload)?;
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::network::transport::TransportError;
    use crate::network::types::peer_address::PeerAddress;

    /// Transport double that records every outbound message
    struct MockTransport {
        local: PeerAddress,
        sent: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                local: PeerAddress::new("127.0.0.1", 9000),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn local_address(&self) -> PeerAddress {
            self.local.clone()
        }

        async fn broadcast(&self, message: String) {
            self.sent.lock().await.push(message);
        }

        async fn send_to(
            &self,
            _target: &PeerAddress,
            message: String,
        ) -> Result<(), TransportError> {
            self.sent.lock().await.push(message);
            Ok(())
        }
    }

    fn collector_in(dir: &TempDir, transport: Arc<MockTransport>) -> ManifestCollector {
        ManifestCollector::new(
            transport,
            dir.path().join("request_config.json"),
            dir.path().to_path_buf(),
            Arc::new(Mutex::new(())),
        )
    }

    async fn wait_for(path: &Path) -> bool {
        for _ in 0..100 {
            if path.exists() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_missing_request_list_broadcasts_empty_and_creates_file() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new();
        let collector = collector_in(&dir, transport.clone());

        collector.request_files().await;

        let sent = transport.sent.lock().await;
        assert_eq!(sent.len(), 1);
        let message = message::decode(&sent[0]).unwrap();
        assert_eq!(message.header, Header::FileRequest);
        assert_eq!(message.sender, "127.0.0.1_9000");
        assert_eq!(message.payload, "[]");

        // The list was (re)created for the user to edit
        assert!(dir.path().join("request_config.json").exists());
    }

    #[tokio::test]
    async fn test_request_list_is_reread_on_every_broadcast() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new();
        let collector = collector_in(&dir, transport.clone());
        let list = dir.path().join("request_config.json");

        fs::write(&list, r#"[{"filePath":"a.txt"}]"#).unwrap();
        collector.request_files().await;

        // Edit the list between broadcasts, no restart
        fs::write(&list, r#"[{"filePath":"b.txt"}]"#).unwrap();
        collector.request_files().await;

        let sent = transport.sent.lock().await;
        assert!(message::decode(&sent[0]).unwrap().payload.contains("a.txt"));
        let second = message::decode(&sent[1]).unwrap().payload;
        assert!(second.contains("b.txt"));
        assert!(!second.contains("a.txt"));
    }

    #[tokio::test]
    async fn test_state_machine_transitions() {
        let dir = TempDir::new().unwrap();
        let collector = collector_in(&dir, MockTransport::new());

        assert_eq!(collector.state(), CollectorState::Idle);
        collector.request_files().await;
        assert_eq!(collector.state(), CollectorState::CollectingAcks);
        collector.mark_reconciled();
        assert_eq!(collector.state(), CollectorState::Reconciled);
    }

    #[tokio::test]
    async fn test_acknowledgement_is_persisted_per_peer() {
        let dir = TempDir::new().unwrap();
        let collector = collector_in(&dir, MockTransport::new());

        let payload = r#"[{"FilePath":"a.txt","Timestamp":"2024-01-01T00:00:00Z"}]"#;
        collector.on_acknowledgement("10.0.0.1_9000".to_string(), payload.to_string());

        let expected = dir.path().join("10.0.0.1_9000.json");
        assert!(wait_for(&expected).await);
        assert_eq!(fs::read_to_string(&expected).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_malformed_acknowledgement_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let collector = collector_in(&dir, MockTransport::new());

        collector.on_acknowledgement("10.0.0.1_9000".to_string(), "not json".to_string());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!dir.path().join("10.0.0.1_9000.json").exists());
    }

    #[tokio::test]
    async fn test_second_acknowledgement_overwrites_first() {
        let dir = TempDir::new().unwrap();
        let collector = collector_in(&dir, MockTransport::new());
        let peer_file = dir.path().join("10.0.0.1_9000.json");

        let first = r#"[{"FilePath":"a.txt","Timestamp":"2024-01-01T00:00:00Z"}]"#;
        collector.on_acknowledgement("10.0.0.1_9000".to_string(), first.to_string());
        assert!(wait_for(&peer_file).await);

        let second = r#"[{"FilePath":"a.txt","Timestamp":"2024-02-01T00:00:00Z"}]"#;
        collector.on_acknowledgement("10.0.0.1_9000".to_string(), second.to_string());
        for _ in 0..100 {
            if fs::read_to_string(&peer_file).unwrap() == second {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(fs::read_to_string(&peer_file).unwrap(), second);
    }

    #[tokio::test]
    async fn test_collected_manifests_are_sorted_json_only() {
        let dir = TempDir::new().unwrap();
        let collector = collector_in(&dir, MockTransport::new());

        fs::write(dir.path().join("10.0.0.2_9000.json"), "[]").unwrap();
        fs::write(dir.path().join("10.0.0.1_9000.json"), "[]").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let paths = collector.collected_manifests();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("10.0.0.1_9000.json"));
        assert!(paths[1].ends_with("10.0.0.2_9000.json"));
    }
}
