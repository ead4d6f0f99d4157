use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::manifest::{CanonicalFileRecord, PeerManifestEntry};
use crate::network::types::peer_address::PeerAddress;

/// Merges every collected per-peer manifest into the canonical freshest-wins
/// manifest consumed by the downstream clone tooling.
pub struct Reconciler {
    output_path: PathBuf,

    /// Shared with the collector; serializes writes under the output path.
    /// Two concurrent runs cannot interleave their writes, but the later
    /// run's whole file still replaces the earlier one (last writer wins at
    /// file granularity, no stronger guarantee).
    output_lock: Arc<Mutex<()>>,
}

impl Reconciler {
    pub fn new(output_path: PathBuf, output_lock: Arc<Mutex<()>>) -> Self {
        Self {
            output_path,
            output_lock,
        }
    }

    /// Merge the given per-peer manifest files and write the canonical
    /// manifest, one record per line. Returns the number of records written.
    ///
    /// Failures local to one peer's file (unattributable name, bad port,
    /// unreadable or malformed content) are logged and that file skipped;
    /// they never abort reconciliation of the remaining files. Only the final
    /// output write can fail the run.
    pub async fn generate_summary(&self, manifest_paths: &[PathBuf]) -> io::Result<usize> {
        let records = merge_manifests(manifest_paths);

        let _guard = self.output_lock.lock().await;
        let file = File::create(&self.output_path)?;
        let mut writer = BufWriter::new(file);
        for record in records.values() {
            writeln!(writer, "{}", record.to_output_line())?;
        }
        writer.flush()?;

        info!(
            "Wrote {} canonical records to {}",
            records.len(),
            self.output_path.display()
        );
        Ok(records.len())
    }
}

/// Freshest-wins merge across per-peer manifests
///
/// Order-independent for distinct timestamps: the maximum timestamp wins
/// regardless of scan order. On an exact tie the first peer seen keeps the
/// record (strict greater-than replacement).
fn merge_manifests(manifest_paths: &[PathBuf]) -> BTreeMap<String, CanonicalFileRecord> {
    let mut records = BTreeMap::new();

    for path in manifest_paths {
        let peer = match peer_from_file_name(path) {
            Some(peer) => peer,
            None => continue,
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let entries: Vec<PeerManifestEntry> = match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping {}: not a manifest sequence: {}", path.display(), e);
                continue;
            }
        };

        for entry in entries {
            apply_entry(&mut records, &peer, entry);
        }
    }

    records
}

fn apply_entry(
    records: &mut BTreeMap<String, CanonicalFileRecord>,
    peer: &PeerAddress,
    entry: PeerManifestEntry,
) {
    match records.get_mut(&entry.file_path) {
        Some(existing) => {
            // Owning peer and timestamp move together
            if entry.timestamp > existing.timestamp {
                debug!(
                    "Fresher copy of {} on {} at {}",
                    entry.file_path, peer, entry.timestamp
                );
                existing.timestamp = entry.timestamp;
                existing.peer = peer.clone();
            }
        }
        None => {
            records.insert(
                entry.file_path.clone(),
                CanonicalFileRecord {
                    relative_path: entry.file_path,
                    peer: peer.clone(),
                    timestamp: entry.timestamp,
                },
            );
        }
    }
}

/// Attribute a per-peer manifest file to its peer via the `host_port.json`
/// naming convention
///
/// A name with no separator cannot be attributed to a peer and is excluded
/// silently (not an error); a separator with a bad port is logged and skipped.
fn peer_from_file_name(path: &Path) -> Option<PeerAddress> {
    let stem = path.file_stem()?.to_str()?;
    if !stem.contains('_') {
        return None;
    }

    match stem.parse::<PeerAddress>() {
        Ok(peer) => Some(peer),
        Err(e) => {
            warn!("Skipping {}: {}", path.display(), e);
            None
        }
    }
}
