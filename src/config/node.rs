use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Node-local paths and reconciliation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Root directory for node state
    pub data_dir: PathBuf,

    /// Directory holding one manifest file per answering peer
    pub diff_dir: PathBuf,

    /// User-editable list of files to resolve, re-read on every broadcast
    pub request_list: PathBuf,

    /// Canonical freshest-wins manifest consumed by the clone tooling
    pub output_manifest: PathBuf,

    /// Seconds to collect acknowledgements before reconciling
    pub collection_window_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/filecloner"),
            diff_dir: PathBuf::from("./data/filecloner/diff"),
            request_list: PathBuf::from("./data/filecloner/request_config.json"),
            output_manifest: PathBuf::from("./data/filecloner/diff_manifest.txt"),
            collection_window_secs: 10,
        }
    }
}
