use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::Mutex;

use filecloner::config::Config;
use filecloner::init_logger;
use filecloner::network::peer::registry::PeerRegistry;
use filecloner::network::transport::{TcpTransport, Transport};
use filecloner::sync::collector::ManifestCollector;
use filecloner::sync::reconciler::Reconciler;
use filecloner::sync::responder::ManifestResponder;
use filecloner::sync::SyncService;

const CONFIG_PATH: &str = "./filecloner.toml";

#[tokio::main]
async fn main() {
    // Initialize logger
    init_logger();

    info!("Starting FileCloner node...");

    if let Err(e) = Config::generate_default(CONFIG_PATH) {
        warn!("{}", e);
    }
    let config = match Config::load(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            warn!("{}; falling back to defaults", e);
            Config::default()
        }
    };

    // Bootstrap node directories
    for dir in [&config.node.data_dir, &config.node.diff_dir] {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Could not create {}: {}", dir.display(), e);
        }
    }

    // Start the file server; a bind failure is the one unrecoverable error
    let registry = Arc::new(PeerRegistry::new());
    let transport = match TcpTransport::start(config.network.bind_addr, registry).await {
        Ok(transport) => transport,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!("File server listening as {}", transport.local_address());

    for seed in &config.network.seed_peers {
        if let Err(e) = transport.clone().connect(*seed).await {
            warn!("Could not reach seed peer {}: {}", seed, e);
        }
    }

    // Wire the sync protocol to the transport
    let output_lock = Arc::new(Mutex::new(()));
    let transport_handle: Arc<dyn Transport> = transport.clone();
    let collector = Arc::new(ManifestCollector::new(
        transport_handle.clone(),
        config.node.request_list.clone(),
        config.node.diff_dir.clone(),
        output_lock.clone(),
    ));
    let responder = Arc::new(ManifestResponder::new(transport_handle));
    let reconciler = Reconciler::new(config.node.output_manifest.clone(), output_lock);

    let service = Arc::new(SyncService::new(collector.clone(), responder));
    transport.subscribe(service).await;

    // Broadcast, collect for the configured window, reconcile, repeat
    let window = Duration::from_secs(config.node.collection_window_secs);
    loop {
        collector.request_files().await;
        tokio::time::sleep(window).await;

        let manifests = collector.collected_manifests();
        match reconciler.generate_summary(&manifests).await {
            Ok(count) => info!("Reconciled {} files from {} peer manifests", count, manifests.len()),
            Err(e) => warn!("Reconciliation failed: {}", e),
        }
        collector.mark_reconciled();
    }
}
