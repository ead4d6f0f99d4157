// FileCloner Sync Module
//
// The file sync protocol itself:
// - Broadcasting file-availability requests and collecting acknowledgements
// - Answering other nodes' requests with the local manifest
// - Reconciling per-peer manifests into the canonical freshest-wins manifest

pub mod collector;
pub mod reconciler;
pub mod responder;

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use crate::network::transport::InboundHandler;
use crate::network::types::message::{self, Header};
use self::collector::ManifestCollector;
use self::responder::ManifestResponder;

/// Routes decoded inbound messages to the collector and responder
///
/// One instance is subscribed to the transport; every raw inbound message
/// lands here first.
pub struct SyncService {
    collector: Arc<ManifestCollector>,
    responder: Arc<ManifestResponder>,
}

impl SyncService {
    pub fn new(collector: Arc<ManifestCollector>, responder: Arc<ManifestResponder>) -> Self {
        Self {
            collector,
            responder,
        }
    }

    pub fn collector(&self) -> &Arc<ManifestCollector> {
        &self.collector
    }
}

#[async_trait]
impl InboundHandler for SyncService {
    async fn on_data_received(&self, raw: String) {
        let message = match message::decode(&raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };

        match message.header {
            Header::AckFileRequest => {
                self.collector
                    .on_acknowledgement(message.sender, message.payload);
            }
            Header::FileRequest => {
                self.responder
                    .on_request(message.sender, message.payload)
                    .await;
            }
            Header::CloneFiles | Header::AckCloneFiles => {
                debug!("Ignoring {} message from {}", message.header, message.sender);
            }
            Header::Unknown(name) => {
                debug!("Ignoring unrecognized header '{}' from {}", name, message.sender);
            }
        }
    }
}
