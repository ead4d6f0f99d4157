use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use crate::network::peer::registry::{PeerConnection, PeerRegistry};
use crate::network::types::peer_address::PeerAddress;

/// Outbox depth per connection
const OUTBOX_CAPACITY: usize = 100;

/// Send retries before a peer is dropped from the registry
const MAX_SEND_RETRIES: usize = 3;

/// Transport-layer failures surfaced to the sync layer
#[derive(Debug, Error)]
pub enum TransportError {
    /// The local listener could not be started; fatal at startup
    #[error("transport unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    /// No open connection to the target peer
    #[error("peer {0} is not connected")]
    PeerNotConnected(PeerAddress),
}

/// Callback for raw inbound wire messages
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn on_data_received(&self, raw: String);
}

/// Outbound boundary the sync layer sends through
///
/// All sends are fire-and-forget; delivery guarantees, reconnection, and
/// backoff live below this boundary.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Canonical address this node tells peers to answer to
    fn local_address(&self) -> PeerAddress;

    /// Send a message to every currently connected peer
    async fn broadcast(&self, message: String);

    /// Send a message to one peer, looked up by address
    async fn send_to(&self, target: &PeerAddress, message: String) -> Result<(), TransportError>;
}

/// Line-delimited TCP transport
///
/// Each accepted or dialed connection is registered with the peer registry and
/// gets a read task (inbound lines go to the subscribed handler) and a write
/// task (draining the connection's outbox).
pub struct TcpTransport {
    local_address: PeerAddress,
    registry: Arc<PeerRegistry>,
    handler: RwLock<Option<Arc<dyn InboundHandler>>>,
}

impl TcpTransport {
    /// Bind the local listener and start accepting peers
    ///
    /// A bind failure is the one unrecoverable startup error.
    pub async fn start(
        bind_addr: SocketAddr,
        registry: Arc<PeerRegistry>,
    ) -> Result<Arc<Self>, TransportError> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local = listener.local_addr()?;
        info!("Listening for peers on {}", local);

        let transport = Arc::new(Self {
            local_address: PeerAddress::from_socket_addr(&local),
            registry,
            handler: RwLock::new(None),
        });

        let accepting = transport.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!("Accepted connection from {}", addr);
                        accepting.clone().adopt_stream(stream);
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }
        });

        Ok(transport)
    }

    /// Register the handler inbound messages are delivered to
    pub async fn subscribe(&self, handler: Arc<dyn InboundHandler>) {
        *self.handler.write().await = Some(handler);
    }

    /// Dial a known peer and adopt the connection
    pub async fn connect(self: Arc<Self>, addr: SocketAddr) -> Result<(), TransportError> {
        let stream = TcpStream::connect(addr).await?;
        debug!("Connected to peer {}", addr);
        self.adopt_stream(stream);
        Ok(())
    }

    /// Register a stream with the registry and spawn its read and write tasks
    fn adopt_stream(self: Arc<Self>, stream: TcpStream) {
        let remote = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        let (outbox_tx, mut outbox_rx) = mpsc::channel::<String>(OUTBOX_CAPACITY);

        let address = match self.registry.on_peer_joined(PeerConnection::new(remote, outbox_tx)) {
            Some(address) => address,
            // No resolvable remote endpoint; the registry logged the drop
            None => return,
        };

        // Write task: drain the outbox into the socket
        tokio::spawn(async move {
            let mut sink = FramedWrite::new(write_half, LinesCodec::new());
            while let Some(line) = outbox_rx.recv().await {
                if let Err(e) = sink.send(line).await {
                    warn!("Write to peer failed: {}", e);
                    break;
                }
            }
        });

        // Read task: feed inbound lines to the subscribed handler
        tokio::spawn(async move {
            let mut lines = FramedRead::new(read_half, LinesCodec::new());
            while let Some(next) = lines.next().await {
                match next {
                    Ok(line) => {
                        let handler = self.handler.read().await.clone();
                        match handler {
                            Some(handler) => handler.on_data_received(line).await,
                            None => debug!("Dropping inbound message, no handler subscribed"),
                        }
                    }
                    Err(e) => {
                        warn!("Read from peer {} failed: {}", address, e);
                        break;
                    }
                }
            }
            self.registry.on_peer_left(&address);
        });
    }

    /// Queue a message on one connection's outbox, retrying while it is full
    ///
    /// A peer whose outbox stays full or whose connection closed is dropped
    /// from the registry.
    async fn send_via(&self, address: &str, conn: &PeerConnection, message: String) -> bool {
        for _ in 0..MAX_SEND_RETRIES {
            match conn.outbox.try_send(message.clone()) {
                Ok(()) => return true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }

        warn!("Failed to send to peer {}", address);
        if let Ok(parsed) = address.parse() {
            self.registry.on_peer_left(&parsed);
        }
        false
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn local_address(&self) -> PeerAddress {
        self.local_address.clone()
    }

    async fn broadcast(&self, message: String) {
        let connections = self.registry.connections();
        if connections.is_empty() {
            debug!("No peers to broadcast to");
            return;
        }

        debug!("Broadcasting to {} peers", connections.len());
        for (address, conn) in connections {
            self.send_via(&address, &conn, message.clone()).await;
        }
    }

    async fn send_to(&self, target: &PeerAddress, message: String) -> Result<(), TransportError> {
        let conn = self
            .registry
            .lookup(target)
            .ok_or_else(|| TransportError::PeerNotConnected(target.clone()))?;

        if self.send_via(&target.to_string(), &conn, message).await {
            Ok(())
        } else {
            Err(TransportError::PeerNotConnected(target.clone()))
        }
    }
}
