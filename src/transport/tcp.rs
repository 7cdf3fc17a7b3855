//! Stream transport: an accept loop per listener and a reader per connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::{Ingest, LoopSet};
use crate::error::{MuxError, Result};

pub struct StreamServer {
    local_addrs: Vec<SocketAddr>,
    loops: LoopSet,
}

impl StreamServer {
    /// Listen on every address, then start one accept loop per listener.
    #[instrument(skip(ingest))]
    pub async fn dial<I: Ingest>(
        addresses: &[String],
        packet_size: usize,
        ingest: Arc<I>,
    ) -> Result<Self> {
        let mut listeners = Vec::with_capacity(addresses.len());
        for address in addresses {
            let listener = TcpListener::bind(address.as_str()).await.map_err(|e| {
                MuxError::TransportError(format!("Failed to listen on tcp {address}: {e}"))
            })?;
            let local = listener.local_addr()?;
            listeners.push((listener, local));
        }

        let mut loops = LoopSet::new(CancellationToken::new());
        let mut local_addrs = Vec::with_capacity(listeners.len());
        for (listener, addr) in listeners {
            info!(address = %addr, "Listening on tcp socket");
            let task = tokio::spawn(accept_loop(
                listener,
                packet_size,
                ingest.clone(),
                loops.cancel.clone(),
            ));
            loops.push(addr, task);
            local_addrs.push(addr);
        }

        Ok(Self { local_addrs, loops })
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.local_addrs.clone()
    }

    pub fn healthcheck(&self) -> Result<()> {
        self.loops.healthcheck()
    }

    pub async fn close(self) -> Result<()> {
        self.loops.close().await
    }
}

async fn accept_loop<I: Ingest>(
    listener: TcpListener,
    packet_size: usize,
    ingest: Arc<I>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Accept loop stopped");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!(peer = %peer, "Connection accepted");
                    tokio::spawn(read_connection(
                        stream,
                        peer,
                        packet_size,
                        ingest.clone(),
                        cancel.child_token(),
                    ));
                }
                Err(e) => {
                    error!(error = %e, "Error accepting connection");
                }
            }
        }
    }
}

/// Read chunks of at most `packet_size + 1` bytes until the peer closes.
async fn read_connection<I: Ingest>(
    mut stream: TcpStream,
    peer: SocketAddr,
    packet_size: usize,
    ingest: Arc<I>,
    cancel: CancellationToken,
) {
    let mut raw = vec![0u8; packet_size + 1];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(peer = %peer, "Connection reader stopped");
                return;
            }
            read = stream.read(&mut raw) => match read {
                Ok(0) => {
                    info!(peer = %peer, "Connection closed");
                    return;
                }
                Ok(n) => ingest.ingest(raw[..n].to_vec(), peer).await,
                Err(e) => {
                    error!(peer = %peer, error = %e, "Failed to read");
                    return;
                }
            }
        }
    }
}
