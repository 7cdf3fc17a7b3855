//! Datagram transport: one dedicated read loop per bound UDP socket.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{Ingest, LoopSet};
use crate::error::{MuxError, Result};

pub struct DatagramServer {
    sockets: Vec<Arc<UdpSocket>>,
    local_addrs: Vec<SocketAddr>,
    loops: LoopSet,
}

impl DatagramServer {
    /// Bind every address, then start one read loop per socket.
    #[instrument(skip(ingest))]
    pub async fn dial<I: Ingest>(
        addresses: &[String],
        packet_size: usize,
        ingest: Arc<I>,
    ) -> Result<Self> {
        // Bind everything before spawning so a failure leaves nothing running
        let mut sockets = Vec::with_capacity(addresses.len());
        for address in addresses {
            let socket = UdpSocket::bind(address.as_str()).await.map_err(|e| {
                MuxError::TransportError(format!("Failed to bind udp {address}: {e}"))
            })?;
            sockets.push(Arc::new(socket));
        }

        let mut local_addrs = Vec::with_capacity(sockets.len());
        for socket in &sockets {
            local_addrs.push(socket.local_addr()?);
        }

        let mut loops = LoopSet::new(CancellationToken::new());
        for (socket, addr) in sockets.iter().zip(&local_addrs) {
            info!(address = %addr, "Listening on udp socket");
            let task = tokio::spawn(read_loop(
                socket.clone(),
                packet_size,
                ingest.clone(),
                loops.cancel.clone(),
            ));
            loops.push(*addr, task);
        }

        Ok(Self {
            sockets,
            local_addrs,
            loops,
        })
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.local_addrs.clone()
    }

    pub fn sockets(&self) -> &[Arc<UdpSocket>] {
        &self.sockets
    }

    pub fn healthcheck(&self) -> Result<()> {
        self.loops.healthcheck()
    }

    pub async fn close(self) -> Result<()> {
        // Loops hold the remaining socket handles and drop them on exit
        drop(self.sockets);
        self.loops.close().await
    }
}

async fn read_loop<I: Ingest>(
    socket: Arc<UdpSocket>,
    packet_size: usize,
    ingest: Arc<I>,
    cancel: CancellationToken,
) {
    let mut raw = vec![0u8; packet_size + 1];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Datagram read loop stopped");
                return;
            }
            received = socket.recv_from(&mut raw) => match received {
                Ok((n, peer)) => ingest.ingest(raw[..n].to_vec(), peer).await,
                Err(e) => {
                    // e.g. ICMP unreachable surfaced on the next read; the socket stays usable
                    warn!(error = %e, "Failed to read datagram");
                }
            }
        }
    }
}
