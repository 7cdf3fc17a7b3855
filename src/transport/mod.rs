//! # Transport Layer
//!
//! Owns the raw sockets and turns inbound traffic into `(bytes, peer)` frames.
//!
//! ## Variants
//! - **Datagram** (`udp`): one read loop per bound socket, one frame per datagram
//! - **Stream** (`tcp`): one accept loop per listener, one reader per accepted
//!   connection, one frame per read
//!
//! Frames are handed to an [`Ingest`] implementation on the read loop's own
//! task. Read buffers hold `packet_size + 1` bytes so a unit larger than the
//! packet size reaches the ingest side and can be rejected there.
//!
//! Every loop watches a shared cancellation token; closing the server cancels
//! it and waits for the loops, which drop their sockets on exit.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{MuxError, Result};

pub mod pool;
pub mod tcp;
pub mod udp;

pub use pool::{Connection, ConnectionPool};
pub use tcp::StreamServer;
pub use udp::DatagramServer;

/// Transport kind selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Connectionless datagrams
    #[default]
    Udp,
    /// Connection-oriented byte streams
    Tcp,
}

impl TransportKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Udp => "udp",
            TransportKind::Tcp => "tcp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = MuxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(TransportKind::Udp),
            "tcp" => Ok(TransportKind::Tcp),
            other => Err(MuxError::ConfigError(format!(
                "Unknown transport kind: '{other}' (expected 'udp' or 'tcp')"
            ))),
        }
    }
}

/// Receiver of raw frames produced by the read loops.
///
/// `ingest` runs on the read loop itself: the next read starts only once the
/// returned future completes, so implementations should hand real work off
/// to another task.
pub trait Ingest: Send + Sync + 'static {
    fn ingest(&self, frame: Vec<u8>, peer: SocketAddr) -> impl Future<Output = ()> + Send;
}

/// Long-lived read/accept loops sharing one cancellation token.
struct LoopSet {
    cancel: CancellationToken,
    tasks: Vec<(SocketAddr, JoinHandle<()>)>,
}

impl LoopSet {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            tasks: Vec::new(),
        }
    }

    fn push(&mut self, addr: SocketAddr, task: JoinHandle<()>) {
        self.tasks.push((addr, task));
    }

    fn healthcheck(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(MuxError::NotRunning);
        }
        if let Some((addr, _)) = self.tasks.iter().find(|(_, task)| task.is_finished()) {
            return Err(MuxError::TransportError(format!(
                "read loop on {addr} has stopped"
            )));
        }
        Ok(())
    }

    /// Cancel every loop and wait for each; a loop that panicked does not
    /// stop the others from being awaited.
    async fn close(self) -> Result<()> {
        self.cancel.cancel();

        let (addrs, tasks): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        let mut failures = Vec::new();
        for (addr, joined) in addrs.into_iter().zip(join_all(tasks).await) {
            match joined {
                Ok(()) => info!(address = %addr, "Socket closed"),
                Err(e) => {
                    error!(address = %addr, error = %e, "Read loop failed");
                    failures.push(format!("{addr}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MuxError::CloseError(failures.join("; ")))
        }
    }
}

/// The transport server of a running multiplexer.
pub enum Server {
    Datagram(DatagramServer),
    Stream(StreamServer),
}

impl Server {
    /// Bind every address and start the read loops.
    ///
    /// Fails without starting anything if any bind fails; sockets opened
    /// before the failure are dropped.
    pub async fn dial<I: Ingest>(
        kind: TransportKind,
        addresses: &[String],
        packet_size: usize,
        ingest: Arc<I>,
    ) -> Result<Self> {
        match kind {
            TransportKind::Udp => Ok(Server::Datagram(
                DatagramServer::dial(addresses, packet_size, ingest).await?,
            )),
            TransportKind::Tcp => Ok(Server::Stream(
                StreamServer::dial(addresses, packet_size, ingest).await?,
            )),
        }
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        match self {
            Server::Datagram(server) => server.local_addrs(),
            Server::Stream(server) => server.local_addrs(),
        }
    }

    /// Bound datagram sockets, usable for outbound spreading. Empty for streams.
    pub fn sockets(&self) -> Vec<Arc<UdpSocket>> {
        match self {
            Server::Datagram(server) => server.sockets().to_vec(),
            Server::Stream(_) => Vec::new(),
        }
    }

    pub fn healthcheck(&self) -> Result<()> {
        match self {
            Server::Datagram(server) => server.healthcheck(),
            Server::Stream(server) => server.healthcheck(),
        }
    }

    pub async fn close(self) -> Result<()> {
        match self {
            Server::Datagram(server) => server.close().await,
            Server::Stream(server) => server.close().await,
        }
    }
}
