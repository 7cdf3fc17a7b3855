//! # Connection Pool
//!
//! Get-or-create cache of outbound sockets keyed by destination address.
//!
//! ## Semantics
//! - At most one live socket per address string
//! - Dialing happens outside the map lock; the store is an atomic
//!   load-or-store, so a caller that loses a dial race drops (closes) its own
//!   socket and returns the winner's
//! - A failed dial stores nothing, so the next call dials again
//! - No TTL and no eviction; [`ConnectionPool::clear`] drops everything

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::TransportKind;
use crate::error::{MuxError, Result};

/// A live outbound socket.
#[derive(Debug)]
pub enum Connection {
    /// UDP socket connected to its destination
    Datagram(UdpSocket),
    /// TCP stream; writes are serialized
    Stream {
        stream: Mutex<TcpStream>,
        local: SocketAddr,
    },
}

impl Connection {
    /// Open a socket to `address`.
    pub async fn dial(kind: TransportKind, address: &str) -> Result<Self> {
        match kind {
            TransportKind::Udp => {
                let target = resolve(address).await?;
                let local: SocketAddr = if target.is_ipv4() {
                    ([0, 0, 0, 0], 0).into()
                } else {
                    ([0u16; 8], 0).into()
                };
                let socket = UdpSocket::bind(local).await?;
                socket.connect(target).await?;
                Ok(Connection::Datagram(socket))
            }
            TransportKind::Tcp => {
                let stream = TcpStream::connect(address).await?;
                stream.set_nodelay(true)?;
                let local = stream.local_addr()?;
                Ok(Connection::Stream {
                    stream: Mutex::new(stream),
                    local,
                })
            }
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Connection::Datagram(_) => TransportKind::Udp,
            Connection::Stream { .. } => TransportKind::Tcp,
        }
    }

    /// Write one payload, returning the number of bytes written.
    pub async fn write(&self, payload: &[u8]) -> Result<usize> {
        match self {
            Connection::Datagram(socket) => Ok(socket.send(payload).await?),
            Connection::Stream { stream, .. } => {
                let mut stream = stream.lock().await;
                stream.write_all(payload).await?;
                Ok(payload.len())
            }
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        match self {
            Connection::Datagram(socket) => Ok(socket.local_addr()?),
            Connection::Stream { local, .. } => Ok(*local),
        }
    }
}

async fn resolve(address: &str) -> Result<SocketAddr> {
    lookup_host(address).await?.next().ok_or_else(|| {
        MuxError::ConnectionUnavailable(format!("{address} did not resolve to any address"))
    })
}

/// Pool of outbound connections without TTL.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    kind: TransportKind,
    connections: Arc<DashMap<String, Arc<Connection>>>,
}

impl ConnectionPool {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            connections: Arc::new(DashMap::new()),
        }
    }

    /// Return the connection for `address`, dialing it on first use.
    pub async fn get(&self, address: &str) -> Result<Arc<Connection>> {
        if let Some(conn) = self.connections.get(address) {
            trace!(address, "Pool: reusing connection");
            return Ok(conn.clone());
        }

        let dialed = Connection::dial(self.kind, address).await?;

        let conn = match self.connections.entry(address.to_string()) {
            Entry::Occupied(existing) => {
                debug!(address, "Pool: lost dial race, discarding new connection");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                debug!(address, kind = %self.kind, "Pool: stored new connection");
                slot.insert(Arc::new(dialed)).clone()
            }
        };
        Ok(conn)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.connections.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Drop every pooled connection.
    pub fn clear(&self) {
        let count = self.connections.len();
        self.connections.clear();
        debug!(cleared_count = count, "Pool: cleared");
    }
}
