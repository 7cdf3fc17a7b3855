//! Outbound half of the multiplexer: size check, encode, resolve a socket,
//! write.
//!
//! A `Client` works standalone from a [`ClientConfig`] or shares the codec
//! pipeline, pool and metrics of a running [`Mux`](crate::service::Mux).

use std::net::SocketAddr;
use std::sync::Arc;

use rand::Rng;
use tokio::net::{lookup_host, UdpSocket};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::config::ClientConfig;
use crate::core::middleware::MiddlewareOptions;
use crate::core::packet::{PacketId, PacketStatus};
use crate::core::pipeline::Pipeline;
use crate::error::{MuxError, Result};
use crate::transport::ConnectionPool;
use crate::utils::metrics::Metrics;

/// Sends payloads through the codec pipeline to remote addresses.
///
/// Cloning is cheap and every clone shares the pool and metrics.
#[derive(Clone)]
pub struct Client {
    pipeline: Arc<Pipeline>,
    pool: ConnectionPool,
    metrics: Arc<Metrics>,
    packet_size: usize,
    /// Bound server sockets to spread writes over; empty means use the pool
    locals: Vec<Arc<UdpSocket>>,
}

impl Client {
    /// Build a standalone client.
    ///
    /// # Errors
    /// `MuxError::ConfigError` if the configuration does not validate.
    pub fn dial(config: &ClientConfig) -> Result<Self> {
        config.validate_strict()?;
        let opts = MiddlewareOptions {
            packet_size: config.packet_size,
            compression_level: config.compression_level,
        };
        let pipeline = Pipeline::from_names(&config.middlewares, &opts)?;
        info!(
            protocol = %config.client_protocol,
            middlewares = ?pipeline.names(),
            packet_size = config.packet_size,
            "Client ready"
        );
        Ok(Self::from_parts(
            Arc::new(pipeline),
            ConnectionPool::new(config.client_protocol),
            Arc::new(Metrics::new()),
            config.packet_size,
        ))
    }

    pub fn from_parts(
        pipeline: Arc<Pipeline>,
        pool: ConnectionPool,
        metrics: Arc<Metrics>,
        packet_size: usize,
    ) -> Self {
        Self {
            pipeline,
            pool,
            metrics,
            packet_size,
            locals: Vec::new(),
        }
    }

    /// Write from a uniformly chosen socket of `sockets` instead of the pool.
    pub fn with_local_sockets(mut self, sockets: Vec<Arc<UdpSocket>>) -> Self {
        self.locals = sockets;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Encode `payload` and write it to `address`, returning the number of
    /// bytes written.
    ///
    /// Every failure is also reported as a `send-failed` event; nothing is
    /// retried.
    ///
    /// # Errors
    /// - `MuxError::OversizedPacket` if `payload` or its encoded form exceeds
    ///   the packet size
    /// - the codec error if encoding fails
    /// - `MuxError::ConnectionUnavailable` if no socket could be obtained
    /// - `MuxError::Io` if the write fails
    #[instrument(
        name = "packet",
        skip(self, payload, address),
        fields(packet = %PacketId::new(), peer = %address)
    )]
    pub async fn send(&self, payload: &[u8], address: &str) -> Result<usize> {
        if payload.len() > self.packet_size {
            let e = MuxError::OversizedPacket(payload.len());
            return Err(self.fail(e, "Packet rejected, encode failed"));
        }

        let encoded = match self.pipeline.encode(payload.to_vec()) {
            Ok(encoded) => encoded,
            Err(e) => return Err(self.fail(e, "Packet rejected, encode failed")),
        };
        // The receiving side applies the same bound to what arrives on the wire
        if encoded.len() > self.packet_size {
            let e = MuxError::OversizedPacket(encoded.len());
            return Err(self.fail(e, "Packet rejected, encode failed"));
        }

        let written = if self.locals.is_empty() {
            let conn = match self.pool.get(address).await {
                Ok(conn) => conn,
                Err(e) => {
                    let e = MuxError::ConnectionUnavailable(format!("{address}: {e}"));
                    return Err(self.fail(e, "Packet not sent, connection unavailable"));
                }
            };
            conn.write(&encoded).await
        } else {
            match self.resolve(address).await {
                Ok(target) => self.write_spread(&encoded, target).await,
                Err(e) => return Err(self.fail(e, "Packet not sent, connection unavailable")),
            }
        };

        match written {
            Ok(bytes) => {
                self.metrics.packet_sent(bytes as u64);
                info!(status = PacketStatus::Sent.as_str(), bytes, "Packet sent");
                Ok(bytes)
            }
            Err(e) => Err(self.fail(e, "Packet not sent, write failed")),
        }
    }

    /// Run [`Client::send`] on its own task.
    pub fn spawn_send(&self, payload: Vec<u8>, address: String) -> JoinHandle<Result<usize>> {
        let client = self.clone();
        tokio::spawn(async move { client.send(&payload, &address).await })
    }

    /// Drop every pooled connection.
    pub fn close(&self) {
        self.pool.clear();
    }

    pub fn healthcheck(&self) -> Result<()> {
        Ok(())
    }

    fn fail(&self, error: MuxError, message: &'static str) -> MuxError {
        self.metrics.record(PacketStatus::SendFailed);
        warn!(
            status = PacketStatus::SendFailed.as_str(),
            error = %error,
            "{message}"
        );
        error
    }

    async fn resolve(&self, address: &str) -> Result<SocketAddr> {
        let mut addrs = lookup_host(address)
            .await
            .map_err(|e| MuxError::ConnectionUnavailable(format!("{address}: {e}")))?;
        addrs.next().ok_or_else(|| {
            MuxError::ConnectionUnavailable(format!("{address} did not resolve to any address"))
        })
    }

    async fn write_spread(&self, payload: &[u8], target: SocketAddr) -> Result<usize> {
        let index = rand::rng().random_range(0..self.locals.len());
        Ok(self.locals[index].send_to(payload, target).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[allow(clippy::unwrap_used)]
    fn client(middlewares: &[&str], packet_size: usize) -> Client {
        let config = ClientConfig {
            middlewares: middlewares.iter().map(|s| s.to_string()).collect(),
            packet_size,
            ..ClientConfig::default()
        };
        Client::dial(&config).unwrap()
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_send_reaches_peer_and_reuses_connection() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = peer.local_addr().unwrap().to_string();
        let client = client(&[], 64);

        assert_eq!(client.send(b"ping", &address).await.unwrap(), 4);
        assert_eq!(client.send(b"pong", &address).await.unwrap(), 4);
        assert_eq!(client.pool().len(), 1);

        let mut buf = [0u8; 64];
        let (n, _) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(client.metrics().count(PacketStatus::Sent), 2);
    }

    #[tokio::test]
    async fn test_oversized_send_is_refused() {
        let client = client(&[], 4);
        let result = client.send(b"too long", "127.0.0.1:9").await;
        assert!(matches!(result, Err(MuxError::OversizedPacket(8))));
        assert_eq!(client.metrics().count(PacketStatus::SendFailed), 1);
        assert!(client.pool().is_empty());
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_encoded_growth_past_packet_size_is_refused() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = peer.local_addr().unwrap().to_string();
        let client = client(&["lz4"], 64);

        // Pseudo-random bytes do not compress, so lz4 adds framing overhead
        let mut state = 0x2545_f491_u32;
        let payload: Vec<u8> = (0..64)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();

        let result = client.send(&payload, &address).await;
        assert!(matches!(result, Err(MuxError::OversizedPacket(n)) if n > 64));
        assert_eq!(client.metrics().count(PacketStatus::SendFailed), 1);
        assert_eq!(client.metrics().count(PacketStatus::Sent), 0);
        assert!(client.pool().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_destination() {
        let client = client(&[], 64);
        let result = client.send(b"x", "not an address").await;
        assert!(matches!(result, Err(MuxError::ConnectionUnavailable(_))));
        assert_eq!(client.metrics().count(PacketStatus::SendFailed), 1);
        assert!(client.pool().is_empty());
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_spread_uses_local_sockets() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = peer.local_addr().unwrap().to_string();
        let local = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let local_addr = local.local_addr().unwrap();
        let client = client(&["lz4"], 64).with_local_sockets(vec![local]);

        client
            .spawn_send(b"hello".to_vec(), address)
            .await
            .unwrap()
            .unwrap();

        let mut buf = [0u8; 128];
        let (n, from) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(from, local_addr);
        assert_ne!(&buf[..n], b"hello");
        assert!(client.pool().is_empty());
    }
}
