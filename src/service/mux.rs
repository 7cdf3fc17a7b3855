//! The multiplexer: one transport server feeding a decode, dispatch and
//! handle cycle, plus the outbound send path.
//!
//! ## Lifecycle
//! ```text
//! Unconfigured --dial--> Running --close--> Closed --dial--> Running ...
//! ```
//! `close` on anything but `Running` is a successful no-op. `close` also
//! clears the handler registry and drops every pooled connection.
//!
//! ## Receive path
//! Runs on the transport's read loop up to the hand-off:
//! 1. report `read`
//! 2. drop units larger than the packet size (`rejected-too-large`)
//! 3. wait for an admission permit when `max_in_flight` is set
//! 4. spawn one task per packet, which decodes (`rejected-unreadable`),
//!    identifies (`rejected-unidentified`), looks up the handler
//!    (`rejected-unassigned`) and calls it (`processed` or `processed-failed`)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use crate::config::MuxConfig;
use crate::core::middleware::MiddlewareOptions;
use crate::core::packet::{Packet, PacketId, PacketStatus};
use crate::core::pipeline::Pipeline;
use crate::error::{MuxError, Result};
use crate::protocol::{Dispatcher, HandlerRegistry};
use crate::service::client::Client;
use crate::transport::{ConnectionPool, Ingest, Server};
use crate::utils::metrics::Metrics;

/// Datagram/stream multiplexer.
///
/// Cloning is cheap; every clone drives the same instance, so handlers may
/// capture a clone to send replies.
#[derive(Clone)]
pub struct Mux {
    inner: Arc<Inner>,
}

struct Inner {
    registry: HandlerRegistry,
    dispatcher: Arc<dyn Dispatcher>,
    metrics: Arc<Metrics>,
    state: RwLock<State>,
}

enum State {
    Unconfigured,
    Running(Session),
    Closed,
}

struct Session {
    server: Server,
    client: Client,
    config: MuxConfig,
}

impl Mux {
    pub fn new<D: Dispatcher>(registry: HandlerRegistry, dispatcher: D) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                dispatcher: Arc::new(dispatcher),
                metrics: Arc::new(Metrics::new()),
                state: RwLock::new(State::Unconfigured),
            }),
        }
    }

    /// Build the codec pipeline and start the transport server.
    ///
    /// Allowed from `Unconfigured` and `Closed`. Nothing is left running if
    /// any step fails.
    ///
    /// # Errors
    /// - `MuxError::AlreadyRunning` if the multiplexer is running
    /// - `MuxError::ConfigError` or `MuxError::UnknownMiddleware` for a bad configuration
    /// - `MuxError::TransportError` if any address cannot be bound
    #[instrument(skip(self, config), fields(addresses = ?config.addresses, protocol = %config.server_protocol))]
    pub async fn dial(&self, config: MuxConfig) -> Result<()> {
        let mut state = self.inner.state.write().await;
        if matches!(*state, State::Running(_)) {
            return Err(MuxError::AlreadyRunning);
        }

        config.validate_strict()?;
        let opts = MiddlewareOptions {
            packet_size: config.packet_size,
            compression_level: config.compression_level,
        };
        let pipeline = Arc::new(Pipeline::from_names(&config.middlewares, &opts)?);

        let intake = Arc::new(Intake {
            pipeline: pipeline.clone(),
            dispatcher: self.inner.dispatcher.clone(),
            registry: self.inner.registry.clone(),
            metrics: self.inner.metrics.clone(),
            packet_size: config.packet_size,
            permits: config.max_in_flight.map(|n| Arc::new(Semaphore::new(n))),
        });
        let server = Server::dial(
            config.server_protocol,
            &config.addresses,
            config.packet_size,
            intake,
        )
        .await?;

        let mut client = Client::from_parts(
            pipeline.clone(),
            ConnectionPool::new(config.server_protocol),
            self.inner.metrics.clone(),
            config.packet_size,
        );
        if config.spread_outbound {
            client = client.with_local_sockets(server.sockets());
        }

        info!(
            local_addrs = ?server.local_addrs(),
            middlewares = ?pipeline.names(),
            packet_size = config.packet_size,
            "Multiplexer running"
        );
        *state = State::Running(Session {
            server,
            client,
            config,
        });
        Ok(())
    }

    /// Stop intake, clear the registry and drop pooled connections.
    ///
    /// Packets already handed off keep running to completion.
    ///
    /// # Errors
    /// `MuxError::CloseError` listing every socket that failed to close; the
    /// multiplexer is `Closed` regardless.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.inner.state.write().await;
        let session = match std::mem::replace(&mut *state, State::Closed) {
            State::Running(session) => session,
            other => {
                *state = other;
                debug!("Close on a multiplexer that is not running");
                return Ok(());
            }
        };

        let closed = session.server.close().await;
        session.client.close();
        self.inner.registry.clear();
        info!("Multiplexer closed");
        closed
    }

    /// Encode `payload` and write it to `address`.
    ///
    /// # Errors
    /// `MuxError::NotRunning` unless running, otherwise see [`Client::send`].
    pub async fn send(&self, payload: &[u8], address: &str) -> Result<usize> {
        let client = self.client().await?;
        client.send(payload, address).await
    }

    /// Run [`Mux::send`] on its own task so the caller is not blocked on
    /// socket I/O.
    pub fn spawn_send(&self, payload: Vec<u8>, address: String) -> JoinHandle<Result<usize>> {
        let mux = self.clone();
        tokio::spawn(async move { mux.send(&payload, &address).await })
    }

    pub async fn healthcheck(&self) -> Result<()> {
        match &*self.inner.state.read().await {
            State::Running(session) => {
                session.server.healthcheck()?;
                session.client.healthcheck()
            }
            _ => Err(MuxError::NotRunning),
        }
    }

    /// Addresses the transport server is bound to; empty unless running.
    pub async fn local_addrs(&self) -> Vec<SocketAddr> {
        match &*self.inner.state.read().await {
            State::Running(session) => session.server.local_addrs(),
            _ => Vec::new(),
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.inner.state.read().await, State::Running(_))
    }

    /// Configuration of the current run, if any.
    pub async fn config(&self) -> Option<MuxConfig> {
        match &*self.inner.state.read().await {
            State::Running(session) => Some(session.config.clone()),
            _ => None,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    async fn client(&self) -> Result<Client> {
        match &*self.inner.state.read().await {
            State::Running(session) => Ok(session.client.clone()),
            _ => Err(MuxError::NotRunning),
        }
    }
}

/// Receive side handed to the transport server.
#[derive(Clone)]
struct Intake {
    pipeline: Arc<Pipeline>,
    dispatcher: Arc<dyn Dispatcher>,
    registry: HandlerRegistry,
    metrics: Arc<Metrics>,
    packet_size: usize,
    permits: Option<Arc<Semaphore>>,
}

impl Ingest for Intake {
    async fn ingest(&self, frame: Vec<u8>, peer: SocketAddr) {
        let packet = Packet::new(peer, frame);
        self.metrics.packet_read(packet.len() as u64);
        debug!(
            packet = %packet.id,
            peer = %packet.addr,
            status = PacketStatus::Read.as_str(),
            bytes = packet.len(),
            "Packet read"
        );

        if packet.len() > self.packet_size {
            self.metrics.record(PacketStatus::RejectedTooLarge);
            warn!(
                packet = %packet.id,
                peer = %packet.addr,
                status = PacketStatus::RejectedTooLarge.as_str(),
                error = %MuxError::OversizedPacket(packet.len()),
                "Packet rejected, too large"
            );
            return;
        }

        let permit = match &self.permits {
            Some(permits) => match permits.clone().acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return,
            },
            None => None,
        };

        let intake = self.clone();
        let span = info_span!("packet", packet = %packet.id, peer = %packet.addr);
        tokio::spawn(
            async move {
                intake.process(packet);
                drop(permit);
            }
            .instrument(span),
        );
    }
}

impl Intake {
    fn process(&self, packet: Packet) {
        let Packet { id, addr, payload } = packet;

        let payload = match self.pipeline.decode(payload) {
            Ok(payload) => payload,
            Err(e) => return self.reject(id, addr, PacketStatus::RejectedUnreadable, &e),
        };

        let identifier = match self.dispatcher.identify(&payload) {
            Ok(identifier) => identifier,
            Err(e) => return self.reject(id, addr, PacketStatus::RejectedUnidentified, &e),
        };

        let handler = match self.registry.get(&identifier) {
            Ok(handler) => handler,
            Err(e) => return self.reject(id, addr, PacketStatus::RejectedUnassigned, &e),
        };

        match handler.handle(Packet { id, addr, payload }) {
            Ok(()) => {
                self.metrics.record(PacketStatus::Processed);
                debug!(
                    packet = %id,
                    peer = %addr,
                    status = PacketStatus::Processed.as_str(),
                    handler = %identifier,
                    "Packet processed"
                );
            }
            Err(e) => {
                self.metrics.record(PacketStatus::ProcessedFailed);
                warn!(
                    packet = %id,
                    peer = %addr,
                    status = PacketStatus::ProcessedFailed.as_str(),
                    handler = %identifier,
                    error = %e,
                    "Packet processed, handler failed"
                );
            }
        }
    }

    fn reject(&self, id: PacketId, addr: SocketAddr, status: PacketStatus, error: &MuxError) {
        self.metrics.record(status);
        warn!(
            packet = %id,
            peer = %addr,
            status = status.as_str(),
            error = %error,
            "Packet rejected"
        );
    }
}
