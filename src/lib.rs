//! # packet-mux
//!
//! Datagram and stream multiplexer: bind one or more local sockets, run every
//! inbound unit through an ordered codec chain, route it by content to a
//! registered handler, and send replies through pooled outbound sockets.
//!
//! ## Modules
//! - [`config`]: TOML/env configuration with validation
//! - [`core`]: packets, middlewares and the codec pipeline
//! - [`protocol`]: dispatchers and the handler registry
//! - [`transport`]: UDP/TCP servers and the outbound connection pool
//! - [`service`]: the multiplexer, the outbound client and the launcher
//! - [`utils`]: compression helpers, logging setup and metrics
//!
//! ## Example
//! ```no_run
//! use packet_mux::{HandlerRegistry, Mux, MuxConfig, Packet, PrefixDispatcher, Result};
//!
//! # async fn run() -> Result<()> {
//! let mux = Mux::new(HandlerRegistry::new(), PrefixDispatcher::default());
//!
//! let replies = mux.clone();
//! mux.registry().add("echo", move |packet: Packet| -> Result<()> {
//!     replies.spawn_send(packet.payload, packet.addr.to_string());
//!     Ok(())
//! });
//!
//! mux.dial(MuxConfig {
//!     addresses: vec!["127.0.0.1:4242".to_string()],
//!     middlewares: vec!["lz4".to_string()],
//!     ..MuxConfig::default()
//! })
//! .await?;
//! # mux.close().await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::{ClientConfig, LoggingConfig, MuxConfig, NetworkConfig};
pub use crate::core::packet::{Packet, PacketId, PacketStatus};
pub use crate::core::pipeline::Pipeline;
pub use crate::error::{MuxError, Result};
pub use crate::protocol::{Dispatcher, Handler, HandlerRegistry, PrefixDispatcher, StaticDispatcher};
pub use crate::service::{Client, Launcher, Mux};
pub use crate::transport::TransportKind;
pub use crate::utils::metrics::{Metrics, MetricsSnapshot};
