//! # Error Types
//!
//! Error handling for the multiplexer.
//!
//! This module defines every error variant that can occur while configuring,
//! running, receiving through or sending through a multiplexer.
//!
//! ## Error Categories
//! - **Configuration Errors**: missing or malformed settings, fatal to `dial`
//! - **Transport Errors**: bind/listen failures, fatal to `dial`
//! - **Packet Errors**: oversized, undecodable, unroutable or unhandled packets
//! - **Send Errors**: encode, connection or write failures on the outbound path
//! - **Lifecycle Errors**: operations on a multiplexer in the wrong state
//!
//! Packet and send errors never stop a read loop. They are turned into a
//! structured log event at the point where they occur.
//!
//! ## Example Usage
//! ```rust
//! use packet_mux::error::{MuxError, Result};
//! use tracing::{error, info};
//!
//! fn parse_size(raw: &str) -> Result<usize> {
//!     raw.parse::<usize>()
//!         .map_err(|e| MuxError::ConfigError(format!("invalid packet_size: {e}")))
//! }
//!
//! fn main() {
//!     match parse_size("1024") {
//!         Ok(size) => info!(size, "packet size accepted"),
//!         Err(e) => error!(error = %e, "bad packet size"),
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry lock errors
    pub const ERR_REGISTRY_READ_LOCK: &str = "Failed to acquire read lock on handler registry";

    /// Routing errors
    pub const ERR_EMPTY_IDENTIFIER: &str = "Dispatcher produced an empty identifier";
    pub const ERR_MISSING_DELIMITER: &str = "Routing delimiter not found in payload";
    pub const ERR_INVALID_IDENTIFIER: &str = "Routing identifier is not valid UTF-8";
}

// MuxError is the primary error type for all multiplexer operations
#[derive(Error, Debug)]
pub enum MuxError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Unknown middleware: {0}")]
    UnknownMiddleware(String),

    #[error("Unidentified packet: {0}")]
    UnidentifiedPacket(String),

    #[error("Handler not found: {0}")]
    HandlerNotFound(String),

    #[error("Handler failed: {0}")]
    HandlerError(String),

    #[error("Connection unavailable: {0}")]
    ConnectionUnavailable(String),

    #[error("Multiplexer is not running")]
    NotRunning,

    #[error("Multiplexer is already running")]
    AlreadyRunning,

    #[error("Close failed: {0}")]
    CloseError(String),

    #[error("Synchronization primitive poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using MuxError
pub type Result<T> = std::result::Result<T, MuxError>;
