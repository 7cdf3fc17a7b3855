//! # Utility Modules
//!
//! Supporting utilities for compression, logging and metrics.
//!
//! ## Components
//! - **Compression**: LZ4 block and Zstd frame helpers with output limits
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe per-multiplexer event counters
//!
//! ## Security
//! - Decompression bomb protection (packet size for LZ4, 16MB for Zstd)

pub mod compression;
pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
