//! # Core Packet Components
//!
//! The packet record, the middleware codec trait and the ordered codec
//! pipeline that every inbound and outbound payload passes through.
//!
//! ## Components
//! - **Packet**: Identified payload plus the peer address it came from or goes to
//! - **Middleware**: Named, reversible byte transformation (`lz4`, `zstd`)
//! - **Pipeline**: Ordered middleware chain; encode runs forward, decode in reverse
//!
//! ## Order
//! ```text
//! send:    payload -> m[0] -> m[1] -> ... -> m[n-1] -> wire
//! receive: wire -> m[n-1] -> ... -> m[1] -> m[0] -> payload
//! ```
//!
//! ## Security
//! - LZ4 output is bounded by the configured packet size
//! - Zstd output is bounded by 16MB

pub mod middleware;
pub mod packet;
pub mod pipeline;
