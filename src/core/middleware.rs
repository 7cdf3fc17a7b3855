//! # Middlewares
//!
//! Reversible byte transforms applied to outbound payloads (`send`) and
//! undone on inbound payloads (`receive`).
//!
//! Built-in catalogue, selected by name at configuration time:
//! - `lz4`: raw LZ4 blocks; the decompressed size is bounded by the
//!   configured packet size, which must therefore be known up front
//! - `zstd`: self-describing zstd frames; no size parameter needed
//!
//! Adding a codec means implementing [`Middleware`] and adding one row to the
//! catalogue; nothing else changes.

use crate::error::{MuxError, Result};
use crate::utils::compression;

/// A reversible transform. `receive(send(x)) == x` for valid input.
pub trait Middleware: Send + Sync {
    /// Catalogue name of this middleware.
    fn name(&self) -> &'static str;

    /// Transform an outbound payload.
    fn send(&self, raw: &[u8]) -> Result<Vec<u8>>;

    /// Undo [`Middleware::send`] on an inbound payload.
    fn receive(&self, raw: &[u8]) -> Result<Vec<u8>>;
}

/// Parameters a middleware may need at construction.
#[derive(Debug, Clone, Copy)]
pub struct MiddlewareOptions {
    pub packet_size: usize,
    pub compression_level: i32,
}

/// LZ4 block compression bounded by the packet size.
#[derive(Debug, Clone, Copy)]
pub struct Lz4Block {
    pub packet_size: usize,
}

impl Middleware for Lz4Block {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn send(&self, raw: &[u8]) -> Result<Vec<u8>> {
        // The peer cannot decompress past its packet size
        if raw.len() > self.packet_size {
            return Err(MuxError::OversizedPacket(raw.len()));
        }
        Ok(compression::lz4_block_compress(raw))
    }

    fn receive(&self, raw: &[u8]) -> Result<Vec<u8>> {
        compression::lz4_block_decompress(raw, self.packet_size)
    }
}

/// Zstd streaming compression; decoded output is bounded by the packet size.
#[derive(Debug, Clone, Copy)]
pub struct ZstdStream {
    pub level: i32,
    pub packet_size: usize,
}

impl Middleware for ZstdStream {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn send(&self, raw: &[u8]) -> Result<Vec<u8>> {
        compression::zstd_compress(raw, self.level)
    }

    fn receive(&self, raw: &[u8]) -> Result<Vec<u8>> {
        compression::zstd_decompress(raw, self.packet_size)
    }
}

type Constructor = fn(&MiddlewareOptions) -> Box<dyn Middleware>;

const CATALOGUE: &[(&str, Constructor)] = &[
    ("lz4", |opts| {
        Box::new(Lz4Block {
            packet_size: opts.packet_size,
        })
    }),
    ("zstd", |opts| {
        Box::new(ZstdStream {
            level: opts.compression_level,
            packet_size: opts.packet_size,
        })
    }),
];

/// Names accepted by [`from_name`].
pub fn known_names() -> impl Iterator<Item = &'static str> {
    CATALOGUE.iter().map(|(name, _)| *name)
}

pub fn is_known(name: &str) -> bool {
    known_names().any(|known| known == name)
}

/// Build a middleware from its catalogue name.
///
/// # Errors
/// Returns `MuxError::UnknownMiddleware` for names missing from the catalogue.
pub fn from_name(name: &str, opts: &MiddlewareOptions) -> Result<Box<dyn Middleware>> {
    CATALOGUE
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, build)| build(opts))
        .ok_or_else(|| MuxError::UnknownMiddleware(name.to_string()))
}
