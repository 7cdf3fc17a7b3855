use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{MuxError, Result};
use std::io::Read;

/// Hard ceiling for streaming decompression, whatever bound the caller asks for
const MAX_DECOMPRESSION_SIZE: usize = MAX_PAYLOAD_SIZE;

/// Chunk size used when draining a zstd decoder
const ZSTD_READ_CHUNK: usize = 8192;

/// Compresses data into a raw LZ4 block (no size header).
///
/// The receiver must know an upper bound for the decompressed size, see
/// [`lz4_block_decompress`].
pub fn lz4_block_compress(data: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress(data)
}

/// Decompresses a raw LZ4 block whose output is at most `max_size` bytes.
///
/// # Errors
/// Returns `MuxError::DecompressionFailure` if the block is malformed or
/// would expand beyond `max_size`.
pub fn lz4_block_decompress(data: &[u8], max_size: usize) -> Result<Vec<u8>> {
    let decompressed =
        lz4_flex::block::decompress(data, max_size).map_err(|_| MuxError::DecompressionFailure)?;

    if decompressed.len() > max_size {
        return Err(MuxError::DecompressionFailure);
    }
    Ok(decompressed)
}

/// Compresses data into a self-describing zstd frame.
///
/// # Errors
/// Returns `MuxError::CompressionFailure` if compression fails
pub fn zstd_compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    zstd::stream::copy_encode(data, &mut out, level).map_err(|_| MuxError::CompressionFailure)?;
    Ok(out)
}

/// Decompresses zstd frames whose output is at most `max_size` bytes
/// (never more than MAX_DECOMPRESSION_SIZE).
///
/// # Errors
/// Returns `MuxError::DecompressionFailure` if:
/// - Decompression fails
/// - Output size exceeds the bound
pub fn zstd_decompress(data: &[u8], max_size: usize) -> Result<Vec<u8>> {
    let limit = max_size.min(MAX_DECOMPRESSION_SIZE);
    let mut out = Vec::new();
    let mut reader =
        zstd::stream::Decoder::new(data).map_err(|_| MuxError::DecompressionFailure)?;

    // Read in chunks to enforce size limit
    let mut buffer = [0u8; ZSTD_READ_CHUNK];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                out.extend_from_slice(&buffer[..n]);
                if out.len() > limit {
                    return Err(MuxError::DecompressionFailure);
                }
            }
            Err(_) => return Err(MuxError::DecompressionFailure),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_lz4_block_roundtrip() {
        let original = b"Hello, World! This is a test of LZ4 block compression.";
        let compressed = lz4_block_compress(original);
        let decompressed = lz4_block_decompress(&compressed, 1024).unwrap();
        assert_eq!(original.as_slice(), decompressed.as_slice());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_zstd_roundtrip() {
        let original = b"Hello, World! This is a test of Zstd compression.";
        let compressed = zstd_compress(original, 1).unwrap();
        let decompressed = zstd_decompress(&compressed, 1024).unwrap();
        assert_eq!(original.as_slice(), decompressed.as_slice());
    }

    #[test]
    fn test_lz4_block_bound_enforced() {
        // 4 KB of zeros compresses to a handful of bytes but must not expand
        // past a 1 KB bound
        let data = vec![0u8; 4096];
        let compressed = lz4_block_compress(&data);
        assert!(lz4_block_decompress(&compressed, 1024).is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_zstd_bound_enforced() {
        // 8 MB of zeros shrinks to a few hundred bytes
        let data = vec![0u8; 8 * 1024 * 1024];
        let compressed = zstd_compress(&data, 1).unwrap();
        assert!(compressed.len() < 1024);
        assert!(zstd_decompress(&compressed, 512).is_err());
        assert_eq!(zstd_decompress(&compressed, data.len()).unwrap().len(), data.len());
    }

    #[test]
    fn test_lz4_malformed_block() {
        let malformed = vec![0xff, 0xff, 0xff, 0xff, 0x10];
        assert!(lz4_block_decompress(&malformed, 1024).is_err());
    }

    #[test]
    fn test_zstd_rejects_garbage() {
        let garbage = b"definitely not a zstd frame";
        assert!(zstd_decompress(garbage, 1024).is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_empty_input() {
        let compressed = lz4_block_compress(&[]);
        assert!(lz4_block_decompress(&compressed, 16).unwrap().is_empty());

        let compressed = zstd_compress(&[], 1).unwrap();
        assert!(zstd_decompress(&compressed, 16).unwrap().is_empty());
    }
}
