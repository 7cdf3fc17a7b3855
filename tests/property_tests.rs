//! Property-based tests using proptest
//!
//! These tests validate codec and routing invariants across a wide range of
//! randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use packet_mux::core::middleware::MiddlewareOptions;
use packet_mux::core::pipeline::Pipeline;
use packet_mux::utils::compression::{lz4_block_compress, lz4_block_decompress};
use packet_mux::{Dispatcher, PrefixDispatcher};
use proptest::prelude::*;

const OPTS: MiddlewareOptions = MiddlewareOptions {
    packet_size: 4096,
    compression_level: 1,
};

fn chain() -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(prop::sample::select(vec!["lz4", "zstd"]), 0..4)
}

// Property: decoding undoes encoding for every chain
proptest! {
    #[test]
    fn prop_pipeline_roundtrip(
        names in chain(),
        payload in prop::collection::vec(any::<u8>(), 0..1024),
    ) {
        let pipeline = Pipeline::from_names(&names[..], &OPTS).unwrap();
        let encoded = pipeline.encode(payload.clone()).expect("encode should not fail");
        let decoded = pipeline.decode(encoded).expect("decode should not fail");
        prop_assert_eq!(decoded, payload);
    }
}

// Property: arbitrary wire bytes never panic the decoder
proptest! {
    #[test]
    fn prop_decode_garbage_does_not_panic(
        names in chain(),
        wire in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let pipeline = Pipeline::from_names(&names[..], &OPTS).unwrap();
        let _ = pipeline.decode(wire);
    }
}

// Property: LZ4 output never exceeds the configured bound
proptest! {
    #[test]
    fn prop_lz4_respects_bound(
        payload in prop::collection::vec(any::<u8>(), 1..2048),
        bound in 1usize..2048,
    ) {
        let compressed = lz4_block_compress(&payload);
        match lz4_block_decompress(&compressed, bound) {
            Ok(out) => {
                prop_assert!(out.len() <= bound);
                prop_assert_eq!(out, payload);
            }
            Err(_) => prop_assert!(payload.len() > bound),
        }
    }
}

// Property: the prefix dispatcher returns exactly the header
proptest! {
    #[test]
    fn prop_prefix_identifier(
        identifier in "[a-z0-9_.-]{1,32}",
        body in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let mut payload = identifier.clone().into_bytes();
        payload.push(b'|');
        payload.extend_from_slice(&body);
        prop_assert_eq!(PrefixDispatcher::default().identify(&payload).unwrap(), identifier);
    }
}
