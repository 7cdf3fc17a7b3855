//! Concurrency tests for the shared structures and the receive fan-out

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use packet_mux::transport::{ConnectionPool, TransportKind};
use packet_mux::{HandlerRegistry, Mux, MuxConfig, Packet, PacketStatus, Result, StaticDispatcher};
use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_pool_get_yields_one_connection() {
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let address = peer.local_addr().unwrap().to_string();
    let pool = ConnectionPool::new(TransportKind::Udp);

    let mut tasks = JoinSet::new();
    for _ in 0..64 {
        let pool = pool.clone();
        let address = address.clone();
        tasks.spawn(async move { pool.get(&address).await.unwrap() });
    }

    let mut conns = Vec::new();
    while let Some(res) = tasks.join_next().await {
        conns.push(res.unwrap());
    }

    assert_eq!(pool.len(), 1);
    let stored = pool.get(&address).await.unwrap();
    assert!(conns.iter().all(|c| Arc::ptr_eq(c, &stored)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_registry_add_and_get() {
    let registry = HandlerRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut tasks = JoinSet::new();
    for i in 0..32 {
        let registry = registry.clone();
        let calls = calls.clone();
        tasks.spawn(async move {
            let id = format!("handler-{i}");
            registry.add(id.clone(), move |_p: Packet| -> Result<()> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            for _ in 0..100 {
                let handler = registry.get(&id).unwrap();
                handler
                    .handle(Packet::new("127.0.0.1:1".parse().unwrap(), Vec::new()))
                    .unwrap();
            }
        });
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
    assert_eq!(registry.len(), 32);
    assert_eq!(calls.load(Ordering::SeqCst), 32 * 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn burst_fans_out_to_every_packet() {
    let mux = Mux::new(HandlerRegistry::new(), StaticDispatcher::new("count"));
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();
    mux.registry()
        .add("count", move |_p: Packet| -> Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    mux.dial(MuxConfig {
        addresses: vec!["127.0.0.1:0".to_string()],
        middlewares: vec!["lz4".to_string()],
        ..MuxConfig::default()
    })
    .await
    .unwrap();

    let target = mux.local_addrs().await[0];
    let peers = 4;
    let per_peer = 25;
    let mut tasks = JoinSet::new();
    for p in 0..peers {
        tasks.spawn(async move {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            for i in 0..per_peer {
                let payload = packet_mux::utils::compression::lz4_block_compress(&[p as u8, i as u8]);
                socket.send_to(&payload, target).await.unwrap();
                sleep(Duration::from_millis(1)).await;
            }
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }

    let expected = (peers * per_peer) as u64;
    timeout(Duration::from_secs(10), async {
        while mux.metrics().count(PacketStatus::Processed) < expected {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("every packet should be processed");
    assert_eq!(handled.load(Ordering::SeqCst) as u64, expected);
    mux.close().await.unwrap();
}
