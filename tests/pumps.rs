//! Async pumps over a tokio duplex pipe.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Recorder, fast_config, numbered_payload};
use fdlink::transport::spawn;
use fdlink::{Link, LinkError, LinkState};

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transfer_and_teardown_over_duplex() {
    const FRAMES: u32 = 64;

    let ra = Recorder::default();
    let rb = Recorder::default();
    let a = Arc::new(Link::new(fast_config(), ra.clone()).unwrap());
    let b = Arc::new(Link::new(fast_config(), rb.clone()).unwrap());

    // Small pipe so writes are split across reads
    let (end_a, end_b) = tokio::io::duplex(32);
    let pumps_a = spawn(Arc::clone(&a), end_a);
    let pumps_b = spawn(Arc::clone(&b), end_b);

    a.begin();
    eventually("connect", || a.is_connected() && b.is_connected()).await;

    for i in 0..FRAMES {
        loop {
            match a.send(&numbered_payload(i, 40)) {
                Ok(()) => break,
                Err(LinkError::WindowFull) => tokio::time::sleep(Duration::from_millis(1)).await,
                Err(err) => panic!("send failed: {err}"),
            }
        }
    }
    eventually("delivery", || rb.received_count() == FRAMES as usize).await;
    eventually("acknowledgment", || a.outstanding() == 0).await;

    let expected: Vec<Vec<u8>> = (0..FRAMES).map(|i| numbered_payload(i, 40)).collect();
    assert_eq!(rb.received(), expected);
    assert_eq!(ra.acked(), FRAMES as usize);

    a.end();
    eventually("teardown", || {
        a.state() == LinkState::Disconnected && b.state() == LinkState::Disconnected
    })
    .await;
    assert_eq!(rb.disconnects(), 1);

    pumps_a.abort();
    pumps_b.abort();
}
