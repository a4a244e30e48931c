//! fdlink loopback demo
//!
//! Connects two links over a tokio duplex pipe, pushes a batch of frames
//! from one side to the other and prints both sides' counters.
//!
//! Environment variables:
//! - FDLINK_FRAMES: number of frames to send (default 100)
//! - FDLINK_PAYLOAD: payload size in bytes (default 48)
//! - FDLINK_PIPE: duplex pipe capacity in bytes (default 64)
//! - RUST_LOG: tracing filter (default info)

use std::sync::Arc;
use std::time::{Duration, Instant};

use fdlink::prelude::*;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        error!(%err, "loopback failed");
        std::process::exit(1);
    }
}

async fn run() -> LinkResult<()> {
    let frames: usize = env_or("FDLINK_FRAMES", 100);
    let payload_size: usize = env_or("FDLINK_PAYLOAD", 48);
    let pipe: usize = env_or("FDLINK_PIPE", 64);

    let config = LinkConfig::builder()
        .address(1)
        .max_payload_size(payload_size.max(1))
        .keep_alive(Duration::from_secs(1))
        .build()?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let observer = FnObserver::new()
        .with_connect(|address| info!(address, "receiver connected"))
        .with_frame_received(move |_, payload| {
            let _ = tx.send(payload.len());
        });

    let sender = Arc::new(Link::new(config.clone(), ())?);
    let receiver = Arc::new(Link::new(config, observer)?);

    let (end_a, end_b) = tokio::io::duplex(pipe);
    let pumps_a = spawn(Arc::clone(&sender), end_a);
    let pumps_b = spawn(Arc::clone(&receiver), end_b);

    sender.begin();
    while !sender.is_connected() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    info!("sender connected");

    let started = Instant::now();
    let payload = vec![0x5Au8; payload_size];
    let producer = {
        let sender = Arc::clone(&sender);
        tokio::spawn(async move {
            for _ in 0..frames {
                loop {
                    match sender.send(&payload) {
                        Ok(()) => break,
                        Err(LinkError::WindowFull) => {
                            tokio::time::sleep(Duration::from_millis(1)).await;
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
            Ok(())
        })
    };

    let mut received = 0usize;
    let mut bytes = 0usize;
    while received < frames {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(len)) => {
                received += 1;
                bytes += len;
            }
            _ => break,
        }
    }
    let elapsed = started.elapsed();

    match producer.await {
        Ok(result) => result?,
        Err(err) => error!(%err, "producer task failed"),
    }

    sender.end();
    tokio::time::sleep(Duration::from_millis(50)).await;
    pumps_a.abort();
    pumps_b.abort();

    info!(
        received,
        bytes,
        elapsed_ms = elapsed.as_millis() as u64,
        "transfer finished"
    );
    info!(stats = ?sender.stats(), "sender");
    info!(stats = ?receiver.stats(), "receiver");
    Ok(())
}
