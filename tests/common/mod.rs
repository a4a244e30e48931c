//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use fdlink::{FrameObserver, Link, LinkConfig};
use parking_lot::Mutex;

/// Observer that records deliveries and lifecycle events. Clones share
/// the same record.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    received: Arc<Mutex<Vec<Vec<u8>>>>,
    acked: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().clone()
    }

    pub fn received_count(&self) -> usize {
        self.received.lock().len()
    }

    pub fn acked(&self) -> usize {
        self.acked.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl FrameObserver for Recorder {
    fn on_frame_received(&mut self, _address: u8, payload: &[u8]) {
        self.received.lock().push(payload.to_vec());
    }

    fn on_frame_sent(&mut self, _address: u8, _payload: &[u8]) {
        self.acked.fetch_add(1, Ordering::SeqCst);
    }

    fn on_connect(&mut self, _address: u8) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    fn on_disconnect(&mut self, _address: u8) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Payload number `index`: its index followed by filler that includes
/// bytes needing escapes.
pub fn numbered_payload(index: u32, len: usize) -> Vec<u8> {
    let mut payload = vec![0u8; len.max(4)];
    payload[..4].copy_from_slice(&index.to_le_bytes());
    for (i, byte) in payload[4..].iter_mut().enumerate() {
        *byte = match i % 3 {
            0 => 0x7E,
            1 => 0x7D,
            _ => index as u8,
        };
    }
    payload
}

/// Move every pending byte from `from` to `to` at time `now`.
pub fn pump<A: FrameObserver, B: FrameObserver>(from: &Link<A>, to: &Link<B>, now: Instant) -> usize {
    let mut wire = [0u8; 1024];
    let mut total = 0;
    loop {
        let n = from.get_tx_data_at(&mut wire, now);
        if n == 0 {
            return total;
        }
        to.on_rx_data_at(&wire[..n], now);
        total += n;
    }
}

/// Configuration with short timers for tests.
pub fn fast_config() -> LinkConfig {
    LinkConfig::builder()
        .address(5)
        .retry_timeout(Duration::from_millis(20))
        .ack_delay(Duration::from_millis(2))
        .build()
        .unwrap()
}
