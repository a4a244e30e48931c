//! In-memory wire with fault injection.
//!
//! [`MemoryWire::pair`] returns two connected endpoints implementing
//! [`ReadBytes`] and [`WriteBytes`]. Each direction buffers written bytes
//! until a frame is complete (closing FLAG) and then applies its fault model
//! to the whole frame:
//!
//! | Fault       | Effect                                          |
//! |-------------|-------------------------------------------------|
//! | Loss        | the frame never arrives                         |
//! | Duplication | the frame arrives twice, back to back           |
//! | Corruption  | one bit of the frame body is flipped            |
//!
//! The generator is seeded, so a failing run can be replayed.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::constants::{ESCAPE, FLAG};
use crate::core::{ReadBytes, WriteBytes};

/// Fault model of one direction.
///
/// Rates are probabilities in `[0.0, 1.0]`; the setters clamp out-of-range
/// values and treat NaN as zero.
#[derive(Debug, Clone)]
pub struct WireConfig {
    loss_rate: f64,
    duplicate_rate: f64,
    corrupt_rate: f64,
    read_timeout: Duration,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            corrupt_rate: 0.0,
            read_timeout: Duration::from_millis(5),
        }
    }
}

impl WireConfig {
    /// Fault-free wire.
    pub fn lossless() -> Self {
        Self::default()
    }

    /// Set the loss rate.
    pub fn with_loss(mut self, rate: f64) -> Self {
        self.loss_rate = probability(rate);
        self
    }

    /// Set the duplication rate.
    pub fn with_duplication(mut self, rate: f64) -> Self {
        self.duplicate_rate = probability(rate);
        self
    }

    /// Set the corruption rate.
    pub fn with_corruption(mut self, rate: f64) -> Self {
        self.corrupt_rate = probability(rate);
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Probability that a frame is dropped.
    pub fn loss_rate(&self) -> f64 {
        self.loss_rate
    }

    /// Probability that a frame is delivered twice.
    pub fn duplicate_rate(&self) -> f64 {
        self.duplicate_rate
    }

    /// Probability that one bit of a frame is flipped.
    pub fn corrupt_rate(&self) -> f64 {
        self.corrupt_rate
    }

    /// How long a read waits for data before returning `Ok(0)`.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

fn probability(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

/// Fault counters of one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WireStats {
    /// Frames that were written.
    pub frames: u64,
    /// Frames dropped.
    pub dropped: u64,
    /// Frames delivered twice.
    pub duplicated: u64,
    /// Frames with a flipped bit.
    pub corrupted: u64,
}

#[derive(Debug)]
struct Channel {
    config: WireConfig,
    rng: StdRng,
    /// Bytes of the frame being written.
    partial: Vec<u8>,
    /// Bytes ready for the reader.
    ready: VecDeque<u8>,
    stats: WireStats,
}

impl Channel {
    fn new(config: WireConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            partial: Vec::new(),
            ready: VecDeque::new(),
            stats: WireStats::default(),
        }
    }

    /// Accept written bytes; returns whether anything became readable.
    fn push(&mut self, data: &[u8]) -> bool {
        let before = self.ready.len();
        for &byte in data {
            self.partial.push(byte);
            // A frame is complete at a FLAG that follows some body byte
            if byte == FLAG && self.partial.iter().any(|&b| b != FLAG) {
                let mut frame = std::mem::take(&mut self.partial);
                self.release(&mut frame);
            }
        }
        self.ready.len() > before
    }

    fn release(&mut self, frame: &mut [u8]) {
        self.stats.frames += 1;

        if self.rng.gen_bool(self.config.loss_rate) {
            self.stats.dropped += 1;
            return;
        }
        if self.rng.gen_bool(self.config.corrupt_rate) && self.corrupt(frame) {
            self.stats.corrupted += 1;
        }
        self.ready.extend(frame.iter().copied());
        if self.rng.gen_bool(self.config.duplicate_rate) {
            self.stats.duplicated += 1;
            self.ready.extend(frame.iter().copied());
        }
    }

    /// Flip the low bit of a body byte without creating or destroying a
    /// FLAG or ESC, so the frame boundary survives and only the checksum
    /// catches the damage.
    fn corrupt(&mut self, frame: &mut [u8]) -> bool {
        let special = |b: u8| b == FLAG || b == ESCAPE;
        let candidates: Vec<usize> = frame
            .iter()
            .enumerate()
            .filter(|&(_, &b)| !special(b) && !special(b ^ 1))
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return false;
        }
        let index = candidates[self.rng.gen_range(0..candidates.len())];
        frame[index] ^= 1;
        true
    }
}

#[derive(Debug)]
struct Pipe {
    channel: Mutex<Channel>,
    readable: Condvar,
}

impl Pipe {
    fn new(config: WireConfig, seed: u64) -> Arc<Self> {
        Arc::new(Self {
            channel: Mutex::new(Channel::new(config, seed)),
            readable: Condvar::new(),
        })
    }
}

/// One endpoint of an in-memory wire.
#[derive(Debug, Clone)]
pub struct MemoryWire {
    incoming: Arc<Pipe>,
    outgoing: Arc<Pipe>,
}

impl MemoryWire {
    /// Create two connected endpoints with the same fault model in both
    /// directions.
    pub fn pair(config: WireConfig, seed: u64) -> (Self, Self) {
        Self::pair_with(config.clone(), config, seed)
    }

    /// Create two connected endpoints; `a_to_b` governs bytes written by the
    /// first endpoint.
    pub fn pair_with(a_to_b: WireConfig, b_to_a: WireConfig, seed: u64) -> (Self, Self) {
        let forward = Pipe::new(a_to_b, seed);
        let backward = Pipe::new(b_to_a, seed.wrapping_add(1));
        let a = Self {
            incoming: Arc::clone(&backward),
            outgoing: Arc::clone(&forward),
        };
        let b = Self {
            incoming: forward,
            outgoing: backward,
        };
        (a, b)
    }

    /// Fault counters of the direction this endpoint writes to.
    pub fn tx_stats(&self) -> WireStats {
        self.outgoing.channel.lock().stats
    }

    /// Bytes waiting to be read by this endpoint.
    pub fn pending(&self) -> usize {
        self.incoming.channel.lock().ready.len()
    }
}

impl ReadBytes for MemoryWire {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut channel = self.incoming.channel.lock();
        if channel.ready.is_empty() {
            let timeout = channel.config.read_timeout;
            self.incoming.readable.wait_for(&mut channel, timeout);
        }

        let n = buf.len().min(channel.ready.len());
        for (slot, byte) in buf.iter_mut().zip(channel.ready.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl WriteBytes for MemoryWire {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.outgoing.channel.lock().push(buf) {
            self.outgoing.readable.notify_all();
        }
        Ok(buf.len())
    }
}
