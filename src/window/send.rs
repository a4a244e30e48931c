//! Send side of the sliding window.
//!
//! Three cursors walk the sequence space:
//!
//! ```text
//!   ack_seq        tx_seq          send_seq
//!      │  in flight  │   queued      │
//!      ▼─────────────▼───────────────▼
//!      [ sent, unacked | not yet sent ]
//! ```
//!
//! `sent_high` remembers how far the wire has ever got, so a go-back-N rewind
//! of `tx_seq` does not make already-sent frames look unsent to the ack check.

use std::time::{Duration, Instant};

use super::arena::FrameArena;
use super::seq::{seq_add, seq_distance};
use crate::core::{LinkError, LinkResult, Violation};

/// Information frame selected for transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutgoingFrame<'a> {
    /// N(S) of the frame.
    pub ns: u8,
    /// Stored payload.
    pub payload: &'a [u8],
    /// The frame was already on the wire before.
    pub resend: bool,
}

/// Outstanding information frames and their retry timers.
#[derive(Debug)]
pub struct SendWindow {
    arena: FrameArena,
    window: u8,
    ack_seq: u8,
    tx_seq: u8,
    send_seq: u8,
    sent_high: u8,
}

impl SendWindow {
    /// Create a window of `window` frames of at most `mtu` bytes.
    pub fn new(window: u8, mtu: usize) -> Self {
        Self {
            arena: FrameArena::new(usize::from(window), mtu),
            window,
            ack_seq: 0,
            tx_seq: 0,
            send_seq: 0,
            sent_high: 0,
        }
    }

    /// Configured window size.
    pub fn window_size(&self) -> u8 {
        self.window
    }

    /// Oldest unacknowledged N(S).
    pub fn ack_seq(&self) -> u8 {
        self.ack_seq
    }

    /// N(S) the next submitted payload gets.
    pub fn send_seq(&self) -> u8 {
        self.send_seq
    }

    /// N(S) the next transmitted frame carries.
    pub fn tx_seq(&self) -> u8 {
        self.tx_seq
    }

    /// Frames submitted and not yet acknowledged.
    pub fn outstanding(&self) -> usize {
        usize::from(seq_distance(self.ack_seq, self.send_seq))
    }

    /// Check if no slot is free.
    pub fn is_full(&self) -> bool {
        self.outstanding() >= usize::from(self.window)
    }

    /// Check if a frame is waiting for (re)transmission.
    pub fn has_unsent(&self) -> bool {
        self.tx_seq != self.send_seq
    }

    fn in_flight(&self) -> usize {
        usize::from(seq_distance(self.ack_seq, self.tx_seq))
    }

    /// Queue a payload, returning its N(S).
    pub fn submit(&mut self, payload: &[u8]) -> LinkResult<u8> {
        if payload.len() > self.arena.mtu() {
            return Err(LinkError::PayloadTooLarge {
                size: payload.len(),
                max: self.arena.mtu(),
            });
        }
        if self.is_full() {
            return Err(LinkError::WindowFull);
        }
        let ns = self.send_seq;
        self.arena.store(self.outstanding(), payload);
        self.send_seq = seq_add(self.send_seq, 1);
        Ok(ns)
    }

    /// Take the next frame to put on the wire and arm its retry timer.
    pub fn next_frame(&mut self, now: Instant, retry_timeout: Duration) -> Option<OutgoingFrame<'_>> {
        if !self.has_unsent() {
            return None;
        }
        let ns = self.tx_seq;
        let offset = self.in_flight();
        let resend = offset < usize::from(seq_distance(self.ack_seq, self.sent_high));
        self.tx_seq = seq_add(self.tx_seq, 1);
        if !resend {
            self.sent_high = self.tx_seq;
        }
        self.arena.timer_mut(offset).arm(now, retry_timeout);
        Some(OutgoingFrame {
            ns,
            payload: self.arena.payload(offset),
            resend,
        })
    }

    /// Process a cumulative acknowledgment: every frame before `nr` is done.
    ///
    /// `on_acked` sees each released payload in order. An N(R) beyond the
    /// frames ever sent is rejected and changes nothing.
    pub fn acknowledge(&mut self, nr: u8, mut on_acked: impl FnMut(&[u8])) -> Result<usize, Violation> {
        let count = seq_distance(self.ack_seq, nr);
        if count > seq_distance(self.ack_seq, self.sent_high) {
            return Err(Violation::AckOutOfWindow {
                nr,
                ack_seq: self.ack_seq,
                sent: self.sent_high,
            });
        }
        let count = usize::from(count);
        for offset in 0..count {
            on_acked(self.arena.payload(offset));
        }
        let tx_behind = self.in_flight() < count;
        self.arena.advance(count);
        self.ack_seq = nr;
        if tx_behind {
            self.tx_seq = nr;
        }
        Ok(count)
    }

    /// Go back to the oldest unacknowledged frame (REJ received).
    ///
    /// All outstanding frames are resent with fresh retry budgets. Returns
    /// how many in-flight frames will go out again.
    pub fn rewind(&mut self) -> usize {
        let rewound = self.in_flight();
        for offset in 0..self.outstanding() {
            self.arena.timer_mut(offset).reset();
        }
        self.tx_seq = self.ack_seq;
        rewound
    }

    /// Check retry timers of in-flight frames.
    ///
    /// On the first expired frame, either fails with [`LinkError::LinkLost`]
    /// once it has used `max_retries`, or counts a retry and rewinds so that
    /// frame and everything after it is sent again. Returns the rewound N(S).
    pub fn check_timers(&mut self, now: Instant, max_retries: u8) -> LinkResult<Option<u8>> {
        let in_flight = self.in_flight();
        for offset in 0..in_flight {
            let timer = self.arena.timer_mut(offset);
            if !timer.is_expired(now) {
                continue;
            }
            if timer.retries() >= max_retries {
                return Err(LinkError::LinkLost);
            }
            timer.bump();
            for later in offset..in_flight {
                self.arena.timer_mut(later).disarm();
            }
            // offset < window <= 7
            self.tx_seq = seq_add(self.ack_seq, offset as u8);
            return Ok(Some(self.tx_seq));
        }
        Ok(None)
    }

    /// Earliest retry deadline among in-flight frames.
    pub fn next_deadline(&self) -> Option<Instant> {
        (0..self.in_flight())
            .filter_map(|offset| self.arena.timer(offset).deadline())
            .min()
    }

    /// Drop every outstanding frame and restart numbering at zero.
    pub fn reset(&mut self) {
        self.arena.clear();
        self.ack_seq = 0;
        self.tx_seq = 0;
        self.send_seq = 0;
        self.sent_high = 0;
    }
}
