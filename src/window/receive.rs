//! Receive side: expected N(S) and the acknowledgments we owe.

use std::time::{Duration, Instant};

use super::seq::{seq_add, seq_distance};

/// What to do with an incoming information frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvDecision {
    /// In sequence: hand the payload to the application.
    Deliver,
    /// Already delivered; acknowledge again, do not redeliver.
    Duplicate,
    /// A gap before this frame; request retransmission.
    OutOfSequence,
}

/// Receive sequence state.
#[derive(Debug, Clone, Default)]
pub struct ReceiveState {
    recv_seq: u8,
    /// When an acknowledgment first became owed.
    ack_pending: Option<Instant>,
    reject_pending: bool,
    /// One REJ per exception episode; cleared by the next in-sequence frame.
    reject_sent: bool,
    /// Peer polled us; answer with the F bit set.
    final_pending: bool,
}

impl ReceiveState {
    /// Create the state for a fresh session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next expected N(S); the N(R) we send.
    pub fn recv_seq(&self) -> u8 {
        self.recv_seq
    }

    /// Classify an information frame with sequence number `ns`.
    pub fn on_information(&mut self, ns: u8, now: Instant) -> RecvDecision {
        if ns == self.recv_seq {
            self.recv_seq = seq_add(self.recv_seq, 1);
            self.reject_sent = false;
            self.ack_pending.get_or_insert(now);
            return RecvDecision::Deliver;
        }

        let behind = seq_distance(ns, self.recv_seq);
        let ahead = seq_distance(self.recv_seq, ns);
        if behind <= ahead {
            self.ack_pending.get_or_insert(now);
            RecvDecision::Duplicate
        } else {
            if !self.reject_sent {
                self.reject_pending = true;
                self.reject_sent = true;
            }
            RecvDecision::OutOfSequence
        }
    }

    /// Owe an immediate RR with the F bit.
    pub fn request_final(&mut self) {
        self.final_pending = true;
    }

    /// Check if an F-bit response is owed.
    pub fn final_pending(&self) -> bool {
        self.final_pending
    }

    /// Take a pending REJ request.
    pub fn take_reject(&mut self) -> bool {
        std::mem::take(&mut self.reject_pending)
    }

    /// Check if a REJ is waiting to be sent.
    pub fn reject_pending(&self) -> bool {
        self.reject_pending
    }

    /// Check if a standalone RR must go out now.
    pub fn ack_due(&self, now: Instant, delay: Duration) -> bool {
        self.final_pending || self.ack_pending.is_some_and(|since| now >= since + delay)
    }

    /// When the delayed RR falls due.
    pub fn ack_deadline(&self, delay: Duration) -> Option<Instant> {
        self.ack_pending.map(|since| since + delay)
    }

    /// A frame carrying the current N(R) went out, with or without the
    /// F bit. Information frames cannot answer a poll.
    pub fn on_ack_sent(&mut self, final_bit: bool) {
        self.ack_pending = None;
        if final_bit {
            self.final_pending = false;
        }
    }

    /// Restart at N(S) zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(10);

    #[test]
    fn test_in_sequence_delivery() {
        let now = Instant::now();
        let mut state = ReceiveState::new();
        assert_eq!(state.on_information(0, now), RecvDecision::Deliver);
        assert_eq!(state.on_information(1, now), RecvDecision::Deliver);
        assert_eq!(state.recv_seq(), 2);
    }

    #[test]
    fn test_duplicate_is_acked_again() {
        let now = Instant::now();
        let mut state = ReceiveState::new();
        state.on_information(0, now);
        state.on_ack_sent(false);

        assert_eq!(state.on_information(0, now), RecvDecision::Duplicate);
        assert_eq!(state.recv_seq(), 1);
        assert!(state.ack_due(now + DELAY, DELAY));
        assert!(!state.reject_pending());
    }

    #[test]
    fn test_gap_sends_one_reject() {
        let now = Instant::now();
        let mut state = ReceiveState::new();
        assert_eq!(state.on_information(1, now), RecvDecision::OutOfSequence);
        assert_eq!(state.on_information(2, now), RecvDecision::OutOfSequence);
        assert!(state.take_reject());
        assert!(!state.take_reject());

        // Retransmitted frame closes the episode
        assert_eq!(state.on_information(0, now), RecvDecision::Deliver);
        assert_eq!(state.on_information(3, now), RecvDecision::OutOfSequence);
        assert!(state.take_reject());
    }

    #[test]
    fn test_duplicate_versus_gap_across_wrap() {
        let now = Instant::now();
        let mut state = ReceiveState::new();
        for ns in 0..10 {
            state.on_information(ns % 8, now);
        }
        // recv_seq is now 2
        assert_eq!(state.on_information(1, now), RecvDecision::Duplicate);
        assert_eq!(state.on_information(7, now), RecvDecision::Duplicate);
        assert_eq!(state.on_information(4, now), RecvDecision::OutOfSequence);
    }

    #[test]
    fn test_ack_delay_and_final() {
        let now = Instant::now();
        let mut state = ReceiveState::new();
        assert!(!state.ack_due(now, DELAY));

        state.on_information(0, now);
        assert!(!state.ack_due(now, DELAY));
        assert_eq!(state.ack_deadline(DELAY), Some(now + DELAY));
        assert!(state.ack_due(now + DELAY, DELAY));

        state.on_ack_sent(false);
        state.request_final();
        assert!(state.ack_due(now, DELAY));
        // A piggy-backed ack does not answer the poll
        state.on_ack_sent(false);
        assert!(state.final_pending());
        state.on_ack_sent(true);
        assert!(!state.final_pending());
        assert!(!state.ack_due(now, DELAY));
    }
}
