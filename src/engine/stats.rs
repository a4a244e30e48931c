//! Link counters.

/// Counters since the link was created. Not reset on reconnect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames fully handed to the transport.
    pub frames_sent: u64,
    /// Valid frames parsed from the transport.
    pub frames_received: u64,
    /// Information frames sent again.
    pub retransmissions: u64,
    /// Frames dropped on checksum mismatch or abort.
    pub crc_errors: u64,
    /// Frames dropped as malformed or misaddressed.
    pub protocol_errors: u64,
    /// Frames dropped for exceeding the receive buffer.
    pub oversized: u64,
    /// REJ frames sent.
    pub rejects_sent: u64,
    /// REJ frames received.
    pub rejects_received: u64,
    /// Information frames received again after delivery.
    pub duplicates: u64,
    /// Information frames received ahead of a gap.
    pub out_of_sequence: u64,
    /// Bytes written to the transport.
    pub bytes_tx: u64,
    /// Bytes read from the transport.
    pub bytes_rx: u64,
}

impl LinkStats {
    /// Fraction of received frames that failed validation.
    pub fn error_rate(&self) -> f64 {
        let errors = self.crc_errors + self.protocol_errors + self.oversized;
        let total = errors + self.frames_received;
        if total == 0 {
            0.0
        } else {
            errors as f64 / total as f64
        }
    }
}
