//! Error types for the fdlink engine.
//!
//! Most receive-path errors never reach the application: corrupted frames and
//! protocol violations are dropped, counted and recovered by retransmission.
//! They are still typed so the pipeline stages can report them precisely.

use std::io;

use thiserror::Error;

use crate::framing::FramingError;

/// Malformed or out-of-range frame content.
///
/// The offending frame is discarded; the connection stays up.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Frame shorter than address + control.
    #[error("frame too short")]
    TooShort,

    /// Address id does not match the configured link address.
    #[error("address mismatch: expected {expected}, got {actual}")]
    AddressMismatch {
        /// Configured link address.
        expected: u8,
        /// Address id carried by the frame.
        actual: u8,
    },

    /// Control byte does not encode a known frame.
    #[error("unknown control field 0x{0:02x}")]
    UnknownControl(u8),

    /// RNR/SREJ supervisory frames are not part of this protocol.
    #[error("unsupported supervisory code {0}")]
    UnsupportedSupervisory(u8),

    /// Supervisory or unnumbered frame carried an information field.
    #[error("payload on a frame without information field")]
    UnexpectedPayload,

    /// N(R) acknowledges frames that were never sent.
    #[error("N(R)={nr} outside window (ack_seq={ack_seq}, sent up to {sent})")]
    AckOutOfWindow {
        /// Received N(R).
        nr: u8,
        /// Oldest unacknowledged N(S).
        ack_seq: u8,
        /// One past the highest N(S) put on the wire.
        sent: u8,
    },
}

/// Errors surfaced by the link engine.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Checksum mismatch or aborted frame.
    #[error("frame corrupted")]
    FrameCorrupted,

    /// Malformed control field or sequence number.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] Violation),

    /// All window slots are occupied; retry after an acknowledgment.
    #[error("send window full")]
    WindowFull,

    /// Information frames only flow while connected.
    #[error("link not connected")]
    NotConnected,

    /// Payload exceeds the configured maximum payload size.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Submitted payload size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Incoming frame exceeds the receive buffer.
    #[error("frame too large (max {max} bytes)")]
    FrameTooLarge {
        /// Receive buffer capacity.
        max: usize,
    },

    /// Frame could not be written into the transmit buffer.
    #[error("encode failed: {0}")]
    Encode(#[from] FramingError),

    /// Error reported by the byte transport.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Retry budget exhausted; the session was torn down.
    #[error("link lost: retries exhausted")]
    LinkLost,

    /// Configuration rejected at build time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LinkError {
    /// Check if this error is handled by dropping the frame.
    ///
    /// Recovery relies on the retransmission timers.
    pub fn is_silent_drop(&self) -> bool {
        matches!(
            self,
            LinkError::FrameCorrupted
                | LinkError::ProtocolViolation(_)
                | LinkError::FrameTooLarge { .. }
        )
    }

    /// Check if this error ended the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::LinkLost)
    }

    /// Check if the caller should simply retry the operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LinkError::WindowFull | LinkError::Transport(_))
    }
}

/// Result type for link operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// Check if an I/O error only means "no data now".
pub(crate) fn is_idle_io(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
