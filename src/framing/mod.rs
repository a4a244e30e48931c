//! Byte framer.
//!
//! Turns frame content into a flag-delimited, byte-stuffed wire image and
//! back. No protocol semantics live here.
//!
//! ```text
//! ┌──────┬──────────────────────────────────────────────┬──────┐
//! │ 0x7E │ stuffed( address | control | payload | FCS ) │ 0x7E │
//! └──────┴──────────────────────────────────────────────┴──────┘
//! ```
//!
//! Inside the delimiters every `0x7E`/`0x7D` byte is replaced by
//! `0x7D, byte ^ 0x20`.

pub mod checksum;
mod decoder;
mod encoder;

use thiserror::Error;

pub use checksum::ChecksumKind;
pub use decoder::{DecodeEvent, FrameDecoder};
pub use encoder::FrameEncoder;

/// Framing errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// Output buffer cannot hold the worst-case stuffed frame.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Worst-case encoded size.
        needed: usize,
        /// Output buffer size.
        available: usize,
    },
}
