//! Streaming frame decoder.
//!
//! Bytes may arrive in arbitrary chunks; a frame split over several reads is
//! reassembled in a fixed buffer allocated once. After a corrupted or
//! oversized frame the decoder discards input until the next flag.

use super::checksum::ChecksumKind;
use crate::core::constants::{ESCAPE, ESCAPE_MASK, FLAG};

/// Outcome of feeding bytes to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A frame passed its checksum. The content (without checksum) has the
    /// given length and is available from [`FrameDecoder::frame`].
    Frame(usize),
    /// Checksum mismatch, abort sequence or runt frame.
    Corrupted,
    /// Frame exceeded the buffer capacity and was dropped.
    TooLarge,
}

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Waiting for a flag to synchronize.
    Hunt,
    /// Collecting frame bytes.
    Data,
    /// Previous byte was an escape.
    Escape,
}

/// Byte-stuffing decoder with checksum validation.
#[derive(Debug)]
pub struct FrameDecoder {
    checksum: ChecksumKind,
    state: DecoderState,
    /// Unstuffed frame bytes including the checksum.
    buf: Box<[u8]>,
    /// Bytes collected for the frame in progress.
    len: usize,
    /// Content length of the last completed frame.
    frame_len: usize,
}

impl FrameDecoder {
    /// Create a decoder able to hold `max_content` bytes of header + payload.
    pub fn new(checksum: ChecksumKind, max_content: usize) -> Self {
        Self {
            checksum,
            state: DecoderState::Hunt,
            buf: vec![0u8; max_content + checksum.width()].into_boxed_slice(),
            len: 0,
            frame_len: 0,
        }
    }

    /// Buffer capacity in bytes (content + checksum).
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial frame and wait for the next flag.
    pub fn reset(&mut self) {
        self.state = DecoderState::Hunt;
        self.len = 0;
        self.frame_len = 0;
    }

    /// Content of the last frame reported by [`DecodeEvent::Frame`].
    ///
    /// Valid until the next call to [`feed`](Self::feed).
    pub fn frame(&self) -> &[u8] {
        &self.buf[..self.frame_len]
    }

    /// Feed bytes until one event occurs or the input is exhausted.
    ///
    /// Returns the number of bytes consumed and the event, if any. Callers
    /// loop until all input is consumed, handling each event in between.
    pub fn feed(&mut self, data: &[u8]) -> (usize, Option<DecodeEvent>) {
        for (i, &byte) in data.iter().enumerate() {
            if let Some(event) = self.push(byte) {
                return (i + 1, Some(event));
            }
        }
        (data.len(), None)
    }

    fn push(&mut self, byte: u8) -> Option<DecodeEvent> {
        match self.state {
            DecoderState::Hunt => {
                if byte == FLAG {
                    self.state = DecoderState::Data;
                    self.len = 0;
                }
                None
            }
            DecoderState::Data => match byte {
                FLAG if self.len == 0 => None,
                FLAG => {
                    let event = self.complete();
                    self.len = 0;
                    Some(event)
                }
                ESCAPE => {
                    self.state = DecoderState::Escape;
                    None
                }
                _ => self.store(byte),
            },
            DecoderState::Escape => {
                if byte == FLAG {
                    // Abort sequence; the flag opens the next frame
                    self.state = DecoderState::Data;
                    self.len = 0;
                    return Some(DecodeEvent::Corrupted);
                }
                self.state = DecoderState::Data;
                self.store(byte ^ ESCAPE_MASK)
            }
        }
    }

    fn store(&mut self, byte: u8) -> Option<DecodeEvent> {
        if self.len == self.buf.len() {
            self.state = DecoderState::Hunt;
            self.len = 0;
            return Some(DecodeEvent::TooLarge);
        }
        self.buf[self.len] = byte;
        self.len += 1;
        None
    }

    fn complete(&mut self) -> DecodeEvent {
        let fcs_len = self.checksum.width();
        if self.len <= fcs_len {
            return DecodeEvent::Corrupted;
        }
        let content_len = self.len - fcs_len;
        let (content, rest) = self.buf.split_at(content_len);
        if !self.checksum.verify(content, &rest[..fcs_len]) {
            return DecodeEvent::Corrupted;
        }
        self.frame_len = content_len;
        DecodeEvent::Frame(content_len)
    }
}
