//! Frame encoder: checksum, byte stuffing and flag delimiting.

use super::FramingError;
use super::checksum::ChecksumKind;
use crate::core::constants::{ESCAPE, ESCAPE_MASK, FLAG};

/// Stateless frame encoder.
///
/// Output layout:
///
/// ```text
/// FLAG | stuffed(header | payload | checksum) | FLAG
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    checksum: ChecksumKind,
}

impl FrameEncoder {
    /// Create an encoder appending the given checksum.
    pub fn new(checksum: ChecksumKind) -> Self {
        Self { checksum }
    }

    /// Checksum kind in use.
    pub fn checksum(&self) -> ChecksumKind {
        self.checksum
    }

    /// Worst-case wire size for `content_len` bytes of header + payload.
    ///
    /// Every content and checksum byte may need escaping.
    pub fn max_encoded_len(&self, content_len: usize) -> usize {
        2 + 2 * (content_len + self.checksum.width())
    }

    /// Encode one frame into `out`.
    ///
    /// The checksum covers `header` followed by `payload`. Returns the number
    /// of wire bytes written.
    pub fn encode(
        &self,
        header: &[u8],
        payload: &[u8],
        out: &mut [u8],
    ) -> Result<usize, FramingError> {
        let needed = self.max_encoded_len(header.len() + payload.len());
        if out.len() < needed {
            return Err(FramingError::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }

        let mut fcs = [0u8; 4];
        let mut sum = self.checksum.start();
        sum.update(header);
        sum.update(payload);
        let fcs_len = sum.finish(&mut fcs);

        let mut pos = 0;
        out[pos] = FLAG;
        pos += 1;
        for &byte in header.iter().chain(payload).chain(&fcs[..fcs_len]) {
            if byte == FLAG || byte == ESCAPE {
                out[pos] = ESCAPE;
                out[pos + 1] = byte ^ ESCAPE_MASK;
                pos += 2;
            } else {
                out[pos] = byte;
                pos += 1;
            }
        }
        out[pos] = FLAG;
        pos += 1;

        Ok(pos)
    }
}
