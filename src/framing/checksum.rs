//! Frame check sequences.
//!
//! | Kind | Algorithm | Width |
//! |------|-----------|-------|
//! | `Off` | none | 0 |
//! | `Crc8` | CRC-8/SMBUS (poly 0x07, init 0x00) | 1 |
//! | `Crc16` | CRC-16/X-25, the HDLC FCS-16 (reflected 0x8408, init/xorout 0xFFFF) | 2 |
//! | `Crc32` | CRC-32/ISO-HDLC (IEEE) | 4 |
//!
//! The checksum is appended little-endian after the frame content.
//!
//! # Test Vectors
//!
//! ```
//! use fdlink::framing::checksum::{crc8, crc16};
//!
//! assert_eq!(crc8(b"123456789"), 0xF4);
//! assert_eq!(crc16(b"123456789"), 0x906E);
//! ```

/// Selectable checksum kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChecksumKind {
    /// No checksum.
    Off,
    /// 8-bit CRC.
    Crc8,
    /// 16-bit HDLC frame check sequence.
    #[default]
    Crc16,
    /// 32-bit HDLC frame check sequence.
    Crc32,
}

impl ChecksumKind {
    /// Parse from a bit width (0, 8, 16, 32).
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Off),
            8 => Some(Self::Crc8),
            16 => Some(Self::Crc16),
            32 => Some(Self::Crc32),
            _ => None,
        }
    }

    /// Number of checksum bytes on the wire.
    pub fn width(self) -> usize {
        match self {
            Self::Off => 0,
            Self::Crc8 => 1,
            Self::Crc16 => 2,
            Self::Crc32 => 4,
        }
    }

    /// Start a running checksum.
    pub fn start(self) -> Checksum {
        match self {
            Self::Off => Checksum::Off,
            Self::Crc8 => Checksum::Crc8(0),
            Self::Crc16 => Checksum::Crc16(CRC16_INIT),
            Self::Crc32 => Checksum::Crc32(crc32fast::Hasher::new()),
        }
    }

    /// Check that `fcs` is the checksum of `content`.
    pub fn verify(self, content: &[u8], fcs: &[u8]) -> bool {
        let mut expected = [0u8; 4];
        let mut sum = self.start();
        sum.update(content);
        let n = sum.finish(&mut expected);
        n == fcs.len() && expected[..n] == *fcs
    }
}

/// Running checksum over one frame.
pub enum Checksum {
    /// No checksum.
    Off,
    /// CRC-8 register.
    Crc8(u8),
    /// CRC-16 register (before the final xor).
    Crc16(u16),
    /// CRC-32 state.
    Crc32(crc32fast::Hasher),
}

impl Checksum {
    /// Feed more frame content.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Checksum::Off => {}
            Checksum::Crc8(crc) => *crc = crc8_update(*crc, data),
            Checksum::Crc16(crc) => *crc = crc16_update(*crc, data),
            Checksum::Crc32(hasher) => hasher.update(data),
        }
    }

    /// Write the final checksum little-endian into `out`.
    ///
    /// Returns the number of bytes written. `out` must hold at least
    /// [`ChecksumKind::width`] bytes.
    pub fn finish(self, out: &mut [u8]) -> usize {
        match self {
            Checksum::Off => 0,
            Checksum::Crc8(crc) => {
                out[0] = crc;
                1
            }
            Checksum::Crc16(crc) => {
                out[..2].copy_from_slice(&(crc ^ CRC16_XOROUT).to_le_bytes());
                2
            }
            Checksum::Crc32(hasher) => {
                out[..4].copy_from_slice(&hasher.finalize().to_le_bytes());
                4
            }
        }
    }
}

const CRC8_POLY: u8 = 0x07;

const CRC8_TABLE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Reflected form of the CCITT polynomial 0x1021.
const CRC16_POLY_REFLECTED: u16 = 0x8408;
const CRC16_INIT: u16 = 0xFFFF;
const CRC16_XOROUT: u16 = 0xFFFF;

const CRC16_TABLE: [u16; 256] = {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut j = 0;
        while j < 8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC16_POLY_REFLECTED;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

#[inline]
fn crc8_update(crc: u8, data: &[u8]) -> u8 {
    data.iter()
        .fold(crc, |crc, &byte| CRC8_TABLE[usize::from(crc ^ byte)])
}

#[inline]
fn crc16_update(crc: u16, data: &[u8]) -> u16 {
    data.iter().fold(crc, |crc, &byte| {
        (crc >> 8) ^ CRC16_TABLE[usize::from((crc as u8) ^ byte)]
    })
}

/// CRC-8/SMBUS of `data`.
#[inline]
#[must_use]
pub fn crc8(data: &[u8]) -> u8 {
    crc8_update(0, data)
}

/// CRC-16/X-25 of `data`.
#[inline]
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    crc16_update(CRC16_INIT, data) ^ CRC16_XOROUT
}
