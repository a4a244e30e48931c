//! Address field, frame header and the borrowed frame view.

use std::fmt;

use super::control::Control;
use crate::core::Violation;
use crate::core::constants::{ADDRESS_CR_BIT, ADDRESS_EA_BIT, HEADER_SIZE, MAX_ADDRESS};

/// 6-bit link address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(u8);

impl Address {
    /// Create an address; `None` if `id` exceeds [`MAX_ADDRESS`].
    pub const fn new(id: u8) -> Option<Self> {
        if id > MAX_ADDRESS {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Address id (0..=63).
    pub const fn id(self) -> u8 {
        self.0
    }

    /// Encode the address byte with the given C/R bit.
    pub const fn to_byte(self, command: bool) -> u8 {
        let cr = if command { ADDRESS_CR_BIT } else { 0 };
        (self.0 << 2) | cr | ADDRESS_EA_BIT
    }

    /// Decode an address byte into the id and the C/R bit.
    ///
    /// Returns `None` when the extension bit is clear; multi-byte addresses
    /// are not supported.
    pub const fn from_byte(byte: u8) -> Option<(Self, bool)> {
        if byte & ADDRESS_EA_BIT == 0 {
            return None;
        }
        Some((Self(byte >> 2), byte & ADDRESS_CR_BIT != 0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address and control fields of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Link address.
    pub address: Address,
    /// C/R bit of the address field.
    pub command: bool,
    /// Decoded control field.
    pub control: Control,
}

impl FrameHeader {
    /// Header for an outgoing frame; the C/R bit follows the frame class.
    pub fn new(address: Address, control: Control) -> Self {
        Self {
            address,
            command: control.is_command(),
            control,
        }
    }

    /// Serialize to the two header bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        [self.address.to_byte(self.command), self.control.to_byte()]
    }
}

/// Parsed frame borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Address and control.
    pub header: FrameHeader,
    /// Information field; empty for S and U frames.
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Parse decoded frame content (checksum already stripped).
    ///
    /// Frames for another address, unknown control bytes and S/U frames with
    /// an information field are rejected.
    pub fn parse(content: &'a [u8], expected: Address) -> Result<Self, Violation> {
        let [address, control, payload @ ..] = content else {
            return Err(Violation::TooShort);
        };

        let mismatch = |actual| Violation::AddressMismatch {
            expected: expected.id(),
            actual,
        };
        let (address, command) = Address::from_byte(*address).ok_or_else(|| mismatch(*address >> 2))?;
        if address != expected {
            return Err(mismatch(address.id()));
        }

        let control = Control::from_byte(*control)?;
        if !control.has_payload() && !payload.is_empty() {
            return Err(Violation::UnexpectedPayload);
        }

        Ok(Self {
            header: FrameHeader {
                address,
                command,
                control,
            },
            payload,
        })
    }

    /// Decoded control field.
    pub fn control(&self) -> Control {
        self.header.control
    }
}
