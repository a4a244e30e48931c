//! Control field encoding (modulo-8, single byte).
//!
//! ```text
//!          bit: 7 6 5 | 4 | 3 2 1 | 0
//! Information:  N(R)  | P |  N(S) | 0
//!  Supervisory: N(R)  |P/F| S S 0 | 1
//!   Unnumbered: M M M |P/F| M M 1 | 1
//! ```

use crate::core::Violation;
use crate::core::constants::{
    PF_BIT, S_CODE_REJ, S_CODE_RNR, S_CODE_RR, S_CODE_SREJ, S_FRAME_BITS, SEQ_MODULUS, U_DISC,
    U_DM, U_FRAME_BITS, U_SABM, U_UA,
};

const SEQ_MASK: u8 = SEQ_MODULUS - 1;

/// Supervisory frame variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisoryKind {
    /// Receive-Ready: acknowledgment only.
    ReceiveReady,
    /// Reject: retransmit everything from N(R).
    Reject,
}

impl SupervisoryKind {
    fn code(self) -> u8 {
        match self {
            Self::ReceiveReady => S_CODE_RR,
            Self::Reject => S_CODE_REJ,
        }
    }
}

/// Unnumbered frame variants (connection control).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnnumberedKind {
    /// SABM.
    ConnectRequest,
    /// UA.
    ConnectAck,
    /// DISC.
    DisconnectRequest,
    /// DM.
    DisconnectAck,
}

impl UnnumberedKind {
    fn code(self) -> u8 {
        match self {
            Self::ConnectRequest => U_SABM,
            Self::ConnectAck => U_UA,
            Self::DisconnectRequest => U_DISC,
            Self::DisconnectAck => U_DM,
        }
    }

    /// Check if this frame is sent as a command (C/R bit set).
    pub fn is_command(self) -> bool {
        matches!(self, Self::ConnectRequest | Self::DisconnectRequest)
    }
}

/// Decoded control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Information frame carrying a payload.
    Information {
        /// Send sequence number N(S).
        ns: u8,
        /// Piggy-backed receive sequence number N(R).
        nr: u8,
        /// Poll bit.
        poll: bool,
    },
    /// Supervisory frame.
    Supervisory {
        /// RR or REJ.
        kind: SupervisoryKind,
        /// Receive sequence number N(R).
        nr: u8,
        /// Poll/final bit.
        poll: bool,
    },
    /// Unnumbered frame.
    Unnumbered {
        /// Connection-control variant.
        kind: UnnumberedKind,
        /// Poll/final bit.
        poll: bool,
    },
}

impl Control {
    /// Information frame control.
    pub fn information(ns: u8, nr: u8) -> Self {
        Self::Information {
            ns: ns & SEQ_MASK,
            nr: nr & SEQ_MASK,
            poll: false,
        }
    }

    /// Supervisory frame control.
    pub fn supervisory(kind: SupervisoryKind, nr: u8, poll: bool) -> Self {
        Self::Supervisory {
            kind,
            nr: nr & SEQ_MASK,
            poll,
        }
    }

    /// Unnumbered frame control.
    pub fn unnumbered(kind: UnnumberedKind) -> Self {
        Self::Unnumbered {
            kind,
            poll: kind.is_command(),
        }
    }

    /// Encode to the wire byte.
    pub fn to_byte(self) -> u8 {
        let pf = |p: bool| if p { PF_BIT } else { 0 };
        match self {
            Self::Information { ns, nr, poll } => {
                ((nr & SEQ_MASK) << 5) | pf(poll) | ((ns & SEQ_MASK) << 1)
            }
            Self::Supervisory { kind, nr, poll } => {
                ((nr & SEQ_MASK) << 5) | pf(poll) | (kind.code() << 2) | S_FRAME_BITS
            }
            Self::Unnumbered { kind, poll } => kind.code() | pf(poll),
        }
    }

    /// Decode a wire byte.
    pub fn from_byte(byte: u8) -> Result<Self, Violation> {
        let poll = byte & PF_BIT != 0;
        if byte & 0x01 == 0 {
            return Ok(Self::Information {
                ns: (byte >> 1) & SEQ_MASK,
                nr: byte >> 5,
                poll,
            });
        }
        if byte & 0x03 == S_FRAME_BITS {
            let kind = match (byte >> 2) & 0x03 {
                S_CODE_RR => SupervisoryKind::ReceiveReady,
                S_CODE_REJ => SupervisoryKind::Reject,
                code @ (S_CODE_RNR | S_CODE_SREJ) => {
                    return Err(Violation::UnsupportedSupervisory(code));
                }
                _ => return Err(Violation::UnknownControl(byte)),
            };
            return Ok(Self::Supervisory {
                kind,
                nr: byte >> 5,
                poll,
            });
        }
        debug_assert_eq!(byte & 0x03, U_FRAME_BITS);
        let kind = match byte & !PF_BIT {
            U_SABM => UnnumberedKind::ConnectRequest,
            U_UA => UnnumberedKind::ConnectAck,
            U_DISC => UnnumberedKind::DisconnectRequest,
            U_DM => UnnumberedKind::DisconnectAck,
            _ => return Err(Violation::UnknownControl(byte)),
        };
        Ok(Self::Unnumbered { kind, poll })
    }

    /// N(R) carried by I and S frames.
    pub fn nr(self) -> Option<u8> {
        match self {
            Self::Information { nr, .. } | Self::Supervisory { nr, .. } => Some(nr),
            Self::Unnumbered { .. } => None,
        }
    }

    /// Poll/final bit.
    pub fn poll(self) -> bool {
        match self {
            Self::Information { poll, .. }
            | Self::Supervisory { poll, .. }
            | Self::Unnumbered { poll, .. } => poll,
        }
    }

    /// Check if the frame class carries an information field.
    pub fn has_payload(self) -> bool {
        matches!(self, Self::Information { .. })
    }

    /// Check if the frame is a command (C/R bit set in the address).
    pub fn is_command(self) -> bool {
        match self {
            Self::Information { .. } => true,
            Self::Supervisory { poll, .. } => poll,
            Self::Unnumbered { kind, .. } => kind.is_command(),
        }
    }
}
