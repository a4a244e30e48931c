//! Protocol constants for the fdlink wire format.
//!
//! Values in the framing and control sections are fixed by the wire format
//! and MUST NOT be changed. Values in the defaults section are only starting
//! points for [`LinkConfig`](crate::engine::LinkConfig).

use std::time::Duration;

// =============================================================================
// FRAMING
// =============================================================================

/// Frame delimiter.
pub const FLAG: u8 = 0x7E;

/// Escape byte for in-frame FLAG/ESCAPE occurrences.
pub const ESCAPE: u8 = 0x7D;

/// XOR mask applied to an escaped byte.
pub const ESCAPE_MASK: u8 = 0x20;

/// Address + control bytes preceding the payload.
pub const HEADER_SIZE: usize = 2;

// =============================================================================
// ADDRESS FIELD
// =============================================================================

/// Extension bit, always set (single-byte address).
pub const ADDRESS_EA_BIT: u8 = 0x01;

/// Command/response bit.
pub const ADDRESS_CR_BIT: u8 = 0x02;

/// Highest link address that fits the 6-bit address id.
pub const MAX_ADDRESS: u8 = 0x3F;

// =============================================================================
// CONTROL FIELD
// =============================================================================

/// Modulus of the N(S)/N(R) sequence space (3-bit fields).
pub const SEQ_MODULUS: u8 = 8;

/// Largest window the 3-bit sequence space allows.
pub const MAX_WINDOW_SIZE: u8 = SEQ_MODULUS - 1;

/// Poll/final bit.
pub const PF_BIT: u8 = 0x10;

/// Supervisory frame marker in the two low bits.
pub const S_FRAME_BITS: u8 = 0x01;

/// Unnumbered frame marker in the two low bits.
pub const U_FRAME_BITS: u8 = 0x03;

/// Receive-ready supervisory code.
pub const S_CODE_RR: u8 = 0x00;

/// Receive-not-ready supervisory code (recognised, unsupported).
pub const S_CODE_RNR: u8 = 0x01;

/// Reject supervisory code.
pub const S_CODE_REJ: u8 = 0x02;

/// Selective-reject supervisory code (recognised, unsupported).
pub const S_CODE_SREJ: u8 = 0x03;

/// Set asynchronous balanced mode (Connect-Request).
pub const U_SABM: u8 = 0x2F;

/// Unnumbered acknowledgment (Connect-Ack).
pub const U_UA: u8 = 0x63;

/// Disconnect (Disconnect-Request).
pub const U_DISC: u8 = 0x43;

/// Disconnected mode (Disconnect-Ack).
pub const U_DM: u8 = 0x0F;

// =============================================================================
// DEFAULTS
// =============================================================================

/// Default link address.
pub const DEFAULT_ADDRESS: u8 = 0;

/// Default number of outstanding information frames.
pub const DEFAULT_WINDOW_SIZE: u8 = 7;

/// Default maximum payload size per frame.
pub const DEFAULT_MAX_PAYLOAD: usize = 64;

/// Default time a blocking send waits for a free window slot.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(1000);

/// Retry timeout used when the send timeout is zero.
pub const FALLBACK_RETRY_TIMEOUT: Duration = Duration::from_millis(200);

/// Default number of retransmissions before the link is declared lost.
pub const DEFAULT_MAX_RETRIES: u8 = 2;

/// Default idle window before a pure acknowledgment is sent.
pub const DEFAULT_ACK_DELAY: Duration = Duration::from_millis(10);

/// Size of the stack chunk used by the drive operations.
pub const DRIVE_CHUNK_SIZE: usize = 64;
