//! Frame codec.
//!
//! Interprets the address and control bytes of a decoded frame:
//!
//! ```text
//! ┌─────────┬─────────┬────────────────┐
//! │ Address │ Control │ Payload (I)    │
//! │  1 byte │  1 byte │ 0..=MTU bytes  │
//! └─────────┴─────────┴────────────────┘
//! ```
//!
//! Malformed content is reported as a [`Violation`](crate::core::Violation);
//! the engine drops such frames and lets the retransmission timers recover.

mod control;
mod frame;

pub use control::{Control, SupervisoryKind, UnnumberedKind};
pub use frame::{Address, Frame, FrameHeader};
