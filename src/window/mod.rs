//! Window and retransmission management.
//!
//! Go-back-N over a modulo-8 sequence space:
//!
//! - [`SendWindow`] holds up to `window_size` unacknowledged frames in a
//!   preallocated [`FrameArena`], each with its own [`RetryTimer`].
//! - [`ReceiveState`] tracks the next expected N(S) and decides whether an
//!   incoming frame is delivered, re-acknowledged or rejected.

mod arena;
mod receive;
mod send;
mod seq;
mod timer;

pub use arena::FrameArena;
pub use receive::{ReceiveState, RecvDecision};
pub use send::{OutgoingFrame, SendWindow};
pub use seq::{seq_add, seq_distance};
pub use timer::RetryTimer;
