//! Async transport pumps (tokio).
//!
//! Runs the receive side and the transmit side of a [`Link`](crate::engine::Link)
//! as two independent tasks over any [`AsyncRead`](tokio::io::AsyncRead) +
//! [`AsyncWrite`](tokio::io::AsyncWrite) byte stream: a serial port, a TCP
//! stream or an in-memory duplex pipe. The tasks share nothing but the link.

mod pump;

pub use pump::{
    DEFAULT_POLL_INTERVAL, PumpHandles, run_rx, run_tx, spawn, spawn_with_interval,
};
