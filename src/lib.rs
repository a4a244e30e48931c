//! # fdlink
//!
//! Reliable, ordered, full-duplex point-to-point link over a raw byte stream
//! (UART, pipe, socket), using HDLC-style framing and go-back-N ARQ.
//!
//! - **Framing**: FLAG-delimited, byte-stuffed frames with CRC8, CRC16 or CRC32
//! - **Reliability**: modulo-8 sequence numbers, window up to 7, REJ go-back
//! - **Lifecycle**: SABM/UA/DISC/DM connection handshake, keep-alive polling
//! - **Portability**: the engine never owns the transport; it is driven with
//!   byte buffers or `ReadBytes`/`WriteBytes` capabilities
//!
//! ## Feature Flags
//!
//! - `transport` (default): tokio rx/tx pumps over `AsyncRead`/`AsyncWrite`
//! - `sim` (default): in-memory wire with seeded loss, duplication and corruption
//!
//! ## Modules
//!
//! - [`core`]: constants, errors and capability traits (always included)
//! - [`framing`]: byte stuffing and checksums
//! - [`codec`]: address and control bytes
//! - [`window`]: send window and receive sequence state
//! - [`connection`]: connection state machine
//! - [`engine`]: the [`Link`] itself
//! - [`transport`]: async pumps (requires `transport` feature)
//! - [`sim`]: fault-injecting wire (requires `sim` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use fdlink::prelude::*;
//!
//! let config = LinkConfig::builder().address(1).window_size(4).build()?;
//! let a = Link::new(config.clone(), ())?;
//! let b = Link::new(config, ())?;
//!
//! let mut wire = [0u8; 512];
//! let pump = |from: &Link, to: &Link, wire: &mut [u8]| loop {
//!     let n = from.get_tx_data(wire);
//!     if n == 0 {
//!         break;
//!     }
//!     to.on_rx_data(&wire[..n]);
//! };
//!
//! a.begin();
//! pump(&a, &b, &mut wire); // SABM
//! pump(&b, &a, &mut wire); // UA
//! assert!(a.is_connected() && b.is_connected());
//!
//! a.send(b"hello")?;
//! pump(&a, &b, &mut wire);
//! assert_eq!(b.stats().frames_received, 2);
//! # Ok::<(), fdlink::LinkError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod codec;
pub mod connection;
pub mod engine;
pub mod framing;
pub mod window;

// Async pumps (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Fault-injecting wire (feature-gated)
#[cfg(feature = "sim")]
#[cfg_attr(docsrs, doc(cfg(feature = "sim")))]
pub mod sim;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    pub use crate::connection::LinkState;
    pub use crate::engine::{Link, LinkConfig, LinkConfigBuilder, LinkStats};
    pub use crate::framing::ChecksumKind;

    #[cfg(feature = "transport")]
    pub use crate::transport::{PumpHandles, spawn};

    #[cfg(feature = "sim")]
    pub use crate::sim::{MemoryWire, WireConfig};
}

// Re-export commonly used items at crate root
pub use connection::LinkState;
pub use crate::core::{FnObserver, FrameObserver, LinkError, LinkResult, ReadBytes, Violation, WriteBytes};
pub use engine::{Link, LinkConfig, LinkStats};
pub use framing::ChecksumKind;
