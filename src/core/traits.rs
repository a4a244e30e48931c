//! Capability traits consumed by the link engine.
//!
//! The engine never talks to a serial port or socket directly. It is handed
//! a [`ReadBytes`]/[`WriteBytes`] capability for each drive call and reports
//! what happened through a [`FrameObserver`].

use std::io;

/// Receiver of link events.
///
/// All methods are invoked synchronously from inside a drive call while the
/// engine lock is held. Implementations must not block and must not call
/// back into the same [`Link`](crate::engine::Link).
///
/// # Example
///
/// ```
/// use fdlink::core::FrameObserver;
///
/// #[derive(Default)]
/// struct Collector {
///     received: Vec<Vec<u8>>,
/// }
///
/// impl FrameObserver for Collector {
///     fn on_frame_received(&mut self, _address: u8, payload: &[u8]) {
///         self.received.push(payload.to_vec());
///     }
/// }
/// ```
pub trait FrameObserver: Send {
    /// An information frame was delivered in order.
    fn on_frame_received(&mut self, address: u8, payload: &[u8]) {
        let _ = (address, payload);
    }

    /// An outgoing information frame was acknowledged by the peer.
    fn on_frame_sent(&mut self, address: u8, payload: &[u8]) {
        let _ = (address, payload);
    }

    /// The link entered the connected state.
    fn on_connect(&mut self, address: u8) {
        let _ = address;
    }

    /// The link left the connected state.
    fn on_disconnect(&mut self, address: u8) {
        let _ = address;
    }
}

impl FrameObserver for () {}

type PayloadFn = Box<dyn FnMut(u8, &[u8]) + Send>;
type AddressFn = Box<dyn FnMut(u8) + Send>;

/// Observer assembled from closures.
///
/// Unset callbacks are no-ops.
#[derive(Default)]
pub struct FnObserver {
    received: Option<PayloadFn>,
    sent: Option<PayloadFn>,
    connect: Option<AddressFn>,
    disconnect: Option<AddressFn>,
}

impl FnObserver {
    /// Create an observer with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the frame-received callback.
    pub fn with_frame_received(mut self, f: impl FnMut(u8, &[u8]) + Send + 'static) -> Self {
        self.received = Some(Box::new(f));
        self
    }

    /// Set the frame-sent callback.
    pub fn with_frame_sent(mut self, f: impl FnMut(u8, &[u8]) + Send + 'static) -> Self {
        self.sent = Some(Box::new(f));
        self
    }

    /// Set the connect callback.
    pub fn with_connect(mut self, f: impl FnMut(u8) + Send + 'static) -> Self {
        self.connect = Some(Box::new(f));
        self
    }

    /// Set the disconnect callback.
    pub fn with_disconnect(mut self, f: impl FnMut(u8) + Send + 'static) -> Self {
        self.disconnect = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for FnObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnObserver")
            .field("received", &self.received.is_some())
            .field("sent", &self.sent.is_some())
            .field("connect", &self.connect.is_some())
            .field("disconnect", &self.disconnect.is_some())
            .finish()
    }
}

impl FrameObserver for FnObserver {
    fn on_frame_received(&mut self, address: u8, payload: &[u8]) {
        if let Some(f) = self.received.as_mut() {
            f(address, payload);
        }
    }

    fn on_frame_sent(&mut self, address: u8, payload: &[u8]) {
        if let Some(f) = self.sent.as_mut() {
            f(address, payload);
        }
    }

    fn on_connect(&mut self, address: u8) {
        if let Some(f) = self.connect.as_mut() {
            f(address);
        }
    }

    fn on_disconnect(&mut self, address: u8) {
        if let Some(f) = self.disconnect.as_mut() {
            f(address);
        }
    }
}

/// Byte source with a bounded-wait contract.
///
/// `Ok(0)` means no data arrived before the transport's own timeout.
/// `WouldBlock`, `TimedOut` and `Interrupted` errors are treated the same way.
pub trait ReadBytes {
    /// Read up to `buf.len()` bytes.
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<F> ReadBytes for F
where
    F: FnMut(&mut [u8]) -> io::Result<usize>,
{
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self(buf)
    }
}

/// Byte sink with a bounded-wait contract.
///
/// May accept fewer bytes than offered; `Ok(0)` means nothing was accepted
/// before the transport's own timeout.
pub trait WriteBytes {
    /// Write up to `buf.len()` bytes.
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl<F> WriteBytes for F
where
    F: FnMut(&[u8]) -> io::Result<usize>,
{
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize> {
        self(buf)
    }
}
