//! The link engine.
//!
//! [`Link`] wraps all protocol state in one mutex. Applications call
//! [`Link::send`]; a receive pump calls [`Link::drive_receive`] and a
//! transmit pump calls [`Link::drive_transmit`], from the same or from
//! different threads.
//!
//! ```text
//!  read_bytes ──▶ FrameDecoder ──▶ Frame::parse ──▶ window / machine ──▶ observer
//!                                                        │
//! write_bytes ◀── tx buffer ◀── FrameEncoder ◀── next frame selection
//! ```

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use super::config::LinkConfig;
use super::stats::LinkStats;
use crate::codec::{Address, Control, Frame, FrameHeader, SupervisoryKind, UnnumberedKind};
use crate::connection::{ConnectionMachine, ControlAction, LinkState, Transition};
use crate::core::constants::{DRIVE_CHUNK_SIZE, HEADER_SIZE};
use crate::core::{FrameObserver, LinkError, LinkResult, ReadBytes, WriteBytes, is_idle_io};
use crate::framing::{DecodeEvent, FrameDecoder, FrameEncoder};
use crate::window::{ReceiveState, RecvDecision, RetryTimer, SendWindow};

/// Full-duplex, windowed link endpoint.
///
/// # Example
///
/// ```
/// use fdlink::engine::{Link, LinkConfig};
///
/// let link = Link::new(LinkConfig::default(), ()).unwrap();
/// link.begin();
///
/// // The first frame to go out is the connect request
/// let mut wire = [0u8; 64];
/// let n = link.get_tx_data(&mut wire);
/// assert!(n > 0);
/// assert!(!link.is_connected());
/// ```
pub struct Link<O: FrameObserver = ()> {
    core: Mutex<LinkCore<O>>,
    /// A window slot was freed or the session ended.
    space: Condvar,
    /// Transmit work may be available.
    work: Condvar,
}

impl<O: FrameObserver> Link<O> {
    /// Create a link. All buffers are allocated here.
    pub fn new(config: LinkConfig, observer: O) -> LinkResult<Self> {
        config.validate()?;
        Ok(Self {
            core: Mutex::new(LinkCore::new(config, observer)),
            space: Condvar::new(),
            work: Condvar::new(),
        })
    }

    /// Start connecting to the peer.
    pub fn begin(&self) {
        let started = self.core.lock().machine.begin();
        if started {
            self.work.notify_all();
        }
    }

    /// Start disconnecting. Queued frames are dropped.
    pub fn end(&self) {
        let now = Instant::now();
        {
            let mut core = self.core.lock();
            let transition = core.machine.end();
            core.apply(transition, now);
        }
        self.space.notify_all();
        self.work.notify_all();
    }

    /// Queue a payload for reliable delivery.
    ///
    /// Fails with [`LinkError::WindowFull`] when all window slots are in use.
    pub fn send(&self, payload: &[u8]) -> LinkResult<()> {
        self.core.lock().try_send(payload)?;
        self.work.notify_all();
        Ok(())
    }

    /// Queue a payload, waiting up to the configured send timeout for a
    /// free window slot.
    pub fn send_timeout(&self, payload: &[u8]) -> LinkResult<()> {
        let mut core = self.core.lock();
        let deadline = Instant::now() + core.config.send_timeout;
        let result = loop {
            match core.try_send(payload) {
                Err(LinkError::WindowFull) if Instant::now() < deadline => {
                    self.space.wait_until(&mut core, deadline);
                }
                result => break result,
            }
        };
        drop(core);
        if result.is_ok() {
            self.work.notify_all();
        }
        result
    }

    /// Read once from `reader` and process the bytes.
    ///
    /// Returns the number of bytes read; zero when the transport had
    /// nothing. The lock is not held during the read.
    pub fn drive_receive<R: ReadBytes + ?Sized>(&self, reader: &mut R) -> LinkResult<usize> {
        let mut chunk = [0u8; DRIVE_CHUNK_SIZE];
        let n = match reader.read_bytes(&mut chunk) {
            Ok(n) => n.min(chunk.len()),
            Err(err) if is_idle_io(&err) => 0,
            Err(err) => return Err(err.into()),
        };
        if n > 0 {
            self.on_rx_data(&chunk[..n]);
        }
        Ok(n)
    }

    /// Write the next pending wire bytes to `writer`.
    ///
    /// Returns the number of bytes the transport accepted; zero when there
    /// is nothing to send. Fails with [`LinkError::LinkLost`] when a retry
    /// budget ran out during this call.
    pub fn drive_transmit<W: WriteBytes + ?Sized>(&self, writer: &mut W) -> LinkResult<usize> {
        self.drive_transmit_at(writer, Instant::now())
    }

    /// [`drive_transmit`](Self::drive_transmit) at a given time.
    pub fn drive_transmit_at<W: WriteBytes + ?Sized>(
        &self,
        writer: &mut W,
        now: Instant,
    ) -> LinkResult<usize> {
        let mut chunk = [0u8; DRIVE_CHUNK_SIZE];
        let staged = self.core.lock().peek_tx(&mut chunk, now);
        let len = match staged {
            Ok(len) => len,
            Err(err) => {
                self.space.notify_all();
                return Err(err);
            }
        };
        if len == 0 {
            return Ok(0);
        }

        let written = match writer.write_bytes(&chunk[..len]) {
            Ok(n) => n.min(len),
            Err(err) if is_idle_io(&err) => 0,
            Err(err) => return Err(err.into()),
        };
        if written > 0 {
            self.core.lock().commit_tx(written);
        }
        Ok(written)
    }

    /// Feed received bytes. Returns the number of bytes consumed (all).
    pub fn on_rx_data(&self, data: &[u8]) -> usize {
        self.on_rx_data_at(data, Instant::now())
    }

    /// [`on_rx_data`](Self::on_rx_data) at a given time.
    pub fn on_rx_data_at(&self, data: &[u8], now: Instant) -> usize {
        let consumed = self.core.lock().on_rx_data(data, now);
        self.space.notify_all();
        self.work.notify_all();
        consumed
    }

    /// Fill `buf` with wire bytes to send. The bytes count as sent.
    pub fn get_tx_data(&self, buf: &mut [u8]) -> usize {
        self.get_tx_data_at(buf, Instant::now())
    }

    /// [`get_tx_data`](Self::get_tx_data) at a given time.
    pub fn get_tx_data_at(&self, buf: &mut [u8], now: Instant) -> usize {
        let mut core = self.core.lock();
        let mut written = 0;
        while written < buf.len() {
            match core.peek_tx(&mut buf[written..], now) {
                Ok(0) => break,
                Ok(n) => {
                    core.commit_tx(n);
                    written += n;
                }
                // Already reported through the observer
                Err(_) => {
                    self.space.notify_all();
                    break;
                }
            }
        }
        written
    }

    /// Earliest time the transmit side has work, if any.
    ///
    /// A time in the past (or now) means work is ready.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline_at(Instant::now())
    }

    /// [`next_deadline`](Self::next_deadline) at a given time.
    pub fn next_deadline_at(&self, now: Instant) -> Option<Instant> {
        self.core.lock().next_deadline(now)
    }

    /// Block until transmit work is ready or `max_wait` elapses.
    ///
    /// Returns `true` if work is ready.
    pub fn wait_tx(&self, max_wait: Duration) -> bool {
        let limit = Instant::now() + max_wait;
        let mut core = self.core.lock();
        loop {
            let now = Instant::now();
            let due = core.next_deadline(now);
            if due.is_some_and(|deadline| deadline <= now) {
                return true;
            }
            if now >= limit {
                return false;
            }
            let wake = due.map_or(limit, |deadline| deadline.min(limit));
            self.work.wait_until(&mut core, wake);
        }
    }

    /// Connection state.
    pub fn state(&self) -> LinkState {
        self.core.lock().machine.state()
    }

    /// Check if information frames may flow.
    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Submitted payloads not yet acknowledged.
    pub fn outstanding(&self) -> usize {
        self.core.lock().window.outstanding()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> LinkStats {
        self.core.lock().stats
    }

    /// Configuration in use.
    pub fn config(&self) -> LinkConfig {
        self.core.lock().config.clone()
    }

    /// Maximum payload size.
    pub fn mtu(&self) -> usize {
        self.core.lock().config.max_payload_size
    }

    /// Run `f` with the observer, under the engine lock.
    pub fn with_observer<R>(&self, f: impl FnOnce(&mut O) -> R) -> R {
        f(&mut self.core.lock().observer)
    }
}

impl<O: FrameObserver> std::fmt::Debug for Link<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.lock();
        f.debug_struct("Link")
            .field("address", &core.address.id())
            .field("state", &core.machine.state())
            .field("outstanding", &core.window.outstanding())
            .finish_non_exhaustive()
    }
}

/// State guarded by the link mutex.
struct LinkCore<O> {
    config: LinkConfig,
    address: Address,
    machine: ConnectionMachine,
    window: SendWindow,
    recv: ReceiveState,
    encoder: FrameEncoder,
    decoder: FrameDecoder,
    /// Wire image of the frame being written.
    tx_buf: Box<[u8]>,
    tx_len: usize,
    tx_pos: usize,
    /// When the last frame was staged; drives keep-alive.
    last_tx: Instant,
    /// Outstanding keep-alive poll.
    poll_timer: RetryTimer,
    stats: LinkStats,
    observer: O,
}

impl<O: FrameObserver> LinkCore<O> {
    fn new(config: LinkConfig, observer: O) -> Self {
        // Range checked by LinkConfig::validate
        let address = Address::new(config.address).unwrap_or_default();
        Self {
            address,
            machine: ConnectionMachine::new(),
            window: SendWindow::new(config.window_size, config.max_payload_size),
            recv: ReceiveState::new(),
            encoder: FrameEncoder::new(config.checksum),
            decoder: FrameDecoder::new(config.checksum, HEADER_SIZE + config.max_payload_size),
            tx_buf: vec![0u8; config.max_wire_size()].into_boxed_slice(),
            tx_len: 0,
            tx_pos: 0,
            last_tx: Instant::now(),
            poll_timer: RetryTimer::default(),
            stats: LinkStats::default(),
            observer,
            config,
        }
    }

    fn reset_session(&mut self, now: Instant) {
        self.window.reset();
        self.recv.reset();
        self.poll_timer.reset();
        self.last_tx = now;
    }

    fn apply(&mut self, transition: Transition, now: Instant) {
        let address = self.address.id();
        match transition {
            Transition::Stay => {}
            Transition::Up => {
                self.reset_session(now);
                debug!(address, "link up");
                self.observer.on_connect(address);
            }
            Transition::Restart => {
                warn!(
                    address,
                    dropped = self.window.outstanding(),
                    "peer restarted the link"
                );
                self.reset_session(now);
            }
            Transition::Down => {
                self.reset_session(now);
                debug!(address, "link down");
                self.observer.on_disconnect(address);
            }
            Transition::Closed => self.reset_session(now),
        }
    }

    fn lose_link(&mut self, now: Instant) -> LinkResult<bool> {
        warn!(address = self.address.id(), "retries exhausted, link lost");
        let transition = self.machine.link_lost();
        self.apply(transition, now);
        Err(LinkError::LinkLost)
    }

    fn try_send(&mut self, payload: &[u8]) -> LinkResult<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(LinkError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }
        if self.machine.state() != LinkState::Connected {
            return Err(LinkError::NotConnected);
        }
        let ns = self.window.submit(payload)?;
        trace!(ns, len = payload.len(), "queued");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Receive path
    // ---------------------------------------------------------------------

    fn on_rx_data(&mut self, data: &[u8], now: Instant) -> usize {
        let mut rest = data;
        while !rest.is_empty() {
            let (n, event) = self.decoder.feed(rest);
            rest = &rest[n..];
            match event {
                Some(DecodeEvent::Frame(_)) => self.handle_frame(now),
                Some(DecodeEvent::Corrupted) => self.drop_frame(LinkError::FrameCorrupted),
                Some(DecodeEvent::TooLarge) => {
                    let max = self.decoder.capacity();
                    self.drop_frame(LinkError::FrameTooLarge { max });
                }
                None => {}
            }
        }
        self.stats.bytes_rx += data.len() as u64;
        data.len()
    }

    /// Count and log a frame discarded on the receive path.
    fn drop_frame(&mut self, error: LinkError) {
        match error {
            LinkError::FrameCorrupted => self.stats.crc_errors += 1,
            LinkError::FrameTooLarge { .. } => self.stats.oversized += 1,
            _ => self.stats.protocol_errors += 1,
        }
        warn!(%error, "frame dropped");
    }

    fn handle_frame(&mut self, now: Instant) {
        let header = match Frame::parse(self.decoder.frame(), self.address) {
            Ok(frame) => frame.header,
            Err(violation) => {
                self.drop_frame(violation.into());
                return;
            }
        };
        self.stats.frames_received += 1;
        trace!(control = ?header.control, command = header.command, "rx");

        if let Control::Unnumbered { kind, .. } = header.control {
            let transition = self.machine.on_unnumbered(kind);
            self.apply(transition, now);
            return;
        }
        match self.machine.state() {
            LinkState::Connected => self.handle_numbered(header, now),
            LinkState::Disconnected => self.machine.respond(UnnumberedKind::DisconnectAck),
            LinkState::Connecting | LinkState::Disconnecting => {
                trace!("numbered frame ignored while not connected");
            }
        }
    }

    fn handle_numbered(&mut self, header: FrameHeader, now: Instant) {
        self.poll_timer.reset();
        let address = self.address.id();

        if let Some(nr) = header.control.nr() {
            let observer = &mut self.observer;
            let acked = self
                .window
                .acknowledge(nr, |payload| observer.on_frame_sent(address, payload));
            match acked {
                Ok(0) => {}
                Ok(count) => trace!(nr, count, "acknowledged"),
                Err(violation) => {
                    self.drop_frame(violation.into());
                    return;
                }
            }
        }

        match header.control {
            Control::Information { ns, poll, .. } => {
                match self.recv.on_information(ns, now) {
                    RecvDecision::Deliver => {
                        let payload = &self.decoder.frame()[HEADER_SIZE..];
                        self.observer.on_frame_received(address, payload);
                    }
                    RecvDecision::Duplicate => {
                        self.stats.duplicates += 1;
                        debug!(ns, "duplicate frame");
                    }
                    RecvDecision::OutOfSequence => {
                        self.stats.out_of_sequence += 1;
                        debug!(ns, expected = self.recv.recv_seq(), "out of sequence");
                    }
                }
                if poll {
                    self.recv.request_final();
                }
            }
            Control::Supervisory { kind, nr, poll } => {
                if kind == SupervisoryKind::Reject {
                    self.stats.rejects_received += 1;
                    let resend = self.window.rewind();
                    debug!(nr, resend, "reject received");
                }
                if poll && header.command {
                    self.recv.request_final();
                }
            }
            Control::Unnumbered { .. } => {}
        }
    }

    // ---------------------------------------------------------------------
    // Transmit path
    // ---------------------------------------------------------------------

    /// Copy pending wire bytes without consuming them, staging the next
    /// frame when the current one is done.
    fn peek_tx(&mut self, out: &mut [u8], now: Instant) -> LinkResult<usize> {
        if self.tx_pos == self.tx_len && !self.stage_next(now)? {
            return Ok(0);
        }
        let n = out.len().min(self.tx_len - self.tx_pos);
        out[..n].copy_from_slice(&self.tx_buf[self.tx_pos..self.tx_pos + n]);
        Ok(n)
    }

    fn commit_tx(&mut self, written: usize) {
        let n = written.min(self.tx_len - self.tx_pos);
        self.tx_pos += n;
        self.stats.bytes_tx += n as u64;
        if n > 0 && self.tx_pos == self.tx_len {
            self.stats.frames_sent += 1;
        }
    }

    fn stage(&mut self, header: FrameHeader, now: Instant) -> LinkResult<()> {
        self.tx_len = self.encoder.encode(&header.to_bytes(), &[], &mut self.tx_buf)?;
        self.tx_pos = 0;
        self.last_tx = now;
        trace!(control = ?header.control, "tx");
        Ok(())
    }

    /// Pick the next frame to send and encode it into the tx buffer.
    ///
    /// Priority: connection control, REJ, information frames, RR, then
    /// keep-alive polls.
    fn stage_next(&mut self, now: Instant) -> LinkResult<bool> {
        let retry_timeout = self.config.retry_timeout;
        let max_retries = self.config.max_retries;

        match self.machine.poll(now, retry_timeout, max_retries) {
            Some(ControlAction::Send(kind)) => {
                self.stage(FrameHeader::new(self.address, Control::unnumbered(kind)), now)?;
                return Ok(true);
            }
            Some(ControlAction::GiveUp) => {
                debug!(address = self.address.id(), "disconnect not acknowledged");
                self.apply(Transition::Closed, now);
            }
            None => {}
        }
        if self.machine.state() != LinkState::Connected {
            return Ok(false);
        }

        match self.window.check_timers(now, max_retries) {
            Ok(Some(ns)) => debug!(ns, "retry timeout"),
            Ok(None) => {}
            Err(_) => return self.lose_link(now),
        }

        let nr = self.recv.recv_seq();
        if self.recv.take_reject() {
            self.stats.rejects_sent += 1;
            debug!(nr, "sending reject");
            let control = Control::supervisory(SupervisoryKind::Reject, nr, false);
            self.stage(FrameHeader::new(self.address, control), now)?;
            self.recv.on_ack_sent(false);
            return Ok(true);
        }

        if let Some(frame) = self.window.next_frame(now, retry_timeout) {
            if frame.resend {
                self.stats.retransmissions += 1;
                debug!(ns = frame.ns, "retransmit");
            }
            let header = FrameHeader::new(self.address, Control::information(frame.ns, nr));
            self.tx_len = self.encoder.encode(&header.to_bytes(), frame.payload, &mut self.tx_buf)?;
            self.tx_pos = 0;
            self.last_tx = now;
            trace!(ns = frame.ns, nr, len = frame.payload.len(), "tx I");
            self.recv.on_ack_sent(false);
            return Ok(true);
        }

        if self.recv.ack_due(now, self.config.ack_delay) {
            let final_bit = self.recv.final_pending();
            let header = FrameHeader {
                address: self.address,
                command: false,
                control: Control::supervisory(SupervisoryKind::ReceiveReady, nr, final_bit),
            };
            self.stage(header, now)?;
            self.recv.on_ack_sent(final_bit);
            return Ok(true);
        }

        if self.keep_alive_due(now)? {
            let control = Control::supervisory(SupervisoryKind::ReceiveReady, nr, true);
            self.stage(FrameHeader::new(self.address, control), now)?;
            self.poll_timer.arm(now, retry_timeout);
            return Ok(true);
        }
        Ok(false)
    }

    fn keep_alive_due(&mut self, now: Instant) -> LinkResult<bool> {
        if self.poll_timer.is_armed() {
            if !self.poll_timer.is_expired(now) {
                return Ok(false);
            }
            if self.poll_timer.retries() >= self.config.max_retries {
                return self.lose_link(now);
            }
            self.poll_timer.bump();
            debug!(retry = self.poll_timer.retries(), "keep-alive poll unanswered");
            return Ok(true);
        }
        Ok(self
            .config
            .keep_alive
            .is_some_and(|period| now >= self.last_tx + period))
    }

    fn next_deadline(&self, now: Instant) -> Option<Instant> {
        if self.tx_pos < self.tx_len || self.machine.has_immediate() {
            return Some(now);
        }
        if self.machine.state() != LinkState::Connected {
            return self.machine.next_deadline();
        }
        if self.window.has_unsent() || self.recv.reject_pending() || self.recv.final_pending() {
            return Some(now);
        }
        let keep_alive = if self.poll_timer.is_armed() {
            self.poll_timer.deadline()
        } else {
            self.config.keep_alive.map(|period| self.last_tx + period)
        };
        [
            self.window.next_deadline(),
            self.recv.ack_deadline(self.config.ack_delay),
            keep_alive,
        ]
        .into_iter()
        .flatten()
        .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RTO: Duration = Duration::from_millis(100);
    const ACK_DELAY: Duration = Duration::from_millis(10);

    #[derive(Default)]
    struct Recorder {
        received: Vec<Vec<u8>>,
        sent: Vec<Vec<u8>>,
        connects: usize,
        disconnects: usize,
    }

    impl FrameObserver for Recorder {
        fn on_frame_received(&mut self, _address: u8, payload: &[u8]) {
            self.received.push(payload.to_vec());
        }

        fn on_frame_sent(&mut self, _address: u8, payload: &[u8]) {
            self.sent.push(payload.to_vec());
        }

        fn on_connect(&mut self, _address: u8) {
            self.connects += 1;
        }

        fn on_disconnect(&mut self, _address: u8) {
            self.disconnects += 1;
        }
    }

    fn config() -> LinkConfig {
        LinkConfig::builder()
            .retry_timeout(RTO)
            .ack_delay(ACK_DELAY)
            .build()
            .unwrap()
    }

    fn link_with(config: LinkConfig) -> Link<Recorder> {
        Link::new(config, Recorder::default()).unwrap()
    }

    fn take(link: &Link<Recorder>, now: Instant) -> Vec<u8> {
        let mut buf = [0u8; 512];
        let n = link.get_tx_data_at(&mut buf, now);
        buf[..n].to_vec()
    }

    /// Shuttle bytes both ways until neither side has anything to send.
    fn pump(a: &Link<Recorder>, b: &Link<Recorder>, now: Instant) {
        loop {
            let ab = take(a, now);
            b.on_rx_data_at(&ab, now);
            let ba = take(b, now);
            a.on_rx_data_at(&ba, now);
            if ab.is_empty() && ba.is_empty() {
                break;
            }
        }
    }

    /// Split a byte stream into individual `FLAG ... FLAG` frames.
    fn split_frames(bytes: &[u8]) -> Vec<Vec<u8>> {
        let flags: Vec<usize> = bytes
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b == crate::core::constants::FLAG)
            .map(|(i, _)| i)
            .collect();
        flags
            .chunks(2)
            .map(|pair| bytes[pair[0]..=pair[1]].to_vec())
            .collect()
    }

    fn connected_pair(config: LinkConfig, now: Instant) -> (Link<Recorder>, Link<Recorder>) {
        let a = link_with(config.clone());
        let b = link_with(config);
        a.begin();
        pump(&a, &b, now);
        assert!(a.is_connected() && b.is_connected());
        (a, b)
    }

    #[test]
    fn test_connect_and_deliver() {
        let now = Instant::now();
        let (a, b) = connected_pair(config(), now);
        assert_eq!(a.with_observer(|o| o.connects), 1);
        assert_eq!(b.with_observer(|o| o.connects), 1);

        a.send(b"hello").unwrap();
        pump(&a, &b, now);
        assert_eq!(b.with_observer(|o| o.received.clone()), vec![b"hello".to_vec()]);
        assert_eq!(a.outstanding(), 1);

        // Standalone RR after the ack delay
        pump(&a, &b, now + ACK_DELAY);
        assert_eq!(a.outstanding(), 0);
        assert_eq!(a.with_observer(|o| o.sent.clone()), vec![b"hello".to_vec()]);
    }

    #[test]
    fn test_send_requires_connection() {
        let link = link_with(config());
        assert!(matches!(link.send(b"x"), Err(LinkError::NotConnected)));
        assert!(matches!(
            link.send(&[0u8; 65]),
            Err(LinkError::PayloadTooLarge { size: 65, max: 64 })
        ));
    }

    #[test]
    fn test_window_of_one() {
        let now = Instant::now();
        let config = LinkConfig {
            window_size: 1,
            ..config()
        };
        let (a, b) = connected_pair(config, now);

        a.send(b"A").unwrap();
        assert!(matches!(a.send(b"B"), Err(LinkError::WindowFull)));

        pump(&a, &b, now);
        assert!(matches!(a.send(b"B"), Err(LinkError::WindowFull)));

        pump(&a, &b, now + ACK_DELAY);
        a.send(b"B").unwrap();
        pump(&a, &b, now + ACK_DELAY);
        assert_eq!(
            b.with_observer(|o| o.received.clone()),
            vec![b"A".to_vec(), b"B".to_vec()]
        );
    }

    #[test]
    fn test_piggy_backed_ack() {
        let now = Instant::now();
        let (a, b) = connected_pair(config(), now);
        a.send(b"ping").unwrap();
        b.on_rx_data_at(&take(&a, now), now);

        // The reply carries N(R)=1 before the ack delay runs out
        b.send(b"pong").unwrap();
        a.on_rx_data_at(&take(&b, now), now);
        assert_eq!(a.outstanding(), 0);
        assert_eq!(a.with_observer(|o| o.received.clone()), vec![b"pong".to_vec()]);
    }

    #[test]
    fn test_corrupted_frame_retransmitted_once() {
        let now = Instant::now();
        let (a, b) = connected_pair(config(), now);
        a.send(b"data").unwrap();

        let mut bytes = take(&a, now);
        // Flip a payload bit: [FLAG, addr, ctrl, 'd', ...]
        bytes[3] ^= 0x01;
        b.on_rx_data_at(&bytes, now);
        assert_eq!(b.stats().crc_errors, 1);
        assert!(b.with_observer(|o| o.received.is_empty()));

        pump(&a, &b, now + RTO / 2);
        assert!(b.with_observer(|o| o.received.is_empty()));

        pump(&a, &b, now + RTO);
        pump(&a, &b, now + RTO + ACK_DELAY);
        assert_eq!(b.with_observer(|o| o.received.clone()), vec![b"data".to_vec()]);
        assert_eq!(a.stats().retransmissions, 1);
        assert_eq!(a.outstanding(), 0);
    }

    #[test]
    fn test_oversized_frame_counted_separately() {
        let now = Instant::now();
        let (a, b) = connected_pair(config(), now);

        let encoder = FrameEncoder::new(b.config().checksum);
        let header = FrameHeader::new(Address::new(0).unwrap(), Control::information(0, 0));
        let mut wire = [0u8; 256];
        let n = encoder.encode(&header.to_bytes(), &[0x55; 100], &mut wire).unwrap();
        b.on_rx_data_at(&wire[..n], now);

        let stats = b.stats();
        assert_eq!(stats.oversized, 1);
        assert_eq!(stats.protocol_errors, 0);
        assert_eq!(stats.crc_errors, 0);
        assert!(b.with_observer(|o| o.received.is_empty()));

        // The decoder resynchronises on the next frame
        a.send(b"fits").unwrap();
        pump(&a, &b, now);
        assert_eq!(b.with_observer(|o| o.received.clone()), vec![b"fits".to_vec()]);
    }

    #[test]
    fn test_retries_exhausted() {
        let start = Instant::now();
        let config = LinkConfig {
            max_retries: 2,
            ..config()
        };
        let (a, _b) = connected_pair(config, start);
        a.send(b"lost").unwrap();

        // Initial send plus two retries vanish on the wire
        let mut sink = |buf: &[u8]| -> std::io::Result<usize> { Ok(buf.len()) };
        for i in 0..3 {
            let mut written = 0;
            loop {
                let n = a.drive_transmit_at(&mut sink, start + RTO * i).unwrap();
                if n == 0 {
                    break;
                }
                written += n;
            }
            assert!(written > 0);
        }
        let result = a.drive_transmit_at(&mut sink, start + RTO * 3);
        assert!(matches!(result, Err(LinkError::LinkLost)));

        assert_eq!(a.state(), LinkState::Disconnected);
        assert_eq!(a.outstanding(), 0);
        assert!(take(&a, start + RTO * 4).is_empty());
        assert_eq!(a.with_observer(|o| o.disconnects), 1);
        assert_eq!(a.stats().retransmissions, 2);
    }

    #[test]
    fn test_duplicate_acked_not_redelivered() {
        let now = Instant::now();
        let (a, b) = connected_pair(config(), now);
        a.send(b"once").unwrap();

        let bytes = take(&a, now);
        b.on_rx_data_at(&bytes, now);
        b.on_rx_data_at(&bytes, now);
        assert_eq!(b.with_observer(|o| o.received.len()), 1);
        assert_eq!(b.stats().duplicates, 1);

        pump(&a, &b, now + ACK_DELAY);
        assert_eq!(a.outstanding(), 0);
    }

    #[test]
    fn test_reject_goes_back() {
        let now = Instant::now();
        let (a, b) = connected_pair(config(), now);
        for p in [b"1", b"2", b"3"] {
            a.send(p).unwrap();
        }

        let frames = split_frames(&take(&a, now));
        assert_eq!(frames.len(), 3);
        // First frame lost
        b.on_rx_data_at(&frames[1], now);
        b.on_rx_data_at(&frames[2], now);
        assert_eq!(b.stats().out_of_sequence, 2);

        pump(&a, &b, now);
        pump(&a, &b, now + ACK_DELAY);
        assert_eq!(
            b.with_observer(|o| o.received.clone()),
            vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]
        );
        assert_eq!(b.stats().rejects_sent, 1);
        assert_eq!(a.stats().rejects_received, 1);
        assert_eq!(a.stats().retransmissions, 3);
        assert_eq!(a.outstanding(), 0);
    }

    #[test]
    fn test_peer_restart_resets_sequence() {
        let now = Instant::now();
        let (a, b) = connected_pair(config(), now);
        for p in [b"a", b"b", b"c"] {
            a.send(p).unwrap();
        }
        pump(&a, &b, now);
        pump(&a, &b, now + ACK_DELAY);

        // Peer reboots: fresh engine, N(S) starts over at zero
        let restarted = link_with(config());
        restarted.begin();
        pump(&restarted, &b, now + ACK_DELAY);
        assert!(restarted.is_connected());

        restarted.send(b"fresh").unwrap();
        pump(&restarted, &b, now + ACK_DELAY);
        assert_eq!(b.with_observer(|o| o.received.last().cloned()), Some(b"fresh".to_vec()));
        assert_eq!(b.with_observer(|o| o.received.len()), 4);
        assert_eq!(b.with_observer(|o| o.connects), 1);
        assert_eq!(b.stats().out_of_sequence, 0);
    }

    #[test]
    fn test_disconnected_peer_answers_dm() {
        let now = Instant::now();
        let (a, _b) = connected_pair(config(), now);
        let idle = link_with(config());

        a.send(b"anyone?").unwrap();
        pump(&a, &idle, now);
        assert_eq!(a.state(), LinkState::Disconnected);
        assert_eq!(a.with_observer(|o| o.disconnects), 1);
        assert!(idle.with_observer(|o| o.received.is_empty()));
    }

    #[test]
    fn test_orderly_disconnect() {
        let now = Instant::now();
        let (a, b) = connected_pair(config(), now);
        a.end();
        assert_eq!(a.state(), LinkState::Disconnecting);
        assert_eq!(a.with_observer(|o| o.disconnects), 1);

        pump(&a, &b, now);
        assert_eq!(a.state(), LinkState::Disconnected);
        assert_eq!(b.state(), LinkState::Disconnected);
        assert_eq!(a.with_observer(|o| o.disconnects), 1);
        assert_eq!(b.with_observer(|o| o.disconnects), 1);
        assert!(matches!(a.send(b"x"), Err(LinkError::NotConnected)));
    }

    #[test]
    fn test_poll_answered_with_final() {
        let now = Instant::now();
        let (_a, b) = connected_pair(config(), now);
        let address = Address::new(0).unwrap();

        let poll = FrameHeader::new(
            address,
            Control::supervisory(SupervisoryKind::ReceiveReady, 0, true),
        );
        let encoder = FrameEncoder::new(b.config().checksum);
        let mut wire = [0u8; 16];
        let n = encoder.encode(&poll.to_bytes(), &[], &mut wire).unwrap();
        b.on_rx_data_at(&wire[..n], now);

        let reply = take(&b, now);
        let mut decoder = FrameDecoder::new(b.config().checksum, 8);
        let (_, event) = decoder.feed(&reply);
        assert!(matches!(event, Some(DecodeEvent::Frame(_))));
        let frame = Frame::parse(decoder.frame(), address).unwrap();
        assert!(!frame.header.command);
        assert_eq!(
            frame.control(),
            Control::supervisory(SupervisoryKind::ReceiveReady, 0, true)
        );
    }

    #[test]
    fn test_keep_alive_detects_silent_peer() {
        let start = Instant::now();
        let keep_alive = Duration::from_millis(50);
        let config = LinkConfig {
            keep_alive: Some(keep_alive),
            max_retries: 1,
            ..config()
        };
        let (a, _b) = connected_pair(config, start);

        assert!(take(&a, start).is_empty());
        assert_eq!(a.next_deadline_at(start), Some(start + keep_alive));

        // Poll, one retry, then give up
        assert!(!take(&a, start + keep_alive).is_empty());
        assert!(!take(&a, start + keep_alive + RTO).is_empty());
        assert!(take(&a, start + keep_alive + RTO * 2).is_empty());
        assert_eq!(a.state(), LinkState::Disconnected);
        assert_eq!(a.with_observer(|o| o.disconnects), 1);
    }

    #[test]
    fn test_keep_alive_answered() {
        let start = Instant::now();
        let keep_alive = Duration::from_millis(50);
        let config = LinkConfig {
            keep_alive: Some(keep_alive),
            ..config()
        };
        let (a, b) = connected_pair(config, start);
        for step in 1..10 {
            pump(&a, &b, start + keep_alive * step);
        }
        assert!(a.is_connected() && b.is_connected());
    }

    #[test]
    fn test_next_deadline_tracks_retry() {
        let now = Instant::now();
        let (a, _b) = connected_pair(config(), now);
        assert_eq!(a.next_deadline_at(now), None);

        a.send(b"x").unwrap();
        assert_eq!(a.next_deadline_at(now), Some(now));
        take(&a, now);
        assert_eq!(a.next_deadline_at(now), Some(now + RTO));
    }

    #[test]
    fn test_ack_out_of_window_is_dropped() {
        let now = Instant::now();
        let (_a, b) = connected_pair(config(), now);
        let address = Address::new(0).unwrap();

        // RR acknowledging three frames b never sent
        let rr = FrameHeader::new(
            address,
            Control::supervisory(SupervisoryKind::ReceiveReady, 3, false),
        );
        let encoder = FrameEncoder::new(b.config().checksum);
        let mut wire = [0u8; 16];
        let n = encoder.encode(&rr.to_bytes(), &[], &mut wire).unwrap();
        b.on_rx_data_at(&wire[..n], now);

        assert_eq!(b.stats().protocol_errors, 1);
        assert!(b.is_connected());
    }

    #[test]
    fn test_drive_with_partial_writes() {
        let a = link_with(config());
        let b = link_with(config());
        a.begin();

        let mut wire: Vec<u8> = Vec::new();
        let mut trickle = |buf: &[u8]| -> std::io::Result<usize> {
            let n = buf.len().min(3);
            wire.extend_from_slice(&buf[..n]);
            Ok(n)
        };
        while a.drive_transmit(&mut trickle).unwrap() > 0 {}
        assert!(!wire.is_empty());

        let mut source = wire.as_slice();
        let mut reader = |buf: &mut [u8]| -> std::io::Result<usize> {
            let n = buf.len().min(source.len());
            buf[..n].copy_from_slice(&source[..n]);
            source = &source[n..];
            Ok(n)
        };
        while b.drive_receive(&mut reader).unwrap() > 0 {}
        assert!(b.is_connected());
    }

    #[test]
    fn test_transport_errors() {
        let link = link_with(config());
        link.begin();

        let mut idle = |_: &[u8]| -> std::io::Result<usize> {
            Err(std::io::ErrorKind::WouldBlock.into())
        };
        assert_eq!(link.drive_transmit(&mut idle).unwrap(), 0);

        let mut broken = |_: &mut [u8]| -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        };
        assert!(matches!(
            link.drive_receive(&mut broken),
            Err(LinkError::Transport(_))
        ));
    }
}
