//! Connection lifecycle.
//!
//! ```text
//!                 begin()                  UA
//! Disconnected ───────────▶ Connecting ──────────▶ Connected
//!      ▲  ▲                                 │   ▲      │
//!      │  │        UA / DM / retries        │   └──────┘ SABM (peer restart)
//!      │  └──────────── Disconnecting ◀─────┘ end()
//!      │                                          │
//!      └──────────── DISC / DM / link lost ───────┘
//! ```
//!
//! A SABM is accepted in any state except `Disconnecting` (passive open).
//! The machine only decides transitions and which unnumbered frame to send;
//! session resets and callbacks are the engine's job.

use std::time::{Duration, Instant};

use crate::codec::UnnumberedKind;
use crate::window::RetryTimer;

/// Link connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    /// No session.
    #[default]
    Disconnected,
    /// SABM sent, waiting for UA.
    Connecting,
    /// Information frames may flow.
    Connected,
    /// DISC sent, waiting for UA/DM.
    Disconnecting,
}

/// Effect of an event on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changes.
    Stay,
    /// Entered `Connected`: fresh session, connect event.
    Up,
    /// Peer restarted while connected: fresh session, no event.
    Restart,
    /// Left `Connected`: session dropped, disconnect event.
    Down,
    /// Reached `Disconnected` from a non-connected state.
    Closed,
}

/// Unnumbered frame work for the transmit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Put this frame on the wire.
    Send(UnnumberedKind),
    /// DISC retries exhausted; the machine forced itself to `Disconnected`.
    GiveUp,
}

/// Connection state plus the SABM/DISC retry timer and pending responses.
#[derive(Debug, Clone, Default)]
pub struct ConnectionMachine {
    state: LinkState,
    timer: RetryTimer,
    response: Option<UnnumberedKind>,
}

impl ConnectionMachine {
    /// Create a machine in `Disconnected`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    fn enter(&mut self, state: LinkState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "link state");
            self.state = state;
        }
        self.timer.reset();
    }

    /// Start an active open. Ignored unless `Disconnected`.
    pub fn begin(&mut self) -> bool {
        if self.state != LinkState::Disconnected {
            return false;
        }
        self.enter(LinkState::Connecting);
        true
    }

    /// Start a teardown. Ignored when already down or disconnecting.
    pub fn end(&mut self) -> Transition {
        match self.state {
            LinkState::Connected => {
                self.enter(LinkState::Disconnecting);
                Transition::Down
            }
            LinkState::Connecting => {
                self.enter(LinkState::Disconnecting);
                Transition::Stay
            }
            LinkState::Disconnected | LinkState::Disconnecting => Transition::Stay,
        }
    }

    /// Retry budget of the session ran out.
    pub fn link_lost(&mut self) -> Transition {
        let was_connected = self.state == LinkState::Connected;
        self.enter(LinkState::Disconnected);
        self.response = None;
        if was_connected {
            Transition::Down
        } else {
            Transition::Closed
        }
    }

    /// Queue a response frame (UA or DM).
    pub fn respond(&mut self, kind: UnnumberedKind) {
        self.response = Some(kind);
    }

    /// Apply a received unnumbered frame.
    pub fn on_unnumbered(&mut self, kind: UnnumberedKind) -> Transition {
        use UnnumberedKind::*;

        match (kind, self.state) {
            (ConnectRequest, LinkState::Disconnecting) => {
                self.respond(DisconnectAck);
                Transition::Stay
            }
            (ConnectRequest, LinkState::Connected) => {
                self.respond(ConnectAck);
                Transition::Restart
            }
            (ConnectRequest, _) => {
                self.respond(ConnectAck);
                self.enter(LinkState::Connected);
                Transition::Up
            }
            (ConnectAck, LinkState::Connecting) => {
                self.enter(LinkState::Connected);
                Transition::Up
            }
            (ConnectAck | DisconnectAck, LinkState::Disconnecting) => {
                self.enter(LinkState::Disconnected);
                Transition::Closed
            }
            (DisconnectRequest, state) => {
                self.respond(DisconnectAck);
                match state {
                    LinkState::Connected => {
                        self.enter(LinkState::Disconnected);
                        Transition::Down
                    }
                    LinkState::Disconnecting => {
                        self.enter(LinkState::Disconnected);
                        Transition::Closed
                    }
                    // Keep trying to connect; the peer may be about to restart
                    LinkState::Connecting | LinkState::Disconnected => Transition::Stay,
                }
            }
            (DisconnectAck, LinkState::Connected) => {
                self.enter(LinkState::Disconnected);
                Transition::Down
            }
            // Stale UA, or DM while connecting (peer not ready yet)
            (ConnectAck | DisconnectAck, _) => Transition::Stay,
        }
    }

    /// Next unnumbered frame due at `now`, if any.
    ///
    /// Pending responses go first. SABM is retried without limit; DISC
    /// gives up after `max_retries` retries.
    pub fn poll(&mut self, now: Instant, retry_timeout: Duration, max_retries: u8) -> Option<ControlAction> {
        if let Some(kind) = self.response.take() {
            return Some(ControlAction::Send(kind));
        }

        let command = match self.state {
            LinkState::Connecting => UnnumberedKind::ConnectRequest,
            LinkState::Disconnecting => UnnumberedKind::DisconnectRequest,
            LinkState::Disconnected | LinkState::Connected => return None,
        };

        if self.timer.is_armed() {
            if !self.timer.is_expired(now) {
                return None;
            }
            if command == UnnumberedKind::DisconnectRequest && self.timer.retries() >= max_retries {
                tracing::debug!(retries = self.timer.retries(), "no answer to DISC");
                self.enter(LinkState::Disconnected);
                return Some(ControlAction::GiveUp);
            }
            self.timer.bump();
            tracing::debug!(?command, retry = self.timer.retries(), "retrying");
        }
        self.timer.arm(now, retry_timeout);
        Some(ControlAction::Send(command))
    }

    /// Check if an unnumbered frame is due right away.
    pub fn has_immediate(&self) -> bool {
        self.response.is_some()
            || (matches!(self.state, LinkState::Connecting | LinkState::Disconnecting)
                && !self.timer.is_armed())
    }

    /// Deadline of the SABM/DISC retry timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }
}
