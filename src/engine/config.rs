//! Link configuration.

use std::time::Duration;

use crate::core::constants::{
    DEFAULT_ACK_DELAY, DEFAULT_ADDRESS, DEFAULT_MAX_PAYLOAD, DEFAULT_MAX_RETRIES,
    DEFAULT_SEND_TIMEOUT, DEFAULT_WINDOW_SIZE, FALLBACK_RETRY_TIMEOUT, HEADER_SIZE, MAX_ADDRESS,
    MAX_WINDOW_SIZE,
};
use crate::core::{LinkError, LinkResult};
use crate::framing::ChecksumKind;

/// Retry timeout derived from the send timeout.
pub fn default_retry_timeout(send_timeout: Duration) -> Duration {
    if send_timeout.is_zero() {
        FALLBACK_RETRY_TIMEOUT
    } else {
        send_timeout / 2
    }
}

/// Link configuration. Fixed for the life of a [`Link`](super::Link).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Link address id (0..=63).
    pub address: u8,

    /// Frame check sequence.
    pub checksum: ChecksumKind,

    /// Maximum unacknowledged information frames (1..=7).
    pub window_size: u8,

    /// Maximum payload bytes per information frame.
    pub max_payload_size: usize,

    /// How long a blocking send waits for a free window slot.
    pub send_timeout: Duration,

    /// Time before an unacknowledged frame is sent again.
    pub retry_timeout: Duration,

    /// Retransmissions of one frame before the link is declared lost.
    pub max_retries: u8,

    /// Idle time before a standalone acknowledgment is sent.
    pub ack_delay: Duration,

    /// Poll the peer after this much transmit idleness.
    pub keep_alive: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            checksum: ChecksumKind::default(),
            window_size: DEFAULT_WINDOW_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            retry_timeout: default_retry_timeout(DEFAULT_SEND_TIMEOUT),
            max_retries: DEFAULT_MAX_RETRIES,
            ack_delay: DEFAULT_ACK_DELAY,
            keep_alive: None,
        }
    }
}

impl LinkConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> LinkConfigBuilder {
        LinkConfigBuilder::new()
    }

    /// Check value ranges.
    pub fn validate(&self) -> LinkResult<()> {
        let invalid = |msg: String| -> LinkResult<()> { Err(LinkError::InvalidConfig(msg)) };

        if self.address > MAX_ADDRESS {
            return invalid(format!("address {} exceeds {MAX_ADDRESS}", self.address));
        }
        if !(1..=MAX_WINDOW_SIZE).contains(&self.window_size) {
            return invalid(format!(
                "window size {} outside 1..={MAX_WINDOW_SIZE}",
                self.window_size
            ));
        }
        if self.max_payload_size == 0 {
            return invalid("max payload size must be non-zero".into());
        }
        if self.retry_timeout.is_zero() {
            return invalid("retry timeout must be non-zero".into());
        }
        if self.ack_delay >= self.retry_timeout {
            return invalid(format!(
                "ack delay {:?} must be shorter than retry timeout {:?}",
                self.ack_delay, self.retry_timeout
            ));
        }
        if self.keep_alive.is_some_and(|period| period.is_zero()) {
            return invalid("keep-alive period must be non-zero".into());
        }
        Ok(())
    }

    /// Largest unstuffed frame: header, payload and checksum.
    pub fn max_frame_size(&self) -> usize {
        HEADER_SIZE + self.max_payload_size + self.checksum.width()
    }

    /// Largest frame on the wire: every byte escaped, plus two flags.
    pub fn max_wire_size(&self) -> usize {
        2 + 2 * self.max_frame_size()
    }

    /// Bytes allocated by a link: frame arena, receive and transmit buffers.
    pub fn buffer_size(&self) -> usize {
        usize::from(self.window_size) * self.max_payload_size
            + self.max_frame_size()
            + self.max_wire_size()
    }
}

/// Builder for [`LinkConfig`].
///
/// ```
/// use std::time::Duration;
/// use fdlink::engine::LinkConfig;
/// use fdlink::framing::ChecksumKind;
///
/// let config = LinkConfig::builder()
///     .checksum(ChecksumKind::Crc32)
///     .window_size(4)
///     .send_timeout(Duration::from_millis(400))
///     .build()
///     .unwrap();
/// assert_eq!(config.retry_timeout, Duration::from_millis(200));
/// ```
#[derive(Debug)]
pub struct LinkConfigBuilder {
    config: LinkConfig,
    retry_timeout: Option<Duration>,
}

impl LinkConfigBuilder {
    /// Create a builder with default values.
    pub fn new() -> Self {
        Self {
            config: LinkConfig::default(),
            retry_timeout: None,
        }
    }

    /// Set the link address id.
    pub fn address(mut self, address: u8) -> Self {
        self.config.address = address;
        self
    }

    /// Set the checksum kind.
    pub fn checksum(mut self, checksum: ChecksumKind) -> Self {
        self.config.checksum = checksum;
        self
    }

    /// Set the window size.
    pub fn window_size(mut self, window_size: u8) -> Self {
        self.config.window_size = window_size;
        self
    }

    /// Set the maximum payload size.
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    /// Set the blocking send timeout.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout = timeout;
        self
    }

    /// Set the retry timeout. Defaults to half the send timeout.
    pub fn retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = Some(timeout);
        self
    }

    /// Set the retry budget per frame.
    pub fn max_retries(mut self, retries: u8) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the delayed acknowledgment window.
    pub fn ack_delay(mut self, delay: Duration) -> Self {
        self.config.ack_delay = delay;
        self
    }

    /// Enable keep-alive polling.
    pub fn keep_alive(mut self, period: Duration) -> Self {
        self.config.keep_alive = Some(period);
        self
    }

    /// Resolve derived values and validate.
    pub fn build(mut self) -> LinkResult<LinkConfig> {
        self.config.retry_timeout = self
            .retry_timeout
            .unwrap_or_else(|| default_retry_timeout(self.config.send_timeout));
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for LinkConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
