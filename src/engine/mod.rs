//! Engine façade: configuration, counters and the [`Link`] itself.

mod config;
mod link;
mod stats;

pub use config::{LinkConfig, LinkConfigBuilder, default_retry_timeout};
pub use link::Link;
pub use stats::LinkStats;
