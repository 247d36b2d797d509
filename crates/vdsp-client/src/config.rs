//! Tunable parameters for the engine and management facade (§4.2, §4.7).

use std::time::Duration;

use vdsp_core::connection::DEFAULT_PING_TIMEOUT;
use vdsp_proto::coap::DEFAULT_BLOCK_SIZE;

/// Fixed CON retransmission interval (§4.2 "initial interval of 3 s").
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);
/// Maximum CON send attempts, original included (§4.2 "up to 5 attempts").
pub const DEFAULT_MAX_ATTEMPTS: u8 = 5;
/// Scheduler poll granularity for the correlator/connection timer wheel.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Engine-level tunables (§4.2, §4.7).
#[derive(Debug, Clone)]
pub struct Config {
    /// CON retransmission interval.
    pub retry_interval: Duration,
    /// Maximum send attempts before an exchange fails with `Timeout`.
    pub max_attempts: u8,
    /// Default Block1/Block2 size in bytes.
    pub block_size: usize,
    /// Timeout for the initial connection ping and for standalone `ping()`.
    pub ping_timeout: Duration,
    /// Scheduler poll granularity: how often the correlator/connection timer
    /// wheel is checked for expired deadlines while awaiting a reply.
    pub tick_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            block_size: DEFAULT_BLOCK_SIZE,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}
