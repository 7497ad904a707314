//! Engine configuration

use std::time::Duration;
use types::fee::FeeSchedule;

/// Tunables for the matching engine and its runtime
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period of the crossing sweep
    pub sweep_interval: Duration,
    /// Also sweep right after an order is enqueued
    pub eager_sweep: bool,
    pub fees: FeeSchedule,
    /// Bound on every external store/cache call
    pub io_timeout: Duration,
    /// Number of recent delivery keys remembered for de-duplication
    pub dedup_window: usize,
    /// Capacity of the engine command channel
    pub command_buffer: usize,
    /// Pause before a failed delivery is requeued
    pub retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            eager_sweep: false,
            fees: FeeSchedule::zero(),
            io_timeout: Duration::from_millis(5000),
            dedup_window: 10_000,
            command_buffer: 1024,
            retry_backoff: Duration::from_millis(200),
        }
    }
}
