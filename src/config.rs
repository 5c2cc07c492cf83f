use chrono::Duration as ChronoDuration;
use std::time::Duration;

/// Default maximum seconds a lease may remain assigned.
pub const DEFAULT_LEASE_TTL_SECS: i64 = 300;

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 45;

/// Default size of the watchman badge-number space.
pub const DEFAULT_WATCHMAN_CAPACITY: u8 = 5;

/// Tuning knobs for the dispatch engine.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum seconds a lease may remain assigned before it is eligible
    /// for expiry. The server clock is authoritative.
    pub lease_ttl_secs: i64,
    /// Seconds between expiry sweeps, independent of any lease's TTL.
    pub sweep_interval_secs: u64,
    /// Number of badge identifiers the roster may hand out.
    pub watchman_capacity: u8,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: DEFAULT_LEASE_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            watchman_capacity: DEFAULT_WATCHMAN_CAPACITY,
        }
    }
}

impl DispatchConfig {
    pub fn with_ttl_secs(mut self, secs: i64) -> Self {
        self.lease_ttl_secs = secs;
        self
    }

    pub fn with_sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    pub fn with_watchman_capacity(mut self, capacity: u8) -> Self {
        self.watchman_capacity = capacity;
        self
    }

    /// Lease TTL as a chrono duration for timestamp arithmetic.
    pub fn lease_ttl(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.lease_ttl_secs)
    }

    /// Sweep interval as a std duration for the tokio timer.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = DispatchConfig::default();
        assert_eq!(cfg.lease_ttl_secs, 300);
        assert_eq!(cfg.sweep_interval_secs, 45);
        assert_eq!(cfg.watchman_capacity, 5);
    }

    #[test]
    fn builder_helpers() {
        let cfg = DispatchConfig::default()
            .with_ttl_secs(60)
            .with_sweep_interval_secs(10)
            .with_watchman_capacity(3);
        assert_eq!(cfg.lease_ttl(), ChronoDuration::seconds(60));
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(10));
        assert_eq!(cfg.watchman_capacity, 3);
    }
}
