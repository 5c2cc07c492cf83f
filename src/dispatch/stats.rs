use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::watchman::WatchmanId;

/// Counter selected by a stat increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    Assigned,
    Confirmed,
    Expired,
}

/// Per-watchman performance counters.
///
/// Counters are monotonic; `total_confirmed + total_expired` never exceeds
/// `total_assigned` (pending leases account for the difference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchmanStat {
    pub watchman: WatchmanId,
    pub total_assigned: u64,
    pub total_confirmed: u64,
    pub total_expired: u64,
    pub last_updated: DateTime<Utc>,
}

impl WatchmanStat {
    pub fn new(watchman: WatchmanId, now: DateTime<Utc>) -> Self {
        Self {
            watchman,
            total_assigned: 0,
            total_confirmed: 0,
            total_expired: 0,
            last_updated: now,
        }
    }

    pub fn apply(&mut self, field: StatField, at: DateTime<Utc>) {
        match field {
            StatField::Assigned => self.total_assigned += 1,
            StatField::Confirmed => self.total_confirmed += 1,
            StatField::Expired => self.total_expired += 1,
        }
        self.last_updated = at;
    }

    pub fn efficiency(&self) -> u32 {
        efficiency(self.total_confirmed, self.total_assigned)
    }
}

/// Percentage of assignments confirmed, rounded to the nearest whole point.
/// Zero assignments reads as zero efficiency, not a division error.
pub fn efficiency(confirmed: u64, assigned: u64) -> u32 {
    if assigned == 0 {
        0
    } else {
        ((confirmed as f64 / assigned as f64) * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn efficiency_zero_without_assignments() {
        assert_eq!(efficiency(0, 0), 0);
    }

    #[test]
    fn efficiency_rounds_to_nearest() {
        assert_eq!(efficiency(1, 3), 33);
        assert_eq!(efficiency(2, 3), 67);
        assert_eq!(efficiency(1, 2), 50);
        assert_eq!(efficiency(3, 3), 100);
    }

    #[test]
    fn apply_bumps_one_counter_and_timestamp() {
        let now = Utc::now();
        let w = WatchmanId::new(1, 5).unwrap();
        let mut stat = WatchmanStat::new(w, now);

        let later = now + chrono::Duration::seconds(5);
        stat.apply(StatField::Assigned, later);
        stat.apply(StatField::Confirmed, later);

        assert_eq!(stat.total_assigned, 1);
        assert_eq!(stat.total_confirmed, 1);
        assert_eq!(stat.total_expired, 0);
        assert_eq!(stat.last_updated, later);
        assert_eq!(stat.efficiency(), 100);
    }
}
