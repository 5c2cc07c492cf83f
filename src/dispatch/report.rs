use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::dispatch::lease::Lease;
use crate::dispatch::stats::efficiency;
use crate::dispatch::store::{with_retry, LeaseStore, StatStore};
use crate::error::Result;
use crate::watchman::{WatchmanDirectory, WatchmanId};

/// Point-in-time counters for one watchman, merged with the live pending
/// count.
#[derive(Debug, Clone, Serialize)]
pub struct StatView {
    pub watchman: WatchmanId,
    pub total_assigned: u64,
    pub total_confirmed: u64,
    pub total_expired: u64,
    /// Recomputed from the counters, not read back from storage.
    pub efficiency: u32,
    /// Assigned leases currently inside the TTL window.
    pub pending: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// One row of the cross-pool report.
#[derive(Debug, Clone, Serialize)]
pub struct WatchmanSummary {
    pub watchman: WatchmanId,
    pub name: String,
    pub total_assigned: u64,
    pub total_confirmed: u64,
    pub total_expired: u64,
    pub efficiency: u32,
    pub pending: usize,
    pub confirmed_today: usize,
}

/// Read-only views over the lease history and stat counters.
pub struct Reporting {
    directory: Arc<dyn WatchmanDirectory>,
    leases: Arc<dyn LeaseStore>,
    stats: Arc<dyn StatStore>,
    config: DispatchConfig,
}

impl Reporting {
    pub fn new(
        directory: Arc<dyn WatchmanDirectory>,
        leases: Arc<dyn LeaseStore>,
        stats: Arc<dyn StatStore>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            directory,
            leases,
            stats,
            config,
        }
    }

    pub fn stats_for(&self, watchman: WatchmanId) -> Result<StatView> {
        self.stats_for_at(watchman, Utc::now())
    }

    /// Counters plus live pending count for one watchman. A watchman with no
    /// assignments yet reads as all zeros.
    pub fn stats_for_at(&self, watchman: WatchmanId, now: DateTime<Utc>) -> Result<StatView> {
        let stored = with_retry("snapshot", || self.stats.snapshot(watchman))?;
        let pending = with_retry("count_active_for", || {
            self.leases
                .count_active_for(watchman, now, self.config.lease_ttl())
        })?;

        let (assigned, confirmed, expired, last_updated) = match stored {
            Some(s) => (
                s.total_assigned,
                s.total_confirmed,
                s.total_expired,
                Some(s.last_updated),
            ),
            None => (0, 0, 0, None),
        };

        Ok(StatView {
            watchman,
            total_assigned: assigned,
            total_confirmed: confirmed,
            total_expired: expired,
            efficiency: efficiency(confirmed, assigned),
            pending,
            last_updated,
        })
    }

    pub fn report(&self) -> Result<Vec<WatchmanSummary>> {
        self.report_at(Utc::now())
    }

    /// Per-watchman summaries across the active pool, including the same-day
    /// confirmation count derived from the lease history.
    pub fn report_at(&self, now: DateTime<Utc>) -> Result<Vec<WatchmanSummary>> {
        let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();

        let mut rows = Vec::new();
        for watchman in self.directory.list_active()? {
            let view = self.stats_for_at(watchman.id, now)?;
            let confirmed_today = with_retry("count_confirmed_since", || {
                self.leases.count_confirmed_since(watchman.id, day_start)
            })?;
            rows.push(WatchmanSummary {
                watchman: watchman.id,
                name: watchman.name,
                total_assigned: view.total_assigned,
                total_confirmed: view.total_confirmed,
                total_expired: view.total_expired,
                efficiency: view.efficiency,
                pending: view.pending,
                confirmed_today,
            });
        }
        Ok(rows)
    }

    /// The order's full lease history, oldest first. Successive entries are
    /// linked through `reassigned_from`.
    pub fn history_for(&self, order: Uuid) -> Result<Vec<Lease>> {
        with_retry("history_for", || self.leases.history_for(order))
    }
}
