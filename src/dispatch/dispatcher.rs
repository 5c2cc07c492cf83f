use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::dispatch::lease::Lease;
use crate::dispatch::stats::StatField;
use crate::dispatch::store::{record_stat, with_retry, LeaseStore, StatStore};
use crate::error::{DispatchError, Result};
use crate::watchman::{WatchmanDirectory, WatchmanId};

/// Assigns a completed order to an on-duty watchman.
///
/// Selection policy is least-loaded: the active watchman with the fewest
/// assigned leases still inside the TTL window wins, ties broken by
/// ascending badge number.
pub struct Dispatcher {
    directory: Arc<dyn WatchmanDirectory>,
    leases: Arc<dyn LeaseStore>,
    stats: Arc<dyn StatStore>,
    config: DispatchConfig,
}

impl Dispatcher {
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

    /// Assign the order to the selected watchman and return the new lease.
    pub fn assign(&self, order: Uuid) -> Result<Lease> {
        self.assign_at(order, Utc::now())
    }

    /// Clock-injected variant of [`assign`](Self::assign).
    pub fn assign_at(&self, order: Uuid, now: DateTime<Utc>) -> Result<Lease> {
        if with_retry("find_active", || self.leases.find_active(order))?.is_some() {
            return Err(DispatchError::AlreadyAssigned(order));
        }

        let watchman = self.select(&[], now)?;
        let lease = Lease::new(order, watchman, now);
        // The store enforces the one-active-lease invariant again on insert,
        // so a racing dispatch loses here with AlreadyAssigned.
        with_retry("insert", || self.leases.insert(lease.clone()))?;
        record_stat(self.stats.as_ref(), watchman, StatField::Assigned, now);

        tracing::info!(order = %order, watchman = %watchman, "Order assigned");
        Ok(lease)
    }

    /// Pick the least-loaded active watchman outside `exclude`.
    ///
    /// The directory lists watchmen in ascending badge order, so a strict
    /// less-than on load keeps the lowest badge among ties.
    pub(crate) fn select(&self, exclude: &[WatchmanId], now: DateTime<Utc>) -> Result<WatchmanId> {
        let pool = self.directory.list_active()?;
        let ttl = self.config.lease_ttl();

        let mut best: Option<(usize, WatchmanId)> = None;
        for watchman in pool {
            if exclude.contains(&watchman.id) {
                continue;
            }
            let load = with_retry("count_active_for", || {
                self.leases.count_active_for(watchman.id, now, ttl)
            })?;
            if best.map_or(true, |(min, _)| load < min) {
                best = Some((load, watchman.id));
            }
        }

        best.map(|(_, id)| id)
            .ok_or(DispatchError::NoWatchmenAvailable)
    }
}
