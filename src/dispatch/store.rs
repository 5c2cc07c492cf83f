//! Storage contracts for leases and stats, plus the in-memory reference
//! implementations the binary and tests run against.
//!
//! The engine is indifferent to storage technology; it relies only on two
//! atomicity guarantees: [`LeaseStore::conditional_transition`] is a
//! compare-and-swap on lease status, and [`StatStore::increment`] is an
//! atomic counter bump. Implementations must bound every call and surface
//! [`DispatchError::StoreUnavailable`] rather than hang.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::dispatch::lease::{Lease, LeaseOutcome, LeaseStatus};
use crate::dispatch::stats::{StatField, WatchmanStat};
use crate::error::{DispatchError, Result};
use crate::watchman::WatchmanId;

/// Append-only table of assignment leases.
pub trait LeaseStore: Send + Sync {
    /// Insert a new assigned lease. The store enforces at most one assigned
    /// lease per order atomically and fails with `AlreadyAssigned` when the
    /// slot is taken.
    fn insert(&self, lease: Lease) -> Result<()>;

    /// The order's lease currently in assigned status, if any.
    fn find_active(&self, order: Uuid) -> Result<Option<Lease>>;

    /// Transition a lease to the outcome's terminal status only if its
    /// current status equals `expected`. Returns false when the precondition
    /// failed, i.e. another actor won the transition.
    fn conditional_transition(
        &self,
        lease_id: Uuid,
        expected: LeaseStatus,
        outcome: LeaseOutcome,
    ) -> Result<bool>;

    /// Assigned leases created strictly before the cutoff.
    fn find_assigned_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Lease>>;

    /// Number of assigned leases for a watchman still inside the TTL window.
    /// Leases already past the TTL are due to expire and do not count as
    /// load.
    fn count_active_for(&self, watchman: WatchmanId, now: DateTime<Utc>, ttl: Duration)
        -> Result<usize>;

    /// Number of leases the watchman confirmed at or after `since`.
    fn count_confirmed_since(&self, watchman: WatchmanId, since: DateTime<Utc>) -> Result<usize>;

    /// Every lease ever created for the order, oldest first. Walking
    /// `reassigned_from` links yields the reassignment chain.
    fn history_for(&self, order: Uuid) -> Result<Vec<Lease>>;
}

/// Per-watchman counter storage.
pub trait StatStore: Send + Sync {
    /// Atomically bump one counter, creating the record on first touch.
    fn increment(&self, watchman: WatchmanId, field: StatField, at: DateTime<Utc>) -> Result<()>;

    /// Current counters for a watchman, or `None` before any assignment.
    fn snapshot(&self, watchman: WatchmanId) -> Result<Option<WatchmanStat>>;
}

/// Run a store call, retrying once when it fails with the transient
/// `StoreUnavailable`. Every other error kind is terminal for the call.
pub fn with_retry<T>(op: &'static str, f: impl Fn() -> Result<T>) -> Result<T> {
    match f() {
        Err(DispatchError::StoreUnavailable(reason)) => {
            tracing::warn!(op, %reason, "Store unavailable, retrying once");
            f()
        }
        other => other,
    }
}

/// Bump a counter after a successful lease transition. Lease state is
/// authoritative; a failed increment is logged for reconciliation instead of
/// rolling the transition back.
pub(crate) fn record_stat(
    stats: &dyn StatStore,
    watchman: WatchmanId,
    field: StatField,
    at: DateTime<Utc>,
) {
    if let Err(e) = with_retry("increment", || stats.increment(watchman, field, at)) {
        tracing::error!(
            watchman = %watchman,
            field = ?field,
            error = %e,
            "Stat increment failed after lease transition, counters need reconciliation"
        );
    }
}

#[derive(Default)]
struct LeaseTable {
    /// Every lease ever created, by lease id.
    leases: HashMap<Uuid, Lease>,
    /// Order -> lease id of the current assigned lease.
    active: HashMap<Uuid, Uuid>,
}

/// Mutex-backed lease table. One lock guards both the lease map and the
/// active index, which is what makes insert uniqueness and status
/// transitions first-writer-wins.
#[derive(Default)]
pub struct MemoryLeaseStore {
    inner: Mutex<LeaseTable>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> Result<MutexGuard<'_, LeaseTable>> {
        self.inner
            .lock()
            .map_err(|_| DispatchError::StoreUnavailable("lease table lock poisoned".to_string()))
    }
}

impl LeaseStore for MemoryLeaseStore {
    fn insert(&self, lease: Lease) -> Result<()> {
        let mut table = self.table()?;
        if let Some(existing) = table.active.get(&lease.order) {
            // Stale index entries cannot occur: transitions clear the slot
            // under the same lock.
            debug_assert_eq!(
                table.leases[existing].status,
                LeaseStatus::Assigned,
                "active index points at a terminal lease"
            );
            return Err(DispatchError::AlreadyAssigned(lease.order));
        }
        table.active.insert(lease.order, lease.id);
        table.leases.insert(lease.id, lease);
        Ok(())
    }

    fn find_active(&self, order: Uuid) -> Result<Option<Lease>> {
        let table = self.table()?;
        Ok(table
            .active
            .get(&order)
            .and_then(|id| table.leases.get(id))
            .cloned())
    }

    fn conditional_transition(
        &self,
        lease_id: Uuid,
        expected: LeaseStatus,
        outcome: LeaseOutcome,
    ) -> Result<bool> {
        let mut table = self.table()?;
        let Some(lease) = table.leases.get_mut(&lease_id) else {
            return Ok(false);
        };
        if lease.status != expected {
            return Ok(false);
        }
        lease.status = outcome.status();
        match outcome {
            LeaseOutcome::Confirmed {
                at,
                by,
                elapsed_secs,
            } => {
                lease.confirmed_at = Some(at);
                lease.confirmed_by = Some(by);
                lease.elapsed_secs = Some(elapsed_secs);
            }
            LeaseOutcome::Expired { at } => {
                lease.expired_at = Some(at);
            }
        }
        let order = lease.order;
        if table.active.get(&order) == Some(&lease_id) {
            table.active.remove(&order);
        }
        Ok(true)
    }

    fn find_assigned_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Lease>> {
        let table = self.table()?;
        let mut stale: Vec<Lease> = table
            .active
            .values()
            .filter_map(|id| table.leases.get(id))
            .filter(|l| l.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|l| l.created_at);
        Ok(stale)
    }

    fn count_active_for(
        &self,
        watchman: WatchmanId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<usize> {
        let table = self.table()?;
        Ok(table
            .active
            .values()
            .filter_map(|id| table.leases.get(id))
            .filter(|l| l.watchman == watchman && now - l.created_at <= ttl)
            .count())
    }

    fn count_confirmed_since(&self, watchman: WatchmanId, since: DateTime<Utc>) -> Result<usize> {
        let table = self.table()?;
        Ok(table
            .leases
            .values()
            .filter(|l| {
                l.watchman == watchman
                    && l.status == LeaseStatus::Confirmed
                    && l.confirmed_at.is_some_and(|at| at >= since)
            })
            .count())
    }

    fn history_for(&self, order: Uuid) -> Result<Vec<Lease>> {
        let table = self.table()?;
        let mut history: Vec<Lease> = table
            .leases
            .values()
            .filter(|l| l.order == order)
            .cloned()
            .collect();
        history.sort_by_key(|l| l.created_at);
        Ok(history)
    }
}

/// Mutex-backed counter table.
#[derive(Default)]
pub struct MemoryStatStore {
    inner: Mutex<HashMap<WatchmanId, WatchmanStat>>,
}

impl MemoryStatStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> Result<MutexGuard<'_, HashMap<WatchmanId, WatchmanStat>>> {
        self.inner
            .lock()
            .map_err(|_| DispatchError::StoreUnavailable("stat table lock poisoned".to_string()))
    }
}

impl StatStore for MemoryStatStore {
    fn increment(&self, watchman: WatchmanId, field: StatField, at: DateTime<Utc>) -> Result<()> {
        let mut table = self.table()?;
        table
            .entry(watchman)
            .or_insert_with(|| WatchmanStat::new(watchman, at))
            .apply(field, at);
        Ok(())
    }

    fn snapshot(&self, watchman: WatchmanId) -> Result<Option<WatchmanStat>> {
        Ok(self.table()?.get(&watchman).cloned())
    }
}
