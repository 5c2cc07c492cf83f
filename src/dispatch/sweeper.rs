use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::DispatchConfig;
use crate::dispatch::dispatcher::Dispatcher;
use crate::dispatch::lease::{Lease, LeaseOutcome, LeaseStatus};
use crate::dispatch::stats::StatField;
use crate::dispatch::store::{record_stat, with_retry, LeaseStore, StatStore};
use crate::error::{DispatchError, Result};

/// Periodic scan that expires stale leases and reassigns their orders.
///
/// Safe to run concurrently with confirmations and with other sweeps: every
/// expiry is a conditional transition, so whichever actor reaches a lease
/// first wins and the others skip it.
pub struct ExpirySweeper {
    dispatcher: Arc<Dispatcher>,
    leases: Arc<dyn LeaseStore>,
    stats: Arc<dyn StatStore>,
    config: DispatchConfig,
}

impl ExpirySweeper {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        leases: Arc<dyn LeaseStore>,
        stats: Arc<dyn StatStore>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            dispatcher,
            leases,
            stats,
            config,
        }
    }

    /// Expire every assigned lease past its TTL and reassign each affected
    /// order. Returns how many leases this invocation transitioned.
    pub fn sweep(&self) -> Result<usize> {
        self.sweep_at(Utc::now())
    }

    /// Clock-injected variant of [`sweep`](Self::sweep).
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.config.lease_ttl();
        let stale = with_retry("find_assigned_older_than", || {
            self.leases.find_assigned_older_than(cutoff)
        })?;

        let mut expired = 0usize;
        for lease in stale {
            let won = with_retry("conditional_transition", || {
                self.leases.conditional_transition(
                    lease.id,
                    LeaseStatus::Assigned,
                    LeaseOutcome::Expired { at: now },
                )
            })?;
            if !won {
                // Another sweep or a late confirmation got there first.
                tracing::debug!(lease = %lease.id, order = %lease.order, "Lease already transitioned, skipping");
                continue;
            }
            expired += 1;
            record_stat(self.stats.as_ref(), lease.watchman, StatField::Expired, now);
            tracing::info!(
                order = %lease.order,
                watchman = %lease.watchman,
                age_secs = lease.age_secs(now),
                "Lease expired"
            );

            match self.reassign(&lease, now) {
                Ok(Some(next)) => {
                    tracing::info!(
                        order = %lease.order,
                        from = %lease.watchman,
                        to = %next.watchman,
                        "Order reassigned"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(order = %lease.order, error = %e, "Reassignment failed");
                }
            }
        }
        Ok(expired)
    }

    /// Create a replacement lease for an expired one, excluding the watchman
    /// who let it lapse. An exhausted pool is a steady-state condition: the
    /// order stays unassigned and the outcome is only logged.
    pub(crate) fn reassign(&self, prior: &Lease, now: DateTime<Utc>) -> Result<Option<Lease>> {
        let pick = match self.dispatcher.select(&[prior.watchman], now) {
            Ok(id) => id,
            Err(DispatchError::NoWatchmenAvailable) => {
                tracing::warn!(
                    order = %prior.order,
                    excluded = %prior.watchman,
                    "No watchmen available for reassignment, order left unassigned"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let lease = Lease::reassignment(prior.order, pick, now, prior.id);
        match with_retry("insert", || self.leases.insert(lease.clone())) {
            Ok(()) => {}
            Err(DispatchError::AlreadyAssigned(_)) => {
                // A concurrent actor already replaced this lease.
                tracing::debug!(order = %prior.order, "Replacement lease already present");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
        record_stat(self.stats.as_ref(), pick, StatField::Assigned, now);
        Ok(Some(lease))
    }

    /// Drive [`sweep`](Self::sweep) on the configured interval until the
    /// token is cancelled. Store failures are logged and retried on the next
    /// tick; they never take the process down.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.sweep_interval());
        tracing::info!(
            interval_secs = self.config.sweep_interval_secs,
            ttl_secs = self.config.lease_ttl_secs,
            "Expiry sweeper started"
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Expiry sweeper stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.sweep() {
                        Ok(0) => {}
                        Ok(n) => tracing::info!(expired = n, "Sweep expired stale leases"),
                        Err(e) => tracing::warn!(error = %e, "Sweep failed, retrying next tick"),
                    }
                }
            }
        }
    }
}
