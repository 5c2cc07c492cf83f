use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::dispatch::lease::{LeaseOutcome, LeaseStatus};
use crate::dispatch::stats::StatField;
use crate::dispatch::store::{record_stat, with_retry, LeaseStore, StatStore};
use crate::dispatch::sweeper::ExpirySweeper;
use crate::error::{DispatchError, Result};
use crate::orders::OrderBoard;
use crate::watchman::{name_matches, WatchmanDirectory, WatchmanId};

/// Validates a watchman's confirmation attempt against the active lease.
pub struct ConfirmationHandler {
    directory: Arc<dyn WatchmanDirectory>,
    leases: Arc<dyn LeaseStore>,
    stats: Arc<dyn StatStore>,
    orders: Arc<dyn OrderBoard>,
    sweeper: Arc<ExpirySweeper>,
    config: DispatchConfig,
}

impl ConfirmationHandler {
    pub fn new(
        directory: Arc<dyn WatchmanDirectory>,
        leases: Arc<dyn LeaseStore>,
        stats: Arc<dyn StatStore>,
        orders: Arc<dyn OrderBoard>,
        sweeper: Arc<ExpirySweeper>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            directory,
            leases,
            stats,
            orders,
            sweeper,
            config,
        }
    }

    /// Confirm the order's verification and return the elapsed whole seconds
    /// between assignment and confirmation.
    ///
    /// Retry-safe: once a lease is confirmed or expired it no longer matches
    /// the assigned-status lookup, so a repeated attempt fails with
    /// `LeaseNotFound` and moves no counters.
    pub fn confirm(&self, order: Uuid, claimed: WatchmanId, claimed_name: &str) -> Result<i64> {
        self.confirm_at(order, claimed, claimed_name, Utc::now())
    }

    /// Clock-injected variant of [`confirm`](Self::confirm). The supplied
    /// `now` is the authoritative server time; the client's view of the
    /// deadline does not matter.
    pub fn confirm_at(
        &self,
        order: Uuid,
        claimed: WatchmanId,
        claimed_name: &str,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let watchman = self
            .directory
            .resolve(claimed)?
            .filter(|w| w.active)
            .ok_or(DispatchError::WatchmanNotFound(claimed))?;

        // Guards against a stale or spoofed client-held identifier.
        if !name_matches(&watchman.name, claimed_name) {
            return Err(DispatchError::IdentityMismatch {
                id: claimed,
                claimed: claimed_name.trim().to_string(),
            });
        }

        let lease = with_retry("find_active", || self.leases.find_active(order))?
            .filter(|l| l.watchman == claimed)
            .ok_or(DispatchError::LeaseNotFound(order))?;

        let elapsed = now - lease.created_at;
        let ttl = self.config.lease_ttl();
        if elapsed > ttl {
            let won = with_retry("conditional_transition", || {
                self.leases.conditional_transition(
                    lease.id,
                    LeaseStatus::Assigned,
                    LeaseOutcome::Expired { at: now },
                )
            })?;
            if won {
                record_stat(self.stats.as_ref(), claimed, StatField::Expired, now);
                match self.sweeper.reassign(&lease, now) {
                    Ok(Some(next)) => {
                        tracing::info!(
                            order = %order,
                            from = %claimed,
                            to = %next.watchman,
                            "Late confirmation, order reassigned"
                        );
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(order = %order, error = %e, "Reassignment after late confirmation failed");
                    }
                }
            } else {
                tracing::debug!(lease = %lease.id, "Lease already transitioned by a concurrent sweep");
            }
            return Err(DispatchError::LeaseExpired {
                order,
                elapsed_secs: elapsed.num_seconds(),
                ttl_secs: ttl.num_seconds(),
            });
        }

        let elapsed_secs = elapsed.num_seconds();
        let won = with_retry("conditional_transition", || {
            self.leases.conditional_transition(
                lease.id,
                LeaseStatus::Assigned,
                LeaseOutcome::Confirmed {
                    at: now,
                    by: watchman.name.clone(),
                    elapsed_secs,
                },
            )
        })?;
        if !won {
            // Lost the race to a sweep between lookup and transition.
            return Err(DispatchError::LeaseNotFound(order));
        }
        record_stat(self.stats.as_ref(), claimed, StatField::Confirmed, now);

        // Lease state is authoritative; a failed order-board update is left
        // for reconciliation rather than rolled back.
        if let Err(e) = self.orders.mark_verified(order, &watchman.name, now) {
            tracing::error!(order = %order, error = %e, "Order board update failed after confirmation");
        }

        tracing::info!(
            order = %order,
            watchman = %claimed,
            elapsed_secs,
            "Verification confirmed"
        );
        Ok(elapsed_secs)
    }
}
