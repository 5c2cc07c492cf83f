use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::watchman::WatchmanId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseStatus {
    Assigned,
    Confirmed,
    Expired,
}

impl std::fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaseStatus::Assigned => write!(f, "assigned"),
            LeaseStatus::Confirmed => write!(f, "confirmed"),
            LeaseStatus::Expired => write!(f, "expired"),
        }
    }
}

/// One watchman's time-bounded claim on one order.
///
/// Leases are append-only: `Confirmed` and `Expired` are terminal, and an
/// expired lease may be succeeded by a replacement carrying
/// `reassigned_from`, forming the order's reassignment chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub id: Uuid,
    pub order: Uuid,
    pub watchman: WatchmanId,
    pub status: LeaseStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    /// Registered name of the confirming watchman.
    pub confirmed_by: Option<String>,
    /// Whole seconds between assignment and confirmation, floored.
    pub elapsed_secs: Option<i64>,
    /// Prior expired lease this one supersedes.
    pub reassigned_from: Option<Uuid>,
}

impl Lease {
    pub fn new(order: Uuid, watchman: WatchmanId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order,
            watchman,
            status: LeaseStatus::Assigned,
            created_at,
            confirmed_at: None,
            expired_at: None,
            confirmed_by: None,
            elapsed_secs: None,
            reassigned_from: None,
        }
    }

    /// Replacement lease for an order whose prior lease expired.
    pub fn reassignment(
        order: Uuid,
        watchman: WatchmanId,
        created_at: DateTime<Utc>,
        prior: Uuid,
    ) -> Self {
        Self {
            reassigned_from: Some(prior),
            ..Self::new(order, watchman, created_at)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != LeaseStatus::Assigned
    }

    /// Seconds since assignment, floored.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds()
    }

    /// True once an assigned lease has outlived the TTL.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.status == LeaseStatus::Assigned && now - self.created_at > ttl
    }
}

/// Terminal fields written together with a status transition.
///
/// A transition and its fields are applied in one conditional update so a
/// confirming watchman and a concurrent sweep cannot interleave.
#[derive(Debug, Clone)]
pub enum LeaseOutcome {
    Confirmed {
        at: DateTime<Utc>,
        by: String,
        elapsed_secs: i64,
    },
    Expired {
        at: DateTime<Utc>,
    },
}

impl LeaseOutcome {
    pub fn status(&self) -> LeaseStatus {
        match self {
            LeaseOutcome::Confirmed { .. } => LeaseStatus::Confirmed,
            LeaseOutcome::Expired { .. } => LeaseStatus::Expired,
        }
    }
}
