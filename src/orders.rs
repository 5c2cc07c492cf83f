//! Order collaborator contract.
//!
//! Orders live in an external system; the engine only checks readiness and
//! reports verification outcomes back through this trait.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{DispatchError, Result};

/// External owner of order state.
pub trait OrderBoard: Send + Sync {
    /// Whether the order is known and awaiting verification.
    fn exists(&self, order: Uuid) -> Result<bool>;

    /// Record that verification completed, with the verifier's registered
    /// name and the server-side completion timestamp.
    fn mark_verified(&self, order: Uuid, verifier: &str, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
struct OrderEntry {
    verified_by: Option<String>,
    verified_at: Option<DateTime<Utc>>,
}

/// In-memory order board for the console binary and tests.
#[derive(Default)]
pub struct MemoryOrderBoard {
    inner: Mutex<HashMap<Uuid, OrderEntry>>,
}

impl MemoryOrderBoard {
    /// Register a completed order awaiting verification.
    pub fn put(&self, order: Uuid) -> Result<()> {
        self.lock()?.entry(order).or_default();
        Ok(())
    }

    /// Verification outcome for an order, if recorded.
    pub fn verification(&self, order: Uuid) -> Result<Option<(String, DateTime<Utc>)>> {
        Ok(self.lock()?.get(&order).and_then(|e| {
            match (&e.verified_by, e.verified_at) {
                (Some(by), Some(at)) => Some((by.clone(), at)),
                _ => None,
            }
        }))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, OrderEntry>>> {
        self.inner
            .lock()
            .map_err(|_| DispatchError::StoreUnavailable("order board lock poisoned".to_string()))
    }
}

impl OrderBoard for MemoryOrderBoard {
    fn exists(&self, order: Uuid) -> Result<bool> {
        Ok(self.lock()?.contains_key(&order))
    }

    fn mark_verified(&self, order: Uuid, verifier: &str, at: DateTime<Utc>) -> Result<()> {
        let mut orders = self.lock()?;
        let entry = orders.entry(order).or_default();
        entry.verified_by = Some(verifier.to_string());
        entry.verified_at = Some(at);
        Ok(())
    }
}
