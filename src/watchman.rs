//! Watchman identity and the on-duty roster.
//!
//! The engine never creates or deletes watchmen; it only reads the roster
//! through [`WatchmanDirectory`]. Identity is a badge number drawn from a
//! small fixed space, not a free-form string.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

/// Badge number of a watchman, bounded by the configured roster capacity.
///
/// Badge numbers start at 1. Ordering is the ascending-badge order used to
/// break ties in worker selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchmanId(u8);

impl WatchmanId {
    /// Build a badge identifier, rejecting numbers outside `1..=capacity`.
    pub fn new(badge: u8, capacity: u8) -> Option<Self> {
        if (1..=capacity).contains(&badge) {
            Some(Self(badge))
        } else {
            None
        }
    }

    pub fn badge(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for WatchmanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", self.0)
    }
}

/// Roster entry for one watchman.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watchman {
    pub id: WatchmanId,
    pub name: String,
    pub active: bool,
}

/// Read-only view of the currently registered watchmen.
///
/// Implementations back onto whatever identity storage the deployment uses;
/// the engine only needs these two reads. `list_active` must return entries
/// in ascending badge order.
pub trait WatchmanDirectory: Send + Sync {
    /// All watchmen currently on duty, ordered by badge number.
    fn list_active(&self) -> Result<Vec<Watchman>>;

    /// Look up one watchman by badge, on duty or not.
    fn resolve(&self, id: WatchmanId) -> Result<Option<Watchman>>;
}

/// Compare a client-claimed name against the registered one.
///
/// Claims arrive from stale or hand-typed client state, so the comparison is
/// whitespace-trimmed and case-insensitive.
pub fn name_matches(registered: &str, claimed: &str) -> bool {
    registered.trim().eq_ignore_ascii_case(claimed.trim())
}

/// Fixed in-memory roster.
///
/// Backs the console binary and tests. Names are unique case-insensitively;
/// duplicates and entries beyond capacity are skipped with a warning.
pub struct RosterDirectory {
    inner: Mutex<HashMap<WatchmanId, Watchman>>,
}

impl RosterDirectory {
    /// Build a roster from names, assigning badges 1..=capacity in order.
    pub fn from_names<S: AsRef<str>>(names: &[S], capacity: u8) -> Self {
        let mut entries = HashMap::new();
        let mut seen = Vec::new();
        let mut badge = 1u8;
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            let folded = name.to_ascii_lowercase();
            if seen.contains(&folded) {
                tracing::warn!(name, "Duplicate watchman name skipped");
                continue;
            }
            let Some(id) = WatchmanId::new(badge, capacity) else {
                tracing::warn!(name, capacity, "Roster capacity reached, watchman skipped");
                continue;
            };
            seen.push(folded);
            entries.insert(
                id,
                Watchman {
                    id,
                    name: name.to_string(),
                    active: true,
                },
            );
            badge += 1;
        }
        Self {
            inner: Mutex::new(entries),
        }
    }

    /// Flip a watchman's duty status. Returns false for unknown badges.
    pub fn set_active(&self, id: WatchmanId, active: bool) -> Result<bool> {
        let mut roster = self.lock()?;
        match roster.get_mut(&id) {
            Some(w) => {
                w.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<WatchmanId, Watchman>>> {
        self.inner
            .lock()
            .map_err(|_| DispatchError::StoreUnavailable("roster lock poisoned".to_string()))
    }
}

impl WatchmanDirectory for RosterDirectory {
    fn list_active(&self) -> Result<Vec<Watchman>> {
        let roster = self.lock()?;
        let mut active: Vec<Watchman> = roster.values().filter(|w| w.active).cloned().collect();
        active.sort_by_key(|w| w.id);
        Ok(active)
    }

    fn resolve(&self, id: WatchmanId) -> Result<Option<Watchman>> {
        Ok(self.lock()?.get(&id).cloned())
    }
}
