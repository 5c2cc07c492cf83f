//! Shared fixtures for dispatch integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use watchpost::config::DispatchConfig;
use watchpost::dispatch::{DispatchEngine, MemoryLeaseStore, MemoryStatStore};
use watchpost::orders::MemoryOrderBoard;
use watchpost::watchman::{RosterDirectory, WatchmanId};

pub struct Fixture {
    pub engine: DispatchEngine,
    pub directory: Arc<RosterDirectory>,
    pub leases: Arc<MemoryLeaseStore>,
    pub stats: Arc<MemoryStatStore>,
    pub board: Arc<MemoryOrderBoard>,
    pub config: DispatchConfig,
}

/// Engine over the default three-watchman roster.
pub fn fixture() -> Fixture {
    fixture_with(&["mills", "reyes", "okafor"])
}

pub fn fixture_with(names: &[&str]) -> Fixture {
    let config = DispatchConfig::default();
    let directory = Arc::new(RosterDirectory::from_names(names, config.watchman_capacity));
    let leases = Arc::new(MemoryLeaseStore::new());
    let stats = Arc::new(MemoryStatStore::new());
    let board = Arc::new(MemoryOrderBoard::default());
    let engine = DispatchEngine::new(
        config.clone(),
        directory.clone(),
        leases.clone(),
        stats.clone(),
        board.clone(),
    );
    Fixture {
        engine,
        directory,
        leases,
        stats,
        board,
        config,
    }
}

pub fn badge(n: u8) -> WatchmanId {
    WatchmanId::new(n, 5).unwrap()
}

/// Fixed base instant so tests drive the clock instead of sleeping.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}
