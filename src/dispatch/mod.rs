//! The assignment/lease engine.
//!
//! Components share the injected collaborator handles; nothing lives in
//! ambient scope. All state transitions are conditional updates against the
//! lease store, so concurrent dispatch, confirmation, and sweep invocations
//! cannot double-apply.

pub mod confirm;
pub mod dispatcher;
pub mod lease;
pub mod report;
pub mod stats;
pub mod store;
pub mod sweeper;

pub use confirm::ConfirmationHandler;
pub use dispatcher::Dispatcher;
pub use lease::{Lease, LeaseOutcome, LeaseStatus};
pub use report::{Reporting, StatView, WatchmanSummary};
pub use stats::{StatField, WatchmanStat};
pub use store::{LeaseStore, MemoryLeaseStore, MemoryStatStore, StatStore};
pub use sweeper::ExpirySweeper;

use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::orders::OrderBoard;
use crate::watchman::WatchmanDirectory;

/// Wires the four dispatch components around shared collaborators.
pub struct DispatchEngine {
    pub dispatcher: Arc<Dispatcher>,
    pub confirmations: Arc<ConfirmationHandler>,
    pub sweeper: Arc<ExpirySweeper>,
    pub reporting: Arc<Reporting>,
}

impl DispatchEngine {
    pub fn new(
        config: DispatchConfig,
        directory: Arc<dyn WatchmanDirectory>,
        leases: Arc<dyn LeaseStore>,
        stats: Arc<dyn StatStore>,
        orders: Arc<dyn OrderBoard>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            directory.clone(),
            leases.clone(),
            stats.clone(),
            config.clone(),
        ));
        let sweeper = Arc::new(ExpirySweeper::new(
            dispatcher.clone(),
            leases.clone(),
            stats.clone(),
            config.clone(),
        ));
        let confirmations = Arc::new(ConfirmationHandler::new(
            directory.clone(),
            leases.clone(),
            stats.clone(),
            orders,
            sweeper.clone(),
            config.clone(),
        ));
        let reporting = Arc::new(Reporting::new(directory, leases, stats, config));

        Self {
            dispatcher,
            confirmations,
            sweeper,
            reporting,
        }
    }
}
