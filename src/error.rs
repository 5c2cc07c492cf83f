use thiserror::Error;
use uuid::Uuid;

use crate::watchman::WatchmanId;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Order {0} already has an active lease")]
    AlreadyAssigned(Uuid),

    #[error("No watchmen available")]
    NoWatchmenAvailable,

    #[error("Watchman not found or off duty: {0}")]
    WatchmanNotFound(WatchmanId),

    #[error("Claimed name {claimed:?} does not match watchman {id}")]
    IdentityMismatch { id: WatchmanId, claimed: String },

    #[error("No assigned lease for order {0}")]
    LeaseNotFound(Uuid),

    #[error("Lease for order {order} expired: {elapsed_secs}s elapsed, ttl {ttl_secs}s")]
    LeaseExpired {
        order: Uuid,
        elapsed_secs: i64,
        ttl_secs: i64,
    },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
