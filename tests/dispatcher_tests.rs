mod harness;

use harness::{badge, fixture, fixture_with, secs, t0};
use uuid::Uuid;

use watchpost::dispatch::{Lease, LeaseStatus, LeaseStore, StatStore};
use watchpost::error::DispatchError;

#[test]
fn assign_picks_lowest_badge_when_tied() {
    let fx = fixture();
    let order = Uuid::new_v4();

    let lease = fx.engine.dispatcher.assign_at(order, t0()).unwrap();

    assert_eq!(lease.watchman, badge(1));
    assert_eq!(lease.order, order);
    assert_eq!(lease.status, LeaseStatus::Assigned);
    assert_eq!(lease.created_at, t0());
    assert!(lease.reassigned_from.is_none());
}

#[test]
fn assign_prefers_least_loaded_watchman() {
    let fx = fixture();

    // W1 carries two fresh leases, W2 one, W3 three.
    for (watchman, count) in [(badge(1), 2), (badge(2), 1), (badge(3), 3)] {
        for _ in 0..count {
            fx.leases
                .insert(Lease::new(Uuid::new_v4(), watchman, t0()))
                .unwrap();
        }
    }

    let lease = fx
        .engine
        .dispatcher
        .assign_at(Uuid::new_v4(), t0() + secs(1))
        .unwrap();
    assert_eq!(lease.watchman, badge(2));
}

#[test]
fn stale_leases_do_not_count_toward_load() {
    let fx = fixture_with(&["mills", "reyes"]);

    // W1's only lease is long past the TTL and due to expire; W2's is fresh.
    fx.leases
        .insert(Lease::new(Uuid::new_v4(), badge(1), t0() - secs(400)))
        .unwrap();
    fx.leases
        .insert(Lease::new(Uuid::new_v4(), badge(2), t0()))
        .unwrap();

    let lease = fx.engine.dispatcher.assign_at(Uuid::new_v4(), t0()).unwrap();
    assert_eq!(lease.watchman, badge(1));
}

#[test]
fn assign_rejects_order_with_active_lease() {
    let fx = fixture();
    let order = Uuid::new_v4();

    fx.engine.dispatcher.assign_at(order, t0()).unwrap();
    let err = fx
        .engine
        .dispatcher
        .assign_at(order, t0() + secs(5))
        .unwrap_err();

    assert!(matches!(err, DispatchError::AlreadyAssigned(o) if o == order));
    // The failed attempt must not move counters.
    let stat = fx.stats.snapshot(badge(1)).unwrap().unwrap();
    assert_eq!(stat.total_assigned, 1);
}

#[test]
fn assign_fails_with_empty_pool_and_mutates_nothing() {
    let fx = fixture_with(&[]);
    let order = Uuid::new_v4();

    let err = fx.engine.dispatcher.assign_at(order, t0()).unwrap_err();

    assert!(matches!(err, DispatchError::NoWatchmenAvailable));
    assert!(fx.leases.find_active(order).unwrap().is_none());
    for b in 1..=5 {
        assert!(fx.stats.snapshot(badge(b)).unwrap().is_none());
    }
}

#[test]
fn assign_skips_off_duty_watchmen() {
    let fx = fixture();
    fx.directory.set_active(badge(1), false).unwrap();

    let lease = fx.engine.dispatcher.assign_at(Uuid::new_v4(), t0()).unwrap();
    assert_eq!(lease.watchman, badge(2));
}

#[test]
fn assign_increments_assigned_counter() {
    let fx = fixture();

    fx.engine.dispatcher.assign_at(Uuid::new_v4(), t0()).unwrap();
    fx.engine
        .dispatcher
        .assign_at(Uuid::new_v4(), t0() + secs(1))
        .unwrap();

    // Least-loaded spreads the two orders across W1 and W2.
    let w1 = fx.stats.snapshot(badge(1)).unwrap().unwrap();
    let w2 = fx.stats.snapshot(badge(2)).unwrap().unwrap();
    assert_eq!(w1.total_assigned, 1);
    assert_eq!(w2.total_assigned, 1);
}
