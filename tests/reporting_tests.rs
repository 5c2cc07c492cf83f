mod harness;

use harness::{badge, fixture, fixture_with, secs, t0};
use uuid::Uuid;

use watchpost::dispatch::LeaseStatus;

#[test]
fn stats_for_unassigned_watchman_reads_zero() {
    let fx = fixture();
    let view = fx.engine.reporting.stats_for_at(badge(3), t0()).unwrap();

    assert_eq!(view.total_assigned, 0);
    assert_eq!(view.total_confirmed, 0);
    assert_eq!(view.total_expired, 0);
    assert_eq!(view.efficiency, 0);
    assert_eq!(view.pending, 0);
    assert!(view.last_updated.is_none());
}

#[test]
fn stats_view_merges_counters_with_live_pending() {
    let fx = fixture_with(&["mills"]);
    let confirmed_order = Uuid::new_v4();
    let pending_order = Uuid::new_v4();

    fx.engine
        .dispatcher
        .assign_at(confirmed_order, t0())
        .unwrap();
    fx.engine
        .confirmations
        .confirm_at(confirmed_order, badge(1), "mills", t0() + secs(10))
        .unwrap();
    fx.engine
        .dispatcher
        .assign_at(pending_order, t0() + secs(20))
        .unwrap();

    let view = fx
        .engine
        .reporting
        .stats_for_at(badge(1), t0() + secs(30))
        .unwrap();
    assert_eq!(view.total_assigned, 2);
    assert_eq!(view.total_confirmed, 1);
    assert_eq!(view.efficiency, 50);
    assert_eq!(view.pending, 1);
    assert_eq!(view.last_updated, Some(t0() + secs(20)));
}

#[test]
fn pending_excludes_leases_past_ttl() {
    let fx = fixture_with(&["mills"]);
    let order = Uuid::new_v4();
    fx.engine.dispatcher.assign_at(order, t0()).unwrap();

    let fresh = fx.engine.reporting.stats_for_at(badge(1), t0() + secs(100)).unwrap();
    assert_eq!(fresh.pending, 1);

    // Past the TTL the lease is due to expire and no longer counts.
    let stale = fx.engine.reporting.stats_for_at(badge(1), t0() + secs(301)).unwrap();
    assert_eq!(stale.pending, 0);
}

#[test]
fn report_covers_the_active_pool_in_badge_order() {
    let fx = fixture();
    fx.engine.dispatcher.assign_at(Uuid::new_v4(), t0()).unwrap();

    let rows = fx.engine.reporting.report_at(t0() + secs(5)).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].watchman, badge(1));
    assert_eq!(rows[0].name, "mills");
    assert_eq!(rows[1].name, "reyes");
    assert_eq!(rows[2].name, "okafor");
    assert_eq!(rows[0].total_assigned, 1);
    assert_eq!(rows[1].total_assigned, 0);
}

#[test]
fn report_excludes_off_duty_watchmen() {
    let fx = fixture();
    fx.directory.set_active(badge(3), false).unwrap();

    let rows = fx.engine.reporting.report_at(t0()).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.watchman != badge(3)));
}

#[test]
fn confirmed_today_counts_only_the_current_day() {
    let fx = fixture_with(&["mills"]);

    // One confirmation yesterday evening, one this morning.
    let yesterday = Uuid::new_v4();
    fx.engine
        .dispatcher
        .assign_at(yesterday, t0() - secs(26 * 3600))
        .unwrap();
    fx.engine
        .confirmations
        .confirm_at(yesterday, badge(1), "mills", t0() - secs(26 * 3600) + secs(60))
        .unwrap();

    let today = Uuid::new_v4();
    fx.engine.dispatcher.assign_at(today, t0()).unwrap();
    fx.engine
        .confirmations
        .confirm_at(today, badge(1), "mills", t0() + secs(30))
        .unwrap();

    let rows = fx.engine.reporting.report_at(t0() + secs(60)).unwrap();
    assert_eq!(rows[0].total_confirmed, 2);
    assert_eq!(rows[0].confirmed_today, 1);
}

#[test]
fn efficiency_reflects_expiries() {
    let fx = fixture_with(&["mills", "reyes"]);

    // W1 confirms one order and lets another lapse.
    let confirmed = Uuid::new_v4();
    fx.engine.dispatcher.assign_at(confirmed, t0()).unwrap();
    fx.engine
        .confirmations
        .confirm_at(confirmed, badge(1), "mills", t0() + secs(5))
        .unwrap();

    let lapsed = Uuid::new_v4();
    fx.engine.dispatcher.assign_at(lapsed, t0() + secs(10)).unwrap();
    fx.engine.sweeper.sweep_at(t0() + secs(400)).unwrap();

    let view = fx
        .engine
        .reporting
        .stats_for_at(badge(1), t0() + secs(400))
        .unwrap();
    assert_eq!(view.total_assigned, 2);
    assert_eq!(view.total_confirmed, 1);
    assert_eq!(view.total_expired, 1);
    assert_eq!(view.efficiency, 50);
}

#[test]
fn history_exposes_the_reassignment_chain() {
    let fx = fixture();
    let order = Uuid::new_v4();
    fx.engine.dispatcher.assign_at(order, t0()).unwrap();
    fx.engine.sweeper.sweep_at(t0() + secs(301)).unwrap();

    let history = fx.engine.reporting.history_for(order).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, LeaseStatus::Expired);
    assert_eq!(history[1].status, LeaseStatus::Assigned);
    assert_eq!(history[1].reassigned_from, Some(history[0].id));

    assert!(fx
        .engine
        .reporting
        .history_for(Uuid::new_v4())
        .unwrap()
        .is_empty());
}
