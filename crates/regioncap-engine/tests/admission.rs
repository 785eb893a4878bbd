#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use regioncap_core::{Alert, Decision, ObjectKind, RegionKey};
use regioncap_engine::admission::{OccupancySource, Permit, Ticket, TrackedOccupancy};
use regioncap_engine::store::SqliteStore;

const QUIET: &str = r#"
version: 1
limits: { hopper: 4, chest: 4, barrel: 4 }
alerts:
  capacity: { enabled: false }
  rapid_placement: { enabled: false }
"#;

fn region() -> RegionKey {
    RegionKey::new("world", 10, -3)
}

fn fixed(n: u32) -> Arc<dyn OccupancySource> {
    Arc::new(move |_: &RegionKey, _: ObjectKind| n)
}

fn expect_permit(ticket: Ticket) -> Permit {
    match ticket {
        Ticket::Admit(p) => p,
        other => panic!("expected admit, got {:?}", other.decision()),
    }
}

#[tokio::test]
async fn boundary_at_limit_minus_one() {
    let h = common::harness(QUIET, fixed(3), common::memory_store());
    let permit = expect_permit(h.engine.admit(&region(), ObjectKind::Hopper, "alice").await.unwrap());
    assert_eq!((permit.occupancy(), permit.limit()), (4, 4));
    let placed = permit.commit().await;
    assert_eq!(placed.occupancy, 4);
    assert!(placed.event_id.is_some());

    let h = common::harness(QUIET, fixed(4), common::memory_store());
    let ticket = h.engine.admit(&region(), ObjectKind::Hopper, "alice").await.unwrap();
    assert_eq!(ticket.decision(), Decision::Deny { limit: 4 });
    assert!(!ticket.is_admit());
}

#[test]
fn admits_iff_below_limit() {
    let count = Arc::new(AtomicU32::new(0));
    let source = {
        let count = Arc::clone(&count);
        Arc::new(move |_: &RegionKey, _: ObjectKind| count.load(Ordering::SeqCst))
    };
    let h = common::harness(QUIET, source, common::memory_store());

    for n in 0..8 {
        count.store(n, Ordering::SeqCst);
        let d = h.engine.try_admit(&region(), ObjectKind::Chest, "bob");
        assert_eq!(d.is_admit(), n < 4, "occupancy {n}");
    }
    assert!(h.engine.store().global_statistics().unwrap().is_empty());
}

#[tokio::test]
async fn disabled_kind_is_exempt_and_untracked() {
    let yaml = "version: 1\nlimits: { barrel: 1 }\nenabled: { barrel: false }\n";
    let h = common::harness(yaml, fixed(500), common::memory_store());

    let ticket = h.engine.admit(&region(), ObjectKind::Barrel, "carol").await.unwrap();
    assert!(matches!(ticket, Ticket::Exempt));
    assert_eq!(h.engine.try_admit(&region(), ObjectKind::Barrel, "carol"), Decision::Exempt);

    assert!(h.engine.locks().is_empty());
    assert!(h.engine.store().global_statistics().unwrap().is_empty());
    assert_eq!(
        h.metrics
            .admission_decisions
            .get(&[("kind", "barrel"), ("decision", "exempt")]),
        1
    );
}

#[tokio::test]
async fn tracked_occupancy_fills_to_limit() {
    let store = common::memory_store();
    let occupancy = Arc::new(TrackedOccupancy::new(Arc::clone(&store)));
    let h = common::harness("version: 1\nlimits: { hopper: 2 }\n", occupancy, store);

    for expected in 1..=2 {
        let permit = expect_permit(h.engine.admit(&region(), ObjectKind::Hopper, "dave").await.unwrap());
        assert_eq!(permit.commit().await.occupancy, expected);
    }
    let ticket = h.engine.admit(&region(), ObjectKind::Hopper, "dave").await.unwrap();
    assert_eq!(ticket.decision(), Decision::Deny { limit: 2 });

    // another region is unaffected
    let other = region().offset(1, 0);
    assert!(h.engine.try_admit(&other, ObjectKind::Hopper, "dave").is_admit());

    assert!(h.engine.record_removal(&region(), ObjectKind::Hopper, "dave").await.is_some());
    assert!(h.engine.try_admit(&region(), ObjectKind::Hopper, "dave").is_admit());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_candidates_for_last_slot() {
    let count = Arc::new(AtomicU32::new(3));
    let source = {
        let count = Arc::clone(&count);
        Arc::new(move |_: &RegionKey, _: ObjectKind| count.load(Ordering::SeqCst))
    };
    let h = common::harness(QUIET, source, common::memory_store());

    let mut tasks = Vec::new();
    for actor in ["erin", "frank"] {
        let engine = h.engine.clone();
        let count = Arc::clone(&count);
        tasks.push(tokio::spawn(async move {
            match engine.admit(&region(), ObjectKind::Hopper, actor).await.unwrap() {
                Ticket::Admit(permit) => {
                    // host places the object before committing
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    count.fetch_add(1, Ordering::SeqCst);
                    permit.commit().await;
                    true
                }
                _ => false,
            }
        }));
    }

    let mut admitted = 0;
    for t in tasks {
        if t.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(count.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn dropped_permit_releases_region_without_recording() {
    let h = common::harness(QUIET, fixed(0), common::memory_store());

    let permit = expect_permit(h.engine.admit(&region(), ObjectKind::Chest, "gina").await.unwrap());
    drop(permit);

    let permit = expect_permit(h.engine.admit(&region(), ObjectKind::Chest, "gina").await.unwrap());
    drop(permit);
    assert!(h.engine.store().global_statistics().unwrap().is_empty());

    assert!(h.engine.locks().is_empty());
    assert_eq!(h.engine.locks().prune(), 0);
}

#[tokio::test]
async fn held_region_times_out_as_busy() {
    let h = common::harness(QUIET, fixed(0), common::memory_store());
    let held = expect_permit(h.engine.admit(&region(), ObjectKind::Hopper, "hank").await.unwrap());

    let err = match h.engine.admit(&region(), ObjectKind::Chest, "ivy").await {
        Err(e) => e,
        Ok(t) => panic!("expected busy, got {:?}", t.decision()),
    };
    assert_eq!(err.code().as_str(), "REGION_BUSY");

    let elsewhere = region().offset(0, 1);
    let other = expect_permit(h.engine.admit(&elsewhere, ObjectKind::Chest, "ivy").await.unwrap());
    other.commit().await;
    assert_eq!(h.engine.locks().len(), 1);
    held.commit().await;
    assert!(h.engine.locks().is_empty());
}

#[tokio::test]
async fn lock_entries_do_not_outlive_their_holders() {
    let h = common::harness(QUIET, fixed(0), common::memory_store());

    for i in 0..50 {
        let at = region().offset(i, -i);
        let permit = expect_permit(h.engine.admit(&at, ObjectKind::Hopper, "lena").await.unwrap());
        if i % 2 == 0 {
            permit.commit().await;
        } else {
            drop(permit);
        }
    }
    assert!(h.engine.locks().is_empty());

    // a waiter that times out leaves only the held region behind
    let held = expect_permit(h.engine.admit(&region(), ObjectKind::Hopper, "lena").await.unwrap());
    assert!(h.engine.admit(&region(), ObjectKind::Hopper, "milo").await.is_err());
    assert_eq!(h.engine.locks().len(), 1);
    drop(held);
    assert!(h.engine.locks().is_empty());
}

#[tokio::test]
async fn storage_failure_does_not_block_admission() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quota.db");
    let store = Arc::new(SqliteStore::open(&path, Duration::from_millis(200)).unwrap());

    let saboteur = rusqlite::Connection::open(&path).unwrap();
    saboteur.execute_batch("DROP TABLE placement_events;").unwrap();
    drop(saboteur);

    let h = common::harness(QUIET, fixed(1), store);
    let permit = expect_permit(h.engine.admit(&region(), ObjectKind::Hopper, "jack").await.unwrap());
    let placed = permit.commit().await;

    assert_eq!(placed.occupancy, 2);
    assert_eq!(placed.event_id, None);
    assert_eq!(h.metrics.store_failures.get(&[("op", "record_admission")]), 1);
    assert!(h.engine.record_removal(&region(), ObjectKind::Hopper, "jack").await.is_none());
}

#[tokio::test]
async fn commit_raises_capacity_and_rate_alerts() {
    let yaml = r#"
version: 1
limits: { hopper: 5 }
alerts:
  capacity: { threshold_percent: 80 }
  rapid_placement: { threshold: 2, window_seconds: 60 }
"#;
    let h = common::harness(yaml, fixed(3), common::memory_store());
    let mut rx = h.bus.subscribe();

    let first = expect_permit(h.engine.admit(&region(), ObjectKind::Hopper, "kim").await.unwrap()).commit().await;
    assert_eq!(first.alerts.len(), 1);
    assert!(matches!(
        &first.alerts[0],
        Alert::CapacityWarning { current: 4, limit: 5, percent: 80, .. }
    ));

    let second = expect_permit(h.engine.admit(&region(), ObjectKind::Hopper, "kim").await.unwrap()).commit().await;
    assert!(second
        .alerts
        .iter()
        .any(|a| matches!(a, Alert::RapidPlacement { count: 2, window_secs: 60, .. })));

    let received = rx.recv().await.unwrap();
    assert_eq!(received, first.alerts[0]);
    assert_eq!(
        h.metrics.alerts.get(&[("alert", "capacity"), ("kind", "hopper")]),
        2
    );
}

#[test]
fn reported_count_check_records_nothing() {
    let h = common::harness(QUIET, fixed(0), common::memory_store());
    assert_eq!(
        h.engine.check_reported(&region(), ObjectKind::Barrel, 3),
        Decision::Admit { occupancy: 4, limit: 4 }
    );
    assert_eq!(
        h.engine.check_reported(&region(), ObjectKind::Barrel, 9),
        Decision::Deny { limit: 4 }
    );
    assert!(h.engine.store().global_statistics().unwrap().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn slow_store_write_leaves_runtime_responsive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quota.db");
    let store = Arc::new(SqliteStore::open(&path, Duration::from_millis(300)).unwrap());
    let h = common::harness(QUIET, fixed(0), store);

    // another process holds the write lock for longer than the busy timeout
    let other = rusqlite::Connection::open(&path).unwrap();
    other.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let ticks = Arc::new(AtomicU32::new(0));
    let ticker = {
        let ticks = Arc::clone(&ticks);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(5)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let permit = expect_permit(h.engine.admit(&region(), ObjectKind::Hopper, "nora").await.unwrap());
    let placed = permit.commit().await;
    ticker.abort();

    assert_eq!(placed.event_id, None);
    assert_eq!(h.metrics.store_failures.get(&[("op", "record_admission")]), 1);
    assert!(ticks.load(Ordering::SeqCst) >= 10, "runtime stalled during the write");

    other.execute_batch("ROLLBACK;").unwrap();
}
