#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use regioncap_core::{Alert, ObjectKind, RegionKey};
use regioncap_engine::alert::{AlertBus, AlertEvaluator, AlertSettings};
use regioncap_engine::obs::metrics::QuotaMetrics;

#[test]
fn capacity_fires_at_threshold() {
    let eval = AlertEvaluator::new(common::policy("version: 1\n"));
    let r = RegionKey::new("world", 0, 0);

    assert!(eval.evaluate_capacity(&r, ObjectKind::Hopper, 25, 32).is_none());
    let alert = eval
        .evaluate_capacity(&r, ObjectKind::Hopper, 26, 32)
        .expect("81% is over 80%");
    assert!(matches!(alert, Alert::CapacityWarning { percent: 81, .. }));
    assert!(eval.evaluate_capacity(&r, ObjectKind::Hopper, 5, 0).is_none());
}

#[test]
fn rate_fires_at_threshold() {
    let eval = AlertEvaluator::new(common::policy(
        "version: 1\nalerts: { rapid_placement: { threshold: 3, window_seconds: 10 } }\n",
    ));
    assert!(eval.evaluate_rate("alice", ObjectKind::Chest, 2, 10).is_none());
    let alert = eval.evaluate_rate("alice", ObjectKind::Chest, 3, 10).unwrap();
    assert_eq!(alert.label(), "rapid_placement");
    assert_eq!(alert.kind(), ObjectKind::Chest);
}

#[test]
fn disabled_alerts_stay_quiet() {
    let eval = AlertEvaluator::new(common::policy(
        "version: 1\nalerts: { capacity: { enabled: false }, rapid_placement: { enabled: false } }\n",
    ));
    let r = RegionKey::new("world", 0, 0);
    assert!(eval.evaluate_capacity(&r, ObjectKind::Hopper, 32, 32).is_none());
    assert!(eval.evaluate_rate("bob", ObjectKind::Hopper, 1_000, 60).is_none());
}

#[test]
fn percent_never_overflows() {
    assert_eq!(AlertSettings::percent_of(u32::MAX, 1), u32::MAX);
    assert_eq!(AlertSettings::percent_of(1, 3), 33);
}

#[tokio::test]
async fn bus_fans_out_to_every_subscriber() {
    let bus = AlertBus::new(8);
    let metrics = QuotaMetrics::default();
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    let alert = Alert::RapidPlacement {
        actor: "carol".into(),
        kind: ObjectKind::Barrel,
        count: 40,
        window_secs: 60,
    };
    bus.publish(alert.clone(), &metrics);

    assert_eq!(a.recv().await.unwrap(), alert);
    assert_eq!(b.recv().await.unwrap(), alert);
    assert_eq!(
        metrics.alerts.get(&[("alert", "rapid_placement"), ("kind", "barrel")]),
        1
    );

    // publishing with nobody listening is not an error
    drop((a, b));
    bus.publish(alert, &metrics);
}
