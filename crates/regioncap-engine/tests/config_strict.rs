#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use regioncap_core::ObjectKind;
use regioncap_engine::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
realms:
  nether:
    hoper: 4 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    for kind in ObjectKind::ALL {
        assert_eq!(cfg.limits.get(kind), 32);
        assert!(cfg.enabled.get(kind));
    }
    assert_eq!(cfg.alerts.capacity.threshold_percent, 80);
    assert_eq!(cfg.alerts.rapid_placement.threshold, 20);
    assert_eq!(cfg.alerts.rapid_placement.window_seconds, 60);
    assert_eq!(cfg.admin.listen, "127.0.0.1:8787");
    assert!(cfg.admin.token.is_none());
}

#[test]
fn realm_sentinel_folds_to_default() {
    let cfg = config::load_from_str(
        r#"
version: 1
realms:
  world_nether:
    hopper: -1
    chest: 8
"#,
    )
    .expect("must parse");

    let nether = &cfg.realms["world_nether"];
    assert_eq!(nether.get(ObjectKind::Hopper), None);
    assert_eq!(nether.get(ObjectKind::Chest), Some(8));
    assert_eq!(nether.get(ObjectKind::Barrel), None);
}

#[test]
fn zero_and_negative_limits_rejected() {
    for bad in [
        "version: 1\nlimits: { hopper: 0 }\n",
        "version: 1\nrealms: { end: { chest: 0 } }\n",
        "version: 1\nrealms: { end: { barrel: -5 } }\n",
    ] {
        let err = config::load_from_str(bad).expect_err("must fail");
        assert_eq!(err.code().as_str(), "BAD_CONFIG", "{bad}");
    }
}

#[test]
fn out_of_range_sections_rejected() {
    for bad in [
        "version: 2\n",
        "version: 1\nalerts: { capacity: { threshold_percent: 0 } }\n",
        "version: 1\nalerts: { rapid_placement: { window_seconds: 0 } }\n",
        "version: 1\nstorage: { path: \"\" }\n",
        "version: 1\nadmin: { token: \"\" }\n",
    ] {
        assert!(config::load_from_str(bad).is_err(), "{bad}");
    }
}

#[test]
fn missing_file_is_policy_unavailable() {
    let err = config::load_from_file("/nonexistent/regioncap.yaml").expect_err("must fail");
    assert_eq!(err.code().as_str(), "POLICY_UNAVAILABLE");
}
