//! Kind parsing and decision rule tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use regioncap_core::{Decision, ErrorCode, KindTable, ObjectKind, RegionKey};

#[test]
fn kind_parse_is_case_insensitive() {
    assert_eq!("Hopper".parse::<ObjectKind>().unwrap(), ObjectKind::Hopper);
    assert_eq!(" chest ".parse::<ObjectKind>().unwrap(), ObjectKind::Chest);
    assert_eq!("BARREL".parse::<ObjectKind>().unwrap(), ObjectKind::Barrel);
}

#[test]
fn unknown_kind_is_rejected() {
    let err = "furnace".parse::<ObjectKind>().expect_err("must fail");
    assert_eq!(err.code(), ErrorCode::InvalidKind);
    assert_eq!(err.code().as_str(), "INVALID_KIND");
    assert!(err.is_caller_error());
}

#[test]
fn kind_serializes_lowercase() {
    let s = serde_json::to_string(&ObjectKind::Barrel).unwrap();
    assert_eq!(s, "\"barrel\"");
}

#[test]
fn admit_iff_current_below_limit() {
    for limit in 1..=8u32 {
        for current in 0..=10u32 {
            let d = Decision::evaluate(current, limit);
            if current < limit {
                assert_eq!(d, Decision::Admit { occupancy: current + 1, limit });
            } else {
                assert_eq!(d, Decision::Deny { limit });
            }
        }
    }
}

#[test]
fn kind_table_indexes_every_kind() {
    let mut t = KindTable::filled(0u32);
    t.set(ObjectKind::Chest, 7);
    assert_eq!(*t.get(ObjectKind::Chest), 7);
    assert_eq!(*t.get(ObjectKind::Hopper), 0);
    let kinds: Vec<ObjectKind> = t.iter().map(|(k, _)| k).collect();
    assert_eq!(kinds, ObjectKind::ALL.to_vec());
}

#[test]
fn region_keys_order_by_realm_then_x_then_z() {
    let mut keys = vec![
        RegionKey::new("world", 1, 0),
        RegionKey::new("nether", 5, 5),
        RegionKey::new("world", 0, 9),
        RegionKey::new("world", 0, 2),
    ];
    keys.sort();
    assert_eq!(
        keys,
        vec![
            RegionKey::new("nether", 5, 5),
            RegionKey::new("world", 0, 2),
            RegionKey::new("world", 0, 9),
            RegionKey::new("world", 1, 0),
        ]
    );
}

#[test]
fn region_containing_block_uses_arithmetic_shift() {
    assert_eq!(RegionKey::containing("w", 17, -1, 4), RegionKey::new("w", 1, -1));
    assert_eq!(RegionKey::containing("w", 15, 0, 4), RegionKey::new("w", 0, 0));
}

fn parse_pair(a: &str, b: &str) -> regioncap_core::Result<(ObjectKind, ObjectKind)> {
    Ok((a.parse()?, b.parse()?))
}

#[test]
fn crate_root_result_carries_quota_errors() {
    assert_eq!(
        parse_pair("hopper", "barrel").unwrap(),
        (ObjectKind::Hopper, ObjectKind::Barrel)
    );
    let err: regioncap_core::QuotaError = parse_pair("hopper", "furnace").unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidKind);
    assert_eq!(err.code().as_str(), "INVALID_KIND");
}
