use std::collections::BTreeMap;

use serde::Serialize;

use regioncap_core::{ObjectKind, RegionKey};

/// Running per-actor totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorCounters {
    pub actor: String,
    /// Every kind is present; untouched kinds read 0.
    pub counts: BTreeMap<ObjectKind, u64>,
    pub first_event_ms: u64,
    pub last_event_ms: u64,
}

impl ActorCounters {
    pub fn count(&self, kind: ObjectKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Global per-kind event totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KindTotals {
    pub admitted: u64,
    pub removed: u64,
}

impl KindTotals {
    pub fn net(&self) -> u64 {
        self.admitted.saturating_sub(self.removed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalStatistics {
    pub total_events: u64,
    pub total_distinct_actors: u64,
    /// Every kind is present; untouched kinds read zero.
    pub per_kind: BTreeMap<ObjectKind, KindTotals>,
}

impl GlobalStatistics {
    pub fn is_empty(&self) -> bool {
        self.total_events == 0
            && self.total_distinct_actors == 0
            && self.per_kind.values().all(|t| *t == KindTotals::default())
    }
}

/// One row of a hotspot ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionCount {
    pub region: RegionKey,
    pub count: u64,
}

pub(crate) fn zeroed<T: Default>() -> BTreeMap<ObjectKind, T> {
    ObjectKind::ALL.into_iter().map(|k| (k, T::default())).collect()
}
