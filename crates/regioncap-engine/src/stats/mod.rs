//! Read-only statistics and hotspot queries over the aggregation store.
//!
//! Percentages are computed against the limit resolved at query time, not the
//! limit in force when each event happened.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use regioncap_core::error::Result;
use regioncap_core::{ObjectKind, PlacementEvent, RegionKey};

use crate::admission::OccupancySource;
use crate::alert::AlertSettings;
use crate::obs::metrics::QuotaMetrics;
use crate::policy::PolicyResolver;
use crate::store::{ActorCounters, GlobalStatistics, SqliteStore, StoreError};

/// Largest radius accepted by [`StatsService::occupancy_grid`].
pub const MAX_GRID_RADIUS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hotspot {
    pub rank: usize,
    pub region: RegionKey,
    pub count: u64,
    pub limit: u32,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindOccupancy {
    pub kind: ObjectKind,
    /// Ground truth from the host.
    pub live: u32,
    /// Admitted-minus-removed from the store's index.
    pub tracked: u64,
    pub limit: u32,
    pub enabled: bool,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionReport {
    pub region: RegionKey,
    pub kinds: Vec<KindOccupancy>,
}

/// Tracked occupancy of a square of regions, row-major by x then z.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccupancyGrid {
    pub center: RegionKey,
    pub radius: u32,
    pub limit: u32,
    pub rows: Vec<Vec<u64>>,
}

impl OccupancyGrid {
    pub fn cell(&self, dx: i32, dz: i32) -> Option<u64> {
        let r = i32::try_from(self.radius).ok()?;
        let row = usize::try_from(dx + r).ok()?;
        let col = usize::try_from(dz + r).ok()?;
        self.rows.get(row)?.get(col).copied()
    }
}

pub struct StatsService {
    policy: Arc<PolicyResolver>,
    store: Arc<SqliteStore>,
    metrics: Arc<QuotaMetrics>,
}

impl StatsService {
    pub fn new(policy: Arc<PolicyResolver>, store: Arc<SqliteStore>, metrics: Arc<QuotaMetrics>) -> Self {
        Self {
            policy,
            store,
            metrics,
        }
    }

    fn read<T>(&self, op: &'static str, res: std::result::Result<T, StoreError>) -> Result<T> {
        res.map_err(|e| {
            self.metrics.store_failures.inc(&[("op", op)]);
            tracing::warn!(op, error = %e, "statistics read failed");
            e.into()
        })
    }

    /// Limit used for percentages: the kind's limit, or the sum over
    /// enforced kinds when no kind is given.
    fn display_limit(&self, realm: &str, kind: Option<ObjectKind>) -> u32 {
        match kind {
            Some(k) => self.policy.resolve(realm, k).limit,
            None => ObjectKind::ALL
                .into_iter()
                .map(|k| self.policy.resolve(realm, k))
                .filter(|r| r.enabled)
                .fold(0u32, |acc, r| acc.saturating_add(r.limit)),
        }
    }

    pub fn global(&self) -> Result<GlobalStatistics> {
        self.read("global_statistics", self.store.global_statistics())
    }

    /// `Ok(None)` is "no data for this actor"; `Err` is "store unavailable".
    pub fn actor(&self, actor: &str) -> Result<Option<ActorCounters>> {
        self.read("actor_statistics", self.store.actor_statistics(actor))
    }

    pub fn actors(&self, limit: usize) -> Result<Vec<ActorCounters>> {
        self.read("all_actor_statistics", self.store.all_actor_statistics(limit))
    }

    pub fn hotspots(&self, realm: &str, kind: Option<ObjectKind>, limit: usize) -> Result<Vec<Hotspot>> {
        let ranked = self.read("top_regions", self.store.top_regions(realm, kind, limit))?;
        let cap = self.display_limit(realm, kind);

        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(i, rc)| Hotspot {
                rank: i + 1,
                percent: AlertSettings::percent_of(u32::try_from(rc.count).unwrap_or(u32::MAX), cap),
                region: rc.region,
                count: rc.count,
                limit: cap,
            })
            .collect())
    }

    /// Live and tracked occupancy of every kind in one region.
    pub fn region_report(&self, region: &RegionKey, source: &dyn OccupancySource) -> Result<RegionReport> {
        let mut kinds = Vec::with_capacity(ObjectKind::ALL.len());
        for kind in ObjectKind::ALL {
            let policy = self.policy.resolve(&region.realm, kind);
            let live = source.occupancy_of(region, kind);
            let tracked = self.read("region_occupancy", self.store.region_occupancy(region, Some(kind)))?;
            kinds.push(KindOccupancy {
                kind,
                live,
                tracked,
                limit: policy.limit,
                enabled: policy.enabled,
                percent: AlertSettings::percent_of(live, policy.limit),
            });
        }
        Ok(RegionReport {
            region: region.clone(),
            kinds,
        })
    }

    /// Tracked occupancy around `center`; `radius` is clamped to [`MAX_GRID_RADIUS`].
    pub fn occupancy_grid(&self, center: &RegionKey, radius: u32, kind: Option<ObjectKind>) -> Result<OccupancyGrid> {
        let radius = radius.min(MAX_GRID_RADIUS);
        let r = i32::try_from(radius).unwrap_or(0);
        let counts = self.read(
            "region_counts_within",
            self.store.region_counts_within(
                &center.realm,
                (center.x.saturating_sub(r), center.x.saturating_add(r)),
                (center.z.saturating_sub(r), center.z.saturating_add(r)),
                kind,
            ),
        )?;
        let by_cell: HashMap<(i32, i32), u64> = counts
            .into_iter()
            .map(|rc| ((rc.region.x, rc.region.z), rc.count))
            .collect();

        let rows = (-r..=r)
            .map(|dx| {
                (-r..=r)
                    .map(|dz| {
                        let cell = center.offset(dx, dz);
                        by_cell.get(&(cell.x, cell.z)).copied().unwrap_or(0)
                    })
                    .collect()
            })
            .collect();

        Ok(OccupancyGrid {
            center: center.clone(),
            radius,
            limit: self.display_limit(&center.realm, kind),
            rows,
        })
    }

    pub fn actor_history(&self, actor: &str, limit: usize) -> Result<Vec<PlacementEvent>> {
        self.read("events_by_actor", self.store.events_by_actor(actor, limit))
    }

    pub fn region_history(&self, region: &RegionKey, limit: usize) -> Result<Vec<PlacementEvent>> {
        self.read("events_in_region", self.store.events_in_region(region, limit))
    }
}
