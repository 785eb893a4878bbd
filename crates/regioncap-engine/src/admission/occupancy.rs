use std::sync::Arc;

use regioncap_core::{ObjectKind, RegionKey};

use crate::store::SqliteStore;

/// Ground-truth object counts, supplied by the host.
///
/// Must return the count already present in `region`, excluding the
/// candidate being checked.
pub trait OccupancySource: Send + Sync {
    fn occupancy_of(&self, region: &RegionKey, kind: ObjectKind) -> u32;
}

impl<F> OccupancySource for F
where
    F: Fn(&RegionKey, ObjectKind) -> u32 + Send + Sync,
{
    fn occupancy_of(&self, region: &RegionKey, kind: ObjectKind) -> u32 {
        self(region, kind)
    }
}

/// Occupancy read from the store's region index, for hosts that cannot count
/// ground truth. Store failures read as 0 so admission keeps flowing.
pub struct TrackedOccupancy {
    store: Arc<SqliteStore>,
}

impl TrackedOccupancy {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }
}

impl OccupancySource for TrackedOccupancy {
    fn occupancy_of(&self, region: &RegionKey, kind: ObjectKind) -> u32 {
        match self.store.region_occupancy(region, Some(kind)) {
            Ok(n) => u32::try_from(n).unwrap_or(u32::MAX),
            Err(e) => {
                tracing::warn!(%region, %kind, error = %e, "tracked occupancy unavailable; assuming empty");
                0
            }
        }
    }
}
