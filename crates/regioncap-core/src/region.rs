//! Region keys: fixed-size grid cells within a realm.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one grid cell. Ordering is realm, then x, then z, which is the
/// tie-break order used by hotspot ranking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionKey {
    pub realm: String,
    pub x: i32,
    pub z: i32,
}

impl RegionKey {
    pub fn new(realm: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            realm: realm.into(),
            x,
            z,
        }
    }

    /// Region containing a block coordinate, for cells `1 << shift` blocks wide
    /// (`shift = 4` gives 16x16 chunks).
    pub fn containing(realm: impl Into<String>, block_x: i32, block_z: i32, shift: u32) -> Self {
        Self::new(realm, block_x >> shift, block_z >> shift)
    }

    /// Neighbouring cell offset by `(dx, dz)` in the same realm.
    pub fn offset(&self, dx: i32, dz: i32) -> Self {
        Self::new(self.realm.clone(), self.x.saturating_add(dx), self.z.saturating_add(dz))
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.realm, self.x, self.z)
    }
}
