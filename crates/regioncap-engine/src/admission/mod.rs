//! Admission: the per-region quota check and its serialized commit.
//!
//! `try_admit` is a pure check safe for dry runs. `admit` holds the region's
//! lock from the occupancy query until the returned [`Permit`] is committed
//! or dropped, so two candidates for the last free slot cannot both pass.

mod engine;
mod occupancy;
mod region_lock;

pub use engine::{AdmissionEngine, Permit, Placement, Ticket};
pub use occupancy::{OccupancySource, TrackedOccupancy};
pub use region_lock::{RegionGuard, RegionLocks};
