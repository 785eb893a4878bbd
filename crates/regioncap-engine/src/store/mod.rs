//! Aggregation store: durable placement log plus derived counters.

mod error;
mod records;
mod sqlite;

pub use error::StoreError;
pub use records::{ActorCounters, GlobalStatistics, KindTotals, RegionCount};
pub use sqlite::{SqliteStore, MAX_ACTORS, MAX_HISTORY, MAX_TOP_REGIONS};
