//! regioncap: per-region object quotas with a durable placement log.
//!
//! Hosts usually need only [`prelude`]: build an [`AppState`](prelude::AppState)
//! (or an [`AdmissionEngine`](prelude::AdmissionEngine) directly), call
//! `admit` before placing an object, and `commit` the returned permit once
//! the object exists.

pub mod core {
    pub use regioncap_core::*;
}

pub mod engine {
    pub use regioncap_engine::*;
}

pub mod prelude {
    pub use regioncap_core::{Alert, Decision, ObjectKind, QuotaError, RegionKey};
    pub use regioncap_engine::admission::{AdmissionEngine, OccupancySource, Permit, Ticket};
    pub use regioncap_engine::app_state::AppState;
    pub use regioncap_engine::config::{FileSource, StaticSource};
}
