//! regioncap engine library entry.
//!
//! Wires config, policy resolution, serialized admission, the SQLite
//! aggregation store, statistics, and alert fan-out into one stack. Consumed
//! by the admin binary (`main.rs`), by embedding hosts, and by integration
//! tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod admission;
pub mod alert;
pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod router;
pub mod stats;
pub mod store;
