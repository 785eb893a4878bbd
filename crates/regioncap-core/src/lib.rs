//! regioncap core: domain primitives, error types, and decisions.
//!
//! This crate defines the vocabulary shared by the engine, the admin surface,
//! and any host embedding the quota engine: object kinds, region keys,
//! placement events, admission decisions, and alerts. It carries no storage
//! or runtime dependencies so hosts can depend on it alone.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `QuotaError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod alert;
pub mod decision;
pub mod error;
pub mod event;
pub mod kind;
pub mod region;

pub use alert::Alert;
pub use decision::Decision;
pub use error::{ErrorCode, QuotaError, Result};
pub use event::{EventAction, PlacementEvent};
pub use kind::{KindTable, ObjectKind};
pub use region::RegionKey;
