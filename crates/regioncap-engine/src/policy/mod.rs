//! Policy layer: layered limit resolution with runtime overrides.
//!
//! Compiles the configured layers into an immutable snapshot that the
//! admission engine and statistics layer consult on every call. Overrides set
//! by administrative calls sit on top until the next reload.

pub mod resolver;

pub use resolver::{LimitSource, PolicyResolver, RealmLimitsView, ResolvedLimit};
