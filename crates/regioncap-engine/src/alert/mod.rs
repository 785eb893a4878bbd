//! Alert evaluation and fan-out.
//!
//! The evaluator is a pure threshold check over caller-supplied numbers and
//! the current alert settings. The bus hands alerts to whoever subscribed;
//! dedup and backoff are the subscribers' business.

mod bus;
mod evaluator;

pub use bus::AlertBus;
pub use evaluator::{AlertEvaluator, AlertSettings};
