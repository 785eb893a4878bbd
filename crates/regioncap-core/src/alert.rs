//! Alert values produced by the evaluator and fanned out by the host.

use serde::Serialize;

use crate::kind::ObjectKind;
use crate::region::RegionKey;

/// Notification intent for operators. Delivery and deduplication belong to
/// whoever consumes these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "alert", rename_all = "snake_case")]
pub enum Alert {
    /// A region is at or above the configured share of its limit.
    CapacityWarning {
        region: RegionKey,
        kind: ObjectKind,
        current: u32,
        limit: u32,
        percent: u32,
    },
    /// An actor placed many objects of one kind inside a short window.
    RapidPlacement {
        actor: String,
        kind: ObjectKind,
        count: u32,
        window_secs: u32,
    },
}

impl Alert {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Alert::CapacityWarning { kind, .. } | Alert::RapidPlacement { kind, .. } => *kind,
        }
    }

    /// Label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Alert::CapacityWarning { .. } => "capacity",
            Alert::RapidPlacement { .. } => "rapid_placement",
        }
    }

    /// One-line operator message.
    pub fn message(&self) -> String {
        match self {
            Alert::CapacityWarning {
                region,
                kind,
                current,
                limit,
                percent,
            } => format!("{region} at {percent}% of {kind} capacity ({current}/{limit})"),
            Alert::RapidPlacement {
                actor,
                kind,
                count,
                window_secs,
            } => format!("{actor} placed {count} {kind}s in {window_secs} seconds"),
        }
    }
}
