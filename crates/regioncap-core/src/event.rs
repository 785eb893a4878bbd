//! Placement events: the append-only facts recorded by the store.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::QuotaError;
use crate::kind::ObjectKind;
use crate::region::RegionKey;

/// What happened to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Admitted,
    Removed,
}

impl EventAction {
    pub fn as_str(self) -> &'static str {
        match self {
            EventAction::Admitted => "admitted",
            EventAction::Removed => "removed",
        }
    }

    /// Signed contribution of this action to a running counter.
    pub fn delta(self) -> i64 {
        match self {
            EventAction::Admitted => 1,
            EventAction::Removed => -1,
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventAction {
    type Err = QuotaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admitted" => Ok(EventAction::Admitted),
            "removed" => Ok(EventAction::Removed),
            other => Err(QuotaError::Internal(format!("unknown event action: {other}"))),
        }
    }
}

/// One recorded placement or removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementEvent {
    /// Sequence id, assigned by the store on append.
    pub seq: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub actor: String,
    pub kind: ObjectKind,
    pub region: RegionKey,
    pub action: EventAction,
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
