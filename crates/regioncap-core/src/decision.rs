//! Admission decisions.

use serde::Serialize;

/// Outcome of checking one candidate placement against its region's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    /// Enforcement is disabled for the kind: admitted, not counted, not recorded.
    Exempt,
    /// Room is available. `occupancy` is the count after placement (`current + 1`).
    Admit { occupancy: u32, limit: u32 },
    /// The region already holds `limit` or more objects of the kind.
    Deny { limit: u32 },
}

impl Decision {
    /// Apply the quota rule to a pre-placement count.
    pub fn evaluate(current: u32, limit: u32) -> Self {
        if current >= limit {
            Decision::Deny { limit }
        } else {
            Decision::Admit {
                occupancy: current.saturating_add(1),
                limit,
            }
        }
    }

    pub fn is_admit(&self) -> bool {
        !matches!(self, Decision::Deny { .. })
    }

    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Exempt => "exempt",
            Decision::Admit { .. } => "admit",
            Decision::Deny { .. } => "deny",
        }
    }
}
