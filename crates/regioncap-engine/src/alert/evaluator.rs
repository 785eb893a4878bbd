use std::sync::Arc;

use serde::Serialize;

use regioncap_core::{Alert, ObjectKind, RegionKey};

use crate::config::AlertSection;
use crate::policy::PolicyResolver;

/// Alert thresholds, compiled from the `alerts` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertSettings {
    pub capacity_enabled: bool,
    pub capacity_threshold_percent: u32,
    pub rapid_enabled: bool,
    pub rapid_threshold: u32,
    pub rapid_window_secs: u32,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self::from_config(&AlertSection::default())
    }
}

impl AlertSettings {
    pub fn from_config(cfg: &AlertSection) -> Self {
        Self {
            capacity_enabled: cfg.capacity.enabled,
            capacity_threshold_percent: cfg.capacity.threshold_percent,
            rapid_enabled: cfg.rapid_placement.enabled,
            rapid_threshold: cfg.rapid_placement.threshold,
            rapid_window_secs: cfg.rapid_placement.window_seconds,
        }
    }

    /// `current` as an integer percentage of `limit`; 0 when `limit` is 0.
    pub fn percent_of(current: u32, limit: u32) -> u32 {
        if limit == 0 {
            return 0;
        }
        let p = u64::from(current) * 100 / u64::from(limit);
        u32::try_from(p).unwrap_or(u32::MAX)
    }

    pub fn capacity(&self, region: &RegionKey, kind: ObjectKind, current: u32, limit: u32) -> Option<Alert> {
        if !self.capacity_enabled || limit == 0 {
            return None;
        }
        let percent = Self::percent_of(current, limit);
        (percent >= self.capacity_threshold_percent).then(|| Alert::CapacityWarning {
            region: region.clone(),
            kind,
            current,
            limit,
            percent,
        })
    }

    pub fn rate(&self, actor: &str, kind: ObjectKind, count_in_window: u32, window_secs: u32) -> Option<Alert> {
        if !self.rapid_enabled {
            return None;
        }
        (count_in_window >= self.rapid_threshold).then(|| Alert::RapidPlacement {
            actor: actor.to_string(),
            kind,
            count: count_in_window,
            window_secs,
        })
    }
}

/// Stateless threshold checks against the resolver's current alert settings.
#[derive(Clone)]
pub struct AlertEvaluator {
    policy: Arc<PolicyResolver>,
}

impl AlertEvaluator {
    pub fn new(policy: Arc<PolicyResolver>) -> Self {
        Self { policy }
    }

    pub fn settings(&self) -> AlertSettings {
        self.policy.alert_settings()
    }

    /// Fires when `current * 100 / limit` reaches the capacity threshold.
    pub fn evaluate_capacity(
        &self,
        region: &RegionKey,
        kind: ObjectKind,
        current: u32,
        limit: u32,
    ) -> Option<Alert> {
        self.settings().capacity(region, kind, current, limit)
    }

    /// Fires when the precomputed window count reaches the rapid-placement threshold.
    pub fn evaluate_rate(
        &self,
        actor: &str,
        kind: ObjectKind,
        count_in_window: u32,
        window_secs: u32,
    ) -> Option<Alert> {
        self.settings().rate(actor, kind, count_in_window, window_secs)
    }
}
