use std::collections::BTreeMap;

use serde::Deserialize;
use regioncap_core::error::{QuotaError, Result};
use regioncap_core::ObjectKind;

/// Sentinel a realm section uses for "fall through to the global default".
pub const USE_DEFAULT: i64 = -1;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    pub version: u32,

    /// Global default limits (lowest-precedence layer).
    #[serde(default)]
    pub limits: KindLimits,

    /// Per-kind enforcement switch.
    #[serde(default)]
    pub enabled: KindSwitches,

    /// Per-realm configured limits.
    #[serde(default)]
    pub realms: BTreeMap<String, RealmLimits>,

    #[serde(default)]
    pub alerts: AlertSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub admin: AdminSection,
}

impl QuotaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(QuotaError::BadConfig(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.limits.validate()?;
        for (realm, limits) in &self.realms {
            if realm.trim().is_empty() {
                return Err(QuotaError::BadConfig("realm name must not be empty".into()));
            }
            limits.validate(realm)?;
        }
        self.alerts.validate()?;
        self.storage.validate()?;
        self.admin.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindLimits {
    #[serde(default = "default_limit")]
    pub hopper: i64,
    #[serde(default = "default_limit")]
    pub chest: i64,
    #[serde(default = "default_limit")]
    pub barrel: i64,
}

impl Default for KindLimits {
    fn default() -> Self {
        Self {
            hopper: default_limit(),
            chest: default_limit(),
            barrel: default_limit(),
        }
    }
}

impl KindLimits {
    pub fn get(&self, kind: ObjectKind) -> i64 {
        match kind {
            ObjectKind::Hopper => self.hopper,
            ObjectKind::Chest => self.chest,
            ObjectKind::Barrel => self.barrel,
        }
    }

    fn validate(&self) -> Result<()> {
        for kind in ObjectKind::ALL {
            let v = self.get(kind);
            if v < 1 || v > i64::from(u32::MAX) {
                return Err(QuotaError::BadConfig(format!(
                    "limits.{kind} must be >= 1 (got {v})"
                )));
            }
        }
        Ok(())
    }
}

fn default_limit() -> i64 {
    32
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindSwitches {
    #[serde(default = "default_true")]
    pub hopper: bool,
    #[serde(default = "default_true")]
    pub chest: bool,
    #[serde(default = "default_true")]
    pub barrel: bool,
}

impl Default for KindSwitches {
    fn default() -> Self {
        Self {
            hopper: true,
            chest: true,
            barrel: true,
        }
    }
}

impl KindSwitches {
    pub fn get(&self, kind: ObjectKind) -> bool {
        match kind {
            ObjectKind::Hopper => self.hopper,
            ObjectKind::Chest => self.chest,
            ObjectKind::Barrel => self.barrel,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Realm overrides. Absent or `-1` means "use the global default".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealmLimits {
    #[serde(default)]
    pub hopper: Option<i64>,
    #[serde(default)]
    pub chest: Option<i64>,
    #[serde(default)]
    pub barrel: Option<i64>,
}

impl RealmLimits {
    /// Configured value with the sentinel folded into `None`.
    pub fn get(&self, kind: ObjectKind) -> Option<u32> {
        let raw = match kind {
            ObjectKind::Hopper => self.hopper,
            ObjectKind::Chest => self.chest,
            ObjectKind::Barrel => self.barrel,
        };
        raw.filter(|v| *v != USE_DEFAULT)
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v >= 1)
    }

    fn validate(&self, realm: &str) -> Result<()> {
        for kind in ObjectKind::ALL {
            let raw = match kind {
                ObjectKind::Hopper => self.hopper,
                ObjectKind::Chest => self.chest,
                ObjectKind::Barrel => self.barrel,
            };
            if let Some(v) = raw {
                if v != USE_DEFAULT && (v < 1 || v > i64::from(u32::MAX)) {
                    return Err(QuotaError::BadConfig(format!(
                        "realms.{realm}.{kind} must be >= 1 or {USE_DEFAULT} (got {v})"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertSection {
    #[serde(default)]
    pub capacity: CapacityAlertSection,
    #[serde(default)]
    pub rapid_placement: RapidPlacementSection,
}

impl AlertSection {
    fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.capacity.threshold_percent) {
            return Err(QuotaError::BadConfig(
                "alerts.capacity.threshold_percent must be between 1 and 100".into(),
            ));
        }
        if self.rapid_placement.threshold < 1 {
            return Err(QuotaError::BadConfig(
                "alerts.rapid_placement.threshold must be >= 1".into(),
            ));
        }
        if !(1..=3600).contains(&self.rapid_placement.window_seconds) {
            return Err(QuotaError::BadConfig(
                "alerts.rapid_placement.window_seconds must be between 1 and 3600".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapacityAlertSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_threshold_percent")]
    pub threshold_percent: u32,
}

impl Default for CapacityAlertSection {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_percent: default_threshold_percent(),
        }
    }
}

fn default_threshold_percent() -> u32 {
    80
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RapidPlacementSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rapid_threshold")]
    pub threshold: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u32,
}

impl Default for RapidPlacementSection {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_rapid_threshold(),
            window_seconds: default_window_seconds(),
        }
    }
}

fn default_rapid_threshold() -> u32 {
    20
}
fn default_window_seconds() -> u32 {
    60
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// 0 disables the periodic maintenance pass.
    #[serde(default)]
    pub maintenance_interval_secs: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            maintenance_interval_secs: 0,
        }
    }
}

impl StorageSection {
    fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(QuotaError::BadConfig("storage.path must not be empty".into()));
        }
        if !(1..=60000).contains(&self.busy_timeout_ms) {
            return Err(QuotaError::BadConfig(
                "storage.busy_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        Ok(())
    }
}

fn default_db_path() -> String {
    "regioncap.db".into()
}
fn default_busy_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_region_lock_timeout_ms")]
    pub region_lock_timeout_ms: u64,

    /// Shared secret expected in `x-admin-token`; `None` leaves the surface open.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for AdminSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            region_lock_timeout_ms: default_region_lock_timeout_ms(),
            token: None,
        }
    }
}

impl AdminSection {
    fn validate(&self) -> Result<()> {
        if !(1..=60000).contains(&self.region_lock_timeout_ms) {
            return Err(QuotaError::BadConfig(
                "admin.region_lock_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        if matches!(&self.token, Some(t) if t.is_empty()) {
            return Err(QuotaError::BadConfig("admin.token must not be empty".into()));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "127.0.0.1:8787".into()
}
fn default_region_lock_timeout_ms() -> u64 {
    2000
}
