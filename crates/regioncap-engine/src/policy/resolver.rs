use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde::Serialize;

use regioncap_core::error::{QuotaError, Result};
use regioncap_core::{KindTable, ObjectKind};

use crate::alert::AlertSettings;
use crate::config::{ConfigSource, QuotaConfig};

/// Built-in limit used when no configuration can be read at all.
const BUILTIN_LIMIT: u32 = 32;

/// Which layer produced a resolved limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSource {
    RealmOverride,
    KindOverride,
    Realm,
    Default,
}

/// Effective policy for one (realm, kind) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedLimit {
    pub limit: u32,
    pub enabled: bool,
    pub source: LimitSource,
}

/// Resolved limits of every kind for a realm.
#[derive(Debug, Clone, Serialize)]
pub struct RealmLimitsView {
    pub realm: String,
    pub custom: bool,
    pub limits: Vec<(ObjectKind, ResolvedLimit)>,
}

/// Compiled, immutable view of the configured layers.
#[derive(Debug)]
struct PolicySnapshot {
    defaults: KindTable<u32>,
    enabled: KindTable<bool>,
    realms: HashMap<String, KindTable<Option<u32>>>,
    alerts: AlertSettings,
}

impl PolicySnapshot {
    fn compile(cfg: &QuotaConfig) -> Self {
        let defaults = KindTable::from_fn(|k| {
            u32::try_from(cfg.limits.get(k)).unwrap_or(BUILTIN_LIMIT)
        });
        let enabled = KindTable::from_fn(|k| cfg.enabled.get(k));
        let realms = cfg
            .realms
            .iter()
            .map(|(name, r)| (name.clone(), KindTable::from_fn(|k| r.get(k))))
            .collect();

        Self {
            defaults,
            enabled,
            realms,
            alerts: AlertSettings::from_config(&cfg.alerts),
        }
    }

    fn builtin() -> Self {
        Self {
            defaults: KindTable::filled(BUILTIN_LIMIT),
            enabled: KindTable::filled(true),
            realms: HashMap::new(),
            alerts: AlertSettings::default(),
        }
    }
}

type OverrideKey = (Option<String>, ObjectKind);

/// Layered limit resolution: runtime override, realm config, global default.
///
/// Overrides live only in memory. `reload` re-reads the config source and
/// drops every override.
pub struct PolicyResolver {
    source: Arc<dyn ConfigSource>,
    snapshot: RwLock<Arc<PolicySnapshot>>,
    limit_overrides: DashMap<OverrideKey, u32>,
    enabled_overrides: DashMap<ObjectKind, bool>,
}

impl PolicyResolver {
    /// Load the initial policy from `source`. Startup fails on a bad config.
    pub fn new(source: Arc<dyn ConfigSource>) -> Result<Self> {
        let cfg = source.load()?;
        Ok(Self::with_config(source, &cfg))
    }

    /// Build from an already-loaded config; later reloads go to `source`.
    pub fn with_config(source: Arc<dyn ConfigSource>, cfg: &QuotaConfig) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(PolicySnapshot::compile(cfg))),
            limit_overrides: DashMap::new(),
            enabled_overrides: DashMap::new(),
        }
    }

    fn snapshot(&self) -> Arc<PolicySnapshot> {
        match self.snapshot.read() {
            Ok(g) => Arc::clone(&*g),
            Err(_) => {
                // Poisoned lock: serve built-in defaults rather than fail admission.
                let err = QuotaError::PolicyUnavailable("policy lock poisoned".into());
                tracing::warn!(error = %err, "falling back to built-in defaults");
                Arc::new(PolicySnapshot::builtin())
            }
        }
    }

    pub fn resolve(&self, realm: &str, kind: ObjectKind) -> ResolvedLimit {
        self.resolve_in(Some(realm), kind)
    }

    /// Realm-independent view: kind override, then global default.
    pub fn resolve_default(&self, kind: ObjectKind) -> ResolvedLimit {
        self.resolve_in(None, kind)
    }

    fn resolve_in(&self, realm: Option<&str>, kind: ObjectKind) -> ResolvedLimit {
        let snap = self.snapshot();
        let enabled = self
            .enabled_overrides
            .get(&kind)
            .map(|e| *e.value())
            .unwrap_or(*snap.enabled.get(kind));

        let realm_override = realm.and_then(|r| {
            self.limit_overrides
                .get(&(Some(r.to_string()), kind))
                .map(|v| *v.value())
        });
        let kind_override = self.limit_overrides.get(&(None, kind)).map(|v| *v.value());
        let realm_config = realm.and_then(|r| snap.realms.get(r).and_then(|t| *t.get(kind)));

        let (limit, source) = if let Some(v) = realm_override {
            (v, LimitSource::RealmOverride)
        } else if let Some(v) = kind_override {
            (v, LimitSource::KindOverride)
        } else if let Some(v) = realm_config {
            (v, LimitSource::Realm)
        } else {
            (*snap.defaults.get(kind), LimitSource::Default)
        };

        ResolvedLimit {
            limit,
            // a zero limit can only come from a broken layer; treat as unenforced
            enabled: enabled && limit >= 1,
            source,
        }
    }

    /// String-keyed variant for administrative callers.
    pub fn resolve_named(&self, realm: &str, kind: &str) -> Result<ResolvedLimit> {
        let kind: ObjectKind = kind.parse()?;
        Ok(self.resolve(realm, kind))
    }

    /// Process-wide override for `kind`, visible immediately to every realm
    /// without a realm-scoped override.
    pub fn set_limit(&self, kind: ObjectKind, value: i64) -> Result<()> {
        let value = validate_limit(value)?;
        self.limit_overrides.insert((None, kind), value);
        tracing::info!(%kind, limit = value, "runtime limit override set");
        Ok(())
    }

    pub fn set_realm_limit(&self, realm: &str, kind: ObjectKind, value: i64) -> Result<()> {
        let value = validate_limit(value)?;
        self.limit_overrides
            .insert((Some(realm.to_string()), kind), value);
        tracing::info!(%realm, %kind, limit = value, "runtime realm limit override set");
        Ok(())
    }

    pub fn set_enabled(&self, kind: ObjectKind, enabled: bool) {
        self.enabled_overrides.insert(kind, enabled);
        tracing::info!(%kind, enabled, "runtime enforcement override set");
    }

    /// Re-read the config source and discard all runtime overrides.
    ///
    /// On failure the current policy and overrides stay in place and the error
    /// is returned to the administrative caller.
    pub fn reload(&self) -> Result<()> {
        let cfg = self.source.load().map_err(|e| {
            tracing::warn!(source = %self.source.describe(), error = %e, "policy reload failed; keeping current policy");
            match e {
                QuotaError::PolicyUnavailable(_) => e,
                other => QuotaError::PolicyUnavailable(other.to_string()),
            }
        })?;

        let fresh = Arc::new(PolicySnapshot::compile(&cfg));
        match self.snapshot.write() {
            Ok(mut g) => *g = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        self.limit_overrides.clear();
        self.enabled_overrides.clear();

        tracing::info!(source = %self.source.describe(), "policy reloaded; runtime overrides discarded");
        Ok(())
    }

    pub fn realm_limits(&self, realm: &str) -> RealmLimitsView {
        let custom = self.snapshot().realms.contains_key(realm);
        RealmLimitsView {
            realm: realm.to_string(),
            custom,
            limits: ObjectKind::ALL
                .into_iter()
                .map(|k| (k, self.resolve(realm, k)))
                .collect(),
        }
    }

    pub fn alert_settings(&self) -> AlertSettings {
        self.snapshot().alerts
    }
}

fn validate_limit(value: i64) -> Result<u32> {
    if value < 1 {
        return Err(QuotaError::InvalidLimit(value));
    }
    u32::try_from(value).map_err(|_| QuotaError::InvalidLimit(value))
}
