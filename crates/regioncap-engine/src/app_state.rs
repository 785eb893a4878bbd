//! Shared application state for the regioncap engine.
//!
//! Wires config, policy, store, admission, statistics, and alert fan-out
//! together and exposes the administrative operations. Authorization for
//! those operations is the host's concern.

use std::sync::Arc;
use std::time::Duration;

use regioncap_core::error::{QuotaError, Result};
use regioncap_core::ObjectKind;

use crate::admission::{AdmissionEngine, OccupancySource, TrackedOccupancy};
use crate::alert::AlertBus;
use crate::config::{AdminSection, ConfigSource, QuotaConfig, StorageSection};
use crate::obs::metrics::QuotaMetrics;
use crate::policy::{PolicyResolver, ResolvedLimit};
use crate::stats::StatsService;
use crate::store::SqliteStore;

const ALERT_BUS_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    admin: AdminSection,
    storage: StorageSection,
    policy: Arc<PolicyResolver>,
    store: Arc<SqliteStore>,
    engine: AdmissionEngine,
    stats: StatsService,
    bus: AlertBus,
    metrics: Arc<QuotaMetrics>,
}

impl AppState {
    /// Load config from `source`, open the configured store, and build the
    /// engine. Without a host occupancy source the store's own region index
    /// stands in for ground truth.
    pub fn open(
        source: Arc<dyn ConfigSource>,
        occupancy: Option<Arc<dyn OccupancySource>>,
    ) -> Result<Self> {
        let cfg = source.load()?;
        let store = Arc::new(SqliteStore::from_config(&cfg.storage)?);
        let occupancy = occupancy
            .unwrap_or_else(|| Arc::new(TrackedOccupancy::new(Arc::clone(&store))));
        Ok(Self::new(cfg, source, store, occupancy))
    }

    /// Build from already-opened parts.
    pub fn new(
        cfg: QuotaConfig,
        source: Arc<dyn ConfigSource>,
        store: Arc<SqliteStore>,
        occupancy: Arc<dyn OccupancySource>,
    ) -> Self {
        let policy = Arc::new(PolicyResolver::with_config(source, &cfg));
        let metrics = Arc::new(QuotaMetrics::default());
        let bus = AlertBus::new(ALERT_BUS_CAPACITY);

        let engine = AdmissionEngine::new(
            Arc::clone(&policy),
            occupancy,
            Arc::clone(&store),
            bus.clone(),
            Arc::clone(&metrics),
            Duration::from_millis(cfg.admin.region_lock_timeout_ms),
        );
        let stats = StatsService::new(Arc::clone(&policy), Arc::clone(&store), Arc::clone(&metrics));

        for kind in ObjectKind::ALL {
            let r = policy.resolve_default(kind);
            tracing::info!(%kind, limit = r.limit, enabled = r.enabled, "default policy");
        }

        Self {
            inner: Arc::new(AppStateInner {
                admin: cfg.admin,
                storage: cfg.storage,
                policy,
                store,
                engine,
                stats,
                bus,
                metrics,
            }),
        }
    }

    pub fn admin(&self) -> &AdminSection {
        &self.inner.admin
    }

    pub fn storage(&self) -> &StorageSection {
        &self.inner.storage
    }

    pub fn policy(&self) -> &Arc<PolicyResolver> {
        &self.inner.policy
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.inner.store
    }

    pub fn engine(&self) -> &AdmissionEngine {
        &self.inner.engine
    }

    pub fn stats(&self) -> &StatsService {
        &self.inner.stats
    }

    pub fn alerts(&self) -> &AlertBus {
        &self.inner.bus
    }

    pub fn metrics(&self) -> &QuotaMetrics {
        &self.inner.metrics
    }

    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        vec![(
            "regioncap_region_locks",
            self.inner.engine.locks().len() as u64,
        )]
    }

    /// Set a runtime limit override; `realm = None` applies to every realm.
    pub fn set_limit(&self, kind: &str, value: i64, realm: Option<&str>) -> Result<ResolvedLimit> {
        let kind: ObjectKind = kind.parse()?;
        let resolved = match realm {
            Some(realm) => {
                self.inner.policy.set_realm_limit(realm, kind, value)?;
                self.inner.policy.resolve(realm, kind)
            }
            None => {
                self.inner.policy.set_limit(kind, value)?;
                self.inner.policy.resolve_default(kind)
            }
        };
        self.inner
            .metrics
            .policy_changes
            .inc(&[("change", "set_limit"), ("kind", kind.as_str())]);
        Ok(resolved)
    }

    pub fn set_enabled(&self, kind: &str, enabled: bool) -> Result<ResolvedLimit> {
        let kind: ObjectKind = kind.parse()?;
        self.inner.policy.set_enabled(kind, enabled);
        self.inner
            .metrics
            .policy_changes
            .inc(&[("change", "set_enabled"), ("kind", kind.as_str())]);
        Ok(self.inner.policy.resolve_default(kind))
    }

    pub fn reload(&self) -> Result<()> {
        self.inner.policy.reload()?;
        self.inner
            .metrics
            .policy_changes
            .inc(&[("change", "reload"), ("kind", "*")]);
        Ok(())
    }

    /// Irreversibly clear the event log and every counter.
    pub fn reset(&self) -> Result<()> {
        self.inner.store.reset_all().map_err(|e| {
            self.inner.metrics.store_failures.inc(&[("op", "reset_all")]);
            QuotaError::from(e)
        })
    }

    /// One maintenance pass: store housekeeping plus idle lock pruning.
    pub fn maintain(&self) {
        if let Err(e) = self.inner.store.maintain() {
            self.inner.metrics.store_failures.inc(&[("op", "maintain")]);
            tracing::warn!(error = %e, "store maintenance failed");
        }
        let pruned = self.inner.engine.locks().prune();
        tracing::debug!(pruned, "maintenance pass complete");
    }

    /// Spawn the periodic maintenance task if an interval is configured.
    pub fn spawn_maintenance(&self) -> Option<tokio::task::JoinHandle<()>> {
        let secs = self.inner.storage.maintenance_interval_secs;
        if secs == 0 {
            return None;
        }
        let state = self.clone();
        Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(secs));
            tick.tick().await; // first tick fires immediately
            loop {
                tick.tick().await;
                let s = state.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || s.maintain()).await {
                    tracing::warn!(error = %e, "maintenance task panicked");
                }
            }
        }))
    }
}
