use std::sync::Arc;
use std::time::Duration;

use regioncap_core::error::{QuotaError, Result};
use regioncap_core::event::now_ms;
use regioncap_core::{Alert, Decision, ObjectKind, RegionKey};

use super::occupancy::OccupancySource;
use super::region_lock::{RegionGuard, RegionLocks};
use crate::alert::{AlertBus, AlertEvaluator};
use crate::obs::metrics::QuotaMetrics;
use crate::policy::PolicyResolver;
use crate::store::SqliteStore;

/// Quota admission over a host-supplied occupancy source.
///
/// Cheap to clone; clones share locks, store, and policy.
#[derive(Clone)]
pub struct AdmissionEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    policy: Arc<PolicyResolver>,
    occupancy: Arc<dyn OccupancySource>,
    store: Arc<SqliteStore>,
    alerts: AlertEvaluator,
    bus: AlertBus,
    metrics: Arc<QuotaMetrics>,
    locks: RegionLocks,
}

/// Result of a serialized admission attempt.
pub enum Ticket {
    /// Kind is not enforced. Nothing is locked, counted, or recorded.
    Exempt,
    /// Room for one more. The region stays locked until the permit is
    /// committed or dropped.
    Admit(Permit),
    Deny { limit: u32 },
}

impl Ticket {
    pub fn decision(&self) -> Decision {
        match self {
            Ticket::Exempt => Decision::Exempt,
            Ticket::Admit(p) => Decision::Admit {
                occupancy: p.occupancy,
                limit: p.limit,
            },
            Ticket::Deny { limit } => Decision::Deny { limit: *limit },
        }
    }

    pub fn is_admit(&self) -> bool {
        !matches!(self, Ticket::Deny { .. })
    }
}

/// Exclusive right to place one object in a region.
///
/// The host places the object, then calls [`Permit::commit`]. Dropping the
/// permit instead (the host vetoed for its own reasons) releases the region
/// without recording anything.
pub struct Permit {
    engine: Arc<EngineInner>,
    region: RegionKey,
    kind: ObjectKind,
    actor: String,
    occupancy: u32,
    limit: u32,
    guard: RegionGuard,
}

/// What a committed permit left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Region occupancy after placement, for "placed N/limit" feedback.
    pub occupancy: u32,
    pub limit: u32,
    /// `None` when the store could not record the event.
    pub event_id: Option<u64>,
    pub alerts: Vec<Alert>,
}

impl Permit {
    pub fn region(&self) -> &RegionKey {
        &self.region
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn occupancy(&self) -> u32 {
        self.occupancy
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Record the admission, release the region, and raise any alerts.
    ///
    /// Storage faults are logged and reported through `event_id: None`; the
    /// admission itself stands.
    pub async fn commit(self) -> Placement {
        let Permit {
            engine,
            region,
            kind,
            actor,
            occupancy,
            limit,
            guard,
        } = self;

        let event_id = {
            let inner = Arc::clone(&engine);
            let at = region.clone();
            let who = actor.clone();
            tokio::task::spawn_blocking(move || inner.store.record_admission(&who, kind, &at)).await
        };
        let event_id = match event_id {
            Ok(Ok(seq)) => Some(seq),
            Ok(Err(e)) => {
                engine
                    .metrics
                    .store_failures
                    .inc(&[("op", "record_admission")]);
                tracing::warn!(%region, %kind, %actor, error = %e, "admission not recorded");
                None
            }
            Err(e) => {
                tracing::warn!(%region, %kind, %actor, error = %e, "admission write task failed");
                None
            }
        };
        drop(guard);

        tracing::debug!(%region, %kind, %actor, occupancy, limit, "placement committed");

        let mut alerts = Vec::new();
        if let Some(alert) = engine
            .alerts
            .evaluate_capacity(&region, kind, occupancy, limit)
        {
            alerts.push(alert);
        }
        let rate = {
            let inner = Arc::clone(&engine);
            let who = actor.clone();
            tokio::task::spawn_blocking(move || inner.rate_alert(&who, kind)).await
        };
        if let Ok(Some(alert)) = rate {
            alerts.push(alert);
        }
        for alert in &alerts {
            engine.bus.publish(alert.clone(), &engine.metrics);
        }

        Placement {
            occupancy,
            limit,
            event_id,
            alerts,
        }
    }
}

impl EngineInner {
    fn check(&self, region: &RegionKey, kind: ObjectKind, current: Option<u32>) -> Decision {
        let policy = self.policy.resolve(&region.realm, kind);
        if !policy.enabled {
            return Decision::Exempt;
        }
        let current = current.unwrap_or_else(|| self.occupancy.occupancy_of(region, kind));
        Decision::evaluate(current, policy.limit)
    }

    fn rate_alert(&self, actor: &str, kind: ObjectKind) -> Option<Alert> {
        let settings = self.alerts.settings();
        if !settings.rapid_enabled {
            return None;
        }
        let window_ms = u64::from(settings.rapid_window_secs) * 1000;
        let since = now_ms().saturating_sub(window_ms);
        match self.store.count_actor_admissions_since(actor, kind, since) {
            Ok(count) => self
                .alerts
                .evaluate_rate(actor, kind, count, settings.rapid_window_secs),
            Err(e) => {
                tracing::debug!(%actor, %kind, error = %e, "rate window unavailable; skipping rate check");
                None
            }
        }
    }
}

impl AdmissionEngine {
    pub fn new(
        policy: Arc<PolicyResolver>,
        occupancy: Arc<dyn OccupancySource>,
        store: Arc<SqliteStore>,
        bus: AlertBus,
        metrics: Arc<QuotaMetrics>,
        lock_timeout: Duration,
    ) -> Self {
        let alerts = AlertEvaluator::new(Arc::clone(&policy));
        Self {
            inner: Arc::new(EngineInner {
                policy,
                occupancy,
                store,
                alerts,
                bus,
                metrics,
                locks: RegionLocks::new(lock_timeout),
            }),
        }
    }

    pub fn policy(&self) -> &Arc<PolicyResolver> {
        &self.inner.policy
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.inner.store
    }

    pub fn alerts(&self) -> &AlertEvaluator {
        &self.inner.alerts
    }

    pub fn locks(&self) -> &RegionLocks {
        &self.inner.locks
    }

    /// Speculative check against current occupancy. Takes no lock and
    /// changes nothing, so it is safe for "would this be allowed" queries.
    ///
    /// Calls the occupancy source on the current thread; with a store-backed
    /// source that is a blocking read.
    pub fn try_admit(&self, region: &RegionKey, kind: ObjectKind, actor: &str) -> Decision {
        let decision = self.inner.check(region, kind, None);
        tracing::trace!(%region, %kind, %actor, decision = decision.as_str(), "dry-run admission");
        decision
    }

    /// Same rule against a caller-reported pre-placement count.
    pub fn check_reported(&self, region: &RegionKey, kind: ObjectKind, current: u32) -> Decision {
        self.inner.check(region, kind, Some(current))
    }

    /// Serialized admission. On `Ticket::Admit` the region stays locked until
    /// the permit is committed or dropped.
    ///
    /// Fails with `RegionBusy` when the region lock cannot be taken within
    /// the configured bound. The occupancy query runs on the blocking pool.
    pub async fn admit(&self, region: &RegionKey, kind: ObjectKind, actor: &str) -> Result<Ticket> {
        let policy = self.inner.policy.resolve(&region.realm, kind);
        if !policy.enabled {
            self.record_decision(kind, &Decision::Exempt);
            return Ok(Ticket::Exempt);
        }

        let guard = self.inner.locks.acquire(region).await?;
        let decision = {
            let inner = Arc::clone(&self.inner);
            let at = region.clone();
            tokio::task::spawn_blocking(move || inner.check(&at, kind, None))
                .await
                .map_err(|e| QuotaError::Internal(format!("occupancy query failed: {e}")))?
        };
        self.record_decision(kind, &decision);

        match decision {
            Decision::Exempt => Ok(Ticket::Exempt),
            Decision::Deny { limit } => {
                tracing::debug!(%region, %kind, %actor, limit, "placement denied");
                Ok(Ticket::Deny { limit })
            }
            Decision::Admit { occupancy, limit } => Ok(Ticket::Admit(Permit {
                engine: Arc::clone(&self.inner),
                region: region.clone(),
                kind,
                actor: actor.to_string(),
                occupancy,
                limit,
                guard,
            })),
        }
    }

    /// Record a removal. Storage faults are logged and yield `None`.
    pub async fn record_removal(&self, region: &RegionKey, kind: ObjectKind, actor: &str) -> Option<u64> {
        let res = {
            let inner = Arc::clone(&self.inner);
            let at = region.clone();
            let who = actor.to_string();
            tokio::task::spawn_blocking(move || inner.store.record_removal(&who, kind, &at)).await
        };
        match res {
            Ok(Ok(seq)) => {
                tracing::debug!(%region, %kind, %actor, seq, "removal recorded");
                Some(seq)
            }
            Ok(Err(e)) => {
                self.inner
                    .metrics
                    .store_failures
                    .inc(&[("op", "record_removal")]);
                tracing::warn!(%region, %kind, %actor, error = %e, "removal not recorded");
                None
            }
            Err(e) => {
                tracing::warn!(%region, %kind, %actor, error = %e, "removal write task failed");
                None
            }
        }
    }

    fn record_decision(&self, kind: ObjectKind, decision: &Decision) {
        self.inner
            .metrics
            .admission_decisions
            .inc(&[("kind", kind.as_str()), ("decision", decision.as_str())]);
    }
}
