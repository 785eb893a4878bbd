#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use regioncap_engine::admission::{AdmissionEngine, OccupancySource};
use regioncap_engine::alert::AlertBus;
use regioncap_engine::config::StaticSource;
use regioncap_engine::obs::metrics::QuotaMetrics;
use regioncap_engine::policy::PolicyResolver;
use regioncap_engine::store::SqliteStore;

pub const LOCK_TIMEOUT: Duration = Duration::from_millis(500);

pub fn policy(yaml: &str) -> Arc<PolicyResolver> {
    Arc::new(PolicyResolver::new(Arc::new(StaticSource::new(yaml))).expect("policy"))
}

pub fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::in_memory().expect("in-memory store"))
}

pub struct Harness {
    pub engine: AdmissionEngine,
    pub bus: AlertBus,
    pub metrics: Arc<QuotaMetrics>,
}

pub fn harness(
    yaml: &str,
    occupancy: Arc<dyn OccupancySource>,
    store: Arc<SqliteStore>,
) -> Harness {
    let bus = AlertBus::new(64);
    let metrics = Arc::new(QuotaMetrics::default());
    let engine = AdmissionEngine::new(
        policy(yaml),
        occupancy,
        store,
        bus.clone(),
        Arc::clone(&metrics),
        LOCK_TIMEOUT,
    );
    Harness {
        engine,
        bus,
        metrics,
    }
}
