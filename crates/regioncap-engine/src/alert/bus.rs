use tokio::sync::broadcast;

use regioncap_core::Alert;

use crate::obs::metrics::QuotaMetrics;

/// Broadcast fan-out for alerts. Publishing never blocks; slow subscribers
/// lag and lose the oldest alerts.
#[derive(Clone)]
pub struct AlertBus {
    tx: broadcast::Sender<Alert>,
}

impl AlertBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }

    pub fn publish(&self, alert: Alert, metrics: &QuotaMetrics) {
        metrics
            .alerts
            .inc(&[("alert", alert.label()), ("kind", alert.kind().as_str())]);
        tracing::warn!(alert = alert.label(), message = %alert.message(), "quota alert");

        if self.tx.send(alert).is_err() {
            tracing::debug!("no alert subscribers");
        }
    }
}
