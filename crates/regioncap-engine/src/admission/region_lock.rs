use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use regioncap_core::error::{QuotaError, Result};
use regioncap_core::RegionKey;

type LockMap = DashMap<RegionKey, Arc<Mutex<()>>>;

/// Held while a region's check-then-commit is in flight.
///
/// Releasing the last guard of a region with no waiters removes its entry,
/// so the map only holds regions that are busy right now.
pub struct RegionGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
    region: RegionKey,
}

impl Drop for RegionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // entry() clones under the shard lock, so a count of 1 means no
        // holder and no waiter
        self.locks
            .remove_if(&self.region, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Region-scoped mutual exclusion with a bounded wait.
pub struct RegionLocks {
    locks: Arc<LockMap>,
    timeout: Duration,
}

impl RegionLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    pub async fn acquire(&self, region: &RegionKey) -> Result<RegionGuard> {
        let lock = Arc::clone(
            self.locks
                .entry(region.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(RegionGuard {
                guard: Some(guard),
                locks: Arc::clone(&self.locks),
                region: region.clone(),
            }),
            Err(_) => {
                tracing::warn!(%region, timeout_ms = self.timeout.as_millis() as u64, "region lock wait timed out");
                // the timed-out waiter may have been the last reference
                self.locks
                    .remove_if(region, |_, lock| Arc::strong_count(lock) == 1);
                Err(QuotaError::RegionBusy(region.to_string()))
            }
        }
    }

    /// Number of regions with a lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Drop entries that nobody holds or waits on. Guards already clean up
    /// after themselves; this sweeps anything a cancelled waiter left behind.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.locks.len())
    }
}
