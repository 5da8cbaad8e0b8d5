//! Multiplexes several [`connectors::ConnectionSource`]s behind one handle,
//! applying throttle-aware admission and round-robin fairness over the
//! per-source lease lifecycle `connectors::source` exposes (spec §4.2
//! "pool").

use connectors::{ClientFactory, ConnectionSource, Lease, PoolError};
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use throttle::{ThrottlePolicy, ThrottleTracker};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Per-pool policy knobs (spec §4.2, §4.3).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// When true (the default), the pool ignores any affinity cookie the
    /// remote returns and freely round-robins every request across
    /// sources. Bulk migration has no session state worth pinning to one
    /// backend instance, so the default favors even load distribution.
    pub disable_affinity_cookie: bool,
    pub max_concurrent_per_source: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            disable_affinity_cookie: true,
            max_concurrent_per_source: connectors::DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// One source plus the throttle endpoint key it reports under.
struct Slot {
    source: ConnectionSource,
    endpoint: String,
}

/// A held client plus enough bookkeeping for the caller to report the
/// outcome back into the pool's throttle tracker.
pub struct PooledLease {
    lease: Lease,
    endpoint: String,
    slot_index: usize,
}

impl PooledLease {
    pub fn client(&self) -> &dyn connectors::Client {
        self.lease.client()
    }

    pub fn slot_index(&self) -> usize {
        self.slot_index
    }

    pub fn invalidate(&mut self) {
        self.lease.invalidate();
    }
}

/// Fans requests out across N [`ConnectionSource`]s, deferring admission
/// when the shared [`ThrottleTracker`] says a source is backed off, and
/// otherwise picking sources round-robin for even load (spec §4.2, §4.3).
pub struct ConnectionPool {
    slots: Vec<Slot>,
    throttle: Arc<ThrottleTracker>,
    config: PoolConfig,
    next: AtomicUsize,
    /// Sticky routing table used only when `disable_affinity_cookie` is
    /// false: cookie -> slot index.
    affinity: Mutex<HashMap<String, usize>>,
}

impl ConnectionPool {
    pub fn new(factories: Vec<Arc<dyn ClientFactory>>, config: PoolConfig) -> Self {
        let slots = factories
            .into_iter()
            .map(|factory| {
                let endpoint = factory.endpoint().to_string();
                Slot {
                    source: ConnectionSource::with_max_concurrent(
                        factory,
                        config.max_concurrent_per_source,
                    ),
                    endpoint,
                }
            })
            .collect();
        Self {
            slots,
            throttle: Arc::new(ThrottleTracker::new()),
            config,
            next: AtomicUsize::new(0),
            affinity: Mutex::new(HashMap::new()),
        }
    }

    pub fn throttle(&self) -> Arc<ThrottleTracker> {
        self.throttle.clone()
    }

    /// Total concurrent slots across all sources, regardless of current
    /// throttle state.
    pub fn capacity(&self) -> usize {
        self.slots.iter().map(|s| s.source.max_concurrent()).sum()
    }

    pub fn in_flight(&self) -> usize {
        self.slots.iter().map(|s| s.source.in_flight()).sum()
    }

    /// Sum of each source's throttle-adjusted DOP, the number the executor
    /// should treat as "safe to have in flight right now" (spec §5).
    pub fn effective_dop(&self) -> usize {
        self.slots
            .iter()
            .map(|s| {
                self.throttle
                    .effective_dop(&s.endpoint, s.source.max_concurrent())
            })
            .sum()
    }

    fn pick_slot(&self, affinity_cookie: Option<&str>) -> usize {
        if !self.config.disable_affinity_cookie {
            if let Some(cookie) = affinity_cookie {
                let mut table = self.affinity.lock().expect("affinity table poisoned");
                if let Some(&slot) = table.get(cookie) {
                    return slot;
                }
                let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
                table.insert(cookie.to_string(), slot);
                return slot;
            }
        }
        self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len()
    }

    /// Acquires a client, honoring throttle backoff before admitting the
    /// caller. `affinity_cookie` is only consulted when the pool was
    /// configured with `disable_affinity_cookie = false`.
    pub async fn get_client(&self, affinity_cookie: Option<&str>) -> Result<PooledLease, PoolError> {
        if self.slots.is_empty() {
            return Err(PoolError::NoSource);
        }

        let slot_index = self.pick_slot(affinity_cookie);
        let slot = &self.slots[slot_index];

        loop {
            match self.throttle.current_policy(&slot.endpoint) {
                ThrottlePolicy::Admit => break,
                ThrottlePolicy::Defer(duration) => {
                    debug!(endpoint = %slot.endpoint, defer_ms = duration.as_millis() as u64, "pool deferring acquisition");
                    sleep(duration).await;
                }
            }
        }

        let lease = slot.source.acquire().await?;
        Ok(PooledLease {
            lease,
            endpoint: slot.endpoint.clone(),
            slot_index,
        })
    }

    /// Feeds a completed request's outcome back into the throttle tracker
    /// so subsequent `get_client` calls on this endpoint adapt (spec §4.3).
    pub fn record_outcome(
        &self,
        lease: &PooledLease,
        latency_ms: u64,
        throttled: bool,
        retry_after: Option<std::time::Duration>,
    ) {
        self.throttle
            .on_response(&lease.endpoint, latency_ms, throttled, retry_after);
    }

    /// Drops the connection at `slot_index` from future affinity routing
    /// and logs the event; the underlying source keeps serving new
    /// connect attempts (spec §4.2 "Invalidate").
    pub fn invalidate(&self, slot_index: usize) {
        warn!(slot_index, "pool invalidated connection source entry");
        let mut table = self.affinity.lock().expect("affinity table poisoned");
        table.retain(|_, &mut v| v != slot_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectors::{BatchOutcome, Client, ExecuteOutcome, RemoteError, SourceError};
    use model::{Batch, Operation};
    use std::sync::atomic::AtomicBool;

    struct FakeClient {
        poisoned: AtomicBool,
    }

    #[async_trait]
    impl Client for FakeClient {
        async fn execute(&self, _operation: &Operation) -> Result<ExecuteOutcome, RemoteError> {
            Ok(ExecuteOutcome::Created(uuid::Uuid::new_v4()))
        }

        async fn execute_batched(&self, _batch: &Batch) -> Result<BatchOutcome, RemoteError> {
            Ok(BatchOutcome { rows: Vec::new() })
        }

        fn is_poisoned(&self) -> bool {
            self.poisoned.load(Ordering::Relaxed)
        }
    }

    struct FakeFactory {
        endpoint: String,
    }

    #[async_trait]
    impl ClientFactory for FakeFactory {
        async fn connect(&self) -> Result<Box<dyn Client>, SourceError> {
            Ok(Box::new(FakeClient {
                poisoned: AtomicBool::new(false),
            }))
        }

        fn endpoint(&self) -> &str {
            &self.endpoint
        }
    }

    fn pool_with(n: usize) -> ConnectionPool {
        let factories: Vec<Arc<dyn ClientFactory>> = (0..n)
            .map(|i| {
                Arc::new(FakeFactory {
                    endpoint: format!("env-{i}"),
                }) as Arc<dyn ClientFactory>
            })
            .collect();
        ConnectionPool::new(
            factories,
            PoolConfig {
                disable_affinity_cookie: true,
                max_concurrent_per_source: 4,
            },
        )
    }

    #[tokio::test]
    async fn round_robins_across_sources() {
        let pool = pool_with(3);
        let mut seen = Vec::new();
        for _ in 0..3 {
            let lease = pool.get_client(None).await.unwrap();
            seen.push(lease.slot_index());
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn capacity_sums_across_sources() {
        let pool = pool_with(3);
        assert_eq!(pool.capacity(), 12);
    }

    #[tokio::test]
    async fn affinity_cookie_sticks_when_enabled() {
        let factories: Vec<Arc<dyn ClientFactory>> = (0..3)
            .map(|i| {
                Arc::new(FakeFactory {
                    endpoint: format!("env-{i}"),
                }) as Arc<dyn ClientFactory>
            })
            .collect();
        let pool = ConnectionPool::new(
            factories,
            PoolConfig {
                disable_affinity_cookie: false,
                max_concurrent_per_source: 4,
            },
        );
        let first = pool.get_client(Some("session-a")).await.unwrap().slot_index();
        drop(pool.get_client(Some("session-b")).await.unwrap());
        let again = pool.get_client(Some("session-a")).await.unwrap().slot_index();
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn no_sources_is_an_error() {
        let pool = ConnectionPool::new(Vec::new(), PoolConfig::default());
        assert!(matches!(pool.get_client(None).await, Err(PoolError::NoSource)));
    }
}
