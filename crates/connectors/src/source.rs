//! Connection sourcing: turns an (identity, environment) pair into a
//! bounded supply of [`Client`]s, behind any boxed client factory — the
//! domain has an open set of remote backends rather than a fixed dialect
//! list, so dispatch is by trait object, not by an adapter enum.

use crate::client::Client;
use crate::error::{PoolError, SourceError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Default `maxConcurrent` per source when the caller does not override it
/// (spec §4.2).
pub const DEFAULT_MAX_CONCURRENT: usize = 52;

/// Produces authenticated [`Client`]s for one (identity, environment) pair.
/// Implementations own the actual transport (HTTP session, DB connection,
/// etc.); this crate only prescribes the lifecycle.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Client>, SourceError>;

    /// Stable label used for throttle-tracker bucketing and logs.
    fn endpoint(&self) -> &str;
}

/// One bounded pool of clients drawn from a single [`ClientFactory`].
/// `maxConcurrent` permits gate concurrent leases; a held permit is
/// returned to the semaphore on drop regardless of how the lease ends.
pub struct ConnectionSource {
    factory: Arc<dyn ClientFactory>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ConnectionSource {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self::with_max_concurrent(factory, DEFAULT_MAX_CONCURRENT)
    }

    pub fn with_max_concurrent(factory: Arc<dyn ClientFactory>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            factory,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.factory.endpoint()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of leases currently checked out.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    /// Blocks until a permit is free, then connects. The permit is held for
    /// the lifetime of the returned [`Lease`]; dropping the lease (normal
    /// return via `release`, or simply dropping it) frees the slot.
    pub async fn acquire(&self) -> Result<Lease, PoolError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Cancelled)?;
        match self.factory.connect().await {
            Ok(client) => Ok(Lease {
                client: Some(client),
                _permit: permit,
            }),
            Err(SourceError::AuthFailed(msg)) => Err(PoolError::Unauthorized(msg)),
            Err(SourceError::Cancelled) => Err(PoolError::Cancelled),
            Err(SourceError::Transport(msg)) => {
                warn!(endpoint = self.endpoint(), error = %msg, "connect failed, treating as no source");
                Err(PoolError::NoSource)
            }
        }
    }
}

/// A leased client plus the semaphore permit backing it. Invalidating the
/// lease (poisoned client) simply lets it drop without being reused —
/// there is no free-list, the semaphore is the only shared state. Owns
/// its permit (rather than borrowing the source) so it can be held across
/// `.await` points and moved between tasks, which the executor's worker
/// pool relies on.
pub struct Lease {
    client: Option<Box<dyn Client>>,
    _permit: OwnedSemaphorePermit,
}

impl Lease {
    pub fn client(&self) -> &dyn Client {
        self.client.as_deref().expect("lease client taken twice")
    }

    /// Marks the lease as not returnable even if `Client::is_poisoned` is
    /// false, e.g. after a transport error observed by the caller.
    pub fn invalidate(&mut self) {
        debug!("lease invalidated by caller");
        self.client = None;
    }
}
