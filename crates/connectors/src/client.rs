use crate::error::RemoteError;
use async_trait::async_trait;
use model::{Batch, Operation, RowRef};
use uuid::Uuid;

/// Result of one successfully-applied operation.
#[derive(Debug, Clone)]
pub enum ExecuteOutcome {
    Created(Uuid),
    Updated,
    Upserted(Uuid),
    Deleted,
    Associated,
    Disassociated,
}

/// Per-row result inside a batch response: the remote may accept the
/// envelope but reject individual rows (spec §4.4 step 4).
#[derive(Debug, Clone)]
pub struct RowResult {
    pub row_ref: RowRef,
    pub outcome: Result<ExecuteOutcome, RemoteError>,
}

/// Outcome of one `ExecuteBatched` call. A batch-level `Err` means the
/// whole request failed before any row was evaluated (throttled,
/// transient, or fatal); `Ok` always carries one `RowResult` per
/// submitted row, in any order (spec §5: operations may be reordered).
#[derive(Debug)]
pub struct BatchOutcome {
    pub rows: Vec<RowResult>,
}

/// The request-issuing surface a [`crate::source::ConnectionSource`]
/// hands out. One instance represents one authenticated session against
/// one (identity, environment) pair; callers must not assume identity is
/// stable across acquisitions (spec §4.2 "Determinism").
#[async_trait]
pub trait Client: Send + Sync {
    async fn execute(&self, operation: &Operation) -> Result<ExecuteOutcome, RemoteError>;

    async fn execute_batched(&self, batch: &Batch) -> Result<BatchOutcome, RemoteError>;

    /// True once the client has seen an auth/permanent failure and must be
    /// discarded rather than returned to the free-list.
    fn is_poisoned(&self) -> bool;

    /// Affinity cookie bound to this client by the remote, if any (§4.3).
    fn affinity_cookie(&self) -> Option<String> {
        None
    }
}
