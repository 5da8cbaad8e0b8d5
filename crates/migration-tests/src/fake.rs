//! A scripted [`Client`]/[`ClientFactory`] pair for exercising the
//! executor's retry, batch-splitting and continue-on-error paths
//! end-to-end, in the spirit of `executor`'s own `FlakyClient` test double
//! but shared across every scenario in this crate.

use async_trait::async_trait;
use connectors::{
    BatchOutcome, Client, ClientFactory, ExecuteOutcome, RemoteError, RemoteErrorKind, RowResult,
    SourceError,
};
use model::{Batch, ErrorCode, Operation};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// What the fake does on the Nth `execute_batched` call it receives
/// (0-indexed, shared across every client a [`ScriptedFactory`] connects —
/// reconnects do not reset the call counter).
#[derive(Clone)]
pub enum Script {
    /// Every row in the batch succeeds as `Created`.
    Accept,
    /// The whole batch fails with the given kind; no row is evaluated.
    FailBatch(RemoteErrorKind),
    /// The first row fails with `error_code`; the rest succeed.
    FailFirstRow(ErrorCode),
}

pub struct ScriptedClient {
    calls: Arc<AtomicUsize>,
    scripts: Arc<Vec<Script>>,
}

#[async_trait]
impl Client for ScriptedClient {
    async fn execute(&self, _operation: &Operation) -> Result<ExecuteOutcome, RemoteError> {
        Ok(ExecuteOutcome::Created(Uuid::new_v4()))
    }

    async fn execute_batched(&self, batch: &Batch) -> Result<BatchOutcome, RemoteError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.get(call).or_else(|| self.scripts.last());

        match script {
            None | Some(Script::Accept) => Ok(BatchOutcome {
                rows: batch
                    .items
                    .iter()
                    .map(|item| RowResult {
                        row_ref: item.row_ref.clone(),
                        outcome: Ok(ExecuteOutcome::Created(Uuid::new_v4())),
                    })
                    .collect(),
            }),
            Some(Script::FailBatch(kind)) => {
                Err(RemoteError::new(kind.clone(), "scripted batch failure"))
            }
            Some(Script::FailFirstRow(error_code)) => Ok(BatchOutcome {
                rows: batch
                    .items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| RowResult {
                        row_ref: item.row_ref.clone(),
                        outcome: if i == 0 {
                            Err(RemoteError::new(
                                RemoteErrorKind::PermanentPerRecord {
                                    error_code: *error_code,
                                    field: None,
                                },
                                "scripted row failure",
                            ))
                        } else {
                            Ok(ExecuteOutcome::Created(Uuid::new_v4()))
                        },
                    })
                    .collect(),
            }),
        }
    }

    fn is_poisoned(&self) -> bool {
        false
    }
}

pub struct ScriptedFactory {
    calls: Arc<AtomicUsize>,
    scripts: Arc<Vec<Script>>,
}

impl ScriptedFactory {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            scripts: Arc::new(scripts),
        }
    }
}

#[async_trait]
impl ClientFactory for ScriptedFactory {
    async fn connect(&self) -> Result<Box<dyn Client>, SourceError> {
        Ok(Box::new(ScriptedClient {
            calls: self.calls.clone(),
            scripts: self.scripts.clone(),
        }))
    }

    fn endpoint(&self) -> &str {
        "scripted"
    }
}
