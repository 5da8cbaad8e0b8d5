//! A file-backed [`Client`]/[`ClientFactory`] that appends every applied
//! operation to an ndjson sink and returns synthetic success outcomes.
//!
//! The workspace ships no live Dataverse-style wire client — credential
//! acquisition mechanics are explicitly out of scope — so this is the
//! CLI's one concrete, runnable target: useful for demos, CI, and
//! dry-run-style verification of a migration's shape. Production
//! deployments plug in their own `connectors::ClientFactory` in place of
//! this one; nothing else in `engine`/`executor`/`pool` depends on it.

use async_trait::async_trait;
use connectors::{
    BatchOutcome, Client, ClientFactory, ExecuteOutcome, RemoteError, RemoteErrorKind, RowResult,
    SourceError,
};
use model::{Batch, Operation};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Serialize)]
struct AppliedOperation<'a> {
    kind: &'static str,
    entity: &'a str,
    operation: &'a Operation,
}

fn outcome_for(operation: &Operation) -> ExecuteOutcome {
    match operation {
        Operation::Create(record) => ExecuteOutcome::Created(record.id),
        Operation::Update(_) => ExecuteOutcome::Updated,
        Operation::Upsert { record, .. } => ExecuteOutcome::Upserted(record.id),
        Operation::Delete(_) => ExecuteOutcome::Deleted,
        Operation::Associate { .. } => ExecuteOutcome::Associated,
        Operation::Disassociate { .. } => ExecuteOutcome::Disassociated,
    }
}

pub struct FileClient {
    sink: Mutex<File>,
}

impl FileClient {
    fn append(&self, operation: &Operation) -> std::io::Result<()> {
        let entry = AppliedOperation {
            kind: operation.kind(),
            entity: operation.entity(),
            operation,
        };
        let line = serde_json::to_string(&entry).expect("Operation always serializes");
        let mut sink = self.sink.lock().expect("file sink mutex poisoned");
        writeln!(sink, "{line}")
    }
}

#[async_trait]
impl Client for FileClient {
    async fn execute(&self, operation: &Operation) -> Result<ExecuteOutcome, RemoteError> {
        self.append(operation)
            .map_err(|e| RemoteError::new(RemoteErrorKind::Transient, e.to_string()))?;
        Ok(outcome_for(operation))
    }

    async fn execute_batched(&self, batch: &Batch) -> Result<BatchOutcome, RemoteError> {
        let rows = batch
            .items
            .iter()
            .map(|item| {
                let outcome = self
                    .append(&item.operation)
                    .map(|_| outcome_for(&item.operation))
                    .map_err(|e| RemoteError::new(RemoteErrorKind::Transient, e.to_string()));
                RowResult {
                    row_ref: item.row_ref.clone(),
                    outcome,
                }
            })
            .collect();
        Ok(BatchOutcome { rows })
    }

    fn is_poisoned(&self) -> bool {
        false
    }
}

pub struct FileClientFactory {
    path: PathBuf,
}

impl FileClientFactory {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ClientFactory for FileClientFactory {
    async fn connect(&self) -> Result<Box<dyn Client>, SourceError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(Box::new(FileClient {
            sink: Mutex::new(file),
        }))
    }

    fn endpoint(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{Record, RowRef};
    use uuid::Uuid;

    #[tokio::test]
    async fn execute_batched_appends_one_line_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let sink_path = dir.path().join("applied.ndjson");
        let factory = FileClientFactory::new(&sink_path);
        let client = factory.connect().await.unwrap();

        let items = vec![model::BatchItem {
            row_ref: RowRef::Row(0),
            operation: Operation::Create(Record::new("account", Uuid::new_v4())),
        }];
        let batch = Batch::new("b1", "account", items);
        let outcome = client.execute_batched(&batch).await.unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert!(outcome.rows[0].outcome.is_ok());

        let written = std::fs::read_to_string(&sink_path).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(written.contains("\"kind\":\"create\""));
    }
}
