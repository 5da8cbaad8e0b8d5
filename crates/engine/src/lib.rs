//! Migration Engine: drives Export and Import using the Planner and
//! Executor against a shared [`ConnectionPool`] (spec §4.7). Orchestrates
//! phases top-down: plan tiers, then export or import each tier in order,
//! deferring cyclic fields and associations to their own passes.

pub mod error;
pub mod export;
pub mod import;
pub mod owner_fields;
pub mod options;

pub use error::EngineError;
pub use export::{export, ExportSource, Page};
pub use import::import;
pub use options::{ExportOptions, ImportMode, ImportOptions};

use model::{MigrationData, MigrationResult, ProgressEvent, Schema};
use pool::ConnectionPool;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Thin facade pairing a [`ConnectionPool`] with the export/import entry
/// points, so callers (the CLI) hold one handle for a whole run.
pub struct MigrationEngine<'a> {
    pool: &'a ConnectionPool,
}

impl<'a> MigrationEngine<'a> {
    pub fn new(pool: &'a ConnectionPool) -> Self {
        Self { pool }
    }

    pub async fn export(
        &self,
        source: &dyn ExportSource,
        schema: Schema,
        options: &ExportOptions,
        progress_out: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<MigrationData, EngineError> {
        export::export(source, schema, options, progress_out, cancel).await
    }

    pub async fn import(
        &self,
        data: &MigrationData,
        mode: ImportMode,
        options: &ImportOptions,
        progress_out: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<MigrationResult, EngineError> {
        import::import(self.pool, data, mode, options, progress_out, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectors::{BatchOutcome, Client, ClientFactory, ExecuteOutcome, RemoteError, RowResult, SourceError};
    use model::{DataType, EntitySchema, FieldSchema, Operation, Record, Value};
    use pool::PoolConfig;
    use std::sync::Arc;
    use uuid::Uuid;

    struct AcceptAllClient;

    #[async_trait]
    impl Client for AcceptAllClient {
        async fn execute(&self, _operation: &Operation) -> Result<ExecuteOutcome, RemoteError> {
            Ok(ExecuteOutcome::Created(Uuid::new_v4()))
        }

        async fn execute_batched(&self, batch: &model::Batch) -> Result<BatchOutcome, RemoteError> {
            let rows = batch
                .items
                .iter()
                .map(|item| RowResult {
                    row_ref: item.row_ref.clone(),
                    outcome: Ok(ExecuteOutcome::Created(Uuid::new_v4())),
                })
                .collect();
            Ok(BatchOutcome { rows })
        }

        fn is_poisoned(&self) -> bool {
            false
        }
    }

    struct AcceptAllFactory;

    #[async_trait]
    impl ClientFactory for AcceptAllFactory {
        async fn connect(&self) -> Result<Box<dyn Client>, SourceError> {
            Ok(Box::new(AcceptAllClient))
        }

        fn endpoint(&self) -> &str {
            "env"
        }
    }

    fn two_tier_schema() -> Schema {
        let mut schema = Schema::new();

        let mut account = EntitySchema::new("account");
        account.fields.push(FieldSchema::new("accountid", DataType::Id));
        account.fields.push(FieldSchema::new("name", DataType::String));
        schema.insert(account).unwrap();

        let mut contact = EntitySchema::new("contact");
        contact.fields.push(FieldSchema::new("contactid", DataType::Id));
        let mut parent_account = FieldSchema::new("parentaccountid", DataType::Lookup);
        parent_account.lookup_targets = vec!["account".to_string()];
        contact.fields.push(parent_account);
        schema.insert(contact).unwrap();

        schema
    }

    #[tokio::test]
    async fn import_runs_dependent_tier_after_its_target() {
        let schema = two_tier_schema();
        let mut data = MigrationData::new(schema);

        let account_id = Uuid::new_v4();
        data.entity_records.insert(
            "account".to_string(),
            vec![Record::new("account", account_id).with_field("name", Value::String("Acme".into()))],
        );
        data.entity_records.insert(
            "contact".to_string(),
            vec![Record::new("contact", Uuid::new_v4()).with_field(
                "parentaccountid",
                Value::Reference(model::EntityReference::new("account", account_id)),
            )],
        );

        let factory: Arc<dyn ClientFactory> = Arc::new(AcceptAllFactory);
        let pool = ConnectionPool::new(vec![factory], PoolConfig::default());
        let engine = MigrationEngine::new(&pool);
        let (tx, mut rx) = mpsc::channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let result = engine
            .import(
                &data,
                ImportMode::Create,
                &ImportOptions::default(),
                tx,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.total_records, 2);
        assert_eq!(result.success_count, 2);
        assert!(result.success);
    }

    #[tokio::test]
    async fn dry_run_reports_skipped_without_calling_the_client() {
        let schema = two_tier_schema();
        let mut data = MigrationData::new(schema);
        data.entity_records.insert(
            "account".to_string(),
            vec![Record::new("account", Uuid::new_v4())],
        );

        let factory: Arc<dyn ClientFactory> = Arc::new(AcceptAllFactory);
        let pool = ConnectionPool::new(vec![factory], PoolConfig::default());
        let engine = MigrationEngine::new(&pool);
        let (tx, mut rx) = mpsc::channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let mut options = ImportOptions::default();
        options.dry_run = true;

        let result = engine
            .import(&data, ImportMode::Create, &options, tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.skipped_count, Some(1));
        assert_eq!(result.success_count, 0);
    }
}
