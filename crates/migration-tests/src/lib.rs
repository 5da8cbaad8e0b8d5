//! End-to-end scenarios (spec §8) driving the real `executor`/`engine`
//! crates against the scripted client in [`fake`], without any network
//! dependency. Exercises the CSV load path, retry/backoff, per-record
//! continue-on-error, tiered import with a self-reference, many-to-many
//! associations, and the schema archive round-trip.

pub mod fake;

#[cfg(test)]
mod tests {
    use crate::fake::{Script, ScriptedFactory};
    use connectors::csv::loader::{CsvLoader, StaticLookupResolver};
    use connectors::csv::mapping::{ColumnMapping, CsvMapping};
    use connectors::{ClientFactory, RemoteErrorKind};
    use engine::{ImportMode, ImportOptions, MigrationEngine};
    use executor::{BulkExecutor, ExecutionPolicy, RetryPolicy};
    use model::{
        BatchItem, DataType, EntitySchema, EntityReference, FieldSchema, ManyToManyAssociation,
        MigrationData, Operation, Record, RelationshipSchema, RowRef, Schema, Value,
    };
    use pool::{ConnectionPool, PoolConfig};
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn drain(mut rx: mpsc::Receiver<model::ProgressEvent>) {
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
    }

    fn pool_with(scripts: Vec<Script>) -> ConnectionPool {
        let factory: Arc<dyn ClientFactory> = Arc::new(ScriptedFactory::new(scripts));
        ConnectionPool::new(vec![factory], PoolConfig::default())
    }

    #[tokio::test]
    async fn csv_load_feeds_the_executor_to_a_clean_success() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,revenue").unwrap();
        writeln!(file, "Acme,1000.50").unwrap();
        file.flush().unwrap();

        let mapping = CsvMapping {
            entity: "account".to_string(),
            columns: vec![
                ColumnMapping::auto("name", "name", DataType::String),
                ColumnMapping::auto("revenue", "revenue", DataType::Money),
            ],
            key_fields: Vec::new(),
        };
        let resolver = StaticLookupResolver::new();
        let loader = CsvLoader::new(&mapping, &resolver);
        let items: Vec<BatchItem> = loader
            .load(file.path())
            .unwrap()
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(items.len(), 1);

        let pool = pool_with(vec![Script::Accept]);
        let executor = BulkExecutor::new(&pool);
        let (tx, rx) = mpsc::channel(16);
        drain(rx);

        let result = executor
            .execute(items, &ExecutionPolicy::default(), tx, CancellationToken::new())
            .await;

        assert!(result.success);
        assert_eq!(result.success_count, 1);
        assert!(result.is_accounted_for());
    }

    fn row_items(entity: &str, n: u64) -> Vec<BatchItem> {
        (0..n)
            .map(|i| BatchItem {
                row_ref: RowRef::Row(i),
                operation: Operation::Create(Record::new(entity, Uuid::new_v4())),
            })
            .collect()
    }

    #[tokio::test]
    async fn throttled_batch_retries_then_succeeds() {
        let scripts = vec![
            Script::FailBatch(RemoteErrorKind::Throttled { retry_after: None }),
            Script::FailBatch(RemoteErrorKind::Throttled { retry_after: None }),
            Script::Accept,
        ];
        let pool = pool_with(scripts);
        let executor = BulkExecutor::new(&pool);
        let (tx, rx) = mpsc::channel(16);
        drain(rx);

        let policy = ExecutionPolicy {
            retry: RetryPolicy::new(5, Duration::from_millis(0), Duration::from_millis(0), 0.0),
            ..ExecutionPolicy::default()
        };

        let result = executor
            .execute(row_items("account", 2), &policy, tx, CancellationToken::new())
            .await;

        assert!(result.success);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 0);
    }

    #[tokio::test]
    async fn per_record_permanent_failure_continues_with_partial_success() {
        let pool = pool_with(vec![Script::FailFirstRow(model::ErrorCode::RequiredField)]);
        let executor = BulkExecutor::new(&pool);
        let (tx, rx) = mpsc::channel(16);
        drain(rx);

        let policy = ExecutionPolicy {
            continue_on_error: true,
            ..ExecutionPolicy::default()
        };

        let result = executor
            .execute(row_items("account", 3), &policy, tx, CancellationToken::new())
            .await;

        assert!(!result.success);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 1);
        assert!(result.is_accounted_for());
        assert_eq!(result.errors[0].error_code, model::ErrorCode::RequiredField);
    }

    fn self_referencing_account_schema() -> Schema {
        let mut schema = Schema::new();
        let mut account = EntitySchema::new("account");
        account.fields.push(FieldSchema::new("accountid", DataType::Id));
        account.fields.push(FieldSchema::new("name", DataType::String));
        let mut parent = FieldSchema::new("parentaccountid", DataType::Lookup);
        parent.lookup_targets = vec!["account".to_string()];
        account.fields.push(parent);
        schema.insert(account).unwrap();
        schema
    }

    #[tokio::test]
    async fn self_referencing_tier_runs_a_trailing_deferred_field_pass() {
        let schema = self_referencing_account_schema();
        let mut data = MigrationData::new(schema);

        let parent_id = Uuid::new_v4();
        let child_id = Uuid::new_v4();
        let parent = Record::new("account", parent_id).with_field("name", Value::String("Parent".into()));
        let child = Record::new("account", child_id)
            .with_field("name", Value::String("Child".into()))
            .with_field(
                "parentaccountid",
                Value::Reference(EntityReference::new("account", parent_id)),
            );
        data.entity_records.insert("account".to_string(), vec![parent, child]);

        let pool = pool_with(vec![Script::Accept]);
        let engine = MigrationEngine::new(&pool);
        let (tx, rx) = mpsc::channel(64);
        drain(rx);

        let result = engine
            .import(&data, ImportMode::Create, &ImportOptions::default(), tx, CancellationToken::new())
            .await
            .unwrap();

        // 2 records created, plus 1 deferred Update for the child's self-lookup.
        assert_eq!(result.total_records, 3);
        assert_eq!(result.success_count, 3);
        assert!(result.success);
    }

    fn account_contact_schema_with_relationship() -> Schema {
        let mut schema = Schema::new();
        let mut account = EntitySchema::new("account");
        account.fields.push(FieldSchema::new("accountid", DataType::Id));
        account.relationships.push(RelationshipSchema {
            name: "account_contacts".to_string(),
            related_entity: "contact".to_string(),
            intersect_entity: None,
            target_id_field: "contactid".to_string(),
        });
        schema.insert(account).unwrap();

        let mut contact = EntitySchema::new("contact");
        contact.fields.push(FieldSchema::new("contactid", DataType::Id));
        schema.insert(contact).unwrap();
        schema
    }

    #[tokio::test]
    async fn many_to_many_associations_run_after_the_import_passes() {
        let schema = account_contact_schema_with_relationship();
        let mut data = MigrationData::new(schema);

        let account_id = Uuid::new_v4();
        data.entity_records
            .insert("account".to_string(), vec![Record::new("account", account_id)]);

        let mut association =
            ManyToManyAssociation::new("account_contacts", "account", account_id, "contact", "contactid");
        association.add_target(Uuid::new_v4());
        association.add_target(Uuid::new_v4());
        data.associations.insert("account_contacts".to_string(), vec![association]);

        let pool = pool_with(vec![Script::Accept]);
        let engine = MigrationEngine::new(&pool);
        let (tx, rx) = mpsc::channel(64);
        drain(rx);

        let result = engine
            .import(&data, ImportMode::Create, &ImportOptions::default(), tx, CancellationToken::new())
            .await
            .unwrap();

        // 1 account create + 2 Associate operations.
        assert_eq!(result.total_records, 3);
        assert_eq!(result.success_count, 3);
    }

    #[test]
    fn schema_document_round_trips_through_the_xml_codec() {
        let mut schema = Schema::new();
        let mut account = EntitySchema::new("account");
        account.fields.push(FieldSchema::new("accountid", DataType::Id));
        account.fields.push(FieldSchema::new("name", DataType::String));
        schema.insert(account).unwrap();

        let mut buf = Vec::new();
        schema::write_schema(&schema, &mut buf).unwrap();
        let xml = String::from_utf8(buf).unwrap();

        let parsed = schema::read_schema(&xml).unwrap();
        assert_eq!(parsed.entities().len(), 1);
        assert_eq!(parsed.get("account").unwrap().fields.len(), 2);
    }
}
