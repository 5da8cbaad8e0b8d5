//! Import orchestration (spec §4.7): tiers run sequentially, entities
//! within a tier concurrently; deferred fields and M2M associations are
//! swept in two trailing passes that only start once every tier is fully
//! drained (spec §5 "strict happens-before").

use crate::error::EngineError;
use crate::options::{ImportMode, ImportOptions};
use crate::owner_fields::apply_owner_policy;
use executor::{BulkExecutor, ExecutionPolicy};
use model::{BatchItem, MigrationData, MigrationResult, Operation, ProgressEvent, Record, RowRef};
use planner::plan_tiers;
use pool::ConnectionPool;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn import(
    pool: &ConnectionPool,
    data: &MigrationData,
    mode: ImportMode,
    options: &ImportOptions,
    progress_out: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
) -> Result<MigrationResult, EngineError> {
    data.schema.validate()?;

    let entity_order: Vec<String> = data
        .schema
        .entities()
        .iter()
        .map(|e| e.logical_name.clone())
        .collect();
    let tier_plan = plan_tiers(&data.schema, &entity_order);

    let mut result = MigrationResult::empty();
    let policy = execution_policy(options);

    for (tier_index, tier) in tier_plan.tiers.iter().enumerate() {
        if cancel.is_cancelled() {
            if options.continue_on_error {
                break;
            }
            return Err(EngineError::Cancelled);
        }

        let items = build_tier_items(data, tier, &tier_plan, mode, options)?;
        if items.is_empty() {
            continue;
        }
        info!(tier = tier_index, records = items.len(), "starting import tier");

        let executor = BulkExecutor::new(pool);
        let tier_result = if options.dry_run {
            dry_run_result(&items)
        } else {
            executor
                .execute(items, &policy, progress_out.clone(), cancel.clone())
                .await
        };

        let tier_failed = tier_result.failure_count > 0;
        result.merge(tier_result);
        if tier_failed && !options.continue_on_error {
            return Ok(result);
        }
    }

    if cancel.is_cancelled() && !options.continue_on_error {
        return Err(EngineError::Cancelled);
    }

    if !options.dry_run {
        let deferred_result = run_deferred_field_pass(pool, data, &tier_plan, &policy, progress_out.clone(), cancel.clone()).await?;
        result.merge(deferred_result);

        let association_result =
            run_association_pass(pool, data, &policy, progress_out, cancel).await?;
        result.merge(association_result);
    }

    result.success = result.failure_count == 0;
    Ok(result)
}

fn execution_policy(options: &ImportOptions) -> ExecutionPolicy {
    ExecutionPolicy {
        batch_size: model::batch::clamp_batch_size(options.batch_size),
        bypass_plugins: options.bypass_plugins,
        bypass_flows: options.bypass_flows,
        continue_on_error: options.continue_on_error,
        requested_dop: options.tier_concurrency.max(1),
        ..ExecutionPolicy::default()
    }
}

fn build_tier_items(
    data: &MigrationData,
    tier: &[String],
    tier_plan: &model::TierPlan,
    mode: ImportMode,
    options: &ImportOptions,
) -> Result<Vec<BatchItem>, EngineError> {
    let mut items = Vec::new();

    for entity_name in tier {
        let Some(entity_schema) = data.schema.get(entity_name) else {
            return Err(EngineError::UnknownEntity(entity_name.clone()));
        };
        let Some(records) = data.entity_records.get(entity_name) else {
            continue;
        };

        let deferred: Vec<&str> = tier_plan
            .deferred_fields_for(entity_name)
            .map(|d| d.field_name.as_str())
            .collect();

        for (row_index, record) in records.iter().enumerate() {
            let mut record = record.clone();
            for field in &deferred {
                record.remove(field);
            }
            strip_non_writable_fields(&mut record, entity_schema, mode);
            apply_owner_policy(&mut record, &options.user_mapping, options.strip_owner_fields);

            let operation = match mode {
                ImportMode::Create => Operation::Create(record),
                ImportMode::Update => Operation::Update(record),
                ImportMode::Upsert => Operation::Upsert {
                    key_fields: vec![entity_schema.primary_id_field.clone()],
                    record,
                },
            };
            items.push(BatchItem {
                row_ref: RowRef::Row(row_index as u64),
                operation,
            });
        }
    }

    Ok(items)
}

fn strip_non_writable_fields(record: &mut Record, entity: &model::EntitySchema, mode: ImportMode) {
    let for_create = matches!(mode, ImportMode::Create | ImportMode::Upsert);
    let writable: Vec<String> = entity
        .writable_fields(for_create)
        .map(|f| f.name.clone())
        .collect();
    let to_remove: Vec<String> = record
        .field_names()
        .filter(|name| *name != entity.primary_id_field && !writable.iter().any(|w| w == name))
        .map(str::to_string)
        .collect();
    for name in to_remove {
        record.remove(&name);
    }
}

async fn run_deferred_field_pass(
    pool: &ConnectionPool,
    data: &MigrationData,
    tier_plan: &model::TierPlan,
    policy: &ExecutionPolicy,
    progress_out: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
) -> Result<MigrationResult, EngineError> {
    if tier_plan.deferred_fields.is_empty() {
        return Ok(MigrationResult::empty());
    }

    let mut items = Vec::new();
    for deferred in &tier_plan.deferred_fields {
        let Some(entity_schema) = data.schema.get(&deferred.entity) else {
            continue;
        };
        let Some(records) = data.entity_records.get(&deferred.entity) else {
            continue;
        };
        for (row_index, record) in records.iter().enumerate() {
            let Some(value) = record.get(&deferred.field_name) else {
                continue;
            };
            let mut patch = Record::new(deferred.entity.clone(), record.id);
            patch.set(entity_schema.primary_id_field.clone(), model::Value::Id(record.id));
            patch.set(deferred.field_name.clone(), value.clone());
            items.push(BatchItem {
                row_ref: RowRef::Row(row_index as u64),
                operation: Operation::Update(patch),
            });
        }
    }

    if items.is_empty() {
        return Ok(MigrationResult::empty());
    }

    let executor = BulkExecutor::new(pool);
    Ok(executor.execute(items, policy, progress_out, cancel).await)
}

async fn run_association_pass(
    pool: &ConnectionPool,
    data: &MigrationData,
    policy: &ExecutionPolicy,
    progress_out: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
) -> Result<MigrationResult, EngineError> {
    let total: usize = data.associations.values().map(|v| v.len()).sum();
    if total == 0 {
        return Ok(MigrationResult::empty());
    }

    let mut items = Vec::new();
    for (relationship_name, associations) in &data.associations {
        for association in associations {
            for target_id in association.target_ids() {
                items.push(BatchItem {
                    row_ref: RowRef::RecordId(association.source_id),
                    operation: Operation::Associate {
                        relationship_name: relationship_name.clone(),
                        source_entity: association.source_entity.clone(),
                        source_id: association.source_id,
                        target_entity: association.target_entity.clone(),
                        target_id,
                    },
                });
            }
        }
    }

    if items.is_empty() {
        return Ok(MigrationResult::empty());
    }

    let executor = BulkExecutor::new(pool);
    Ok(executor.execute(items, policy, progress_out, cancel).await)
}

fn dry_run_result(items: &[BatchItem]) -> MigrationResult {
    let mut result = MigrationResult::empty();
    result.total_records = items.len() as u64;
    result.skipped_count = Some(items.len() as u64);
    result
}
