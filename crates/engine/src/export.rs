//! Export orchestration (spec §4.7). The engine doesn't speak the remote's
//! wire protocol directly; it drives a caller-supplied [`ExportSource`],
//! one paged-record trait shared by every Dataverse-style backend.

use crate::error::EngineError;
use crate::options::ExportOptions;
use async_trait::async_trait;
use model::{EntitySchema, ManyToManyAssociation, MigrationData, Phase, ProgressEvent, Record, Schema};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One page of records plus an opaque continuation token.
pub struct Page {
    pub records: Vec<Record>,
    pub next_cursor: Option<String>,
}

/// Paged reader the engine drives to pull entity records and M2M target ids
/// out of the source environment (spec §4.7 "Export operations").
#[async_trait]
pub trait ExportSource: Send + Sync {
    async fn fetch_page(
        &self,
        entity: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<Page, EngineError>;

    async fn fetch_associations(
        &self,
        entity: &str,
        relationship: &str,
        source_ids: &[uuid::Uuid],
    ) -> Result<Vec<ManyToManyAssociation>, EngineError>;
}

/// Runs a full export over every entity in `schema`, in the schema's
/// declared order (dependency order is not required for export, only used
/// for stable progress reporting per spec §4.7).
pub async fn export(
    source: &dyn ExportSource,
    schema: Schema,
    options: &ExportOptions,
    progress_out: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
) -> Result<MigrationData, EngineError> {
    let mut data = MigrationData::new(schema.clone());

    for entity in schema.entities() {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let records = export_entity(source, entity, options, &progress_out).await?;
        data.entity_records.insert(entity.logical_name.clone(), records);

        for relationship in &entity.relationships {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let source_ids: Vec<uuid::Uuid> = data
                .entity_records
                .get(&entity.logical_name)
                .into_iter()
                .flatten()
                .map(|r| r.id)
                .collect();
            let associations = source
                .fetch_associations(&entity.logical_name, &relationship.name, &source_ids)
                .await?;
            data.associations
                .insert(relationship.name.clone(), associations);
        }
    }

    Ok(data)
}

async fn export_entity(
    source: &dyn ExportSource,
    entity: &EntitySchema,
    options: &ExportOptions,
    progress_out: &mpsc::Sender<ProgressEvent>,
) -> Result<Vec<Record>, EngineError> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = source
            .fetch_page(&entity.logical_name, cursor.as_deref(), options.page_size)
            .await?;
        let fetched = page.records.len() as u64;
        records.extend(page.records);

        let event = ProgressEvent::new(Phase::Exporting, records.len() as u64, records.len() as u64)
            .for_entity(entity.logical_name.clone());
        let _ = progress_out.send(event).await;
        debug!(entity = %entity.logical_name, fetched, "exported page");

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(records)
}
