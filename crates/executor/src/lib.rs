pub mod error_mapping;
pub mod policy;
pub mod progress;
pub mod retry;

pub use policy::{BypassPlugins, ExecutionPolicy};
pub use retry::{RetryDisposition, RetryError, RetryPolicy};

use connectors::{BatchOutcome, RemoteError, RemoteErrorKind, RowResult};
use error_mapping::error_code_for;
use model::{Batch, BatchItem, MigrationResult, Phase, ProgressEvent, RowError};
use pool::ConnectionPool;
use progress::ProgressDelta;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Packs per-record operations into batches and drives them through the
/// pool with retry/backoff and per-record error attribution (spec §4.4).
pub struct BulkExecutor<'a> {
    pool: &'a ConnectionPool,
}

impl<'a> BulkExecutor<'a> {
    pub fn new(pool: &'a ConnectionPool) -> Self {
        Self { pool }
    }

    /// Runs `items` (already tagged with stable `RowRef`s) to completion.
    /// `progress_out` receives one `ProgressEvent` at least every 100
    /// records or every second per entity; `cancel` stops new batch
    /// submission and lets in-flight batches finish.
    pub async fn execute(
        &self,
        items: Vec<BatchItem>,
        policy: &ExecutionPolicy,
        progress_out: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> MigrationResult {
        let start = Instant::now();
        let mut by_entity: Vec<(String, Vec<BatchItem>)> = Vec::new();
        for item in items {
            let entity = item.operation.entity().to_string();
            match by_entity.iter_mut().find(|(e, _)| e == &entity) {
                Some((_, bucket)) => bucket.push(item),
                None => by_entity.push((entity, vec![item])),
            }
        }

        let total_records: u64 = by_entity.iter().map(|(_, v)| v.len() as u64).sum();
        let entity_totals: HashMap<String, u64> = by_entity
            .iter()
            .map(|(entity, v)| (entity.clone(), v.len() as u64))
            .collect();
        let (delta_tx, aggregator_handle) =
            progress::spawn_aggregator(Phase::Importing, entity_totals, progress_out);

        let batches: Vec<Batch> = by_entity
            .into_iter()
            .flat_map(|(entity, group)| {
                let batch_size = model::batch::clamp_batch_size(policy.batch_size);
                group
                    .chunks(batch_size)
                    .enumerate()
                    .map(|(i, chunk)| Batch::new(format!("{entity}-{i}"), entity.clone(), chunk.to_vec()))
                    .collect::<Vec<_>>()
            })
            .collect();

        let dop = self.pool.effective_dop().min(policy.requested_dop).max(1);
        let semaphore = Arc::new(Semaphore::new(dop));
        let result = Arc::new(Mutex::new(MigrationResult::empty()));
        result.lock().expect("result mutex poisoned").total_records = total_records;

        let mut handles = Vec::with_capacity(batches.len());
        for batch in batches {
            if cancel.is_cancelled() && !policy.continue_on_error {
                break;
            }
            let semaphore = semaphore.clone();
            let result = result.clone();
            let delta_tx = delta_tx.clone();
            let cancel = cancel.clone();
            let policy = policy.clone();
            let pool = self.pool;

            let permit = semaphore.acquire_owned().await.expect("semaphore closed");
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                if cancel.is_cancelled() {
                    return;
                }
                let entity = batch.entity.clone();
                let row_results = run_batch(pool, batch, &policy).await;
                apply_row_results(&result, &delta_tx, &entity, row_results);
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        drop(delta_tx);
        let _ = aggregator_handle.await;

        let mut final_result = Arc::try_unwrap(result)
            .map(|m| m.into_inner().expect("result mutex poisoned"))
            .unwrap_or_else(|arc| arc.lock().expect("result mutex poisoned").clone());
        final_result.duration = start.elapsed();
        final_result.success = final_result.failure_count == 0;
        final_result
    }
}

fn apply_row_results(
    result: &Arc<Mutex<MigrationResult>>,
    delta_tx: &mpsc::UnboundedSender<ProgressDelta>,
    entity: &str,
    rows: Vec<RowResult>,
) {
    if rows.is_empty() {
        return;
    }

    let mut success = 0u64;
    let mut failure = 0u64;
    let mut created = 0u64;
    let mut updated = 0u64;
    let mut errors = Vec::new();

    for row in rows {
        match row.outcome {
            Ok(connectors::ExecuteOutcome::Created(_)) => {
                success += 1;
                created += 1;
            }
            Ok(connectors::ExecuteOutcome::Updated) | Ok(connectors::ExecuteOutcome::Upserted(_)) => {
                success += 1;
                updated += 1;
            }
            Ok(_) => success += 1,
            Err(remote_err) => {
                failure += 1;
                errors.push(RowError {
                    row_ref: row.row_ref,
                    entity: entity.to_string(),
                    field: None,
                    error_code: error_code_for(&remote_err.kind),
                    message: remote_err.message,
                    record_id: None,
                });
            }
        }
    }

    let mut guard = result.lock().expect("result mutex poisoned");
    guard.success_count += success;
    guard.failure_count += failure;
    guard.created_count = Some(guard.created_count.unwrap_or(0) + created);
    guard.updated_count = Some(guard.updated_count.unwrap_or(0) + updated);
    guard.errors.extend(errors);
    drop(guard);

    let _ = delta_tx.send(ProgressDelta {
        entity: entity.to_string(),
        success,
        failure,
    });
}

type BatchFuture<'a> = Pin<Box<dyn Future<Output = Vec<RowResult>> + Send + 'a>>;

/// Runs one batch to a final per-row outcome, retrying batch-level
/// failures with exponential backoff and splitting the batch in half once
/// the retry budget is exhausted, to isolate poisoned records (spec §4.4
/// step 3).
fn run_batch<'a>(pool: &'a ConnectionPool, batch: Batch, policy: &'a ExecutionPolicy) -> BatchFuture<'a> {
    Box::pin(async move {
        let entity = batch.entity.clone();
        let mut attempt = 0usize;
        loop {
            let lease = match pool.get_client(None).await {
                Ok(lease) => lease,
                Err(err) => {
                    warn!(error = %err, "failed to acquire connection for batch");
                    return fatal_rows(&batch, &format!("pool error: {err}"));
                }
            };

            let started = Instant::now();
            let outcome = lease.client().execute_batched(&batch).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(BatchOutcome { rows }) => {
                    pool.record_outcome(&lease, latency_ms, false, None);
                    return rows;
                }
                Err(remote_err) => {
                    let throttled = matches!(remote_err.kind, RemoteErrorKind::Throttled { .. });
                    let retry_after = match &remote_err.kind {
                        RemoteErrorKind::Throttled { retry_after } => *retry_after,
                        _ => None,
                    };
                    pool.record_outcome(&lease, latency_ms, throttled, retry_after);

                    let retryable = remote_err.is_retryable();
                    if retryable && attempt + 1 < policy.retry.max_attempts {
                        let delay = retry_after.unwrap_or_else(|| policy.retry.backoff_delay(attempt));
                        debug!(entity = %entity, attempt, delay_ms = delay.as_millis() as u64, "retrying batch");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    if batch.len() > 1 {
                        debug!(entity = %entity, len = batch.len(), "splitting batch after exhausting retries");
                        let (left, right) = batch.split();
                        let mut rows = Vec::new();
                        if let Some(left) = left {
                            rows.extend(run_batch(pool, left, policy).await);
                        }
                        if let Some(right) = right {
                            rows.extend(run_batch(pool, right, policy).await);
                        }
                        return rows;
                    }

                    return fatal_rows(&batch, &remote_err.message);
                }
            }
        }
    })
}

fn fatal_rows(batch: &Batch, message: &str) -> Vec<RowResult> {
    batch
        .items
        .iter()
        .map(|item| RowResult {
            row_ref: item.row_ref.clone(),
            outcome: Err(RemoteError::new(RemoteErrorKind::PermanentFatal, message.to_string())),
        })
        .collect()
}
