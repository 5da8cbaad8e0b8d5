//! Single-writer progress aggregation (spec §4.4 step 5, §5 "Progress
//! channel has exactly one consumer"). Worker tasks post deltas over an
//! unbounded channel; one aggregator task owns all per-entity counters and
//! is the only thing that ever constructs a [`ProgressEvent`].

use model::{Phase, ProgressEvent};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Cadence cap from spec §4.4: emit at least every 100 records or every
/// second, whichever comes first.
const MAX_RECORDS_BETWEEN_EMITS: u64 = 100;
const MAX_INTERVAL_BETWEEN_EMITS: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ProgressDelta {
    pub entity: String,
    pub success: u64,
    pub failure: u64,
}

struct EntityCounters {
    total: u64,
    current: u64,
    success: u64,
    failure: u64,
    last_emitted_current: u64,
    last_emit_at: Instant,
}

impl EntityCounters {
    fn new(total: u64) -> Self {
        Self {
            total,
            current: 0,
            success: 0,
            failure: 0,
            last_emitted_current: 0,
            last_emit_at: Instant::now(),
        }
    }

    fn should_emit(&self) -> bool {
        self.current - self.last_emitted_current >= MAX_RECORDS_BETWEEN_EMITS
            || self.last_emit_at.elapsed() >= MAX_INTERVAL_BETWEEN_EMITS
            || self.current == self.total
    }
}

/// Spawns the aggregator task. Returns the sender workers post deltas to
/// and the handle to await for a clean shutdown (drop the sender, then
/// join).
pub fn spawn_aggregator(
    phase: Phase,
    entity_totals: HashMap<String, u64>,
    out: mpsc::Sender<ProgressEvent>,
) -> (mpsc::UnboundedSender<ProgressDelta>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressDelta>();

    let handle = tokio::spawn(async move {
        let mut counters: HashMap<String, EntityCounters> = entity_totals
            .into_iter()
            .map(|(entity, total)| (entity, EntityCounters::new(total)))
            .collect();

        while let Some(delta) = rx.recv().await {
            let Some(counter) = counters.get_mut(&delta.entity) else {
                continue;
            };
            counter.current += delta.success + delta.failure;
            counter.success += delta.success;
            counter.failure += delta.failure;

            if counter.should_emit() {
                let event = ProgressEvent::new(phase, counter.current, counter.total)
                    .for_entity(delta.entity.clone());
                let event = ProgressEvent {
                    success_count: counter.success,
                    failure_count: counter.failure,
                    ..event
                };
                counter.last_emitted_current = counter.current;
                counter.last_emit_at = Instant::now();
                let _ = out.send(event).await;
            }
        }

        // Final snapshot per entity, regardless of cadence — callers should
        // always see a terminal event per (phase, entity) key.
        for (entity, counter) in counters {
            let event = ProgressEvent {
                success_count: counter.success,
                failure_count: counter.failure,
                ..ProgressEvent::new(phase, counter.current, counter.total).for_entity(entity)
            };
            let _ = out.send(event).await;
        }
    });

    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_final_event_per_entity_on_drain() {
        let mut totals = HashMap::new();
        totals.insert("account".to_string(), 3);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let (delta_tx, handle) = spawn_aggregator(Phase::Importing, totals, out_tx);

        delta_tx
            .send(ProgressDelta {
                entity: "account".to_string(),
                success: 3,
                failure: 0,
            })
            .unwrap();
        drop(delta_tx);
        handle.await.unwrap();

        let mut last = None;
        while let Ok(event) = out_rx.try_recv() {
            last = Some(event);
        }
        let last = last.unwrap();
        assert_eq!(last.current, 3);
        assert_eq!(last.success_count, 3);
    }
}
