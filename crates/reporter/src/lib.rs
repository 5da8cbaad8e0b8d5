//! Progress Reporter (spec §4.8): the sole consumer of the engine's
//! `ProgressEvent` channel. Strictly one producer, one consumer, one
//! format chosen at startup — no subscription registry, since there is
//! exactly one thing listening.

pub mod classify;
pub mod eta;
pub mod format;

pub use classify::{classify, ErrorClass};
pub use format::{OutputFormat, ReporterConfig};

use eta::RateTracker;
use model::{MigrationResult, Phase, ProgressEvent};
use std::collections::HashMap;
use tokio::sync::mpsc;

type ProgressKey = (Phase, Option<String>);

#[derive(Clone)]
pub struct ProgressReporter {
    config: ReporterConfig,
}

impl ProgressReporter {
    pub fn new(config: ReporterConfig) -> Self {
        Self { config }
    }

    /// Drains `rx` until the producer drops its sender. One line per
    /// event; `current`/`successCount`/`failureCount` are clamped to be
    /// monotone per `(phase, entity)` key even though the executor's
    /// aggregator already guarantees it upstream (spec §4.8).
    pub async fn run(&self, mut rx: mpsc::Receiver<ProgressEvent>) {
        let mut trackers: HashMap<ProgressKey, RateTracker> = HashMap::new();
        let mut last_seen: HashMap<ProgressKey, (u64, u64, u64)> = HashMap::new();

        while let Some(mut event) = rx.recv().await {
            let key = event.key();
            let (last_current, last_success, last_failure) =
                last_seen.get(&key).copied().unwrap_or((0, 0, 0));

            if event.current < last_current {
                tracing::warn!(phase = %event.phase, entity = ?event.entity, "progress event reported a non-monotone current; clamping");
                event.current = last_current;
            }
            event.success_count = event.success_count.max(last_success);
            event.failure_count = event.failure_count.max(last_failure);
            last_seen.insert(key.clone(), (event.current, event.success_count, event.failure_count));

            let tracker = trackers.entry(key).or_insert_with(|| RateTracker::new(event.total));
            let (rate, eta) = tracker.observe(event.current, event.total);
            event.instant_rate = rate;
            event.eta_seconds = eta;

            self.write_event(&event);
        }
    }

    /// Emits the terminal summary (spec §4.8 "exactly one terminal event
    /// with the full summary and list of errors").
    pub fn summarize(&self, result: &MigrationResult) {
        match self.config.format {
            OutputFormat::Ndjson => {
                if let Ok(line) = serde_json::to_string(result) {
                    println!("{line}");
                }
            }
            OutputFormat::Human => self.print_human_summary(result),
        }
    }

    fn write_event(&self, event: &ProgressEvent) {
        match self.config.format {
            OutputFormat::Ndjson => {
                if let Ok(line) = serde_json::to_string(event) {
                    println!("{line}");
                }
            }
            OutputFormat::Human => self.print_human_event(event),
        }
    }

    fn print_human_event(&self, event: &ProgressEvent) {
        let entity = event.entity.as_deref().unwrap_or("-");
        let pct = if event.total == 0 {
            100.0
        } else {
            event.current as f64 / event.total as f64 * 100.0
        };
        let eta = event
            .eta_seconds
            .map(eta::format_duration)
            .unwrap_or_else(|| "--:--".to_string());
        let rate = event
            .instant_rate
            .map(|r| format!("{r:.1}/s"))
            .unwrap_or_else(|| "-".to_string());

        let line = format!(
            "[{phase}] {entity} {current}/{total} ({pct:.1}%) ok={ok} fail={fail} rate={rate} eta={eta}",
            phase = event.phase,
            current = event.current,
            total = event.total,
            ok = event.success_count,
            fail = event.failure_count,
        );
        println!("{}", self.colorize(&line, event.failure_count > 0));
    }

    fn print_human_summary(&self, result: &MigrationResult) {
        let header = if result.success {
            "Migration completed"
        } else {
            "Migration completed with errors"
        };
        println!("{}", self.colorize(header, !result.success));
        println!(
            "  total={} success={} failure={} skipped={}",
            result.total_records,
            result.success_count,
            result.failure_count,
            result.skipped_count.unwrap_or(0)
        );
        println!("  duration={:.1}s", result.duration.as_secs_f64());

        if result.errors.is_empty() {
            return;
        }

        println!("  error classes:");
        for class in classify::classify(&result.errors) {
            match class.suggestion {
                Some(suggestion) => println!("    {:?} x{}: {suggestion}", class.code, class.count),
                None => println!("    {:?} x{}", class.code, class.count),
            }
        }

        println!("  sample errors:");
        for error in result.errors.iter().take(self.config.max_errors) {
            println!("    {} [{}]: {}", error.entity, error.row_ref, error.message);
        }
        let omitted = result.errors.len().saturating_sub(self.config.max_errors);
        if omitted > 0 {
            println!("    ... {omitted} omitted");
        }
    }

    fn colorize(&self, text: &str, warn: bool) -> String {
        if !self.config.color {
            return text.to_string();
        }
        if warn {
            format!("\u{1b}[31m{text}\u{1b}[0m")
        } else {
            format!("\u{1b}[32m{text}\u{1b}[0m")
        }
    }
}
