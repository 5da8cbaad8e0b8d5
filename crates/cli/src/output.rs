use crate::error::CliError;
use model::MigrationResult;
use reporter::{OutputFormat, ProgressReporter, ReporterConfig};
use tokio::sync::mpsc;

/// Builds the one `ProgressReporter` a run uses for both its progress
/// stream and its terminal summary (spec §4.8: one format chosen at
/// startup, never mixed).
pub fn reporter_for(json: bool) -> ProgressReporter {
    let format = if json { OutputFormat::Ndjson } else { OutputFormat::Human };
    ProgressReporter::new(ReporterConfig::new(format))
}

/// Spawns the reporter's consumer loop against `rx`, returning the handle
/// so the caller can await it after the producing side finishes.
pub fn spawn_reporter(
    reporter: &ProgressReporter,
    rx: mpsc::Receiver<model::ProgressEvent>,
) -> tokio::task::JoinHandle<()> {
    let reporter = reporter.clone();
    tokio::spawn(async move { reporter.run(rx).await })
}

pub fn print_summary(reporter: &ProgressReporter, result: &MigrationResult) -> Result<(), CliError> {
    reporter.summarize(result);
    Ok(())
}
