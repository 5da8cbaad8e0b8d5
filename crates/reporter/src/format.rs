//! Output format selection (spec §4.8): chosen once per run, never mixed.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Ndjson,
}

#[derive(Debug, Clone)]
pub struct ReporterConfig {
    pub format: OutputFormat,
    pub max_errors: usize,
    pub color: bool,
}

impl ReporterConfig {
    /// `color` defaults to enabled unless `NO_COLOR` is set (spec §6.5);
    /// ndjson output never colors regardless.
    pub fn new(format: OutputFormat) -> Self {
        let color = format == OutputFormat::Human && std::env::var_os("NO_COLOR").is_none();
        Self {
            format,
            max_errors: 10,
            color,
        }
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }
}
