use executor::BypassPlugins;
use std::collections::HashMap;
use uuid::Uuid;

/// How a record is translated into an `Operation` during import (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Create,
    Update,
    Upsert,
}

/// Import-run flags, per spec §4.7 "options".
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Overrides each entity's `disable_plugins_default` when set.
    pub disable_plugins: Option<bool>,
    pub strip_owner_fields: bool,
    /// Source id -> target id; applied before owner-field stripping.
    pub user_mapping: HashMap<Uuid, Uuid>,
    pub dry_run: bool,
    pub continue_on_error: bool,
    pub bypass_plugins: BypassPlugins,
    pub bypass_flows: bool,
    pub batch_size: usize,
    /// Max entities within one tier processed concurrently.
    pub tier_concurrency: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            disable_plugins: None,
            strip_owner_fields: false,
            user_mapping: HashMap::new(),
            dry_run: false,
            continue_on_error: true,
            bypass_plugins: BypassPlugins::None,
            bypass_flows: false,
            batch_size: model::batch::DEFAULT_BATCH_SIZE,
            tier_concurrency: 4,
        }
    }
}

/// Export-run flags, per spec §4.7.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub page_size: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { page_size: 5000 }
    }
}
