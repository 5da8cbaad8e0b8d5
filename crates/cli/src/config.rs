//! Run configuration: batch size, retry policy, DOP, bypass flags, and
//! affinity policy, loaded from a TOML file or built programmatically,
//! validated at construction — invalid batch size or an unknown entity is
//! a [`ConfigError`] raised before any remote call.

use engine::ImportOptions;
use executor::{BypassPlugins, ExecutionPolicy, RetryPolicy};
use model::batch::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE, MIN_BATCH_SIZE, clamp_batch_size};
use model::{Schema, SchemaError};
use pool::PoolConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid batch size {0}: must be between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE}")]
    InvalidBatchSize(usize),
    #[error("config references unknown entity: {0}")]
    UnknownEntity(#[from] SchemaError),
    #[error("could not read config file {0}: {1}")]
    Read(String, #[source] std::io::Error),
    #[error("could not parse config file {0}: {1}")]
    Parse(String, #[source] toml::de::Error),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassPluginsSetting {
    None,
    Sync,
    Async,
    All,
}

impl From<BypassPluginsSetting> for BypassPlugins {
    fn from(value: BypassPluginsSetting) -> Self {
        match value {
            BypassPluginsSetting::None => BypassPlugins::None,
            BypassPluginsSetting::Sync => BypassPlugins::Sync,
            BypassPluginsSetting::Async => BypassPlugins::Async,
            BypassPluginsSetting::All => BypassPlugins::All,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub batch_size: usize,
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub retry_jitter: f64,
    pub requested_dop: usize,
    pub bypass_plugins: BypassPluginsSetting,
    pub bypass_flows: bool,
    pub continue_on_error: bool,
    pub strip_owner_fields: bool,
    pub disable_affinity_cookie: bool,
    pub max_concurrent_per_source: usize,
    /// When non-empty, the only entities this run is allowed to touch;
    /// checked against the schema at construction.
    pub entities: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: 5,
            base_delay_ms: 250,
            max_delay_ms: 30_000,
            retry_jitter: 0.2,
            requested_dop: 8,
            bypass_plugins: BypassPluginsSetting::None,
            bypass_flows: false,
            continue_on_error: true,
            strip_owner_fields: false,
            disable_affinity_cookie: true,
            max_concurrent_per_source: connectors::DEFAULT_MAX_CONCURRENT,
            entities: Vec::new(),
        }
    }
}

impl MigrationConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(path.display().to_string(), e))
    }

    /// Invariants that must hold before any remote call is made: batch
    /// size in range, every named entity present in `schema`.
    pub fn validate(&self, schema: &Schema) -> Result<(), ConfigError> {
        if self.batch_size < MIN_BATCH_SIZE || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        for entity in &self.entities {
            if schema.get(entity).is_none() {
                return Err(ConfigError::UnknownEntity(SchemaError::UnknownEntity(entity.clone())));
            }
        }
        Ok(())
    }

    pub fn execution_policy(&self) -> ExecutionPolicy {
        ExecutionPolicy {
            batch_size: clamp_batch_size(self.batch_size),
            bypass_plugins: self.bypass_plugins.into(),
            bypass_flows: self.bypass_flows,
            continue_on_error: self.continue_on_error,
            retry: RetryPolicy::new(
                self.max_retries,
                Duration::from_millis(self.base_delay_ms),
                Duration::from_millis(self.max_delay_ms),
                self.retry_jitter,
            ),
            requested_dop: self.requested_dop,
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            disable_affinity_cookie: self.disable_affinity_cookie,
            max_concurrent_per_source: self.max_concurrent_per_source,
        }
    }

    /// Base `ImportOptions` from this config; callers override the
    /// per-invocation fields (`strip_owner_fields`, `user_mapping`,
    /// `dry_run`) that a config file does not carry.
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            disable_plugins: None,
            strip_owner_fields: self.strip_owner_fields,
            user_mapping: HashMap::new(),
            dry_run: false,
            continue_on_error: self.continue_on_error,
            bypass_plugins: self.bypass_plugins.into(),
            bypass_flows: self.bypass_flows,
            batch_size: clamp_batch_size(self.batch_size),
            tier_concurrency: self.requested_dop.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{DataType, EntitySchema, FieldSchema};

    fn schema() -> Schema {
        let mut schema = Schema::new();
        let mut account = EntitySchema::new("account");
        account.fields.push(FieldSchema::new("accountid", DataType::Id));
        schema.insert(account).unwrap();
        schema
    }

    #[test]
    fn default_config_validates_against_any_schema() {
        assert!(MigrationConfig::default().validate(&schema()).is_ok());
    }

    #[test]
    fn rejects_batch_size_out_of_bounds() {
        let mut config = MigrationConfig::default();
        config.batch_size = 0;
        assert!(matches!(
            config.validate(&schema()),
            Err(ConfigError::InvalidBatchSize(0))
        ));
    }

    #[test]
    fn rejects_unknown_entity_before_any_remote_call() {
        let mut config = MigrationConfig::default();
        config.entities = vec!["contact".to_string()];
        assert!(config.validate(&schema()).is_err());
    }

    #[test]
    fn parses_toml_overriding_defaults() {
        let toml_src = r#"
            batch_size = 250
            continue_on_error = false
            bypass_plugins = "all"
        "#;
        let config: MigrationConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.batch_size, 250);
        assert!(!config.continue_on_error);
        assert!(matches!(config.bypass_plugins, BypassPluginsSetting::All));
    }
}
