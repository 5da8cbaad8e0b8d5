use thiserror::Error;

/// Aggregates failures from the components the engine drives. Per-record
/// failures never surface here — those land in `MigrationResult::errors`
/// (spec §7 "the engine converts per-record failures into errors[]").
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("schema error: {0}")]
    Schema(#[from] model::SchemaError),
    #[error("pool error: {0}")]
    Pool(#[from] connectors::PoolError),
    #[error("export source error: {0}")]
    Export(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("unknown entity '{0}' referenced by migration data")]
    UnknownEntity(String),
}
