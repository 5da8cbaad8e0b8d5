use crate::config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read the configuration file: {0}")]
    ConfigFileRead(#[from] std::io::Error),

    #[error("Invalid run configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Failed to deserialize JSON input: {0}")]
    ConfigDeserialize(#[from] serde_json::Error),

    #[error("Schema error: {0}")]
    Schema(#[from] model::SchemaError),

    #[error("Schema/data document error: {0}")]
    Codec(#[from] schema::CodecError),

    #[error("CSV load error: {0}")]
    File(#[from] connectors::FileError),

    #[error("Migration engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CliError {
    /// Maps onto the CLI's documented exit codes: `1` general failure,
    /// `2` invalid arguments, `3` not found.
    pub fn exit_code(&self) -> crate::shutdown::ExitCode {
        use crate::shutdown::ExitCode;
        match self {
            CliError::InvalidConfig(_) | CliError::Config(_) => ExitCode::InvalidArguments,
            CliError::ConfigFileRead(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ExitCode::NotFound
            }
            CliError::ShutdownRequested => ExitCode::GeneralFailure,
            _ => ExitCode::GeneralFailure,
        }
    }
}
