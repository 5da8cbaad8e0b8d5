use crate::{
    commands::{Commands, ImportModeArg},
    config::MigrationConfig,
    env::EnvManager,
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
    target::FileClientFactory,
};
use clap::Parser;
use connectors::ClientFactory;
use connectors::csv::loader::{CsvLoader, StaticLookupResolver};
use connectors::csv::mapping::CsvMapping;
use engine::{ImportMode, ImportOptions, MigrationEngine};
use executor::BulkExecutor;
use model::{MigrationData, MigrationResult, Schema, SchemaError};
use pool::ConnectionPool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use uuid::Uuid;

mod commands;
mod config;
mod env;
mod error;
mod output;
mod shutdown;
mod target;

#[derive(Parser)]
#[command(name = "stratum", version = "0.1.0", about = "Bulk migration engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit ndjson instead of human-readable progress/summary lines.
    #[arg(long, global = true)]
    json: bool,

    /// Load additional environment variables from a `.env`-style file.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let exit_code = match run_cli().await {
        Ok(code) => code,
        Err(CliError::ShutdownRequested) => {
            info!("shutdown requested, exiting");
            ExitCode::GeneralFailure
        }
        Err(e) => {
            error!("{e}");
            e.exit_code()
        }
    };

    process::exit(exit_code.as_i32());
}

async fn run_cli() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    let shutdown = ShutdownCoordinator::new(cancel.clone());
    shutdown.register_handlers();

    if let Some(path) = &cli.env_file {
        let mut env_manager = EnvManager::new();
        env_manager.load_from_file(path)?;
    }

    match cli.command {
        Commands::Import {
            archive,
            mode,
            target,
            config,
            dry_run,
            continue_on_error,
            strip_owner_fields,
            user_mapping,
        } => {
            run_import(
                &archive,
                mode,
                &target,
                config.as_deref(),
                dry_run,
                continue_on_error,
                strip_owner_fields,
                user_mapping.as_deref(),
                cli.json,
                cancel,
            )
            .await
        }
        Commands::CsvImport {
            schema,
            entity,
            mapping,
            csv,
            target,
            config,
            dry_run,
            continue_on_error,
        } => {
            run_csv_import(
                &schema,
                &entity,
                &mapping,
                &csv,
                &target,
                config.as_deref(),
                dry_run,
                continue_on_error,
                cli.json,
                cancel,
            )
            .await
        }
        Commands::ValidateSchema { schema } => run_validate_schema(&schema),
        Commands::ValidateConfig { config, schema } => run_validate_config(&config, &schema),
    }
}

fn read_schema_document(archive: &Path) -> Result<Schema, CliError> {
    for name in ["schema.xml", "data_schema.xml"] {
        let path = archive.join(name);
        if path.exists() {
            let xml = std::fs::read_to_string(&path)?;
            return Ok(schema::read_schema(&xml)?);
        }
    }
    Err(CliError::Unexpected(format!(
        "no schema.xml or data_schema.xml found under {}",
        archive.display()
    )))
}

fn load_config(path: Option<&Path>, schema: &Schema) -> Result<MigrationConfig, CliError> {
    let config = match path {
        Some(path) => MigrationConfig::from_file(path)?,
        None => MigrationConfig::default(),
    };
    config.validate(schema)?;
    Ok(config)
}

fn load_user_mapping(path: Option<&Path>) -> Result<HashMap<Uuid, Uuid>, CliError> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    let text = std::fs::read_to_string(path)?;
    let raw: HashMap<Uuid, Uuid> = serde_json::from_str(&text)?;
    Ok(raw)
}

fn exit_code_for(result: &MigrationResult) -> ExitCode {
    if result.success {
        ExitCode::Success
    } else if result.failure_count > 0 && result.success_count > 0 {
        ExitCode::PartialSuccess
    } else {
        ExitCode::GeneralFailure
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_import(
    archive: &Path,
    mode: ImportModeArg,
    target: &Path,
    config_path: Option<&Path>,
    dry_run: bool,
    continue_on_error: Option<bool>,
    strip_owner_fields: bool,
    user_mapping_path: Option<&Path>,
    json: bool,
    cancel: CancellationToken,
) -> Result<ExitCode, CliError> {
    let schema = read_schema_document(archive)?;
    let config = load_config(config_path, &schema)?;

    let data_xml = std::fs::read_to_string(archive.join("data.xml"))?;
    let data: MigrationData = schema::read_data(&data_xml, &schema)?;

    let mut options = ImportOptions {
        strip_owner_fields,
        user_mapping: load_user_mapping(user_mapping_path)?,
        dry_run,
        ..config.import_options()
    };
    if let Some(flag) = continue_on_error {
        options.continue_on_error = flag;
    }

    let mode = match mode {
        ImportModeArg::Create => ImportMode::Create,
        ImportModeArg::Update => ImportMode::Update,
        ImportModeArg::Upsert => ImportMode::Upsert,
    };

    let factory: Arc<dyn ClientFactory> = Arc::new(FileClientFactory::new(target));
    let pool = ConnectionPool::new(vec![factory], config.pool_config());
    let engine = MigrationEngine::new(&pool);

    let reporter = output::reporter_for(json);
    let (tx, rx) = mpsc::channel(256);
    let reporter_handle = output::spawn_reporter(&reporter, rx);

    let result = engine.import(&data, mode, &options, tx, cancel).await?;
    let _ = reporter_handle.await;
    output::print_summary(&reporter, &result)?;

    Ok(exit_code_for(&result))
}

#[allow(clippy::too_many_arguments)]
async fn run_csv_import(
    schema_path: &Path,
    entity: &str,
    mapping_path: &Path,
    csv_path: &Path,
    target: &Path,
    config_path: Option<&Path>,
    dry_run: bool,
    continue_on_error: Option<bool>,
    json: bool,
    cancel: CancellationToken,
) -> Result<ExitCode, CliError> {
    let schema_xml = std::fs::read_to_string(schema_path)?;
    let schema = schema::read_schema(&schema_xml)?;
    schema
        .get(entity)
        .ok_or_else(|| SchemaError::UnknownEntity(entity.to_string()))?;

    let config = load_config(config_path, &schema)?;

    let mapping_json = std::fs::read_to_string(mapping_path)?;
    let mapping: CsvMapping = serde_json::from_str(&mapping_json)?;

    let resolver = StaticLookupResolver::new();
    let loader = CsvLoader::new(&mapping, &resolver);
    let items = loader
        .load(csv_path)?
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let mut policy = config.execution_policy();
    if let Some(flag) = continue_on_error {
        policy.continue_on_error = flag;
    }

    let factory: Arc<dyn ClientFactory> = Arc::new(FileClientFactory::new(target));
    let pool = ConnectionPool::new(vec![factory], config.pool_config());

    let reporter = output::reporter_for(json);
    let (tx, rx) = mpsc::channel(256);
    let reporter_handle = output::spawn_reporter(&reporter, rx);

    let result = if dry_run {
        let mut result = MigrationResult::empty();
        result.total_records = items.len() as u64;
        result.skipped_count = Some(items.len() as u64);
        result
    } else {
        let executor = BulkExecutor::new(&pool);
        executor.execute(items, &policy, tx, cancel).await
    };

    let _ = reporter_handle.await;
    output::print_summary(&reporter, &result)?;

    Ok(exit_code_for(&result))
}

fn run_validate_schema(path: &Path) -> Result<ExitCode, CliError> {
    let xml = std::fs::read_to_string(path)?;
    let schema = schema::read_schema(&xml)?;
    for entity in schema.entities() {
        entity.validate()?;
    }
    let relationships: usize = schema.entities().iter().map(|e| e.relationships.len()).sum();
    let fields: usize = schema.entities().iter().map(|e| e.fields.len()).sum();
    println!(
        "entities={} fields={} relationships={}",
        schema.entities().len(),
        fields,
        relationships
    );
    Ok(ExitCode::Success)
}

fn run_validate_config(config_path: &Path, schema_path: &Path) -> Result<ExitCode, CliError> {
    let xml = std::fs::read_to_string(schema_path)?;
    let schema = schema::read_schema(&xml)?;
    let config = MigrationConfig::from_file(config_path)?;
    config.validate(&schema)?;
    println!("configuration is valid");
    Ok(ExitCode::Success)
}
