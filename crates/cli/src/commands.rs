use clap::{Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ImportModeArg {
    Create,
    Update,
    Upsert,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a migration archive (a directory holding a schema document
    /// and `data.xml`) into a target.
    Import {
        /// Directory containing the schema document and `data.xml`.
        #[arg(long)]
        archive: PathBuf,

        #[arg(long, value_enum, default_value = "create")]
        mode: ImportModeArg,

        /// ndjson file the built-in file target appends applied operations to.
        #[arg(long)]
        target: PathBuf,

        #[arg(long, help = "Run configuration file (TOML)")]
        config: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        continue_on_error: Option<bool>,

        #[arg(long)]
        strip_owner_fields: bool,

        /// JSON file mapping source owner ids to target owner ids,
        /// `{"<source-uuid>": "<target-uuid>"}`.
        #[arg(long)]
        user_mapping: Option<PathBuf>,
    },
    /// Load a single CSV file against one entity and import it into a target.
    CsvImport {
        #[arg(long)]
        schema: PathBuf,

        #[arg(long)]
        entity: String,

        /// JSON-encoded `connectors::csv::mapping::CsvMapping`.
        #[arg(long)]
        mapping: PathBuf,

        #[arg(long)]
        csv: PathBuf,

        #[arg(long)]
        target: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        continue_on_error: Option<bool>,
    },
    /// Parse a schema document and report entity/field/relationship counts.
    ValidateSchema {
        #[arg(long)]
        schema: PathBuf,
    },
    /// Parse a run configuration file and validate it against a schema.
    ValidateConfig {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        schema: PathBuf,
    },
}
