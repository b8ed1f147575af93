use crate::config::AppConfig;
use crate::core::DataInput;
use crate::domain::model::CodeTable;
use crate::utils::error::{Result, ServiceError};
use crate::utils::validation::validate_file_extensions;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "air-supply")]
#[command(about = "Tariff lookup backend for cross-border pricing")]
#[command(version)]
pub struct CliConfig {
    /// Path to TOML configuration file (defaults to ./air-supply.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Reload a code table from WITS (or a CSV export) into the vector store
    Refresh(RefreshArgs),
    /// Drop a code table and its stored column metadata
    Drop {
        #[arg(value_enum)]
        table: CodeTable,
    },
    /// Run a single tariff lookup and print the JSON response
    Lookup(LookupArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Override [server].host
    #[arg(long)]
    pub host: Option<String>,

    /// Override [server].port
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
pub struct RefreshArgs {
    #[arg(value_enum)]
    pub table: CodeTable,

    /// Import this CSV export instead of calling the WITS API
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Import the CSV file configured in [vector_store]
    #[arg(long, conflicts_with = "file")]
    pub from_configured_file: bool,
}

impl RefreshArgs {
    /// Resolves the refresh payload: `--file`, the configured CSV, or the WITS API.
    pub fn input(&self, config: &AppConfig) -> Result<DataInput> {
        let path = match (&self.file, self.from_configured_file) {
            (Some(path), _) => path.clone(),
            (None, true) => PathBuf::from(match self.table {
                CodeTable::HsCodes => &config.vector_store.hs_code_file,
                CodeTable::CountryCodes => &config.vector_store.country_code_file,
            }),
            (None, false) => return Ok(DataInput::Api),
        };

        let name = path.to_string_lossy().into_owned();
        validate_file_extensions("--file", std::slice::from_ref(&name), &["csv"])?;
        if !path.is_file() {
            return Err(ServiceError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", name),
            )));
        }
        Ok(DataInput::CsvFile(path))
    }
}

#[derive(Debug, Clone, Args)]
pub struct LookupArgs {
    /// Product description, e.g. "wireless earbuds"
    #[arg(long)]
    pub product: String,

    /// Importing country name
    #[arg(long)]
    pub reporter: String,

    /// Exporting country name
    #[arg(long)]
    pub partner: String,

    #[arg(long)]
    pub year: i32,
}
