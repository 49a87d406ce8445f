//! comprehend CLI - compile a query tree to SQL
//!
//! Usage:
//!   comprehend compile --catalog <catalog.json> --query <query.json> [--scope <scope.json>]
//!                      [--dialect <dialect>] [--config <comprehend.toml>] [--format sql|json]
//!   comprehend catalog <catalog.json>
//!
//! Examples:
//!   comprehend compile --catalog shop.json --query adults.json --dialect tsql
//!   RUST_LOG=comprehend=debug comprehend compile --catalog shop.json --query adults.json

use clap::{Parser, Subcommand, ValueEnum};
use comprehend::bind::Scope;
use comprehend::catalog::{CatalogSpec, SchemaCatalog};
use comprehend::compile::{BoundQuery, Compiler};
use comprehend::config::CompilerSettings;
use comprehend::sql::Dialect;
use comprehend::tree::QueryRoot;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "comprehend")]
#[command(about = "Compile comprehension query trees to multi-dialect SQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON query tree to SQL
    Compile {
        /// Path to the JSON catalog
        #[arg(long)]
        catalog: PathBuf,

        /// Path to the JSON query tree
        #[arg(long)]
        query: PathBuf,

        /// Path to a JSON calling scope (cells, locals, globals)
        #[arg(long)]
        scope: Option<PathBuf>,

        /// SQL dialect to generate (overrides the config file)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Path to comprehend.toml
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        format: OutputFormat,
    },

    /// Check a JSON catalog and list its entities
    Catalog {
        /// Path to the JSON catalog
        file: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Postgres,
    Duckdb,
    Mysql,
    Sqlite,
    Tsql,
    Oracle,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Duckdb => Dialect::DuckDb,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Tsql => Dialect::TSql,
            DialectArg::Oracle => Dialect::Oracle,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// SQL followed by one comment line per parameter
    Sql,
    /// SQL, style and parameters as JSON
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            catalog,
            query,
            scope,
            dialect,
            config,
            format,
        } => cmd_compile(&catalog, &query, scope.as_deref(), dialect, config.as_deref(), format),
        Commands::Catalog { file } => cmd_catalog(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_compile(
    catalog: &Path,
    query: &Path,
    scope: Option<&Path>,
    dialect: Option<DialectArg>,
    config: Option<&Path>,
    format: OutputFormat,
) -> Result<(), String> {
    let mut settings =
        CompilerSettings::load(config).map_err(|e| format!("Configuration error: {e}"))?;
    if let Some(dialect) = dialect {
        settings = settings.with_dialect(dialect.into());
    }

    let catalog = load_catalog(catalog)?;
    let root: QueryRoot = read_json(query)?;
    let scope: Scope = match scope {
        Some(path) => read_json(path)?,
        None => Scope::default(),
    };

    let compiler = Compiler::with_settings(Arc::new(catalog), settings);
    let bound = compiler
        .compile(&root, &scope)
        .map_err(|e| format!("Compilation error: {e}"))?;

    match format {
        OutputFormat::Sql => print_sql(&bound),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&bound)
                .map_err(|e| format!("Failed to serialize output: {e}"))?;
            println!("{json}");
        }
    }
    Ok(())
}

fn print_sql(bound: &BoundQuery) {
    println!("{}", bound.sql);
    match bound.named_params() {
        Some(named) => {
            for (name, value) in named {
                println!("-- {name} = {value:?}");
            }
        }
        None => {
            for (i, value) in bound.params.iter().enumerate() {
                println!("-- {} = {value:?}", i + 1);
            }
        }
    }
}

fn cmd_catalog(file: &Path) -> Result<(), String> {
    let spec: CatalogSpec = read_json(file)?;
    SchemaCatalog::from_spec(&spec).map_err(|e| format!("Invalid catalog: {e}"))?;

    println!("File: {}", file.display());
    println!();
    println!("Entities:");
    for entity in &spec.entities {
        println!(
            "  - {} (table: \"{}\", {} attributes)",
            entity.name,
            entity.table,
            entity.attributes.len()
        );
    }
    Ok(())
}

fn load_catalog(path: &Path) -> Result<SchemaCatalog, String> {
    let spec: CatalogSpec = read_json(path)?;
    SchemaCatalog::from_spec(&spec).map_err(|e| format!("Invalid catalog: {e}"))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let source = fs::read_to_string(path)
        .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?;
    serde_json::from_str(&source).map_err(|e| format!("Error parsing '{}': {}", path.display(), e))
}
