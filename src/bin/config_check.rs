//! Config Schema Check CLI
//!
//! Compiles package config schema fragments and validates config files
//! against the merged schema.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use familiar_config_schema::{
    compile_with_options, SchemaError, SchemaFragment, SchemaSettings, ValidationRequest, Visibility,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "config-schema-check")]
#[command(about = "Validate config files against package config schemas")]
struct Cli {
    /// Config schema fragment (JSON), may be repeated
    #[arg(short, long = "schema")]
    schemas: Vec<PathBuf>,

    /// Directory searched recursively for *.json schema fragments
    #[arg(long)]
    schema_dir: Option<PathBuf>,

    /// Config file (JSON or TOML), may be repeated. Later files are
    /// validated after earlier ones.
    #[arg(short, long = "config", required = true)]
    configs: Vec<PathBuf>,

    /// Only keep values with these visibilities (comma separated)
    #[arg(long, value_delimiter = ',')]
    visibility: Vec<Visibility>,

    /// Report validation errors as warnings instead of failing
    #[arg(long)]
    ignore_schema_errors: bool,

    /// Settings file (config-schema.toml)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print the processed config
    #[arg(long)]
    print: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = SchemaSettings::load_from(cli.settings.as_deref().and_then(Path::to_str))
        .context("failed to load settings")?;

    let fragments = load_fragments(&cli.schemas, cli.schema_dir.as_deref())?;
    let schema = compile_with_options(&fragments, &settings.compile)?;
    println!("🔍 Compiled {} schema fragment(s)", fragments.len());

    let batch = cli
        .configs
        .iter()
        .map(|path| Ok(ValidationRequest::new(read_config(path)?, path.display().to_string())))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut options = settings.process.clone();
    if !cli.visibility.is_empty() {
        options.visibility = Some(cli.visibility.clone());
    }
    options.ignore_schema_errors |= cli.ignore_schema_errors;
    options.with_deprecated_keys = true;

    match schema.process(batch, &options) {
        Ok(processed) => {
            for config in &processed {
                for key in config.deprecated_keys.iter().flatten() {
                    println!(
                        "⚠️  {}: '{}' is deprecated: {}",
                        config.context, key.key, key.description
                    );
                }
                if cli.print {
                    println!("{}", serde_json::to_string_pretty(&config.data)?);
                }
            }
            println!("✅ {} config file(s) valid", processed.len());
            Ok(())
        }
        Err(SchemaError::ConfigInvalid(errors)) => {
            println!("❌ {} validation error(s):", errors.len());
            println!("{errors}");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

/// Explicit fragments first, then the schema directory in file name order
fn load_fragments(files: &[PathBuf], dir: Option<&Path>) -> anyhow::Result<Vec<SchemaFragment>> {
    let mut paths: Vec<PathBuf> = files.to_vec();

    if let Some(dir) = dir {
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "json") {
                paths.push(path.to_path_buf());
            }
        }
    }

    paths
        .iter()
        .map(|path| {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read schema {}", path.display()))?;
            let value: Value = serde_json::from_str(&content)
                .with_context(|| format!("invalid JSON in schema {}", path.display()))?;
            Ok(SchemaFragment::new(path.display().to_string(), value))
        })
        .collect()
}

fn read_config(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;

    let value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("invalid TOML in config {}", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in config {}", path.display()))?,
    };
    Ok(value)
}
