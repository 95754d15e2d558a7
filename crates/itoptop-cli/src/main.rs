//! itoptop CLI
//!
//! Inspect the indirect-reference tables derived from an iTop data-dictionary
//! export:
//! - `schemas`: list every class id
//! - `external-fields`: external field -> (key, target schema, target field)
//! - `linked-sets`: linked set -> (link class, key to me, key to remote)
//! - `resolve-all`: both tables for every class, failures reported per class

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use itoptop_datamodel::{
    DataModel, EngineConfig, ExternalFieldTable, LinkedSetTable, DEFAULT_ROOT_CLASS,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "itoptop")]
#[command(author, version, about = "Resolve iTop data-dictionary references")]
struct Cli {
    /// Emit JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Base class that ends ancestor resolution.
    #[arg(
        long,
        global = true,
        env = "ITOPTOP_ROOT_CLASS",
        default_value = DEFAULT_ROOT_CLASS
    )]
    root_class: String,

    /// Raise log verbosity (overridden by RUST_LOG).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every schema (class id) in the export.
    Schemas {
        /// Data-dictionary XML export.
        file: PathBuf,
    },

    /// Show the merged external-field table for a schema.
    ExternalFields { file: PathBuf, schema: String },

    /// Show the linked-set table for a schema.
    LinkedSets { file: PathBuf, schema: String },

    /// Resolve both tables for every schema.
    ResolveAll { file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = EngineConfig::default().with_root_class(cli.root_class.clone());

    match &cli.command {
        Commands::Schemas { file } => {
            let engine = open(file, config)?;
            if cli.json {
                print_json(&engine.list_schemas())?;
            } else {
                for schema in engine.list_schemas() {
                    println!("{schema}");
                }
            }
        }
        Commands::ExternalFields { file, schema } => {
            let engine = open(file, config)?;
            ensure_schema(&engine, schema)?;
            let table = engine
                .resolve_external_fields(schema)
                .with_context(|| format!("resolving external fields of `{schema}`"))?;
            if cli.json {
                print_json(&*table)?;
            } else {
                print_external(&table);
            }
        }
        Commands::LinkedSets { file, schema } => {
            let engine = open(file, config)?;
            ensure_schema(&engine, schema)?;
            let table = engine
                .resolve_linked_sets(schema)
                .with_context(|| format!("resolving linked sets of `{schema}`"))?;
            if cli.json {
                print_json(&*table)?;
            } else {
                print_linked(&table);
            }
        }
        Commands::ResolveAll { file } => {
            let engine = open(file, config)?;
            let report = resolve_all(&engine);
            if cli.json {
                print_json(&report)?;
            } else {
                print_report(&report);
            }
        }
    }

    Ok(())
}

fn default_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(file: &Path, config: EngineConfig) -> Result<DataModel> {
    DataModel::open(file, config).with_context(|| format!("loading {}", file.display()))
}

fn ensure_schema(engine: &DataModel, schema: &str) -> Result<()> {
    anyhow::ensure!(
        engine.contains_schema(schema),
        "no class `{schema}` in the export ({} classes; try `itoptop schemas`)",
        engine.list_schemas().len()
    );
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_external(table: &ExternalFieldTable) {
    if table.is_empty() {
        println!("{}", "(no external fields)".dimmed());
    }
    for (field, lookup) in table {
        println!(
            "{} {} {}.{} via {}",
            field.bold(),
            "->".dimmed(),
            lookup.target_schema.cyan(),
            lookup.target_field,
            lookup.key.yellow()
        );
    }
}

fn print_linked(table: &LinkedSetTable) {
    if table.is_empty() {
        println!("{}", "(no linked sets)".dimmed());
    }
    for (field, lookup) in table {
        println!(
            "{} {} {} ({} -> me, {} -> remote)",
            field.bold(),
            "->".dimmed(),
            lookup.linked_class.cyan(),
            lookup.ext_key_to_me.yellow(),
            lookup.ext_key_to_remote.yellow()
        );
    }
}

// ============================================================================
// resolve-all
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum SchemaReport {
    Ok {
        external_fields: ExternalFieldTable,
        linked_sets: LinkedSetTable,
    },
    Error {
        message: String,
    },
}

fn resolve_all(engine: &DataModel) -> BTreeMap<String, SchemaReport> {
    engine
        .list_schemas()
        .iter()
        .map(|schema| {
            let resolved = engine.resolve_external_fields(schema).and_then(|external| {
                let linked = engine.resolve_linked_sets(schema)?;
                Ok(((*external).clone(), (*linked).clone()))
            });
            let report = match resolved {
                Ok((external_fields, linked_sets)) => SchemaReport::Ok {
                    external_fields,
                    linked_sets,
                },
                Err(err) => {
                    tracing::warn!(schema = %schema, error = %err, "schema did not resolve");
                    SchemaReport::Error {
                        message: err.to_string(),
                    }
                }
            };
            (schema.clone(), report)
        })
        .collect()
}

fn print_report(report: &BTreeMap<String, SchemaReport>) {
    let mut failures = 0usize;
    for (schema, entry) in report {
        match entry {
            SchemaReport::Ok {
                external_fields,
                linked_sets,
            } => println!(
                "{} {} {} external, {} linked",
                "ok".green(),
                schema.bold(),
                external_fields.len(),
                linked_sets.len()
            ),
            SchemaReport::Error { message } => {
                failures += 1;
                println!("{} {} {}", "error".red(), schema.bold(), message);
            }
        }
    }
    println!(
        "\n{} schemas, {} failed",
        report.len(),
        if failures == 0 {
            failures.to_string().green()
        } else {
            failures.to_string().red()
        }
    );
}
