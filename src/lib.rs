pub mod clean;
pub mod cli;
pub mod data;
pub mod dtypes;
pub mod error;
pub mod io_utils;
pub mod mapping;
pub mod table;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    clean::Dataset,
    cli::{CleanArgs, Cli, Commands},
};

pub use crate::{
    clean::rename_columns,
    dtypes::{coerce_datetime, set_dtypes},
    error::{CleanError, CleanResult},
    mapping::{ColumnMapping, resolve_mapping},
    table::Table,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("caproj", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Clean(args) => handle_clean(&args),
    }
}

fn handle_clean(args: &CleanArgs) -> Result<()> {
    info!(
        "Cleaning '{}' with delimiter '{}'",
        args.input.display(),
        args.delimiter
            .map(printable_delimiter)
            .unwrap_or_else(|| "auto".to_string())
    );
    let mut dataset = Dataset::from_file_with(
        &args.input,
        args.delimiter,
        args.input_encoding.as_deref(),
        args.copy_input,
    )
    .with_context(|| format!("Reading {:?}", args.input))?;

    if args.lint_names {
        dataset.lint_colnames();
    }
    if let Some(path) = &args.rename_map {
        dataset.rename_columns(None, Some(path.as_path()));
    }
    if let Some(path) = &args.dtype_map {
        dataset
            .set_dtypes(None, Some(path.as_path()), args.coerce)
            .with_context(|| format!("Converting dtypes using {path:?}"))?;
    }
    if !args.drop_missing.is_empty() {
        let columns = trimmed(&args.drop_missing);
        dataset
            .remove_missing_records(&columns)
            .context("Removing records with missing values")?;
    }
    if let Some(spec) = &args.key {
        let (name, columns) = cli::parse_key_spec(spec).map_err(|err| anyhow!(err))?;
        let columns = columns.iter().map(String::as_str).collect::<Vec<_>>();
        dataset
            .add_composite_key(&columns, &name, &args.key_separator)
            .with_context(|| format!("Building composite key '{name}'"))?;
    }
    if !args.sort.is_empty() {
        let columns = trimmed(&args.sort);
        debug!("Sort columns: {:?}", columns);
        dataset.sort_values(&columns).context("Sorting records")?;
    }

    if let Some(path) = &args.errors_report {
        match &dataset.dtype_errors {
            Some(report) => {
                let serialized = serde_json::to_string_pretty(report)
                    .context("Serializing dtype error report")?;
                fs::write(path, serialized)
                    .with_context(|| format!("Writing dtype error report to {path:?}"))?;
                info!(
                    "Dtype error report with {} error(s) across {} column(s) written to {:?}",
                    report.total_errors(),
                    report.len(),
                    path
                );
            }
            None => info!("No dtype conversion ran; error report {path:?} not written"),
        }
    }

    if let Some(input) = &dataset.input {
        info!(
            "Input held {} record(s); cleaned table holds {}",
            input.row_count(),
            dataset.table.row_count()
        );
    }
    if let Some(output) = &args.output {
        dataset
            .to_file_with(output, args.output_delimiter)
            .with_context(|| format!("Writing output to {output:?}"))?;
    }
    Ok(())
}

fn trimmed(values: &[String]) -> Vec<&str> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect()
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
