use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Clean the capital-projects dataset", long_about = None)]
pub struct Cli {
    /// Log debug output unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rename, retype and tidy a CSV file
    Clean(CleanArgs),
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Input CSV file to clean
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (the cleaned table is not written when omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Snake-case every column name before any mapping is applied
    #[arg(long = "lint-names")]
    pub lint_names: bool,
    /// JSON object mapping current column names to new names
    #[arg(long = "rename-map")]
    pub rename_map: Option<PathBuf>,
    /// JSON object mapping column names to dtype tags
    /// (integer, float, signed, unsigned, datetime, string)
    #[arg(long = "dtype-map")]
    pub dtype_map: Option<PathBuf>,
    /// Blank out cells that fail dtype conversion instead of keeping them
    #[arg(long)]
    pub coerce: bool,
    /// Drop records missing a value in any of these columns
    #[arg(long = "drop-missing", value_delimiter = ',')]
    pub drop_missing: Vec<String>,
    /// Composite key of the form `name=col_a,col_b`
    #[arg(long = "key")]
    pub key: Option<String>,
    /// Separator placed between composite key parts
    #[arg(long = "key-separator", default_value = "_")]
    pub key_separator: String,
    /// Sort records ascending by these columns
    #[arg(long = "sort", value_delimiter = ',')]
    pub sort: Vec<String>,
    /// Write the dtype conversion error report as JSON to this path
    #[arg(long = "errors-report")]
    pub errors_report: Option<PathBuf>,
    /// Keep an untouched copy of the input for the record-count summary
    #[arg(long = "copy-input")]
    pub copy_input: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Output delimiter (defaults to the output file extension)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

/// Splits `name=col_a,col_b` into the key name and its source columns.
pub fn parse_key_spec(spec: &str) -> Result<(String, Vec<String>), String> {
    let (name, columns) = spec
        .split_once('=')
        .ok_or_else(|| format!("Composite key '{spec}' must look like name=col_a,col_b"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Composite key '{spec}' is missing a name"));
    }
    let columns = columns
        .split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if columns.is_empty() {
        return Err(format!("Composite key '{name}' lists no columns"));
    }
    Ok((name.to_string(), columns))
}
