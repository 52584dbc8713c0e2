use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{chunk::DEFAULT_CHUNK_SIZE, diagnose::DEFAULT_TOP_N, domain::Domain};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Diagnose target time-series CSV data before forecasting",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve the schema of a dataset, validate it against a domain and summarize its series
    Diagnose(DiagnoseArgs),
    /// List the supported dataset domains and their fields
    Domains,
    /// Report whether a CSV file starts with a header row and how many columns it has
    Sniff(SniffArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct DiagnoseArgs {
    /// CSV file or directory of CSV files to diagnose
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Dataset domain (e.g. RETAIL, "EC2 CAPACITY"); required for headerless files without a schema
    #[arg(short = 'd', long, value_parser = parse_domain)]
    pub domain: Option<Domain>,
    /// Schema document (JSON or YAML) with an "Attributes" list; inferred from the data when omitted
    #[arg(short = 's', long)]
    pub schema: Option<PathBuf>,
    /// Maximum number of rows held in memory per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    pub chunk_size: usize,
    /// Number of most frequent values listed per dimension and series (0 lists all)
    #[arg(long = "top", default_value_t = DEFAULT_TOP_N)]
    pub top: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Write the resolved schema to this path (.json, .yaml or .yml)
    #[arg(long = "emit-schema")]
    pub emit_schema: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SniffArgs {
    /// CSV file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
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

pub fn parse_domain(value: &str) -> Result<Domain, String> {
    value.parse::<Domain>().map_err(|err| err.to_string())
}

fn parse_chunk_size(value: &str) -> Result<usize, String> {
    let size = value
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("Invalid chunk size '{value}': {err}"))?;
    if size == 0 {
        return Err("Chunk size must be at least 1".to_string());
    }
    Ok(size)
}
