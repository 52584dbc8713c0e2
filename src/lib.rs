pub mod aggregate;
pub mod chunk;
pub mod cli;
pub mod data;
pub mod diagnose;
pub mod domain;
pub mod error;
pub mod infer;
pub mod io_utils;
pub mod report;
pub mod schema;
pub mod sniff;
pub mod table;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, OutputFormat},
    diagnose::DiagnoseOptions,
    domain::{Domain, FieldSpec},
    schema::Schema,
    table::Table,
};

pub use crate::{
    diagnose::diagnose,
    error::{DiagnoseError, DiagnoseResult},
    report::DiagnosticReport,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tts_diagnose", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Diagnose(args) => handle_diagnose(&args),
        Commands::Domains => handle_domains(),
        Commands::Sniff(args) => handle_sniff(&args),
    }
}

fn handle_diagnose(args: &cli::DiagnoseArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Diagnosing '{}' with delimiter '{}' and encoding {}",
        args.input.display(),
        printable_delimiter(delimiter),
        encoding.name()
    );
    let schema = match &args.schema {
        Some(path) => Some(
            Schema::load(path).with_context(|| format!("Loading schema from {path:?}"))?,
        ),
        None => None,
    };
    let options = DiagnoseOptions {
        domain: args.domain,
        schema,
        chunk_size: args.chunk_size,
        top_n: args.top,
        delimiter,
        encoding,
        cancel: None,
    };
    debug!("Diagnose options: {options:?}");
    let report = diagnose::diagnose(&args.input, &options)
        .with_context(|| format!("Diagnosing {:?}", args.input))?;

    if let Some(path) = &args.emit_schema {
        report
            .schema
            .save(path)
            .with_context(|| format!("Writing schema to {path:?}"))?;
        info!("Resolved schema written to {path:?}");
    }
    match args.format {
        OutputFormat::Table => print!("{}", report.render_text()),
        OutputFormat::Json => println!(
            "{}",
            report.to_json().context("Serializing diagnostic report")?
        ),
    }
    Ok(())
}

fn handle_domains() -> Result<()> {
    let mut table = Table::new(["domain", "target", "required", "optional"]);
    for domain in Domain::ALL {
        let template = domain.template();
        let describe = |fields: &[FieldSpec]| {
            fields
                .iter()
                .map(|spec| format!("{}:{}", spec.name, spec.attribute_type))
                .collect::<Vec<_>>()
                .join(", ")
        };
        table.push_row(vec![
            domain.to_string(),
            template.target_field.to_string(),
            describe(template.required),
            describe(template.optional),
        ]);
    }
    print!("{}", table.render());
    Ok(())
}

fn handle_sniff(args: &cli::SniffArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let result = sniff::sniff(&args.input, delimiter, encoding)
        .with_context(|| format!("Sniffing {:?}", args.input))?;
    match &result.header {
        Some(header) => println!("header: {}", header.join(", ")),
        None => println!("header: none"),
    }
    println!("columns: {}", result.column_count);
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
