//! End-to-end diagnosis of a target time-series dataset.
//!
//! A run moves through [`Stage`]s: input files are resolved, the schema is
//! resolved (up front when one is supplied, otherwise from the first chunk of
//! data), every file is streamed chunk by chunk into the aggregation state,
//! and the report is assembled. The first error aborts the run and is
//! returned as is. A run can be cancelled between chunks through
//! [`DiagnoseOptions::cancel`].

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};

use crate::{
    aggregate::AggregationState,
    chunk::{ChunkReader, DEFAULT_CHUNK_SIZE, RawChunk, TypedChunk},
    domain::Domain,
    error::{DiagnoseError, DiagnoseResult},
    infer::infer_schema,
    io_utils::{self, DEFAULT_CSV_DELIMITER},
    report::{DiagnosticReport, DiagnosticWarning},
    schema::{FieldPartition, Schema},
    sniff::{SniffResult, sniff},
    validate::{FieldClassification, SchemaOrigin, classify_without_domain, validate},
};

pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone)]
pub struct DiagnoseOptions {
    pub domain: Option<Domain>,
    /// Explicit schema; when absent the schema is inferred from the data.
    pub schema: Option<Schema>,
    pub chunk_size: usize,
    /// Rows listed per dimension and series table; 0 lists everything.
    pub top_n: usize,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for DiagnoseOptions {
    fn default() -> Self {
        Self {
            domain: None,
            schema: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            top_n: DEFAULT_TOP_N,
            delimiter: DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
            cancel: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingInputs,
    ResolvingSchema,
    Streaming,
    Reporting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::ResolvingInputs => "resolving inputs",
            Stage::ResolvingSchema => "resolving schema",
            Stage::Streaming => "streaming",
            Stage::Reporting => "reporting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A schema that passed domain validation, with its column roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    pub schema: Schema,
    pub origin: SchemaOrigin,
    pub classification: FieldClassification,
    pub partition: FieldPartition,
}

impl ResolvedSchema {
    pub fn resolve(
        schema: Schema,
        domain: Option<Domain>,
        origin: SchemaOrigin,
    ) -> DiagnoseResult<Self> {
        let classification = match domain {
            Some(domain) => validate(&schema, domain, origin)?,
            None => classify_without_domain(&schema),
        };
        let partition = FieldPartition::derive(&schema, domain.map(Domain::template))?;
        Ok(Self {
            schema,
            origin,
            classification,
            partition,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFiles {
    pub files: Vec<PathBuf>,
    /// Files under the input directory skipped for lacking a `.csv` extension.
    pub excluded: usize,
}

/// A single file is used as given; a directory is walked recursively and
/// only `.csv` files are kept, in sorted path order.
pub fn resolve_inputs(path: &Path) -> DiagnoseResult<InputFiles> {
    if path.is_file() {
        return Ok(InputFiles {
            files: vec![path.to_path_buf()],
            excluded: 0,
        });
    }
    if !path.is_dir() {
        return Err(DiagnoseError::InvalidPath {
            path: path.to_path_buf(),
        });
    }
    let mut found = Vec::new();
    collect_files(path, &mut found)?;
    found.sort();
    let total = found.len();
    let files = found
        .into_iter()
        .filter(|file| io_utils::has_csv_extension(file))
        .collect::<Vec<_>>();
    if files.is_empty() {
        return Err(DiagnoseError::NoInputFiles {
            path: path.to_path_buf(),
        });
    }
    Ok(InputFiles {
        excluded: total - files.len(),
        files,
    })
}

fn collect_files(dir: &Path, found: &mut Vec<PathBuf>) -> DiagnoseResult<()> {
    let io_error = |source| DiagnoseError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            collect_files(&path, found)?;
        } else if path.is_file() {
            found.push(path);
        }
    }
    Ok(())
}

pub fn diagnose(path: &Path, options: &DiagnoseOptions) -> DiagnoseResult<DiagnosticReport> {
    DiagnoseRun::new(options).run(path)
}

struct Resolution {
    resolved: ResolvedSchema,
    state: AggregationState,
}

impl Resolution {
    fn new(resolved: ResolvedSchema) -> Self {
        let state = AggregationState::new(&resolved.schema, &resolved.partition);
        Self { resolved, state }
    }
}

struct DiagnoseRun<'a> {
    options: &'a DiagnoseOptions,
    stage: Stage,
    resolution: Option<Resolution>,
    warnings: Vec<DiagnosticWarning>,
}

impl<'a> DiagnoseRun<'a> {
    fn new(options: &'a DiagnoseOptions) -> Self {
        Self {
            options,
            stage: Stage::ResolvingInputs,
            resolution: None,
            warnings: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        info!("Diagnosis stage: {stage}");
        self.stage = stage;
    }

    fn run(&mut self, path: &Path) -> DiagnoseResult<DiagnosticReport> {
        let result = self.execute(path);
        if let Err(err) = &result {
            warn!("Diagnosis failed while {}: {err}", self.stage);
            self.enter(Stage::Failed);
        }
        result
    }

    fn check_cancelled(&self, files_completed: usize) -> DiagnoseResult<()> {
        match &self.options.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => {
                Err(DiagnoseError::Cancelled { files_completed })
            }
            _ => Ok(()),
        }
    }

    fn adopt(&mut self, resolved: ResolvedSchema) -> Resolution {
        self.warnings
            .extend(resolved.classification.warnings.iter().cloned());
        Resolution::new(resolved)
    }

    fn execute(&mut self, path: &Path) -> DiagnoseResult<DiagnosticReport> {
        self.enter(Stage::ResolvingInputs);
        let inputs = resolve_inputs(path)?;
        if inputs.excluded > 0 {
            let warning = DiagnosticWarning::ExcludedFiles {
                count: inputs.excluded,
            };
            warn!("{warning}");
            self.warnings.push(warning);
        }
        info!(
            "Found {} target time-series file(s) under {path:?}",
            inputs.files.len()
        );

        self.enter(Stage::ResolvingSchema);
        if let Some(schema) = &self.options.schema {
            let resolved =
                ResolvedSchema::resolve(schema.clone(), self.options.domain, SchemaOrigin::Explicit)?;
            let resolution = self.adopt(resolved);
            self.resolution = Some(resolution);
        }

        self.enter(Stage::Streaming);
        for (file_index, file) in inputs.files.iter().enumerate() {
            self.check_cancelled(file_index)?;
            self.stream_file(file_index, file)?;
        }

        self.enter(Stage::Reporting);
        let Resolution { resolved, state } =
            self.resolution
                .take()
                .ok_or_else(|| DiagnoseError::SchemaIndeterminate {
                    reason: "no data rows were found to infer a schema from".into(),
                })?;
        if state.records_with_nulls() > 0 {
            let warning = DiagnosticWarning::RecordsWithNulls {
                count: state.records_with_nulls(),
            };
            warn!("{warning}");
            self.warnings.push(warning);
        }
        let report = DiagnosticReport::build(
            inputs.files,
            self.options.domain,
            resolved,
            &state,
            std::mem::take(&mut self.warnings),
            self.options.top_n,
        );
        info!(
            "Diagnosed {} record(s) across {} series",
            report.total_records, report.series.distinct_series
        );
        self.enter(Stage::Done);
        Ok(report)
    }

    fn stream_file(&mut self, file_index: usize, path: &Path) -> DiagnoseResult<()> {
        let layout = sniff(path, self.options.delimiter, self.options.encoding)?;
        if layout.column_count == 0 {
            warn!("Skipping empty file {path:?}");
            return Ok(());
        }
        let origin = match &self.resolution {
            Some(resolution) => {
                let resolved = &resolution.resolved;
                resolved.schema.ensure_layout(
                    path,
                    resolved.origin,
                    layout.header.as_deref(),
                    layout.column_count,
                )?;
                resolved.origin
            }
            None => SchemaOrigin::Inferred,
        };
        info!("Reading {path:?}");

        let mut reader = ChunkReader::open(
            path,
            file_index,
            &layout,
            self.options.delimiter,
            self.options.encoding,
            self.options.chunk_size,
            origin,
        )?;
        let mut chunks = 0usize;
        while let Some(raw) = reader.next_chunk()? {
            let resolution = match self.resolution.take() {
                Some(resolution) => resolution,
                None => self.infer_resolution(&raw, &layout, path)?,
            };
            let resolution = self.resolution.insert(resolution);
            let rows = raw.len();
            let typed = TypedChunk::parse(raw, &resolution.resolved.schema, path)?;
            resolution.state.absorb(&typed);
            chunks += 1;
            debug!("Aggregated chunk {chunks} of {path:?} ({rows} row(s))");
            self.check_cancelled(file_index)?;
        }
        info!("Finished {path:?}: {} row(s) in {chunks} chunk(s)", reader.rows_read());
        Ok(())
    }

    fn infer_resolution(
        &mut self,
        chunk: &RawChunk,
        layout: &SniffResult,
        path: &Path,
    ) -> DiagnoseResult<Resolution> {
        self.enter(Stage::ResolvingSchema);
        let schema = infer_schema(
            chunk,
            layout.column_count,
            layout.header.as_deref(),
            self.options.domain,
            path,
        )?;
        let resolved = ResolvedSchema::resolve(schema, self.options.domain, SchemaOrigin::Inferred)?;
        let resolution = self.adopt(resolved);
        self.enter(Stage::Streaming);
        Ok(resolution)
    }
}
