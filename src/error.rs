//! Error type for diagnose runs.
//!
//! Every variant is fatal to the run that raised it. Variants carry enough
//! context (file, column, expected vs. actual) to act on the message alone.

use std::path::PathBuf;

use thiserror::Error;

use crate::{schema::TypeTag, validate::SchemaOrigin};

pub type DiagnoseResult<T> = Result<T, DiagnoseError>;

#[derive(Debug, Error)]
pub enum DiagnoseError {
    // === Input resolution ===
    /// Path is neither a readable file nor a directory.
    #[error("path must be an existing file or directory, got {path:?}")]
    InvalidPath { path: PathBuf },

    /// Path resolved to zero candidate CSV files.
    #[error("no CSV input files found under {path:?}")]
    NoInputFiles { path: PathBuf },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unknown input encoding '{label}'")]
    UnknownEncoding { label: String },

    #[error("failed to decode line {line} of {path:?} as {encoding}")]
    Decode {
        path: PathBuf,
        line: u64,
        encoding: &'static str,
    },

    // === Schema attributes ===
    #[error("'{name}' is not a valid attribute name (expected [A-Za-z][A-Za-z0-9_]*)")]
    InvalidAttributeName { name: String },

    #[error("'{type_name}' is not a valid attribute type (expected one of {})", TypeTag::keywords().join(", "))]
    InvalidAttributeType { type_name: String },

    #[error("attribute '{name}' appears more than once in the schema")]
    DuplicateAttributeName { name: String },

    #[error("failed to load schema document {path:?}: {message}")]
    SchemaDocument { path: PathBuf, message: String },

    #[error("domain '{name}' is not supported (expected one of {expected})")]
    UnknownDomain { name: String, expected: String },

    // === Domain conformance ===
    #[error("{origin}schema is missing required field '{field}' for domain '{domain}'")]
    MissingRequiredField {
        origin: SchemaOrigin,
        domain: &'static str,
        field: &'static str,
    },

    #[error(
        "{origin}schema has type '{actual}' for required field '{field}', which domain '{domain}' specifies as '{expected}'"
    )]
    RequiredFieldTypeMismatch {
        origin: SchemaOrigin,
        domain: &'static str,
        field: &'static str,
        expected: TypeTag,
        actual: TypeTag,
    },

    // === Inference ===
    #[error("cannot determine schema: {reason}")]
    SchemaIndeterminate { reason: String },

    #[error("cannot infer column names from domain '{domain}' for type '{type_tag}': {reason}")]
    AmbiguousColumnMapping {
        domain: &'static str,
        type_tag: TypeTag,
        reason: String,
    },

    #[error("column {column} ({column_name}) of {path:?} holds {physical} values, which map to no attribute type")]
    UnsupportedPhysicalType {
        path: PathBuf,
        column: usize,
        column_name: String,
        physical: &'static str,
    },

    // === Streaming ===
    #[error(
        "{origin}schema column {column} is {expected}, but found {found} in {path:?}; column order and count must match across all files"
    )]
    SchemaColumnMismatch {
        origin: SchemaOrigin,
        path: PathBuf,
        column: usize,
        expected: String,
        found: String,
    },

    #[error("line {line} of {path:?}: column '{column}' value '{value}' is not a valid {expected}")]
    InvalidValue {
        path: PathBuf,
        line: u64,
        column: String,
        expected: TypeTag,
        value: String,
    },

    #[error("diagnose run cancelled after {files_completed} file(s)")]
    Cancelled { files_completed: usize },
}
