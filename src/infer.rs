//! Schema inference from the first chunk of data.
//!
//! Inference runs in two phases. [`infer_physical_schema`] assigns a
//! [`TypeTag`] to every column position from the values observed in one chunk.
//! [`resolve_logical_schema`] then names those positions, either from the
//! file's header row or, for headerless files, by matching each observed type
//! to the single domain field of that type. The resulting [`Schema`] is final
//! for the rest of the run; later chunks are never re-inferred.

use std::path::Path;

use itertools::Itertools;
use log::{debug, info};

use crate::{
    chunk::RawChunk,
    data::{is_boolean_literal, parse_float, parse_integer, parse_timestamp},
    domain::{Domain, FieldSpec},
    error::{DiagnoseError, DiagnoseResult},
    schema::{Schema, SchemaAttribute, TypeTag},
};

/// Leading rows of a text column that must all parse as dates for the column
/// to be typed as a timestamp.
const TIMESTAMP_PROBE_ROWS: usize = 5;

#[derive(Debug, Clone, Default)]
struct TypeCandidate {
    non_null: usize,
    integer_matches: usize,
    float_matches: usize,
    boolean_matches: usize,
    leading: Vec<Option<String>>,
}

impl TypeCandidate {
    fn update(&mut self, value: Option<&str>) {
        if self.leading.len() < TIMESTAMP_PROBE_ROWS {
            self.leading.push(value.map(str::to_string));
        }
        let Some(value) = value else {
            return;
        };
        self.non_null += 1;
        if parse_integer(value).is_some() {
            self.integer_matches += 1;
        }
        if parse_float(value).is_some() {
            self.float_matches += 1;
        }
        if is_boolean_literal(value) {
            self.boolean_matches += 1;
        }
    }

    fn leading_values_are_timestamps(&self) -> bool {
        let mut probed = self.leading.iter().flatten().peekable();
        probed.peek().is_some() && probed.all(|value| parse_timestamp(value).is_some())
    }

    /// Integer when every non-null value is an integer, float when every value
    /// is numeric, otherwise text (timestamp if the leading values are dates).
    /// Returns the name of the physical kind when it maps to no type tag.
    fn decide(&self) -> Result<TypeTag, &'static str> {
        if self.non_null == 0 {
            return Ok(TypeTag::String);
        }
        if self.boolean_matches == self.non_null {
            return Err("boolean");
        }
        if self.integer_matches == self.non_null {
            Ok(TypeTag::Integer)
        } else if self.float_matches == self.non_null {
            Ok(TypeTag::Float)
        } else if self.leading_values_are_timestamps() {
            Ok(TypeTag::Timestamp)
        } else {
            Ok(TypeTag::String)
        }
    }
}

/// Positional column types, before any names are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalSchema {
    columns: Vec<TypeTag>,
}

impl PhysicalSchema {
    pub fn new(columns: Vec<TypeTag>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[TypeTag] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column positions per observed type, types in order of first appearance.
    pub fn positions_by_type(&self) -> Vec<(TypeTag, Vec<usize>)> {
        self.columns
            .iter()
            .copied()
            .unique()
            .map(|ty| {
                let positions = self
                    .columns
                    .iter()
                    .positions(|column| *column == ty)
                    .collect();
                (ty, positions)
            })
            .collect()
    }
}

pub fn infer_physical_schema(
    chunk: &RawChunk,
    width: usize,
    header: Option<&[String]>,
    path: &Path,
) -> DiagnoseResult<PhysicalSchema> {
    let columns = (0..width)
        .map(|index| {
            let mut candidate = TypeCandidate::default();
            chunk.column(index).for_each(|value| candidate.update(value));
            candidate
                .decide()
                .map_err(|physical| DiagnoseError::UnsupportedPhysicalType {
                    path: path.to_path_buf(),
                    column: index,
                    column_name: header
                        .and_then(|names| names.get(index).cloned())
                        .unwrap_or_else(|| index.to_string()),
                    physical,
                })
        })
        .collect::<DiagnoseResult<Vec<_>>>()?;
    debug!("Physical column types for {path:?}: {columns:?}");
    Ok(PhysicalSchema::new(columns))
}

pub fn resolve_logical_schema(
    physical: &PhysicalSchema,
    header: Option<&[String]>,
    domain: Option<Domain>,
) -> DiagnoseResult<Schema> {
    if let Some(header) = header {
        let attributes = header
            .iter()
            .zip(physical.columns())
            .map(|(name, ty)| SchemaAttribute::new(name.trim(), *ty))
            .collect::<DiagnoseResult<Vec<_>>>()?;
        return Schema::new(attributes);
    }
    let domain = domain.ok_or_else(|| DiagnoseError::SchemaIndeterminate {
        reason: "a domain is required when no schema is given and the files have no header row"
            .into(),
    })?;
    let names = names_from_domain(physical, domain)?;
    let attributes = names
        .into_iter()
        .zip(physical.columns())
        .map(|(name, ty)| SchemaAttribute::new(name, *ty))
        .collect::<DiagnoseResult<Vec<_>>>()?;
    Schema::new(attributes)
}

/// Each observed type must occur in exactly one column and correspond to
/// exactly one domain field: the single required field of that type, or the
/// single optional one when none is required.
fn names_from_domain(
    physical: &PhysicalSchema,
    domain: Domain,
) -> DiagnoseResult<Vec<&'static str>> {
    let template = domain.template();
    let mut names = vec![""; physical.len()];
    for (ty, positions) in physical.positions_by_type() {
        let ambiguous = |reason: String| DiagnoseError::AmbiguousColumnMapping {
            domain: domain.name(),
            type_tag: ty,
            reason,
        };
        if positions.len() > 1 {
            return Err(ambiguous(format!(
                "{} (>1) columns in the data have this type",
                positions.len()
            )));
        }
        let required: Vec<&FieldSpec> = template.required_of_type(ty).collect();
        let candidates = if required.is_empty() {
            template.optional_of_type(ty).collect()
        } else {
            required
        };
        match candidates.as_slice() {
            [only] => names[positions[0]] = only.name,
            [] => {
                return Err(ambiguous(
                    "the domain declares no field of this type".into(),
                ));
            }
            many => {
                return Err(ambiguous(format!(
                    "the domain declares {} fields of this type",
                    many.len()
                )));
            }
        }
    }
    Ok(names)
}

/// Runs both inference phases over the first chunk.
pub fn infer_schema(
    chunk: &RawChunk,
    width: usize,
    header: Option<&[String]>,
    domain: Option<Domain>,
    path: &Path,
) -> DiagnoseResult<Schema> {
    let physical = infer_physical_schema(chunk, width, header, path)?;
    let schema = resolve_logical_schema(&physical, header, domain)?;
    info!(
        "Inferred target time-series schema: {}",
        serde_json::to_string(&schema).unwrap_or_else(|_| format!("{:?}", schema.names()))
    );
    Ok(schema)
}
