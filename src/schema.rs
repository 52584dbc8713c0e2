//! Schema model for target time-series datasets.
//!
//! This module owns [`TypeTag`] (the four attribute types a dataset column may
//! declare), [`SchemaAttribute`] (one validated column), [`Schema`] (the
//! ordered column list every input file must follow) and [`FieldPartition`]
//! (which columns play the timestamp, target and dimension roles).
//!
//! Schemas are read and written in the Forecast-style document shape
//! `{"Attributes": [{"AttributeName": .., "AttributeType": ..}]}`, as JSON or
//! YAML depending on the file extension.

use std::{
    collections::HashSet,
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    domain::DomainTemplate,
    error::{DiagnoseError, DiagnoseResult},
    validate::SchemaOrigin,
};

static ATTRIBUTE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("attribute name pattern compiles")
});

const TYPE_KEYWORDS: &[&str] = &["string", "integer", "float", "timestamp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    String,
    Integer,
    Float,
    Timestamp,
}

/// Storage the chunk reader coerces a column's cells into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalKind {
    Text,
    DateTime,
    NullableInt64,
    Float64,
}

impl TypeTag {
    pub const ALL: [TypeTag; 4] = [
        TypeTag::String,
        TypeTag::Integer,
        TypeTag::Float,
        TypeTag::Timestamp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::Timestamp => "timestamp",
        }
    }

    pub fn keywords() -> &'static [&'static str] {
        TYPE_KEYWORDS
    }

    pub fn is_keyword(token: &str) -> bool {
        TypeTag::from_str(token).is_ok()
    }

    pub fn affinity(self) -> PhysicalKind {
        match self {
            TypeTag::String => PhysicalKind::Text,
            TypeTag::Timestamp => PhysicalKind::DateTime,
            TypeTag::Integer => PhysicalKind::NullableInt64,
            TypeTag::Float => PhysicalKind::Float64,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = DiagnoseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        TypeTag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DiagnoseError::InvalidAttributeType {
                type_name: value.to_string(),
            })
    }
}

/// One column of a dataset schema. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "AttributeDocument")]
pub struct SchemaAttribute {
    name: String,
    attribute_type: TypeTag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AttributeDocument {
    #[serde(rename = "AttributeName")]
    name: String,
    #[serde(rename = "AttributeType")]
    attribute_type: String,
}

impl SchemaAttribute {
    pub fn new(name: impl Into<String>, attribute_type: TypeTag) -> DiagnoseResult<Self> {
        let name = name.into();
        if !Self::is_valid_name(&name) {
            return Err(DiagnoseError::InvalidAttributeName { name });
        }
        Ok(Self {
            name,
            attribute_type,
        })
    }

    /// Builds an attribute from raw name and type tokens, as found in schema
    /// documents and on the command line.
    pub fn parse(name: &str, type_token: &str) -> DiagnoseResult<Self> {
        let attribute_type = TypeTag::from_str(type_token)?;
        Self::new(name, attribute_type)
    }

    pub fn is_valid_name(name: &str) -> bool {
        ATTRIBUTE_NAME.is_match(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute_type(&self) -> TypeTag {
        self.attribute_type
    }
}

impl From<SchemaAttribute> for AttributeDocument {
    fn from(attribute: SchemaAttribute) -> Self {
        Self {
            name: attribute.name,
            attribute_type: attribute.attribute_type.as_str().to_string(),
        }
    }
}

/// Ordered column list. Column order is significant: every file of a dataset
/// must present the same columns in the same positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "SchemaDocument")]
pub struct Schema {
    attributes: Vec<SchemaAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaDocument {
    #[serde(rename = "Attributes")]
    attributes: Vec<AttributeDocument>,
}

impl SchemaDocument {
    /// Attribute names and types are checked only after the document parses,
    /// so their errors keep their own kinds.
    fn into_schema(self) -> DiagnoseResult<Schema> {
        let attributes = self
            .attributes
            .iter()
            .map(|doc| SchemaAttribute::parse(&doc.name, &doc.attribute_type))
            .collect::<DiagnoseResult<Vec<_>>>()?;
        Schema::new(attributes)
    }
}

impl From<Schema> for SchemaDocument {
    fn from(schema: Schema) -> Self {
        Self {
            attributes: schema
                .attributes
                .into_iter()
                .map(AttributeDocument::from)
                .collect(),
        }
    }
}

enum DocumentFormat {
    Json,
    Yaml,
}

fn document_format(path: &Path) -> DocumentFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            DocumentFormat::Yaml
        }
        _ => DocumentFormat::Json,
    }
}

impl Schema {
    pub fn new(attributes: Vec<SchemaAttribute>) -> DiagnoseResult<Self> {
        let mut seen = HashSet::new();
        for attribute in &attributes {
            if !seen.insert(attribute.name()) {
                return Err(DiagnoseError::DuplicateAttributeName {
                    name: attribute.name().to_string(),
                });
            }
        }
        Ok(Self { attributes })
    }

    pub fn load(path: &Path) -> DiagnoseResult<Self> {
        let file = File::open(path).map_err(|source| DiagnoseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let document_error = |message: String| DiagnoseError::SchemaDocument {
            path: path.to_path_buf(),
            message,
        };
        let document: SchemaDocument = match document_format(path) {
            DocumentFormat::Yaml => {
                serde_yaml::from_reader(reader).map_err(|err| document_error(err.to_string()))?
            }
            DocumentFormat::Json => {
                serde_json::from_reader(reader).map_err(|err| document_error(err.to_string()))?
            }
        };
        document.into_schema()
    }

    pub fn save(&self, path: &Path) -> DiagnoseResult<()> {
        let io_error = |source: std::io::Error| DiagnoseError::Io {
            path: path.to_path_buf(),
            source,
        };
        let document_error = |message: String| DiagnoseError::SchemaDocument {
            path: path.to_path_buf(),
            message,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
        match document_format(path) {
            DocumentFormat::Yaml => serde_yaml::to_writer(&mut writer, self)
                .map_err(|err| document_error(err.to_string()))?,
            DocumentFormat::Json => {
                serde_json::to_writer_pretty(&mut writer, self)
                    .map_err(|err| document_error(err.to_string()))?;
                writer.write_all(b"\n").map_err(io_error)?;
            }
        }
        writer.flush().map_err(io_error)
    }

    pub fn attributes(&self) -> &[SchemaAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, index: usize) -> Option<&SchemaAttribute> {
        self.attributes.get(index)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.attributes.iter().map(SchemaAttribute::name).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|attr| attr.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&SchemaAttribute> {
        self.attributes.iter().find(|attr| attr.name() == name)
    }

    /// Checks a file's sniffed layout against this schema: the column count
    /// always, and the column names positionally when the file has a header.
    pub fn ensure_layout(
        &self,
        path: &Path,
        origin: SchemaOrigin,
        header: Option<&[String]>,
        column_count: usize,
    ) -> DiagnoseResult<()> {
        let mismatch = |column: usize, expected: String, found: String| {
            DiagnoseError::SchemaColumnMismatch {
                origin,
                path: PathBuf::from(path),
                column,
                expected,
                found,
            }
        };
        if column_count != self.len() {
            return Err(mismatch(
                column_count.min(self.len()),
                format!("one of {} attribute(s)", self.len()),
                format!("{column_count} column(s)"),
            ));
        }
        if let Some(header) = header {
            for (index, (found, attribute)) in header.iter().zip(&self.attributes).enumerate() {
                if found.trim() != attribute.name() {
                    return Err(mismatch(
                        index,
                        format!("'{}'", attribute.name()),
                        format!("'{}'", found.trim()),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Column roles derived from a resolved schema: one timestamp column, one
/// target column, and every remaining column as a dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPartition {
    timestamp: usize,
    target: usize,
    dimensions: Vec<usize>,
}

impl FieldPartition {
    pub fn derive(schema: &Schema, template: Option<&DomainTemplate>) -> DiagnoseResult<Self> {
        let (timestamp, target) = match template {
            Some(template) => {
                let timestamp_name = template.timestamp_field().map(|spec| spec.name);
                let timestamp = timestamp_name
                    .and_then(|name| schema.position(name))
                    .ok_or_else(|| DiagnoseError::SchemaIndeterminate {
                        reason: "schema has no timestamp field required by the domain".into(),
                    })?;
                let target = schema.position(template.target_field).ok_or_else(|| {
                    DiagnoseError::SchemaIndeterminate {
                        reason: format!(
                            "schema has no target field '{}'",
                            template.target_field
                        ),
                    }
                })?;
                (timestamp, target)
            }
            None => {
                let timestamp = schema
                    .attributes
                    .iter()
                    .position(|attr| attr.attribute_type() == TypeTag::Timestamp)
                    .ok_or_else(|| DiagnoseError::SchemaIndeterminate {
                        reason: "no domain given and schema has no timestamp column".into(),
                    })?;
                let target = schema
                    .attributes
                    .iter()
                    .position(|attr| {
                        matches!(attr.attribute_type(), TypeTag::Integer | TypeTag::Float)
                    })
                    .ok_or_else(|| DiagnoseError::SchemaIndeterminate {
                        reason: "no domain given and schema has no numeric target column".into(),
                    })?;
                (timestamp, target)
            }
        };
        let dimensions = (0..schema.len())
            .filter(|idx| *idx != timestamp && *idx != target)
            .collect();
        Ok(Self {
            timestamp,
            target,
            dimensions,
        })
    }

    pub fn timestamp(&self) -> usize {
        self.timestamp
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }
}
