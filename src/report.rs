//! Final diagnostic report assembled from the aggregation state.

use std::{fmt, fmt::Write as _, path::PathBuf};

use serde::Serialize;

use crate::{
    aggregate::{AggregationState, DimensionValue, TimeSpan},
    data::Value,
    diagnose::ResolvedSchema,
    domain::Domain,
    schema::{Schema, TypeTag},
    table::Table,
    validate::{FieldClassification, SchemaOrigin},
};

/// Display form of a null dimension value.
pub const NULL_DISPLAY: &str = "<null>";

/// Files listed in the text report before the list is elided.
const LISTED_FILES: usize = 10;

const TIMESTAMP_DISPLAY: &str = "%Y-%m-%d %H:%M:%S";

/// Non-fatal findings collected during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticWarning {
    ExcludedFiles {
        count: usize,
    },
    OptionalFieldTypeMismatch {
        domain: &'static str,
        field: String,
        expected: TypeTag,
        actual: TypeTag,
    },
    RecordsWithNulls {
        count: u64,
    },
    NoDomain,
}

impl fmt::Display for DiagnosticWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticWarning::ExcludedFiles { count } => write!(
                f,
                "{count} file(s) without a .csv extension were excluded"
            ),
            DiagnosticWarning::OptionalFieldTypeMismatch {
                domain,
                field,
                expected,
                actual,
            } => write!(
                f,
                "optional field '{field}' of domain {domain} has type '{actual}' instead of '{expected}'; it is treated as a custom field"
            ),
            DiagnosticWarning::RecordsWithNulls { count } => write!(
                f,
                "{count} record(s) contain missing values; fill or drop them before forecasting"
            ),
            DiagnosticWarning::NoDomain => write!(
                f,
                "no domain given; required and optional fields cannot be checked and every field is treated as custom"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueShare {
    pub value: String,
    pub records: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesShare {
    pub values: Vec<String>,
    pub records: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionSummary {
    pub field: String,
    pub distinct_values: usize,
    pub top: Vec<ValueShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub fields: Vec<String>,
    pub distinct_series: usize,
    pub top: Vec<SeriesShare>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldNulls {
    pub field: String,
    pub nulls: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub files: Vec<PathBuf>,
    pub domain: Option<Domain>,
    pub schema: Schema,
    pub schema_origin: SchemaOrigin,
    pub fields: FieldClassification,
    pub timestamp_field: String,
    pub target_field: String,
    pub dimension_fields: Vec<String>,
    pub time_span: TimeSpan,
    pub total_records: u64,
    pub total_records_without_nulls: u64,
    pub nulls_by_field: Vec<FieldNulls>,
    pub dimensions: Vec<DimensionSummary>,
    pub series: SeriesSummary,
    pub warnings: Vec<DiagnosticWarning>,
}

fn display_dimension(value: &DimensionValue) -> String {
    value
        .as_ref()
        .map(Value::as_display)
        .unwrap_or_else(|| NULL_DISPLAY.to_string())
}

fn share(records: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        records as f64 * 100.0 / total as f64
    }
}

impl DiagnosticReport {
    pub fn build(
        files: Vec<PathBuf>,
        domain: Option<Domain>,
        resolved: ResolvedSchema,
        state: &AggregationState,
        warnings: Vec<DiagnosticWarning>,
        top_n: usize,
    ) -> Self {
        let total = state.total_records();
        let dimension_fields = state
            .dimension_fields()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let dimensions = dimension_fields
            .iter()
            .zip(state.dimension_value_counts())
            .map(|(field, table)| DimensionSummary {
                field: field.clone(),
                distinct_values: table.len(),
                top: table
                    .top(top_n)
                    .into_iter()
                    .map(|(value, tally)| ValueShare {
                        value: display_dimension(value),
                        records: tally.count,
                        percentage: share(tally.count, total),
                    })
                    .collect(),
            })
            .collect();
        let combos = state.dimension_combo_counts();
        let series = SeriesSummary {
            fields: dimension_fields.clone(),
            distinct_series: combos.len(),
            top: combos
                .top(top_n)
                .into_iter()
                .map(|(values, tally)| SeriesShare {
                    values: values.iter().map(display_dimension).collect(),
                    records: tally.count,
                    percentage: share(tally.count, total),
                })
                .collect(),
        };
        let ResolvedSchema {
            schema,
            origin,
            classification,
            partition,
        } = resolved;
        let field_name = |index: usize| {
            schema
                .attribute(index)
                .map(|attribute| attribute.name().to_string())
                .unwrap_or_default()
        };
        Self {
            files,
            domain,
            timestamp_field: field_name(partition.timestamp()),
            target_field: field_name(partition.target()),
            dimension_fields,
            time_span: state.time_span(),
            total_records: total,
            total_records_without_nulls: state.total_records_without_nulls(),
            nulls_by_field: state
                .nulls_by_field()
                .map(|(field, nulls)| FieldNulls {
                    field: field.to_string(),
                    nulls,
                })
                .collect(),
            dimensions,
            series,
            warnings,
            schema,
            schema_origin: origin,
            fields: classification,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn role_of(&self, name: &str) -> &'static str {
        if self.fields.required.iter().any(|field| field == name) {
            "required"
        } else if self.fields.optional.iter().any(|field| field == name) {
            "optional"
        } else {
            "custom"
        }
    }

    fn usage_of(&self, name: &str) -> &'static str {
        if name == self.timestamp_field {
            "timestamp"
        } else if name == self.target_field {
            "target"
        } else {
            "dimension"
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Files ({}):", self.files.len());
        for file in self.files.iter().take(LISTED_FILES) {
            let _ = writeln!(out, "  {}", file.display());
        }
        if self.files.len() > LISTED_FILES {
            let _ = writeln!(out, "  ... and {} more", self.files.len() - LISTED_FILES);
        }
        let _ = writeln!(out);

        let label = match self.schema_origin {
            SchemaOrigin::Explicit => "Schema",
            SchemaOrigin::Inferred => "Inferred schema",
        };
        match self.domain {
            Some(domain) => {
                let _ = writeln!(out, "{label} (domain {domain}):");
            }
            None => {
                let _ = writeln!(out, "{label} (no domain):");
            }
        }
        let mut schema_table = Table::new(["#", "name", "type", "role", "usage"]).align_right(0);
        for (index, attribute) in self.schema.attributes().iter().enumerate() {
            schema_table.push_row(vec![
                (index + 1).to_string(),
                attribute.name().to_string(),
                attribute.attribute_type().to_string(),
                self.role_of(attribute.name()).to_string(),
                self.usage_of(attribute.name()).to_string(),
            ]);
        }
        out.push_str(&schema_table.render());
        let _ = writeln!(out);

        let format_time = |at: Option<chrono::NaiveDateTime>| {
            at.map(|ts| ts.format(TIMESTAMP_DISPLAY).to_string())
                .unwrap_or_else(|| "n/a".to_string())
        };
        let _ = writeln!(
            out,
            "Time span: {} to {}",
            format_time(self.time_span.start),
            format_time(self.time_span.end)
        );
        let _ = writeln!(
            out,
            "Records: {} total, {} without missing values",
            self.total_records, self.total_records_without_nulls
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "Missing values by field:");
        let mut nulls = Table::new(["field", "nulls", "percentage"])
            .align_right(1)
            .align_right(2);
        for entry in &self.nulls_by_field {
            nulls.push_row(vec![
                entry.field.clone(),
                entry.nulls.to_string(),
                format!("{:.2}%", share(entry.nulls, self.total_records)),
            ]);
        }
        out.push_str(&nulls.render());

        for dimension in &self.dimensions {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "Dimension '{}': {} distinct value(s)",
                dimension.field, dimension.distinct_values
            );
            let mut values = Table::new(["value", "records", "percentage"])
                .align_right(1)
                .align_right(2);
            for entry in &dimension.top {
                values.push_row(vec![
                    entry.value.clone(),
                    entry.records.to_string(),
                    format!("{:.2}%", entry.percentage),
                ]);
            }
            out.push_str(&values.render());
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Series to forecast: {} distinct combination(s) of [{}]",
            self.series.distinct_series,
            self.series.fields.join(", ")
        );
        if !self.series.fields.is_empty() {
            let width = self.series.fields.len();
            let mut combos = Table::new(
                self.series
                    .fields
                    .iter()
                    .cloned()
                    .chain(["records".to_string(), "percentage".to_string()]),
            )
            .align_right(width)
            .align_right(width + 1);
            for entry in &self.series.top {
                let mut row = entry.values.clone();
                row.push(entry.records.to_string());
                row.push(format!("{:.2}%", entry.percentage));
                combos.push_row(row);
            }
            out.push_str(&combos.render());
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Warnings:");
            for warning in &self.warnings {
                let _ = writeln!(out, "  - {warning}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregate::AggregationState,
        chunk::TypedChunk,
        schema::{FieldPartition, SchemaAttribute},
        validate::validate,
    };

    fn report(top_n: usize) -> DiagnosticReport {
        let schema = Schema::new(vec![
            SchemaAttribute::new("item_id", TypeTag::String).unwrap(),
            SchemaAttribute::new("timestamp", TypeTag::Timestamp).unwrap(),
            SchemaAttribute::new("demand", TypeTag::Float).unwrap(),
        ])
        .unwrap();
        let partition = FieldPartition::derive(&schema, Some(Domain::Retail.template())).unwrap();
        let classification = validate(&schema, Domain::Retail, SchemaOrigin::Explicit).unwrap();
        let mut state = AggregationState::new(&schema, &partition);
        let at = Value::Timestamp(
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        );
        let item = |name: &str| Some(Value::String(name.to_string()));
        state.absorb(&TypedChunk {
            file_index: 0,
            first_row: 0,
            rows: vec![
                vec![item("b"), Some(at.clone()), Some(Value::Float(1.0))],
                vec![item("a"), Some(at.clone()), Some(Value::Float(2.0))],
                vec![item("a"), Some(at.clone()), None],
                vec![None, Some(at), Some(Value::Float(3.0))],
            ],
        });
        DiagnosticReport::build(
            vec![PathBuf::from("data/a.csv")],
            Some(Domain::Retail),
            ResolvedSchema {
                schema,
                origin: SchemaOrigin::Explicit,
                classification,
                partition,
            },
            &state,
            vec![DiagnosticWarning::RecordsWithNulls { count: 1 }],
            top_n,
        )
    }

    #[test]
    fn builds_dimension_and_series_shares() {
        let report = report(2);
        assert_eq!(report.timestamp_field, "timestamp");
        assert_eq!(report.target_field, "demand");
        assert_eq!(report.dimension_fields, vec!["item_id"]);
        assert_eq!(report.total_records, 4);
        assert_eq!(report.total_records_without_nulls, 2);

        let items = &report.dimensions[0];
        assert_eq!(items.distinct_values, 3);
        assert_eq!(items.top.len(), 2);
        assert_eq!(items.top[0].value, "a");
        assert_eq!(items.top[0].records, 2);
        assert!((items.top[0].percentage - 50.0).abs() < f64::EPSILON);
        assert_eq!(items.top[1].value, "b");

        assert_eq!(report.series.distinct_series, 3);
        assert_eq!(report.series.top[0].values, vec!["a"]);
    }

    #[test]
    fn null_dimension_values_are_displayed() {
        let report = report(0);
        assert!(report.dimensions[0]
            .top
            .iter()
            .any(|share| share.value == NULL_DISPLAY));
    }

    #[test]
    fn text_rendering_covers_every_section() {
        let text = report(10).render_text();
        assert!(text.contains("Files (1):"));
        assert!(text.contains("Schema (domain RETAIL):"));
        assert!(text.contains("Time span: 2024-03-01 00:00:00 to 2024-03-01 00:00:00"));
        assert!(text.contains("Records: 4 total, 2 without missing values"));
        assert!(text.contains("Dimension 'item_id': 3 distinct value(s)"));
        assert!(text.contains("Series to forecast: 3 distinct combination(s) of [item_id]"));
        assert!(text.contains("50.00%"));
        assert!(text.contains("Warnings:"));
    }

    #[test]
    fn json_rendering_uses_document_schema_shape() {
        let json = report(1).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["schema"]["Attributes"][0]["AttributeName"], "item_id");
        assert_eq!(value["schema_origin"], "explicit");
        assert_eq!(value["warnings"][0]["kind"], "records_with_nulls");
        assert_eq!(value["domain"], "RETAIL");
    }
}
