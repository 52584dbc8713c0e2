//! Domain conformance checks for a candidate schema.
//!
//! [`validate`] is a pure function of the schema and the static domain
//! template: required fields must be present with their declared types,
//! optional fields count as used only when their type matches, and every
//! other column is classified as custom.

use std::fmt;

use log::{info, warn};
use serde::Serialize;

use crate::{
    domain::Domain,
    error::{DiagnoseError, DiagnoseResult},
    report::DiagnosticWarning,
    schema::Schema,
};

/// Whether a schema was supplied by the caller or inferred from file contents.
/// Only used to label messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaOrigin {
    Explicit,
    Inferred,
}

impl fmt::Display for SchemaOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaOrigin::Explicit => Ok(()),
            SchemaOrigin::Inferred => f.write_str("Inferred "),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldClassification {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub custom: Vec<String>,
    #[serde(skip)]
    pub warnings: Vec<DiagnosticWarning>,
}

pub fn validate(
    schema: &Schema,
    domain: Domain,
    origin: SchemaOrigin,
) -> DiagnoseResult<FieldClassification> {
    let template = domain.template();
    for spec in template.required {
        let attribute = schema
            .get(spec.name)
            .ok_or(DiagnoseError::MissingRequiredField {
                origin,
                domain: domain.name(),
                field: spec.name,
            })?;
        if attribute.attribute_type() != spec.attribute_type {
            return Err(DiagnoseError::RequiredFieldTypeMismatch {
                origin,
                domain: domain.name(),
                field: spec.name,
                expected: spec.attribute_type,
                actual: attribute.attribute_type(),
            });
        }
    }

    let mut classification = FieldClassification {
        required: template
            .required
            .iter()
            .map(|spec| spec.name.to_string())
            .collect(),
        ..FieldClassification::default()
    };
    for spec in template.optional {
        let Some(attribute) = schema.get(spec.name) else {
            continue;
        };
        if attribute.attribute_type() == spec.attribute_type {
            classification.optional.push(spec.name.to_string());
        } else {
            let warning = DiagnosticWarning::OptionalFieldTypeMismatch {
                domain: domain.name(),
                field: spec.name.to_string(),
                expected: spec.attribute_type,
                actual: attribute.attribute_type(),
            };
            warn!("{warning}");
            classification.warnings.push(warning);
        }
    }
    classification.custom = schema
        .attributes()
        .iter()
        .map(|attribute| attribute.name())
        .filter(|name| {
            template.required_field(name).is_none()
                && !classification.optional.iter().any(|used| used == name)
        })
        .map(str::to_string)
        .collect();

    info!(
        "{origin}schema conforms to domain '{domain}' with required fields {:?}, optional fields {:?}, custom fields {:?}",
        classification.required, classification.optional, classification.custom
    );
    Ok(classification)
}

/// Classification used when no domain was supplied: nothing is required or
/// optional, so every column is custom.
pub fn classify_without_domain(schema: &Schema) -> FieldClassification {
    let warning = DiagnosticWarning::NoDomain;
    warn!("{warning}");
    FieldClassification {
        required: Vec::new(),
        optional: Vec::new(),
        custom: schema.names().into_iter().map(str::to_string).collect(),
        warnings: vec![warning],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaAttribute, TypeTag};

    fn schema(columns: &[(&str, TypeTag)]) -> Schema {
        Schema::new(
            columns
                .iter()
                .map(|(name, ty)| SchemaAttribute::new(*name, *ty).unwrap())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn classifies_required_optional_and_custom_fields() {
        let schema = schema(&[
            ("brand", TypeTag::String),
            ("item_id", TypeTag::String),
            ("timestamp", TypeTag::Timestamp),
            ("demand", TypeTag::Float),
            ("location", TypeTag::String),
            ("price", TypeTag::Float),
        ]);
        let result = validate(&schema, Domain::Retail, SchemaOrigin::Explicit).unwrap();
        assert_eq!(result.required, vec!["item_id", "timestamp", "demand"]);
        assert_eq!(result.optional, vec!["location"]);
        assert_eq!(result.custom, vec!["brand", "price"]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn missing_required_field_fails() {
        let schema = schema(&[
            ("item_id", TypeTag::String),
            ("timestamp", TypeTag::Timestamp),
        ]);
        let err = validate(&schema, Domain::Retail, SchemaOrigin::Inferred).unwrap_err();
        match err {
            DiagnoseError::MissingRequiredField { field, .. } => assert_eq!(field, "demand"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn required_type_mismatch_fails() {
        let schema = schema(&[
            ("item_id", TypeTag::String),
            ("timestamp", TypeTag::Timestamp),
            ("demand", TypeTag::Integer),
        ]);
        let err = validate(&schema, Domain::Retail, SchemaOrigin::Explicit).unwrap_err();
        assert!(matches!(
            err,
            DiagnoseError::RequiredFieldTypeMismatch {
                expected: TypeTag::Float,
                actual: TypeTag::Integer,
                ..
            }
        ));
        assert!(err.to_string().starts_with("schema has type 'integer'"));
    }

    #[test]
    fn mistyped_optional_field_is_custom_with_warning() {
        let schema = schema(&[
            ("item_id", TypeTag::String),
            ("timestamp", TypeTag::Timestamp),
            ("demand", TypeTag::Float),
            ("location", TypeTag::Integer),
        ]);
        let result = validate(&schema, Domain::Retail, SchemaOrigin::Explicit).unwrap();
        assert!(result.optional.is_empty());
        assert_eq!(result.custom, vec!["location"]);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn classification_is_idempotent() {
        let schema = schema(&[
            ("metric_name", TypeTag::String),
            ("timestamp", TypeTag::Timestamp),
            ("metric_value", TypeTag::Float),
            ("host", TypeTag::String),
        ]);
        let first = validate(&schema, Domain::Metrics, SchemaOrigin::Explicit).unwrap();
        let second = validate(&schema, Domain::Metrics, SchemaOrigin::Explicit).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn without_domain_every_field_is_custom() {
        let schema = schema(&[("sku", TypeTag::String), ("at", TypeTag::Timestamp)]);
        let result = classify_without_domain(&schema);
        assert!(result.required.is_empty());
        assert_eq!(result.custom, vec!["sku", "at"]);
        assert_eq!(result.warnings, vec![DiagnosticWarning::NoDomain]);
    }
}
