//! Static catalog of dataset domains.
//!
//! Each [`Domain`] names a [`DomainTemplate`]: the target field plus the
//! required and optional target time-series fields, in declaration order.
//! The catalog is plain `static` data and is never mutated.

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::{error::DiagnoseError, schema::TypeTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub attribute_type: TypeTag,
}

const fn field(name: &'static str, attribute_type: TypeTag) -> FieldSpec {
    FieldSpec {
        name,
        attribute_type,
    }
}

#[derive(Debug, Serialize)]
pub struct DomainTemplate {
    pub target_field: &'static str,
    pub required: &'static [FieldSpec],
    pub optional: &'static [FieldSpec],
}

impl DomainTemplate {
    pub fn required_field(&self, name: &str) -> Option<&FieldSpec> {
        self.required.iter().find(|spec| spec.name == name)
    }

    pub fn required_of_type(&self, ty: TypeTag) -> impl Iterator<Item = &FieldSpec> {
        self.required
            .iter()
            .filter(move |spec| spec.attribute_type == ty)
    }

    pub fn optional_of_type(&self, ty: TypeTag) -> impl Iterator<Item = &FieldSpec> {
        self.optional
            .iter()
            .filter(move |spec| spec.attribute_type == ty)
    }

    pub fn timestamp_field(&self) -> Option<&FieldSpec> {
        self.required_of_type(TypeTag::Timestamp).next()
    }
}

const LOCATION: FieldSpec = field("location", TypeTag::String);
const TIMESTAMP: FieldSpec = field("timestamp", TypeTag::Timestamp);
const ITEM_ID: FieldSpec = field("item_id", TypeTag::String);

static RETAIL: DomainTemplate = DomainTemplate {
    target_field: "demand",
    required: &[ITEM_ID, TIMESTAMP, field("demand", TypeTag::Float)],
    optional: &[LOCATION],
};

static CUSTOM: DomainTemplate = DomainTemplate {
    target_field: "target_value",
    required: &[ITEM_ID, TIMESTAMP, field("target_value", TypeTag::Float)],
    optional: &[],
};

static INVENTORY_PLANNING: DomainTemplate = DomainTemplate {
    target_field: "demand",
    required: &[ITEM_ID, TIMESTAMP, field("demand", TypeTag::Float)],
    optional: &[LOCATION],
};

static EC2_CAPACITY: DomainTemplate = DomainTemplate {
    target_field: "number_of_instances",
    required: &[
        field("instance_type", TypeTag::String),
        TIMESTAMP,
        field("number_of_instances", TypeTag::Integer),
    ],
    optional: &[LOCATION],
};

static WORK_FORCE: DomainTemplate = DomainTemplate {
    target_field: "workforce_demand",
    required: &[
        field("workforce_type", TypeTag::String),
        TIMESTAMP,
        field("workforce_demand", TypeTag::Float),
    ],
    optional: &[LOCATION],
};

static WEB_TRAFFIC: DomainTemplate = DomainTemplate {
    target_field: "value",
    required: &[ITEM_ID, TIMESTAMP, field("value", TypeTag::Float)],
    optional: &[],
};

static METRICS: DomainTemplate = DomainTemplate {
    target_field: "metric_value",
    required: &[
        field("metric_name", TypeTag::String),
        TIMESTAMP,
        field("metric_value", TypeTag::Float),
    ],
    optional: &[],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Domain {
    Retail,
    Custom,
    InventoryPlanning,
    Ec2Capacity,
    WorkForce,
    WebTraffic,
    Metrics,
}

impl Domain {
    pub const ALL: [Domain; 7] = [
        Domain::Retail,
        Domain::Custom,
        Domain::InventoryPlanning,
        Domain::Ec2Capacity,
        Domain::WorkForce,
        Domain::WebTraffic,
        Domain::Metrics,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Domain::Retail => "RETAIL",
            Domain::Custom => "CUSTOM",
            Domain::InventoryPlanning => "INVENTORY_PLANNING",
            Domain::Ec2Capacity => "EC2_CAPACITY",
            Domain::WorkForce => "WORK_FORCE",
            Domain::WebTraffic => "WEB_TRAFFIC",
            Domain::Metrics => "METRICS",
        }
    }

    pub fn template(self) -> &'static DomainTemplate {
        match self {
            Domain::Retail => &RETAIL,
            Domain::Custom => &CUSTOM,
            Domain::InventoryPlanning => &INVENTORY_PLANNING,
            Domain::Ec2Capacity => &EC2_CAPACITY,
            Domain::WorkForce => &WORK_FORCE,
            Domain::WebTraffic => &WEB_TRAFFIC,
            Domain::Metrics => &METRICS,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Domain {
    type Err = DiagnoseError;

    /// Case-insensitive; spaces and hyphens count as underscores, so
    /// `"EC2 CAPACITY"` and `"ec2-capacity"` both resolve.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect::<String>();
        Domain::ALL
            .into_iter()
            .find(|domain| domain.name() == normalized)
            .ok_or_else(|| DiagnoseError::UnknownDomain {
                name: value.to_string(),
                expected: Domain::ALL.map(Domain::name).join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaAttribute;

    #[test]
    fn every_domain_has_one_timestamp_and_a_required_target() {
        for domain in Domain::ALL {
            let template = domain.template();
            assert_eq!(
                template.required_of_type(TypeTag::Timestamp).count(),
                1,
                "{domain}"
            );
            assert!(
                template.required_field(template.target_field).is_some(),
                "{domain} target must be required"
            );
            for spec in template.required.iter().chain(template.optional) {
                assert!(
                    SchemaAttribute::is_valid_name(spec.name),
                    "{domain}.{}",
                    spec.name
                );
            }
        }
    }

    #[test]
    fn domain_names_parse_leniently() {
        assert_eq!("RETAIL".parse::<Domain>().unwrap(), Domain::Retail);
        assert_eq!("ec2 capacity".parse::<Domain>().unwrap(), Domain::Ec2Capacity);
        assert_eq!("Work-Force".parse::<Domain>().unwrap(), Domain::WorkForce);
        let err = "SALES".parse::<Domain>().unwrap_err();
        assert!(err.to_string().contains("RETAIL"));
    }

    #[test]
    fn ec2_capacity_target_is_integer() {
        let spec = Domain::Ec2Capacity
            .template()
            .required_field("number_of_instances")
            .expect("target present");
        assert_eq!(spec.attribute_type, TypeTag::Integer);
    }
}
