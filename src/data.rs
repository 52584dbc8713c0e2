use std::{
    fmt,
    hash::{Hash, Hasher},
};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::schema::PhysicalKind;

/// Cell tokens read as missing values, in addition to the empty string.
const NULL_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y", "%Y%m%d"];

/// A parsed cell. Floats compare and hash by bit pattern (with `-0.0` folded
/// into `0.0`) so values can key frequency tables.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
}

impl Value {
    fn float_bits(value: f64) -> u64 {
        if value == 0.0 {
            0.0f64.to_bits()
        } else if value.is_nan() {
            f64::NAN.to_bits()
        } else {
            value.to_bits()
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => Value::float_bits(*a) == Value::float_bits(*b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => Value::float_bits(*f).hash(state),
            Value::Timestamp(ts) => ts.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn is_null_token(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || NULL_TOKENS.contains(&trimmed)
}

/// Parses a timestamp cell; date-only values resolve to midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(parsed);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn parse_integer(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

pub fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

pub fn is_boolean_literal(value: &str) -> bool {
    matches!(
        value.trim(),
        "True" | "TRUE" | "true" | "False" | "FALSE" | "false"
    )
}

/// Coerces a non-null cell into the storage named by `kind`. Returns `None`
/// when the text does not fit that storage.
pub fn parse_typed_value(value: &str, kind: PhysicalKind) -> Option<Value> {
    match kind {
        PhysicalKind::Text => Some(Value::String(value.trim().to_string())),
        PhysicalKind::NullableInt64 => parse_integer(value).map(Value::Integer),
        PhysicalKind::Float64 => parse_float(value).map(Value::Float),
        PhysicalKind::DateTime => parse_timestamp(value).map(Value::Timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn null_tokens_cover_blank_and_na_markers() {
        for token in ["", "   ", "NA", "N/A", "null", "NaN", "<NA>", " None "] {
            assert!(is_null_token(token), "{token:?}");
        }
        assert!(!is_null_token("0"));
        assert!(!is_null_token("none_of_these"));
    }

    #[test]
    fn parse_timestamp_supports_datetime_and_date_forms() {
        let expected =
            NaiveDateTime::parse_from_str("2024-05-06 14:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(parse_timestamp("2024-05-06 14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-06T14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-06 14:30"), Some(expected));
        let midnight =
            NaiveDateTime::parse_from_str("2024-05-06 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(parse_timestamp("2024-05-06"), Some(midnight));
        assert_eq!(parse_timestamp("2024/05/06"), Some(midnight));
        assert_eq!(parse_timestamp("item_001"), None);
        assert_eq!(parse_timestamp("10.5"), None);
    }

    #[test]
    fn parse_typed_value_follows_physical_kind() {
        assert_eq!(
            parse_typed_value("42", PhysicalKind::NullableInt64),
            Some(Value::Integer(42))
        );
        assert_eq!(parse_typed_value("4.2", PhysicalKind::NullableInt64), None);
        assert_eq!(
            parse_typed_value("42", PhysicalKind::Float64),
            Some(Value::Float(42.0))
        );
        assert_eq!(
            parse_typed_value(" sku ", PhysicalKind::Text),
            Some(Value::String("sku".into()))
        );
        assert!(parse_typed_value("soon", PhysicalKind::DateTime).is_none());
    }

    #[test]
    fn float_values_hash_consistently() {
        let mut set = HashSet::new();
        set.insert(Value::Float(0.0));
        set.insert(Value::Float(-0.0));
        set.insert(Value::Float(1.5));
        set.insert(Value::Float(1.5));
        assert_eq!(set.len(), 2);
        assert_ne!(Value::Integer(1), Value::Float(1.0));
    }
}
