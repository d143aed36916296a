// src/value.rs

//! Dynamically typed values for conditions and registry reads
//!
//! A [`Value`] holds one of the small set of data types that deployment
//! conditions can compare: booleans, 64-bit integers, strings and
//! versions. On the wire a value is a JSON string, a JSON number, or a
//! JSON object of the form `{"version": "..."}`.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::version::Version;

/// A value that can be stored in a condition or read from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// No value. Produced by a zeroed condition with no compare value.
    #[default]
    Unknown,
    Bool(bool),
    Int64(i64),
    String(String),
    Version(Version),
}

/// The kind of data a [`Value`] holds.
///
/// Registry value resources declare the kind of data they are expected to
/// contain, which controls how the raw registry data is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    #[default]
    Unknown,
    Bool,
    Int64,
    String,
    Version,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Unknown => "unknown",
            Kind::Bool => "bool",
            Kind::Int64 => "int64",
            Kind::String => "string",
            Kind::Version => "version",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// Returns the kind of the value.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Unknown => Kind::Unknown,
            Value::Bool(_) => Kind::Bool,
            Value::Int64(_) => Kind::Int64,
            Value::String(_) => Kind::String,
            Value::Version(_) => Kind::Version,
        }
    }

    /// Returns the value as a version, if it holds one.
    pub fn as_version(&self) -> Option<&Version> {
        match self {
            Value::Version(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unknown => Ok(()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Version(v) => f.write_str(v.as_str()),
        }
    }
}

/// Compares two values, returning `None` when their types are not
/// comparable with each other.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Version(a), Value::Version(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Compares two values, returning an error when their types are not
/// comparable with each other.
pub fn try_compare(a: &Value, b: &Value) -> Result<Ordering, ComparisonError> {
    compare(a, b).ok_or(ComparisonError {
        a: a.kind(),
        b: b.kind(),
    })
}

/// Returned when a comparison is attempted on incomparable values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonError {
    pub a: Kind,
    pub b: Kind,
}

impl fmt::Display for ComparisonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "the \"{}\" and \"{}\" types are not comparable",
            self.a, self.b
        )
    }
}

impl std::error::Error for ComparisonError {}

/// A comparison operator used by registry value comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Comparison {
    #[default]
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEquals,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEquals,
}

impl Comparison {
    /// Applies the operator to the result of a comparison between two
    /// values.
    pub fn evaluate(&self, result: Ordering) -> bool {
        match self {
            Comparison::Equals => result == Ordering::Equal,
            Comparison::LessThan => result == Ordering::Less,
            Comparison::LessThanOrEquals => result != Ordering::Greater,
            Comparison::GreaterThan => result == Ordering::Greater,
            Comparison::GreaterThanOrEquals => result != Ordering::Less,
        }
    }

    /// Returns true for the default equality operator.
    pub fn is_equals(&self) -> bool {
        matches!(self, Comparison::Equals)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Equals => "=",
            Comparison::LessThan => "<",
            Comparison::LessThanOrEquals => "<=",
            Comparison::GreaterThan => ">",
            Comparison::GreaterThanOrEquals => ">=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Unknown => Err(serde::ser::Error::custom(
                "cannot serialize a value of unknown kind",
            )),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Version(v) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("version", v.as_str())?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> de::Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, an integer, or a {\"version\": ...} object")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
                Ok(Value::String(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
                Ok(Value::Int64(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
                i64::try_from(v)
                    .map(Value::Int64)
                    .map_err(|_| E::custom("integer value out of range"))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
                let mut version: Option<String> = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "version" => version = Some(map.next_value()?),
                        _ => {
                            let _ = map.next_value::<de::IgnoredAny>()?;
                        }
                    }
                }
                match version {
                    Some(v) => Ok(Value::Version(Version::from(v))),
                    None => Err(de::Error::custom("the value type could not be determined")),
                }
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_json_string() {
        let value: Value = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(value, Value::String("hello".to_string()));
    }

    #[test]
    fn test_value_from_json_number() {
        let value: Value = serde_json::from_str("-42").unwrap();
        assert_eq!(value, Value::Int64(-42));
    }

    #[test]
    fn test_value_from_json_version_object() {
        let value: Value = serde_json::from_str("{\"version\": \"v1.2.3\"}").unwrap();
        assert_eq!(value, Value::Version(Version::from("v1.2.3")));
    }

    #[test]
    fn test_value_rejects_unrecognized_object() {
        let result: Result<Value, _> = serde_json::from_str("{\"other\": 1}");
        assert!(result.is_err());
    }

    #[test]
    fn test_value_serialization_round_trip() {
        for value in [
            Value::Int64(7),
            Value::String("abc".to_string()),
            Value::Version(Version::from("1.2")),
        ] {
            let encoded = serde_json::to_string(&value).unwrap();
            let decoded: Value = serde_json::from_str(&encoded).unwrap();
            assert_eq!(value, decoded);
        }
    }

    #[test]
    fn test_try_compare_versions_ignores_designator() {
        let a = Value::Version(Version::from("v1.2"));
        let b = Value::Version(Version::from("1.10"));
        assert_eq!(try_compare(&a, &b).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_try_compare_mismatched_kinds() {
        let err = try_compare(&Value::Int64(1), &Value::String("1".to_string())).unwrap_err();
        assert_eq!(err.a, Kind::Int64);
        assert_eq!(err.b, Kind::String);
        assert!(err.to_string().contains("not comparable"));
    }

    #[test]
    fn test_comparison_operators() {
        assert!(Comparison::Equals.evaluate(Ordering::Equal));
        assert!(!Comparison::Equals.evaluate(Ordering::Less));
        assert!(Comparison::LessThan.evaluate(Ordering::Less));
        assert!(Comparison::LessThanOrEquals.evaluate(Ordering::Equal));
        assert!(Comparison::GreaterThan.evaluate(Ordering::Greater));
        assert!(Comparison::GreaterThanOrEquals.evaluate(Ordering::Equal));
        assert!(!Comparison::GreaterThanOrEquals.evaluate(Ordering::Less));
    }

    #[test]
    fn test_comparison_serde_symbols() {
        let op: Comparison = serde_json::from_str("\">=\"").unwrap();
        assert_eq!(op, Comparison::GreaterThanOrEquals);
        assert_eq!(serde_json::to_string(&op).unwrap(), "\">=\"");
    }
}
