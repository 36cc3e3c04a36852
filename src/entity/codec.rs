//! Column codec: typed field values to and from their transport-safe JSON
//! representation, driven by the column's declared type.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::FieldValue;
use crate::error::{SyncError, SyncResult};

/// Static description of an enum column's variant set.
#[derive(Debug)]
pub struct EnumSpec {
    pub name: &'static str,
    /// Symbolic variant names, in declaration order.
    pub variants: &'static [&'static str],
}

impl EnumSpec {
    /// Resolve a transport value to a variant name: exact name lookup
    /// first, then value-based construction (integer ordinal into the
    /// variant list, or case-folded name match).
    pub fn resolve(&self, value: &Value) -> SyncResult<&'static str> {
        if let Some(raw) = value.as_str() {
            if let Some(variant) = self.variants.iter().find(|v| **v == raw) {
                return Ok(variant);
            }
            if let Some(variant) = self
                .variants
                .iter()
                .find(|v| v.eq_ignore_ascii_case(raw))
            {
                return Ok(variant);
            }
        } else if let Some(ordinal) = value.as_u64() {
            if let Some(variant) = self.variants.get(ordinal as usize) {
                return Ok(variant);
            }
        }

        Err(SyncError::UnknownEnumValue {
            name: self.name,
            value: value.to_string(),
        })
    }
}

/// Declared type of a persisted column.
#[derive(Debug, Clone, Copy)]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Text,
    Timestamp,
    Enum(&'static EnumSpec),
}

/// Encode a typed value into its transport representation. Enums encode to
/// their symbolic name, timestamps to an RFC 3339 string, everything else
/// passes through.
pub fn encode(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Int(i) => Value::from(*i),
        FieldValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Enum(name) => Value::String(name.clone()),
        FieldValue::Timestamp(ts) => Value::String(ts.to_rfc3339()),
    }
}

/// Decode a transport value back into a typed value. Null decodes to null
/// unconditionally, independent of the column type.
pub fn decode(value: &Value, ty: ColumnType) -> SyncResult<FieldValue> {
    if value.is_null() {
        return Ok(FieldValue::Null);
    }

    match ty {
        ColumnType::Bool => value
            .as_bool()
            .map(FieldValue::Bool)
            .ok_or_else(|| mismatch("bool", value)),
        ColumnType::Int => value
            .as_i64()
            .map(FieldValue::Int)
            .ok_or_else(|| mismatch("integer", value)),
        ColumnType::Float => value
            .as_f64()
            .map(FieldValue::Float)
            .ok_or_else(|| mismatch("float", value)),
        ColumnType::Text => value
            .as_str()
            .map(|s| FieldValue::Text(s.to_string()))
            .ok_or_else(|| mismatch("text", value)),
        ColumnType::Timestamp => {
            let raw = value.as_str().ok_or_else(|| mismatch("timestamp", value))?;
            DateTime::parse_from_rfc3339(raw)
                .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|_| SyncError::MalformedTimestamp(raw.to_string()))
        }
        ColumnType::Enum(spec) => spec
            .resolve(value)
            .map(|variant| FieldValue::Enum(variant.to_string())),
    }
}

fn mismatch(expected: &'static str, value: &Value) -> SyncError {
    SyncError::InvalidScalar {
        expected,
        value: value.to_string(),
    }
}
