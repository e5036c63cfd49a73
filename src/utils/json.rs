use chrono::NaiveDate;
use serde_json::Value;

use super::dates::parse_date;

/// A request field that may be absent, explicitly cleared, or set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NullableValue<T = String> {
    #[default]
    Omitted,
    Null,
    Value(T),
}

impl<T> NullableValue<T> {
    pub fn is_omitted(&self) -> bool {
        matches!(self, NullableValue::Omitted)
    }

    /// Collapses omitted and null into `None`, as inserts do.
    pub fn into_option(self) -> Option<T> {
        match self {
            NullableValue::Value(value) => Some(value),
            NullableValue::Omitted | NullableValue::Null => None,
        }
    }

    /// Changeset form: `None` leaves the column alone, `Some(None)` clears it.
    pub fn into_change(self) -> Option<Option<T>> {
        match self {
            NullableValue::Omitted => None,
            NullableValue::Null => Some(None),
            NullableValue::Value(value) => Some(Some(value)),
        }
    }
}

/// Reads a text field. Blank strings count as null and numbers are stringified.
pub fn classify_nullable(optional_value: Option<&Value>) -> Result<NullableValue, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(NullableValue::Null)
            } else {
                Ok(NullableValue::Value(trimmed.to_owned()))
            }
        }
        Some(Value::Number(n)) => Ok(NullableValue::Value(n.to_string())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}

pub fn classify_nullable_date(
    optional_value: Option<&Value>,
) -> Result<NullableValue<NaiveDate>, String> {
    match classify_nullable(optional_value)? {
        NullableValue::Omitted => Ok(NullableValue::Omitted),
        NullableValue::Null => Ok(NullableValue::Null),
        NullableValue::Value(raw) => parse_date(&raw)
            .map(NullableValue::Value)
            .ok_or_else(|| format!("`{raw}` is not a valid date (expected YYYY-MM-DD)")),
    }
}

/// Rejects keys outside `allowed`, naming the first offender.
pub fn reject_unknown_fields(
    body: &serde_json::Map<String, Value>,
    allowed: &[&[&str]],
) -> Result<(), String> {
    match body
        .keys()
        .find(|key| !allowed.iter().any(|group| group.contains(&key.as_str())))
    {
        Some(key) => Err(format!("unknown field `{key}`")),
        None => Ok(()),
    }
}
