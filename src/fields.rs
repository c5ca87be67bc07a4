#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{OverrideError, Result};

/// The kind of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A UTC timestamp, stored as RFC 3339 text.
    Date,
    /// A boolean flag.
    Bool,
    /// A finite floating point number.
    Float,
    /// Free text.
    Text,
}

/// A named attribute of a course tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// When the node is released to students.
    Start,
    /// When work under the node is due.
    Due,
    /// Hides the node from everyone except course staff.
    VisibleToStaffOnly,
    /// Human readable title.
    DisplayName,
    /// Points a scored item is worth, replacing its raw maximum.
    Weight,
    /// Assessment category of a graded section, e.g. `Homework`.
    Format,
    /// Raw maximum score of a problem.
    MaxScore,
}

impl Field {
    /// Every field the course tree knows about.
    pub const ALL: [Field; 7] = [
        Field::Start,
        Field::Due,
        Field::VisibleToStaffOnly,
        Field::DisplayName,
        Field::Weight,
        Field::Format,
        Field::MaxScore,
    ];

    /// The stored name of the field.
    pub fn name(self) -> &'static str {
        match self {
            Field::Start => "start",
            Field::Due => "due",
            Field::VisibleToStaffOnly => "visible_to_staff_only",
            Field::DisplayName => "display_name",
            Field::Weight => "weight",
            Field::Format => "format",
            Field::MaxScore => "max_score",
        }
    }

    /// Declared value kind.
    pub fn kind(self) -> FieldKind {
        match self {
            Field::Start | Field::Due => FieldKind::Date,
            Field::VisibleToStaffOnly => FieldKind::Bool,
            Field::Weight | Field::MaxScore => FieldKind::Float,
            Field::DisplayName | Field::Format => FieldKind::Text,
        }
    }

    /// Whether an unset value falls back to the nearest ancestor.
    pub fn is_inheritable(self) -> bool {
        matches!(self, Field::Start | Field::Due | Field::VisibleToStaffOnly)
    }

    /// Whether a context may store an override for the field.
    pub fn is_overridable(self) -> bool {
        !matches!(self, Field::Format | Field::MaxScore)
    }

    /// Value used once resolution runs out of ancestors.
    pub fn default_value(self) -> Option<FieldValue> {
        match self {
            Field::VisibleToStaffOnly => Some(FieldValue::Bool(false)),
            _ => None,
        }
    }

    /// Fails with `UnsupportedField` unless the field accepts overrides.
    pub fn ensure_overridable(self) -> Result<()> {
        if self.is_overridable() || self.is_inheritable() {
            Ok(())
        } else {
            Err(OverrideError::UnsupportedField(self))
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = OverrideError;

    fn from_str(s: &str) -> Result<Self> {
        Field::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| OverrideError::FieldNotFound(s.to_string()))
    }
}

/// A concrete field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A UTC timestamp.
    Date(DateTime<Utc>),
    /// A boolean flag.
    Bool(bool),
    /// A number.
    Float(f64),
    /// Free text.
    Text(String),
}

impl FieldValue {
    /// Kind of the held value.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Date(_) => FieldKind::Date,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Text(_) => FieldKind::Text,
        }
    }

    /// Returns the timestamp, if this is a date.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the flag, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number, if this is a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a JSON value into the declared kind of `field`.
    pub fn from_json(field: Field, value: &Value) -> Result<Self> {
        let mismatch = || OverrideError::Serialization {
            field,
            reason: format!("expected a {:?} value, found `{value}`", field.kind()),
        };

        match field.kind() {
            FieldKind::Date => {
                let raw = value.as_str().ok_or_else(mismatch)?;
                DateTime::parse_from_rfc3339(raw)
                    .map(|d| FieldValue::Date(d.with_timezone(&Utc)))
                    .map_err(|e| OverrideError::Serialization {
                        field,
                        reason: e.to_string(),
                    })
            }
            FieldKind::Bool => value.as_bool().map(FieldValue::Bool).ok_or_else(mismatch),
            FieldKind::Float => value.as_f64().map(FieldValue::Float).ok_or_else(mismatch),
            FieldKind::Text => value
                .as_str()
                .map(|s| FieldValue::Text(s.to_string()))
                .ok_or_else(mismatch),
        }
    }

    /// Parses user supplied text into the declared kind of `field`.
    ///
    /// Dates accept RFC 3339 or a bare `YYYY-MM-DD`, read as midnight UTC.
    pub fn parse(field: Field, text: &str) -> Result<Self> {
        let text = text.trim();
        let bad = |reason: String| OverrideError::Serialization { field, reason };

        match field.kind() {
            FieldKind::Date => match DateTime::parse_from_rfc3339(text) {
                Ok(d) => Ok(FieldValue::Date(d.with_timezone(&Utc))),
                Err(_) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map_err(|e| bad(e.to_string()))?
                    .and_hms_opt(0, 0, 0)
                    .map(|d| FieldValue::Date(d.and_utc()))
                    .ok_or_else(|| bad(format!("`{text}` is not a valid date"))),
            },
            FieldKind::Bool => text
                .parse::<bool>()
                .map(FieldValue::Bool)
                .map_err(|e| bad(e.to_string())),
            FieldKind::Float => text
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|e| bad(e.to_string())),
            FieldKind::Text => Ok(FieldValue::Text(text.to_string())),
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Serializes `value` for storage under `field`.
///
/// The encoding is checked by decoding it again; a value that does not
/// survive the trip (wrong kind, non-finite number) is rejected rather than
/// stored.
pub fn encode(field: Field, value: &FieldValue) -> Result<String> {
    if value.kind() != field.kind() {
        return Err(OverrideError::Serialization {
            field,
            reason: format!("expected a {:?} value, got {:?}", field.kind(), value.kind()),
        });
    }

    let json = serde_json::to_string(value).map_err(|e| OverrideError::Serialization {
        field,
        reason: e.to_string(),
    })?;

    if decode(field, &json)? != *value {
        return Err(OverrideError::Serialization {
            field,
            reason: format!("`{value}` does not round-trip"),
        });
    }

    Ok(json)
}

/// Deserializes a stored value for `field`.
pub fn decode(field: Field, raw: &str) -> Result<FieldValue> {
    let json: Value = serde_json::from_str(raw).map_err(|e| OverrideError::Serialization {
        field,
        reason: e.to_string(),
    })?;
    FieldValue::from_json(field, &json)
}
