//! Cell values and their text forms.
//!
//! A [`Value`] is one cell of a [`crate::table::Table`]. Text rendering follows
//! the dataframe conventions the capital-projects extracts were produced with:
//! floats always carry a fractional part, missing numbers print as `nan` and
//! missing timestamps as `NaT`. Conversion ledgers compare these renderings, so
//! they must stay stable.

use std::{cmp::Ordering, fmt};

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};

// Slash dates read month-first; day-first is only a fallback for days past 12.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
    /// Not-a-time: a timestamp slot whose value could not be parsed.
    NaT,
}

impl Value {
    /// `Null`, `NaT` and NaN floats all count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null | Value::NaT => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Per-cell string projection.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => "nan".to_string(),
            Value::NaT => "NaT".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::String(s) => s.clone(),
            Value::DateTime(dt) => format_datetime(dt),
        }
    }

    /// Text written to a delimited file: missing cells become empty fields.
    pub fn to_field(&self) -> String {
        if self.is_missing() {
            String::new()
        } else {
            self.stringify()
        }
    }

    /// Compares two cells as a conversion would see them: missing matches missing
    /// and integers match numerically equal floats.
    pub fn same_cell(&self, other: &Value) -> bool {
        match (self, other) {
            (left, right) if left.is_missing() || right.is_missing() => {
                left.is_missing() && right.is_missing()
            }
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (left, right) if left.is_numeric() && right.is_numeric() => {
                left.as_f64() == right.as_f64()
            }
            (left, right) => left == right,
        }
    }

    /// Ordering used by record sorting. Missing values sort last; mixed kinds
    /// order numbers, then timestamps, then text.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match self.sort_rank().cmp(&other.sort_rank()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => Ordering::Equal,
            },
        }
    }

    fn sort_rank(&self) -> u8 {
        if self.is_missing() {
            return 3;
        }
        match self {
            Value::Integer(_) | Value::Float(_) => 0,
            Value::DateTime(_) => 1,
            _ => 2,
        }
    }

    /// Quoted form used in log lines so text and numbers stay distinguishable.
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("'{s}'"),
            Value::DateTime(dt) => format!("Timestamp('{}')", format_datetime(dt)),
            other => other.stringify(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stringify())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null | Value::NaT => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_nan() => serializer.serialize_none(),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => serializer.serialize_str(&format_datetime(dt)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        let token = if value > 0.0 { "inf" } else { "-inf" };
        token.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub fn format_datetime(value: &NaiveDateTime) -> String {
    if value.nanosecond() == 0 {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

pub fn format_date(value: &NaiveDateTime) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub fn is_midnight(value: &NaiveDateTime) -> bool {
    value.time().num_seconds_from_midnight() == 0 && value.nanosecond() == 0
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Strict timestamp parse: a full datetime, or a calendar date taken as midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    parse_naive_datetime(trimmed).or_else(|| {
        parse_naive_date(trimmed).and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}
