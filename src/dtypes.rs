//! Column dtype conversion with per-cell error ledgers.
//!
//! Every conversion is computed twice over the same parse logic: once under
//! the *ignore* policy (a cell that fails keeps its original value) and once
//! under the *coerce* policy (a cell that fails becomes missing). The error
//! ledger of a column is the post-hoc difference between the two results, so
//! whatever the parse does at the edges (overflow, infinities, narrowing) the
//! ledger agrees with what the two outputs actually contain.
//!
//! [`set_dtypes`] applies a whole mapping to a table, writes back one of the
//! two results per column and returns a [`DtypeReport`] keyed by column name.

use std::{collections::BTreeMap, fmt};

use log::{info, warn};
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    data::{Value, parse_timestamp},
    error::{CleanError, CleanResult},
    mapping::ColumnMapping,
    table::{Column, ColumnDtype, Table, infer_dtype, render_datetime_column},
};

/// Target type requested for a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Integer,
    Float,
    Signed,
    Unsigned,
    Datetime,
    String,
    /// Unrecognised tag, kept verbatim for reporting.
    Invalid(String),
}

impl Directive {
    /// Parses a tag from a mapping. Only the exact lowercase tags are
    /// recognised; anything else becomes [`Directive::Invalid`].
    pub fn parse(tag: &str) -> Self {
        match tag {
            "integer" => Directive::Integer,
            "float" => Directive::Float,
            "signed" => Directive::Signed,
            "unsigned" => Directive::Unsigned,
            "datetime" => Directive::Datetime,
            "string" => Directive::String,
            _ => Directive::Invalid(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Directive::Integer => "integer",
            Directive::Float => "float",
            Directive::Signed => "signed",
            Directive::Unsigned => "unsigned",
            Directive::Datetime => "datetime",
            Directive::String => "string",
            Directive::Invalid(tag) => tag,
        }
    }

    /// Runs the conversion for this directive. `None` for invalid tags.
    pub fn convert(&self, column: &Column) -> Option<ConversionResult> {
        match self {
            Directive::Integer => Some(numeric_conversion(column, NumericKind::Integer)),
            Directive::Float => Some(numeric_conversion(column, NumericKind::Float)),
            Directive::Signed => Some(numeric_conversion(column, NumericKind::Signed)),
            Directive::Unsigned => Some(numeric_conversion(column, NumericKind::Unsigned)),
            Directive::Datetime => Some(datetime_conversion(column)),
            Directive::String => Some(string_conversion(column)),
            Directive::Invalid(_) => None,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Integer,
    Signed,
    Unsigned,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep the original value of a cell that fails to convert.
    Ignore,
    /// Replace a cell that fails to convert with a missing marker.
    Coerce,
}

/// Row position → value that failed conversion (as it appears in the ignore
/// result). Rebuilt for every conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorLedger(BTreeMap<usize, Value>);

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, position: usize, value: Value) {
        self.0.insert(position, value);
    }

    pub fn get(&self, position: usize) -> Option<&Value> {
        self.0.get(&position)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.0.iter().map(|(position, value)| (*position, value))
    }

    fn retain_present(&mut self) {
        self.0.retain(|_, value| !value.is_missing());
    }
}

impl fmt::Display for ErrorLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (position, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{position}: {}", value.repr())?;
        }
        write!(f, "}}")
    }
}

/// One policy's output for a column.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedColumn {
    pub values: Vec<Value>,
    pub dtype: ColumnDtype,
}

/// Both policy outputs for a column plus the ledger of differing cells.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub ignore: ConvertedColumn,
    pub coerce: ConvertedColumn,
    pub ledger: ErrorLedger,
}

impl ConversionResult {
    fn from_policies(ignore: ConvertedColumn, coerce: ConvertedColumn) -> Self {
        let mut ledger = ErrorLedger::new();
        for (position, (kept, coerced)) in ignore.values.iter().zip(&coerce.values).enumerate() {
            if !kept.same_cell(coerced) {
                ledger.insert(position, kept.clone());
            }
        }
        Self {
            ignore,
            coerce,
            ledger,
        }
    }

    pub fn select(&self, policy: FailurePolicy) -> &ConvertedColumn {
        match policy {
            FailurePolicy::Ignore => &self.ignore,
            FailurePolicy::Coerce => &self.coerce,
        }
    }

    fn into_parts(self, policy: FailurePolicy) -> (ConvertedColumn, ErrorLedger) {
        match policy {
            FailurePolicy::Ignore => (self.ignore, self.ledger),
            FailurePolicy::Coerce => (self.coerce, self.ledger),
        }
    }
}

/// Outcome recorded for one column of a [`set_dtypes`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnReport {
    Ledger(ErrorLedger),
    /// The directive tag was not recognised; the message explains which.
    InvalidDirective(String),
}

impl ColumnReport {
    pub fn ledger(&self) -> Option<&ErrorLedger> {
        match self {
            ColumnReport::Ledger(ledger) => Some(ledger),
            ColumnReport::InvalidDirective(_) => None,
        }
    }

    pub fn error_count(&self) -> usize {
        match self {
            ColumnReport::Ledger(ledger) => ledger.len(),
            ColumnReport::InvalidDirective(_) => 1,
        }
    }
}

/// Per-column results of a [`set_dtypes`] call, in mapping order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DtypeReport {
    columns: Vec<(String, ColumnReport)>,
}

impl DtypeReport {
    pub fn get(&self, column: &str) -> Option<&ColumnReport> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, report)| report)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnReport)> {
        self.columns.iter().map(|(name, report)| (name.as_str(), report))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn total_errors(&self) -> usize {
        self.columns.iter().map(|(_, report)| report.error_count()).sum()
    }

    fn push(&mut self, column: &str, report: ColumnReport) {
        self.columns.push((column.to_string(), report));
    }
}

impl Serialize for DtypeReport {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, report) in &self.columns {
            map.serialize_entry(name, report)?;
        }
        map.end()
    }
}

fn parse_numeric_cell(value: &Value) -> Option<Value> {
    if value.is_missing() {
        return Some(Value::Null);
    }
    match value {
        Value::Integer(_) | Value::Float(_) => Some(value.clone()),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Some(Value::Null);
            }
            if let Ok(parsed) = trimmed.parse::<i64>() {
                return Some(Value::Integer(parsed));
            }
            match trimmed.parse::<f64>() {
                Ok(parsed) if parsed.is_nan() => Some(Value::Null),
                Ok(parsed) => Some(Value::Float(parsed)),
                Err(_) => None,
            }
        }
        _ => None,
    }
}

fn is_integral(value: f64) -> bool {
    value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64
}

fn smallest_signed(min: i64, max: i64) -> ColumnDtype {
    if min >= i8::MIN as i64 && max <= i8::MAX as i64 {
        ColumnDtype::Int8
    } else if min >= i16::MIN as i64 && max <= i16::MAX as i64 {
        ColumnDtype::Int16
    } else if min >= i32::MIN as i64 && max <= i32::MAX as i64 {
        ColumnDtype::Int32
    } else {
        ColumnDtype::Int64
    }
}

fn smallest_unsigned(max: i64) -> ColumnDtype {
    if max <= u8::MAX as i64 {
        ColumnDtype::UInt8
    } else if max <= u16::MAX as i64 {
        ColumnDtype::UInt16
    } else if max <= u32::MAX as i64 {
        ColumnDtype::UInt32
    } else {
        ColumnDtype::UInt64
    }
}

fn fits_f32(value: f64) -> bool {
    !value.is_finite() || (value as f32) as f64 == value
}

fn map_numbers(values: Vec<Value>, convert: impl Fn(f64, &Value) -> Value) -> Vec<Value> {
    values
        .into_iter()
        .map(|value| match value.as_f64() {
            Some(number) if !value.is_missing() => convert(number, &value),
            _ => value,
        })
        .collect()
}

/// Narrows numeric output to the smallest dtype of the requested family.
/// `kept_original` marks output that still holds unconverted cells, which
/// leaves the column as `object`.
fn downcast(values: Vec<Value>, kind: NumericKind, kept_original: bool) -> ConvertedColumn {
    let numbers = values
        .iter()
        .filter(|value| value.is_numeric() && !value.is_missing())
        .filter_map(Value::as_f64)
        .collect::<Vec<_>>();

    let (values, dtype) = if kind == NumericKind::Float {
        let dtype = if !numbers.is_empty() && numbers.iter().all(|n| fits_f32(*n)) {
            ColumnDtype::Float32
        } else {
            ColumnDtype::Float64
        };
        (map_numbers(values, |n, _| Value::Float(n)), dtype)
    } else if numbers.is_empty() {
        (values, ColumnDtype::Float64)
    } else if numbers.iter().all(|n| is_integral(*n)) {
        let values = map_numbers(values, |n, original| match original {
            Value::Integer(i) => Value::Integer(*i),
            _ => Value::Integer(n as i64),
        });
        let ints = values.iter().filter_map(|value| match value {
            Value::Integer(i) => Some(*i),
            _ => None,
        });
        let (min, max) = ints.fold((i64::MAX, i64::MIN), |(lo, hi), i| (lo.min(i), hi.max(i)));
        let dtype = match kind {
            NumericKind::Unsigned if min >= 0 => smallest_unsigned(max),
            NumericKind::Unsigned => ColumnDtype::Int64,
            _ => smallest_signed(min, max),
        };
        (values, dtype)
    } else {
        (map_numbers(values, |n, _| Value::Float(n)), ColumnDtype::Float64)
    };

    let dtype = if kept_original {
        ColumnDtype::Object
    } else {
        dtype
    };
    ConvertedColumn { values, dtype }
}

/// Converts a column to numbers under one failure policy.
pub fn to_numeric(column: &Column, kind: NumericKind, policy: FailurePolicy) -> ConvertedColumn {
    let mut kept_original = false;
    let values = column
        .values
        .iter()
        .map(|original| match parse_numeric_cell(original) {
            Some(parsed) => parsed,
            None => match policy {
                FailurePolicy::Ignore => {
                    kept_original = true;
                    original.clone()
                }
                FailurePolicy::Coerce => Value::Null,
            },
        })
        .collect();
    downcast(values, kind, kept_original)
}

fn numeric_conversion(column: &Column, kind: NumericKind) -> ConversionResult {
    let ignore = to_numeric(column, kind, FailurePolicy::Ignore);
    let coerce = to_numeric(column, kind, FailurePolicy::Coerce);
    ConversionResult::from_policies(ignore, coerce)
}

fn datetime_conversion(column: &Column) -> ConversionResult {
    // Parse the text form so bare numbers are never read as epoch offsets.
    let original_text = column.stringified();
    let coerced = original_text
        .iter()
        .map(|text| parse_timestamp(text).map(Value::DateTime).unwrap_or(Value::NaT))
        .collect::<Vec<_>>();
    let kept = coerced
        .iter()
        .zip(&column.values)
        .map(|(parsed, original)| match parsed {
            Value::NaT => original.clone(),
            other => other.clone(),
        })
        .collect::<Vec<_>>();

    let coerced_text = render_datetime_column(&coerced);
    let mut ledger = ErrorLedger::new();
    for (position, (before, after)) in original_text.iter().zip(&coerced_text).enumerate() {
        if before != after {
            ledger.insert(position, kept[position].clone());
        }
    }
    // A cell that was already missing is not a conversion failure.
    ledger.retain_present();

    let ignore_dtype = infer_dtype(&kept);
    ConversionResult {
        ignore: ConvertedColumn {
            values: kept,
            dtype: ignore_dtype,
        },
        coerce: ConvertedColumn {
            values: coerced,
            dtype: ColumnDtype::DateTime,
        },
        ledger,
    }
}

fn string_conversion(column: &Column) -> ConversionResult {
    let values = column
        .stringified()
        .into_iter()
        .zip(&column.values)
        .map(|(text, original)| {
            if original.is_missing() {
                Value::Null
            } else {
                Value::String(text)
            }
        })
        .collect::<Vec<_>>();
    let converted = ConvertedColumn {
        values,
        dtype: ColumnDtype::String,
    };
    ConversionResult {
        ignore: converted.clone(),
        coerce: converted,
        ledger: ErrorLedger::new(),
    }
}

/// Converts `column` of `table` to timestamps.
///
/// The coerce result holds `NaT` wherever the text form of a cell does not
/// parse; the ignore result puts the original cell back in those places. The
/// ledger records every position whose text changed across the round trip,
/// excluding cells that were missing to begin with.
pub fn coerce_datetime(table: &Table, column: &str) -> CleanResult<ConversionResult> {
    let column = table.column(column).ok_or_else(|| CleanError::UnknownColumn {
        column: column.to_string(),
    })?;
    Ok(datetime_conversion(column))
}

/// Applies a column → dtype-tag mapping to `table` in place.
///
/// Each mapped column is converted with the ignore result written back, or the
/// coerce result when `coerce` is set. Invalid tags leave their column
/// untouched and are recorded in the report as an explanatory message. Every
/// mapped column must exist; otherwise the call fails before any column is
/// modified.
pub fn set_dtypes(
    table: &mut Table,
    mapping: &ColumnMapping,
    coerce: bool,
) -> CleanResult<DtypeReport> {
    for name in mapping.keys() {
        table.require_index(name)?;
    }

    let policy = if coerce {
        warn!("All dtype conversion error values will be deleted and left blank");
        FailurePolicy::Coerce
    } else {
        FailurePolicy::Ignore
    };

    let mut report = DtypeReport::default();
    for (name, tag) in mapping.iter() {
        let column = table
            .column_mut(name)
            .ok_or_else(|| CleanError::UnknownColumn {
                column: name.to_string(),
            })?;
        let directive = Directive::parse(tag);
        let Some(result) = directive.convert(column) else {
            let message = format!("'{tag}' dtype is not a valid input");
            info!("'{name}' dtype conversion to '{tag}' encountered 1 errors: {message}");
            report.push(name, ColumnReport::InvalidDirective(message));
            continue;
        };

        let (converted, ledger) = result.into_parts(policy);
        if ledger.is_empty() {
            info!("'{name}' dtype conversion to '{tag}' encountered no errors");
        } else {
            info!(
                "'{name}' dtype conversion to '{tag}' encountered {} errors: {ledger}",
                ledger.len()
            );
        }
        column.values = converted.values;
        column.dtype = converted.dtype;
        report.push(name, ColumnReport::Ledger(ledger));
    }
    Ok(report)
}
