//! Column-oriented in-memory table.
//!
//! A [`Table`] is an ordered list of named [`Column`]s of equal length. Rows
//! have no identity beyond their 0-based position, which is also the key used
//! by the dtype error ledgers. Column names may repeat; name lookups resolve to
//! the first match.

use std::fmt;

use crate::{
    data::{Value, format_date, is_midnight},
    error::{CleanError, CleanResult},
};

/// Storage type of a column, as left behind by loading or by a dtype conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDtype {
    Object,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    DateTime,
    String,
}

impl ColumnDtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnDtype::Object => "object",
            ColumnDtype::Int8 => "int8",
            ColumnDtype::Int16 => "int16",
            ColumnDtype::Int32 => "int32",
            ColumnDtype::Int64 => "int64",
            ColumnDtype::UInt8 => "uint8",
            ColumnDtype::UInt16 => "uint16",
            ColumnDtype::UInt32 => "uint32",
            ColumnDtype::UInt64 => "uint64",
            ColumnDtype::Float32 => "float32",
            ColumnDtype::Float64 => "float64",
            ColumnDtype::DateTime => "datetime64",
            ColumnDtype::String => "string",
        }
    }

}

impl fmt::Display for ColumnDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const MISSING_TOKENS: &[&str] = &[
    "", "na", "n/a", "nan", "-nan", "null", "none", "#n/a", "<na>", "nat",
];

fn is_missing_token(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    MISSING_TOKENS.contains(&lowered.as_str())
}

#[derive(Debug, Clone, Copy)]
struct TypeCandidate {
    possible_integer: bool,
    possible_float: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_integer: true,
            possible_float: true,
        }
    }

    fn observe(&mut self, raw: &str) {
        let trimmed = raw.trim();
        if self.possible_integer && trimmed.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && trimmed.parse::<f64>().is_err() {
            self.possible_float = false;
        }
    }

    fn decide(&self, observed: usize) -> ColumnDtype {
        if observed == 0 {
            ColumnDtype::Object
        } else if self.possible_integer {
            ColumnDtype::Int64
        } else if self.possible_float {
            ColumnDtype::Float64
        } else {
            ColumnDtype::Object
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
    pub dtype: ColumnDtype,
}

impl Column {
    /// Builds a column and derives its dtype from the values.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let dtype = infer_dtype(&values);
        Self {
            name: name.into(),
            values,
            dtype,
        }
    }

    pub fn with_dtype(name: impl Into<String>, values: Vec<Value>, dtype: ColumnDtype) -> Self {
        Self {
            name: name.into(),
            values,
            dtype,
        }
    }

    /// Builds a column from raw delimited-text fields. A column whose present
    /// fields all parse as integers becomes `int64`, all-numeric becomes
    /// `float64`, anything else stays text. Missing-value tokens become `Null`.
    pub fn from_text(name: impl Into<String>, raw: &[String]) -> Self {
        let mut candidate = TypeCandidate::new();
        let mut observed = 0usize;
        for field in raw.iter().filter(|field| !is_missing_token(field)) {
            candidate.observe(field);
            observed += 1;
        }
        let dtype = candidate.decide(observed);
        let values = raw
            .iter()
            .map(|field| {
                if is_missing_token(field) {
                    return Value::Null;
                }
                let trimmed = field.trim();
                match dtype {
                    ColumnDtype::Int64 => trimmed.parse().map(Value::Integer).unwrap_or(Value::Null),
                    ColumnDtype::Float64 => trimmed.parse().map(Value::Float).unwrap_or(Value::Null),
                    _ => Value::String(field.clone()),
                }
            })
            .collect();
        Self {
            name: name.into(),
            values,
            dtype,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// String projection of the whole column. A timestamp column whose values
    /// all sit on midnight renders as bare dates.
    pub fn stringified(&self) -> Vec<String> {
        if self.dtype == ColumnDtype::DateTime {
            render_datetime_column(&self.values)
        } else {
            self.values.iter().map(Value::stringify).collect()
        }
    }

    /// Field text for delimited output.
    pub fn fields(&self) -> Vec<String> {
        if self.dtype != ColumnDtype::DateTime {
            return self.values.iter().map(Value::to_field).collect();
        }
        render_datetime_column(&self.values)
            .into_iter()
            .zip(&self.values)
            .map(|(text, value)| if value.is_missing() { String::new() } else { text })
            .collect()
    }
}

/// Renders timestamp values the way a timestamp column prints: date-only when
/// every present value is at midnight, full precision otherwise.
pub fn render_datetime_column(values: &[Value]) -> Vec<String> {
    let date_only = values.iter().all(|value| match value {
        Value::DateTime(dt) => is_midnight(dt),
        _ => true,
    });
    values
        .iter()
        .map(|value| match value {
            Value::DateTime(dt) if date_only => format_date(dt),
            other => other.stringify(),
        })
        .collect()
}

/// Derives a dtype from already-typed values; missing cells do not vote.
pub fn infer_dtype(values: &[Value]) -> ColumnDtype {
    let mut present = values.iter().filter(|value| !value.is_missing()).peekable();
    if present.peek().is_none() {
        return ColumnDtype::Object;
    }
    let mut all_integer = true;
    let mut all_numeric = true;
    let mut all_datetime = true;
    for value in present {
        all_integer &= matches!(value, Value::Integer(_));
        all_numeric &= value.is_numeric();
        all_datetime &= matches!(value, Value::DateTime(_));
    }
    if all_integer {
        ColumnDtype::Int64
    } else if all_numeric {
        ColumnDtype::Float64
    } else if all_datetime {
        ColumnDtype::DateTime
    } else {
        ColumnDtype::Object
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> CleanResult<Self> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|column| column.len() != expected) {
                return Err(CleanError::LengthMismatch {
                    column: bad.name.clone(),
                    expected,
                    found: bad.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// Convenience constructor from `(name, values)` pairs.
    pub fn from_pairs<N, I>(pairs: I) -> CleanResult<Self>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Vec<Value>)>,
    {
        let columns = pairs
            .into_iter()
            .map(|(name, values)| Column::new(name, values))
            .collect();
        Self::from_columns(columns)
    }

    /// Independent copy of another table's current state.
    pub fn from_existing(source: &Table) -> Self {
        source.clone()
    }

    /// Empty table with the given column names.
    pub fn with_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let columns = headers
            .iter()
            .map(|name| Column::with_dtype(name.as_ref(), Vec::new(), ColumnDtype::Object))
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn require_index(&self, name: &str) -> CleanResult<usize> {
        self.column_index(name)
            .ok_or_else(|| CleanError::UnknownColumn {
                column: name.to_string(),
            })
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn column_at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_at_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(index)
    }

    pub fn push_column(&mut self, column: Column) -> CleanResult<()> {
        let found = column.len();
        if !self.columns.is_empty() && found != self.row_count() {
            return Err(CleanError::LengthMismatch {
                column: column.name,
                expected: self.row_count(),
                found,
            });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Keeps only the rows whose flag is `true`.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column
                .values
                .retain(|_| flags.next().copied().unwrap_or(false));
        }
    }

    /// Reorders every column by the given row permutation.
    pub fn reorder_rows(&mut self, order: &[usize]) {
        for column in &mut self.columns {
            let reordered = order
                .iter()
                .filter_map(|&idx| column.values.get(idx).cloned())
                .collect();
            column.values = reordered;
        }
    }

    /// Row-major field text, as written to delimited output.
    pub fn field_rows(&self) -> Vec<Vec<String>> {
        let rendered = self.columns.iter().map(Column::fields).collect::<Vec<_>>();
        (0..self.row_count())
            .map(|row| {
                rendered
                    .iter()
                    .map(|fields| fields.get(row).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn from_text_infers_integer_float_and_object() {
        let ints = Column::from_text("a", &text(&["1", "", "3"]));
        assert_eq!(ints.dtype, ColumnDtype::Int64);
        assert_eq!(ints.values, vec![Value::Integer(1), Value::Null, Value::Integer(3)]);

        let floats = Column::from_text("b", &text(&["1", "2.5", "NA"]));
        assert_eq!(floats.dtype, ColumnDtype::Float64);
        assert_eq!(floats.values[0], Value::Float(1.0));
        assert_eq!(floats.values[2], Value::Null);

        let mixed = Column::from_text("c", &text(&["1", "2", "2020-01-01"]));
        assert_eq!(mixed.dtype, ColumnDtype::Object);
        assert_eq!(mixed.values[2], Value::from("2020-01-01"));
    }

    #[test]
    fn datetime_column_renders_dates_when_all_midnight() {
        let midnight = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let column = Column::new("c", vec![Value::NaT, Value::DateTime(midnight)]);
        assert_eq!(column.dtype, ColumnDtype::DateTime);
        assert_eq!(column.stringified(), vec!["NaT", "2020-01-01"]);
        assert_eq!(column.fields(), vec!["", "2020-01-01"]);

        let afternoon = midnight + chrono::Duration::hours(15);
        let column = Column::new("c", vec![Value::DateTime(midnight), Value::DateTime(afternoon)]);
        assert_eq!(
            column.stringified(),
            vec!["2020-01-01 00:00:00", "2020-01-01 15:00:00"]
        );
    }

    #[test]
    fn from_columns_rejects_ragged_input() {
        let err = Table::from_pairs([
            ("a", vec![Value::Integer(1)]),
            ("b", vec![Value::Integer(1), Value::Integer(2)]),
        ])
        .unwrap_err();
        assert!(matches!(err, CleanError::LengthMismatch { ref column, .. } if column == "b"));
    }

    #[test]
    fn retain_and_reorder_rows_apply_to_every_column() {
        let mut table = Table::from_pairs([
            ("a", vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]),
            ("b", vec![Value::from("x"), Value::from("y"), Value::from("z")]),
        ])
        .unwrap();
        table.retain_rows(&[true, false, true]);
        table.reorder_rows(&[1, 0]);
        assert_eq!(
            table.column("a").unwrap().values,
            vec![Value::Integer(3), Value::Integer(1)]
        );
        assert_eq!(
            table.column("b").unwrap().values,
            vec![Value::from("z"), Value::from("x")]
        );
    }

    #[test]
    fn push_column_rejects_wrong_length() {
        let mut table = Table::from_pairs([("PID", vec![Value::Integer(1), Value::Integer(2)])]).unwrap();
        let err = table
            .push_column(Column::new("key", vec![Value::from("1_A")]))
            .unwrap_err();
        assert!(matches!(
            err,
            CleanError::LengthMismatch { ref column, expected: 2, found: 1 } if column == "key"
        ));
        assert_eq!(table.column_count(), 1);

        table
            .push_column(Column::new("key", vec![Value::from("1_A"), Value::Null]))
            .unwrap();
        assert_eq!(table.column("key").unwrap().fields(), vec!["1_A", ""]);
    }

    #[test]
    fn from_existing_is_independent() {
        let source = Table::from_pairs([("PID", vec![Value::Integer(0)])]).unwrap();
        let mut copy = Table::from_existing(&source);
        copy.column_mut("PID").unwrap().values[0] = Value::Integer(9);
        assert_eq!(source.column("PID").unwrap().values[0], Value::Integer(0));
    }
}
