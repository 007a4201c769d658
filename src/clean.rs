//! Cleaning operations over a working copy of the capital-projects table.
//!
//! [`Dataset`] owns the working [`Table`], an optional untouched copy of the
//! input, and the report of the most recent dtype conversion. Every operation
//! mutates the working table in place and logs what it did.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use heck::ToSnakeCase;
use itertools::Itertools;
use log::{info, warn};

use crate::{
    data::Value,
    dtypes::{self, DtypeReport},
    error::{CleanError, CleanResult},
    io_utils,
    mapping::{ColumnMapping, resolve_mapping},
    table::{Column, ColumnDtype, Table},
};

/// Column identifying a project across its change records.
pub const DEFAULT_ID_COLUMN: &str = "PID";

/// Renames every column listed in `mapping`. Keys that match no column are
/// ignored and unlisted columns keep their names.
pub fn rename_columns(table: &mut Table, mapping: &ColumnMapping) {
    for index in 0..table.column_count() {
        let Some(column) = table.column_at_mut(index) else {
            continue;
        };
        if let Some(target) = mapping.get(&column.name) {
            column.name = target.to_string();
        }
    }
}

/// Snake-cases a column name: `"Test 3"` becomes `"test_3"`.
pub fn lint_column_name(name: &str) -> String {
    name.trim().to_snake_case()
}

#[derive(Debug, Clone)]
pub struct Dataset {
    /// Working table every operation applies to.
    pub table: Table,
    /// Copy of the table as it was loaded, kept only when requested.
    pub input: Option<Table>,
    /// Report of the last dtype conversion that resolved a mapping.
    pub dtype_errors: Option<DtypeReport>,
}

impl Dataset {
    pub fn from_table(table: Table, copy_input: bool) -> Self {
        let input = copy_input.then(|| Table::from_existing(&table));
        let dataset = Self {
            table,
            input,
            dtype_errors: None,
        };
        dataset.log_record_count(DEFAULT_ID_COLUMN);
        dataset
    }

    /// Starts a new dataset from another one's working table.
    pub fn from_existing(source: &Dataset, copy_input: bool) -> Self {
        Self::from_table(Table::from_existing(&source.table), copy_input)
    }

    /// Reads a `.csv` (or `.tsv`) file. Any other extension is rejected.
    pub fn from_file(path: &Path, copy_input: bool) -> CleanResult<Self> {
        Self::from_file_with(path, None, None, copy_input)
    }

    pub fn from_file_with(
        path: &Path,
        delimiter: Option<u8>,
        encoding: Option<&str>,
        copy_input: bool,
    ) -> CleanResult<Self> {
        if !io_utils::is_supported_extension(path) {
            return Err(CleanError::UnsupportedFileType {
                path: PathBuf::from(path),
            });
        }
        let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
        let encoding = io_utils::resolve_encoding(encoding)?;
        let table = io_utils::read_table(path, delimiter, encoding)?;
        info!(
            "Loaded {} column(s) from {:?} (delimiter '{}')",
            table.column_count(),
            path,
            crate::printable_delimiter(delimiter)
        );
        Ok(Self::from_table(table, copy_input))
    }

    pub fn to_file(&self, path: &Path) -> CleanResult<()> {
        self.to_file_with(path, None)
    }

    pub fn to_file_with(&self, path: &Path, delimiter: Option<u8>) -> CleanResult<()> {
        let delimiter = io_utils::resolve_output_delimiter(path, delimiter);
        io_utils::write_table(&self.table, path, delimiter)?;
        info!("Wrote {} record(s) to {:?}", self.table.row_count(), path);
        Ok(())
    }

    /// Logs the record count and the number of distinct project ids.
    pub fn log_record_count(&self, id_column: &str) {
        let Some(column) = self.table.column(id_column) else {
            warn!("Column '{id_column}' not found: unable to log record count");
            return;
        };
        info!("Number of project change records: {}", self.table.row_count());
        let unique = column
            .stringified()
            .into_iter()
            .zip(&column.values)
            .filter(|(_, value)| !value.is_missing())
            .map(|(text, _)| text)
            .collect::<HashSet<_>>()
            .len();
        info!("Number of unique projects in dataset: {unique}");
    }

    /// Normalises column names to snake case.
    pub fn lint_colnames(&mut self) {
        let mut changed = Vec::new();
        for index in 0..self.table.column_count() {
            let Some(column) = self.table.column_at_mut(index) else {
                continue;
            };
            let linted = lint_column_name(&column.name);
            if linted != column.name {
                changed.push(format!("'{}' -> '{}'", column.name, linted));
                column.name = linted;
            }
        }
        if changed.is_empty() {
            info!("No column names changed");
        } else {
            info!("Column names changed: {}", changed.join(", "));
        }
    }

    /// Renames columns from a direct mapping or a JSON mapping file.
    pub fn rename_columns(&mut self, direct: Option<&ColumnMapping>, path: Option<&Path>) {
        let Some(mapping) = resolve_mapping(direct, path, "Column names") else {
            return;
        };
        rename_columns(&mut self.table, &mapping);
        let summary = mapping.iter().map(|(from, to)| format!("'{from}' -> '{to}'")).join(", ");
        info!("Column names mapped: {summary}");
    }

    /// Converts column dtypes from a direct mapping or a JSON mapping file.
    ///
    /// Returns the new report, which is also kept in `dtype_errors`. When no
    /// mapping resolves nothing is converted, `None` is returned and any
    /// earlier report is left as it was.
    pub fn set_dtypes(
        &mut self,
        direct: Option<&ColumnMapping>,
        path: Option<&Path>,
        coerce: bool,
    ) -> CleanResult<Option<&DtypeReport>> {
        let Some(mapping) = resolve_mapping(direct, path, "Column dtypes") else {
            return Ok(None);
        };
        let report = dtypes::set_dtypes(&mut self.table, &mapping, coerce)?;
        let stored = self.dtype_errors.insert(report);
        Ok(Some(&*stored))
    }

    /// Drops every row that is missing a value in any of `columns`.
    pub fn remove_missing_records(&mut self, columns: &[&str]) -> CleanResult<usize> {
        let indices = columns
            .iter()
            .map(|name| self.table.require_index(name))
            .collect::<CleanResult<Vec<_>>>()?;
        let keep = (0..self.table.row_count())
            .map(|row| {
                indices.iter().all(|&index| {
                    self.table
                        .column_at(index)
                        .and_then(|column| column.values.get(row))
                        .is_some_and(|value| !value.is_missing())
                })
            })
            .collect::<Vec<_>>();
        let removed = keep.iter().filter(|flag| !**flag).count();
        self.table.retain_rows(&keep);
        info!(
            "Removed {removed} record(s) missing values in [{}]; {} record(s) remain",
            columns.join(", "),
            self.table.row_count()
        );
        Ok(removed)
    }

    /// Stable ascending sort by one or more columns, missing values last.
    pub fn sort_values(&mut self, by: &[&str]) -> CleanResult<()> {
        let indices = by
            .iter()
            .map(|name| self.table.require_index(name))
            .collect::<CleanResult<Vec<_>>>()?;
        let keys = indices
            .iter()
            .filter_map(|&index| self.table.column_at(index))
            .map(|column| column.values.as_slice())
            .collect::<Vec<_>>();
        let mut order = (0..self.table.row_count()).collect::<Vec<_>>();
        order.sort_by(|&left, &right| {
            keys.iter()
                .map(|values| values[left].sort_cmp(&values[right]))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.table.reorder_rows(&order);
        info!("Sorted {} record(s) by [{}]", order.len(), by.join(", "));
        Ok(())
    }

    /// Appends a text column joining the listed columns' values with
    /// `separator`; missing cells contribute an empty segment.
    pub fn add_composite_key(
        &mut self,
        columns: &[&str],
        name: &str,
        separator: &str,
    ) -> CleanResult<()> {
        let parts = columns
            .iter()
            .map(|column| {
                self.table
                    .column(column)
                    .map(Column::fields)
                    .ok_or_else(|| CleanError::UnknownColumn {
                        column: column.to_string(),
                    })
            })
            .collect::<CleanResult<Vec<_>>>()?;
        let values = (0..self.table.row_count())
            .map(|row| Value::String(parts.iter().map(|fields| fields[row].as_str()).join(separator)))
            .collect();
        self.table
            .push_column(Column::with_dtype(name, values, ColumnDtype::String))?;
        info!("Added composite key '{name}' from [{}]", columns.join(", "));
        Ok(())
    }
}
