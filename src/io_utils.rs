//! Delimited-file loading and saving for [`Table`]s.
//!
//! - **Delimiter resolution**: `.tsv` → tab, anything else → comma, unless an
//!   explicit delimiter is given.
//! - **Encoding**: input is decoded with `encoding_rs` (UTF-8 by default);
//!   output is always UTF-8.
//! - **Typing**: columns are typed on load via [`Column::from_text`].

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read},
    path::Path,
};

use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    error::{CleanError, CleanResult},
    table::{Column, Table},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

pub fn is_supported_extension(path: &Path) -> bool {
    has_extension(path, "csv") || has_extension(path, "tsv")
}

pub fn resolve_encoding(label: Option<&str>) -> CleanResult<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes()).ok_or_else(|| {
            CleanError::UnknownEncoding {
                label: value.to_string(),
            }
        }),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or(if has_extension(path, "tsv") {
        DEFAULT_TSV_DELIMITER
    } else {
        DEFAULT_CSV_DELIMITER
    })
}

pub fn resolve_output_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    resolve_input_delimiter(path, provided)
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> CleanResult<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(CleanError::Decode {
            encoding: encoding.name(),
        })
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> CleanResult<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reads a delimited file with a header row into a typed [`Table`].
pub fn read_table(path: &Path, delimiter: u8, encoding: &'static Encoding) -> CleanResult<Table> {
    let file = File::open(path)?;
    read_table_from(BufReader::new(file), delimiter, encoding)
}

pub fn read_table_from<R: Read>(
    reader: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> CleanResult<Table> {
    let mut reader = open_csv_reader(reader, delimiter);
    let headers = decode_record(reader.byte_headers()?, encoding)?;
    let mut fields = vec![Vec::new(); headers.len()];

    for record in reader.byte_records() {
        let decoded = decode_record(&record?, encoding)?;
        for (column, value) in fields.iter_mut().zip(decoded) {
            column.push(value);
        }
    }
    debug!(
        "Read {} row(s) across {} column(s)",
        fields.first().map(Vec::len).unwrap_or(0),
        headers.len()
    );

    let columns = headers
        .into_iter()
        .zip(fields)
        .map(|(name, raw)| Column::from_text(name, &raw))
        .collect();
    Table::from_columns(columns)
}

/// Writes `table` with a header row. Missing cells are written as empty fields.
pub fn write_table(table: &Table, path: &Path, delimiter: u8) -> CleanResult<()> {
    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .from_writer(BufWriter::new(file));
    writer.write_record(table.column_names())?;
    for row in table.field_rows() {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
