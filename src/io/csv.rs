//! CSV adapters producing and consuming [`Row`]s.
//!
//! This module provides:
//! - [`CsvSource`]: a re-iterable [`Source`] over one or more CSV files. Every
//!   pipeline execution re-opens the files and streams records lazily.
//! - [`read_csv_rows`] / [`write_csv_rows`]: whole-file helpers.
//! - [`Pipeline::write_csv`]: run a row pipeline straight into a file.
//!
//! # Notes
//! - With headers, fields are named after the header cells. Without headers
//!   (or for cells past the end of a short header in flexible mode) fields are
//!   named `column1`, `column2`, ...
//! - Cells stay strings unless [`CsvOptions::infer_types`] is set, in which case
//!   [`Value::infer`] types them.
//! - The writer's header is the union of every row's field names in first-seen
//!   order; rows lacking a field get an empty cell.

use crate::config::CsvOptions;
use crate::error::{EtlError, Result as EtlResult};
use crate::io::glob::expand_glob_required;
use crate::pipeline::Pipeline;
use crate::row::Row;
use crate::stage::{Source, Stream};
use crate::value::Value;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::collections::HashSet;
use std::fs::create_dir_all;
use std::iter;
use std::path::{Path, PathBuf};

/// Re-iterable CSV source over one or more files, read in the given order.
#[derive(Debug, Clone)]
pub struct CsvSource {
    paths: Vec<PathBuf>,
    options: CsvOptions,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, options: CsvOptions) -> Self {
        Self::from_paths(vec![path.into()], options)
    }

    pub fn from_paths(paths: Vec<PathBuf>, options: CsvOptions) -> Self {
        Self { paths, options }
    }

    /// Every file matching `pattern`, in sorted order.
    ///
    /// # Errors
    /// Returns an error for an invalid pattern or when nothing matches.
    pub fn from_glob(pattern: &str, options: CsvOptions) -> Result<Self> {
        Ok(Self::from_paths(expand_glob_required(pattern)?, options))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Source<Row> for CsvSource {
    fn open(&self) -> EtlResult<Stream<Row>> {
        let delimiter = self.options.delimiter_byte()?;
        let options = self.options.clone();
        let paths = self.paths.clone();
        Ok(Box::new(paths.into_iter().flat_map(move |path| -> Stream<Row> {
            match open_records(&path, &options, delimiter) {
                Ok(rows) => rows,
                Err(e) => Box::new(iter::once(Err(EtlError::Adapter(e)))),
            }
        })))
    }

    fn describe(&self) -> String {
        match self.paths.as_slice() {
            [one] => format!("csv {}", one.display()),
            many => format!("csv ({} files)", many.len()),
        }
    }
}

fn open_records(path: &Path, options: &CsvOptions, delimiter: u8) -> Result<Stream<Row>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(options.has_headers)
        .flexible(options.flexible)
        .trim(if options.trim { Trim::All } else { Trim::None })
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let headers: Vec<String> = if options.has_headers {
        rdr.headers()
            .with_context(|| format!("read CSV header of {}", path.display()))?
            .iter()
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };
    let infer = options.infer_types;
    let display = path.display().to_string();
    Ok(Box::new(rdr.into_records().enumerate().map(
        move |(i, rec)| -> EtlResult<Row> {
            let rec = rec.with_context(|| format!("parse CSV record #{} in {display}", i + 1))?;
            Ok(record_to_row(&headers, &rec, infer))
        },
    )))
}

fn record_to_row(headers: &[String], rec: &StringRecord, infer: bool) -> Row {
    let mut row = Row::with_capacity(rec.len());
    for (i, cell) in rec.iter().enumerate() {
        let name = match headers.get(i) {
            Some(h) => h.clone(),
            None => {
                if !headers.is_empty() {
                    log::warn!("CSV cell {} has no header; naming it column{}", i + 1, i + 1);
                }
                format!("column{}", i + 1)
            }
        };
        let value = if infer {
            Value::infer(cell)
        } else {
            Value::String(cell.to_string())
        };
        row.set(name, value);
    }
    row
}

/// Read every row of a CSV file.
///
/// # Errors
/// Returns an error if the file cannot be opened or a record fails to parse.
pub fn read_csv_rows(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Vec<Row>> {
    let source = CsvSource::new(path.as_ref(), options.clone());
    let rows = source.open()?.collect::<EtlResult<Vec<Row>>>()?;
    Ok(rows)
}

/// Union of field names across `rows`, case-insensitively, in first-seen order.
fn union_headers(rows: &[Row]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut headers = Vec::new();
    for row in rows {
        for name in row.field_names() {
            if seen.insert(name.to_lowercase()) {
                headers.push(name.to_string());
            }
        }
    }
    headers
}

/// Write rows to a CSV file. Parent directories are created as needed.
///
/// # Returns
/// The number of rows written.
pub fn write_csv_rows(path: impl AsRef<Path>, options: &CsvOptions, rows: &[Row]) -> Result<usize> {
    let path = path.as_ref();
    let delimiter = options.delimiter_byte()?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let headers = union_headers(rows);
    let mut wtr = WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    if options.has_headers && !headers.is_empty() {
        wtr.write_record(&headers)
            .with_context(|| format!("write CSV header to {}", path.display()))?;
    }
    for (i, row) in rows.iter().enumerate() {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(h).map(Value::to_string).unwrap_or_default())
            .collect();
        wtr.write_record(&record)
            .with_context(|| format!("write CSV row #{}", i + 1))?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

impl Pipeline<Row> {
    /// Execute the pipeline and write its rows to `path`.
    ///
    /// Nothing is written if execution fails.
    pub fn write_csv(&self, path: impl AsRef<Path>, options: &CsvOptions) -> EtlResult<usize> {
        let rows = self.to_list()?;
        Ok(write_csv_rows(path, options, &rows)?)
    }
}
