//! JSON Lines adapters.
//!
//! This module provides:
//! - [`JsonlSource`]: a re-iterable [`Source`] reading one JSON document per
//!   line. It defaults to [`Row`] but any `DeserializeOwned` type works.
//! - [`read_jsonl_rows`] / [`write_jsonl_rows`]: whole-file helpers.
//! - [`Pipeline::write_jsonl`]: run a pipeline straight into a file.
//!
//! Blank lines are skipped on read unless
//! [`JsonlOptions::skip_blank_lines`] is turned off.

use crate::config::JsonlOptions;
use crate::error::{EtlError, Result as EtlResult};
use crate::io::glob::expand_glob_required;
use crate::pipeline::Pipeline;
use crate::row::Row;
use crate::stage::{EtlBound, Source, Stream};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::iter;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Re-iterable JSONL source over one or more files, read in the given order.
pub struct JsonlSource<T = Row> {
    paths: Vec<PathBuf>,
    options: JsonlOptions,
    _t: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonlSource<T> {
    fn clone(&self) -> Self {
        Self {
            paths: self.paths.clone(),
            options: self.options.clone(),
            _t: PhantomData,
        }
    }
}

impl<T> JsonlSource<T> {
    pub fn new(path: impl Into<PathBuf>, options: JsonlOptions) -> Self {
        Self::from_paths(vec![path.into()], options)
    }

    pub fn from_paths(paths: Vec<PathBuf>, options: JsonlOptions) -> Self {
        Self {
            paths,
            options,
            _t: PhantomData,
        }
    }

    /// Every file matching `pattern`, in sorted order.
    pub fn from_glob(pattern: &str, options: JsonlOptions) -> Result<Self> {
        Ok(Self::from_paths(expand_glob_required(pattern)?, options))
    }
}

impl<T> Source<T> for JsonlSource<T>
where
    T: EtlBound + DeserializeOwned,
{
    fn open(&self) -> EtlResult<Stream<T>> {
        let skip_blank = self.options.skip_blank_lines;
        let paths = self.paths.clone();
        Ok(Box::new(paths.into_iter().flat_map(move |path| -> Stream<T> {
            match open_lines(&path, skip_blank) {
                Ok(items) => items,
                Err(e) => Box::new(iter::once(Err(EtlError::Adapter(e)))),
            }
        })))
    }

    fn describe(&self) -> String {
        match self.paths.as_slice() {
            [one] => format!("jsonl {}", one.display()),
            many => format!("jsonl ({} files)", many.len()),
        }
    }
}

fn open_lines<T>(path: &Path, skip_blank: bool) -> Result<Stream<T>>
where
    T: EtlBound + DeserializeOwned,
{
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let display = path.display().to_string();
    let lines = BufReader::new(f).lines().enumerate();
    Ok(Box::new(lines.filter_map(move |(i, line)| {
        let parsed = line
            .with_context(|| format!("read line {} in {display}", i + 1))
            .and_then(|line| {
                if skip_blank && line.trim().is_empty() {
                    return Ok(None);
                }
                serde_json::from_str::<T>(&line)
                    .map(Some)
                    .with_context(|| format!("parse JSONL line {} in {display}: {line}", i + 1))
            });
        parsed.map_err(EtlError::Adapter).transpose()
    })))
}

/// Read every row of a JSONL file.
pub fn read_jsonl_rows(path: impl AsRef<Path>, options: &JsonlOptions) -> Result<Vec<Row>> {
    let source: JsonlSource = JsonlSource::new(path.as_ref(), options.clone());
    let rows = source.open()?.collect::<EtlResult<Vec<Row>>>()?;
    Ok(rows)
}

/// Write items as JSONL (one document per line). Parent directories are
/// created as needed.
///
/// # Returns
/// The number of items written.
pub fn write_jsonl_rows<T: Serialize>(path: impl AsRef<Path>, data: &[T]) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    for (i, item) in data.iter().enumerate() {
        serde_json::to_writer(&mut w, item)
            .with_context(|| format!("serialize item #{} to {}", i, path.display()))?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(data.len())
}

impl<T: EtlBound + Serialize> Pipeline<T> {
    /// Execute the pipeline and write its elements to `path` as JSONL.
    ///
    /// Nothing is written if execution fails.
    pub fn write_jsonl(&self, path: impl AsRef<Path>) -> EtlResult<usize> {
        let items = self.to_list()?;
        Ok(write_jsonl_rows(path, &items)?)
    }
}
