//! Explicit configuration values.
//!
//! Options are plain serde structs handed to constructors; nothing here is
//! process-wide state. Every field has a default, so a configuration file only
//! needs to name what it changes:
//!
//! ```
//! use rowbeam::config::EtlConfig;
//!
//! let cfg = EtlConfig::from_json_str(r#"{ "csv": { "delimiter": ";" } }"#).unwrap();
//! assert_eq!(cfg.csv.delimiter, ';');
//! assert!(cfg.csv.has_headers);
//! assert_eq!(cfg.parallel.chunk_size, 1024);
//! ```

use crate::error::{EtlError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub parallel: ParallelOptions,
    pub csv: CsvOptions,
    pub jsonl: JsonlOptions,
}

impl EtlConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("parse ETL configuration")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("read configuration {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parse configuration {}", path.display()))
    }
}

/// Sizing of a [`ParallelPipeline`](crate::ParallelPipeline) worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelOptions {
    /// Worker threads; `None` means one per logical CPU.
    pub workers: Option<usize>,
    /// Upper bound on elements handed to a worker at once.
    pub chunk_size: usize,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            workers: None,
            chunk_size: 1024,
        }
    }
}

impl ParallelOptions {
    /// Worker count after applying the hardware default.
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(EtlError::argument("workers", "must be at least 1 when set"));
        }
        if self.chunk_size == 0 {
            return Err(EtlError::argument("chunk_size", "must be at least 1"));
        }
        Ok(())
    }
}

/// CSV reading and writing options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field separator; must be a single ASCII character.
    pub delimiter: char,
    /// First record is a header (reading) / emit a header (writing).
    pub has_headers: bool,
    /// Turn cells into typed values with [`Value::infer`](crate::Value::infer)
    /// instead of keeping every cell as a string.
    pub infer_types: bool,
    /// Accept records whose length differs from the header.
    pub flexible: bool,
    /// Trim surrounding whitespace from cells.
    pub trim: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_headers: true,
            infer_types: false,
            flexible: false,
            trim: false,
        }
    }
}

impl CsvOptions {
    pub(crate) fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                EtlError::argument(
                    "delimiter",
                    format!("{:?} is not a single ASCII character", self.delimiter),
                )
            })
    }
}

/// JSON Lines options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlOptions {
    /// Ignore lines that are empty or whitespace only.
    pub skip_blank_lines: bool,
}

impl Default for JsonlOptions {
    fn default() -> Self {
        Self {
            skip_blank_lines: true,
        }
    }
}
