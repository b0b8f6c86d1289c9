//! Glob expansion for multi-file sources.
//!
//! ```no_run
//! use rowbeam::io::glob::expand_glob;
//!
//! let files = expand_glob("exports/2024-*/*.csv")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::PathBuf;

/// Files (not directories) matching `pattern`, sorted lexicographically.
///
/// Supports `*`, `?`, `**` and `[...]` classes. No match yields an empty vector.
///
/// # Errors
/// Returns an error for an invalid pattern or an unreadable directory entry.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.with_context(|| format!("read glob entry for {pattern}"))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Like [`expand_glob`], but zero matches is an error.
pub fn expand_glob_required(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = expand_glob(pattern)?;
    if files.is_empty() {
        bail!("no files found matching pattern: {pattern}");
    }
    Ok(files)
}
