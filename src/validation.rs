//! Record validation with configurable handling of bad data.
//!
//! Two entry points feed the same stage:
//! - [`Pipeline::validate`] checks rows against a [`RowValidator`] (a closure,
//!   [`required_fields`], or your own type).
//! - [`Pipeline::validate_with_mode`] checks typed records implementing
//!   [`Validate`].
//!
//! What happens to an invalid record depends on [`ValidationMode`]. Record
//! numbers count the records reaching the validation stage, starting at 0.
//!
//! # Example
//!
//! ```
//! use rowbeam::{row, Pipeline, Row};
//! use rowbeam::validation::*;
//! use std::sync::{Arc, Mutex};
//!
//! let people = Pipeline::from_vec(vec![
//!     row! { "name" => "Alice", "email" => "alice@example.com" },
//!     row! { "name" => "Bob", "email" => "bob-at-example" },
//!     row! { "email" => "carol@example.com" },
//! ]);
//!
//! let collector = Arc::new(Mutex::new(ErrorCollector::new()));
//! let valid = people
//!     .validate(required_fields(["name"]), ValidationMode::LogAndContinue, Some(Arc::clone(&collector)))
//!     .validate(
//!         |r: &Row| validators::is_email("email", r.get("email").and_then(|v| v.as_str()).unwrap_or("")),
//!         ValidationMode::SkipInvalid,
//!         None,
//!     );
//!
//! assert_eq!(valid.count().unwrap(), 1);
//! assert_eq!(collector.lock().unwrap().error_count(), 1);
//! ```

use crate::error::EtlError;
use crate::pipeline::Pipeline;
use crate::row::Row;
use crate::stage::{EtlBound, StageInfo, StageKind, Stream};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Result type for validation checks.
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Collector shared between a pipeline and the caller inspecting it afterwards.
pub type SharedCollector = Arc<Mutex<ErrorCollector>>;

/// Types that can check themselves.
pub trait Validate {
    fn validate(&self) -> ValidationResult;
}

/// A rule applied to rows by [`Pipeline::validate`].
pub trait RowValidator: Send + Sync {
    fn validate_row(&self, row: &Row) -> ValidationResult;
}

impl<F> RowValidator for F
where
    F: Fn(&Row) -> ValidationResult + Send + Sync,
{
    fn validate_row(&self, row: &Row) -> ValidationResult {
        self(row)
    }
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The field that failed validation, if any.
    pub field: Option<String>,
    pub message: String,
    /// Optional code for categorization.
    pub code: Option<String>,
}

impl ValidationError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            field: None,
            message: message.into(),
            code: None,
        }
    }

    /// Create a validation error for a specific field.
    pub fn field<S: Into<String>, M: Into<String>>(field: S, message: M) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn with_code<S: Into<String>>(mut self, code: S) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "[{field}] {}", self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(code) = &self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// How a validation stage treats invalid records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationMode {
    /// Drop invalid records silently.
    SkipInvalid,
    /// Drop invalid records, log a warning and record them in the collector.
    LogAndContinue,
    /// Surface [`EtlError::Validation`] at the first invalid record.
    FailFast,
}

impl ValidationMode {
    fn name(self) -> &'static str {
        match self {
            ValidationMode::SkipInvalid => "skip invalid",
            ValidationMode::LogAndContinue => "log and continue",
            ValidationMode::FailFast => "fail fast",
        }
    }
}

/// Errors of one rejected record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    /// Position of the record in the validation stage's input.
    pub record: usize,
    pub errors: Vec<ValidationError>,
}

/// Accumulates rejected records under [`ValidationMode::LogAndContinue`].
///
/// Every execution of the pipeline appends again; call [`clear`](Self::clear)
/// between runs when only the latest run matters.
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    errors: Vec<RecordError>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, record: usize, errors: Vec<ValidationError>) {
        self.errors.push(RecordError { record, errors });
    }

    /// Number of rejected records.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[RecordError] {
        &self.errors
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.errors)
    }

    /// Write the collected errors as pretty JSON.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = self.to_json().context("serialize validation errors")?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))
    }
}

impl fmt::Display for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorCollector({} errors)", self.error_count())
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rows must carry every listed field with a non-null value.
#[derive(Debug, Clone)]
pub struct RequiredFields {
    fields: Vec<String>,
}

/// Build a [`RequiredFields`] rule.
pub fn required_fields<I, S>(fields: I) -> RequiredFields
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RequiredFields {
        fields: fields.into_iter().map(Into::into).collect(),
    }
}

impl RowValidator for RequiredFields {
    fn validate_row(&self, row: &Row) -> ValidationResult {
        let errors: Vec<ValidationError> = self
            .fields
            .iter()
            .filter(|f| row.get(f).is_none_or(|v| v.is_null()))
            .map(|f| ValidationError::field(f.as_str(), "is required").with_code("required"))
            .collect();
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Validation helpers for common patterns.
pub mod validators {
    use super::{ValidationError, ValidationResult};
    use regex::Regex;
    use std::fmt;

    pub fn not_empty(field: &str, value: &str) -> ValidationResult {
        if value.is_empty() {
            Err(vec![ValidationError::field(field, "must not be empty")])
        } else {
            Ok(())
        }
    }

    pub fn contains(field: &str, value: &str, substring: &str) -> ValidationResult {
        if value.contains(substring) {
            Ok(())
        } else {
            Err(vec![ValidationError::field(
                field,
                format!("must contain '{substring}'"),
            )])
        }
    }

    /// Inclusive range check.
    pub fn in_range<T: PartialOrd + fmt::Display>(
        field: &str,
        value: T,
        min: T,
        max: T,
    ) -> ValidationResult {
        if value >= min && value <= max {
            Ok(())
        } else {
            Err(vec![ValidationError::field(
                field,
                format!("must be between {min} and {max}"),
            )])
        }
    }

    /// Basic shape check: non-empty local part, and a domain with a dot that
    /// is not the last character.
    pub fn is_email(field: &str, value: &str) -> ValidationResult {
        if let Some((local, domain)) = value.split_once('@')
            && !local.is_empty()
            && let Some(dot) = domain.rfind('.')
            && dot > 0
            && dot < domain.len() - 1
        {
            return Ok(());
        }
        Err(vec![ValidationError::field(field, "invalid email format")])
    }

    pub fn min_length(field: &str, value: &str, min: usize) -> ValidationResult {
        if value.chars().count() >= min {
            Ok(())
        } else {
            Err(vec![ValidationError::field(
                field,
                format!("must have at least {min} characters"),
            )])
        }
    }

    pub fn max_length(field: &str, value: &str, max: usize) -> ValidationResult {
        if value.chars().count() <= max {
            Ok(())
        } else {
            Err(vec![ValidationError::field(
                field,
                format!("must have at most {max} characters"),
            )])
        }
    }

    /// The whole value must match `pattern` somewhere (use anchors for a full
    /// match).
    pub fn matches_pattern(field: &str, value: &str, pattern: &Regex) -> ValidationResult {
        if pattern.is_match(value) {
            Ok(())
        } else {
            Err(vec![ValidationError::field(
                field,
                format!("must match /{}/", pattern.as_str()),
            )])
        }
    }
}

/// Merge several results, keeping every error.
pub fn combine_validations(results: Vec<ValidationResult>) -> ValidationResult {
    let mut all_errors = Vec::new();
    for result in results {
        if let Err(mut errors) = result {
            all_errors.append(&mut errors);
        }
    }
    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors)
    }
}

impl<T: EtlBound> Pipeline<T> {
    fn validation_stage<F>(
        &self,
        check: F,
        mode: ValidationMode,
        collector: Option<SharedCollector>,
    ) -> Self
    where
        F: Fn(&T) -> ValidationResult + Send + Sync + 'static,
    {
        let check = Arc::new(check);
        let info = StageInfo::with_detail(StageKind::Validate, mode.name());
        self.chain(info, move |upstream: Stream<T>| -> Stream<T> {
            let check = Arc::clone(&check);
            let collector = collector.clone();
            let mut record = 0usize;
            Box::new(upstream.filter_map(move |item| {
                let value = match item {
                    Ok(v) => v,
                    Err(e) => return Some(Err(e)),
                };
                let index = record;
                record += 1;
                let Err(errors) = check(&value) else {
                    return Some(Ok(value));
                };
                match mode {
                    ValidationMode::SkipInvalid => None,
                    ValidationMode::LogAndContinue => {
                        log::warn!("record {index} failed validation: {}", format_errors(&errors));
                        if let Some(collector) = &collector {
                            collector
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .add_error(index, errors);
                        }
                        None
                    }
                    ValidationMode::FailFast => Some(Err(EtlError::Validation {
                        record: index,
                        errors,
                    })),
                }
            }))
        })
    }

    /// Validate typed records with their own [`Validate`] impl.
    pub fn validate_with_mode(
        &self,
        mode: ValidationMode,
        collector: Option<SharedCollector>,
    ) -> Self
    where
        T: Validate,
    {
        self.validation_stage(<T as Validate>::validate, mode, collector)
    }
}

impl Pipeline<Row> {
    /// Validate rows against `rule`.
    pub fn validate<R>(
        &self,
        rule: R,
        mode: ValidationMode,
        collector: Option<SharedCollector>,
    ) -> Self
    where
        R: RowValidator + 'static,
    {
        self.validation_stage(move |row: &Row| rule.validate_row(row), mode, collector)
    }
}

#[cfg(test)]
mod tests {
    use super::validators::*;
    use super::*;
    use regex::Regex;

    #[test]
    fn email_shapes() {
        assert!(is_email("e", "a@b.co").is_ok());
        assert!(is_email("e", "@b.co").is_err());
        assert!(is_email("e", "a@.co").is_err());
        assert!(is_email("e", "a@bco").is_err());
        assert!(is_email("e", "a@b.").is_err());
    }

    #[test]
    fn pattern_and_lengths() {
        let zip = Regex::new(r"^\d{5}$").unwrap();
        assert!(matches_pattern("zip", "12345", &zip).is_ok());
        let err = matches_pattern("zip", "1234", &zip).unwrap_err();
        assert_eq!(err[0].to_string(), r"[zip] must match /^\d{5}$/");
        assert!(min_length("n", "ab", 3).is_err());
        assert!(max_length("n", "abc", 3).is_ok());
    }

    #[test]
    fn combine_keeps_all_errors() {
        let combined = combine_validations(vec![
            not_empty("a", ""),
            Ok(()),
            in_range("b", 200, 0, 150),
        ]);
        assert_eq!(combined.unwrap_err().len(), 2);
    }
}
