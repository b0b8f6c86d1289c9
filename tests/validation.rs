//! Tests for validation stages, validators and the error collector.

use anyhow::Result;
use rowbeam::validation::validators;
use rowbeam::validation::*;
use rowbeam::*;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
struct Order {
    id: u32,
    qty: i64,
}

impl Validate for Order {
    fn validate(&self) -> ValidationResult {
        validators::in_range("qty", self.qty, 1, 100)
    }
}

fn orders() -> Vec<Order> {
    vec![
        Order { id: 1, qty: 5 },
        Order { id: 2, qty: 0 },
        Order { id: 3, qty: 50 },
        Order { id: 4, qty: 500 },
    ]
}

#[test]
fn skip_invalid_drops_bad_records() -> Result<()> {
    let ids: Vec<u32> = Pipeline::from_vec(orders())
        .validate_with_mode(ValidationMode::SkipInvalid, None)
        .map(|o| o.id)
        .to_list()?;
    assert_eq!(ids, vec![1, 3]);
    Ok(())
}

#[test]
fn log_and_continue_records_positions() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let collector: SharedCollector = Arc::new(Mutex::new(ErrorCollector::new()));
    let p = Pipeline::from_vec(orders())
        .validate_with_mode(ValidationMode::LogAndContinue, Some(Arc::clone(&collector)));
    assert_eq!(p.count()?, 2);

    let c = collector.lock().unwrap();
    let records: Vec<usize> = c.errors().iter().map(|e| e.record).collect();
    assert_eq!(records, vec![1, 3]);
    assert_eq!(c.errors()[0].errors[0].field.as_deref(), Some("qty"));
    Ok(())
}

#[test]
fn fail_fast_reports_first_invalid_record() {
    let p = Pipeline::from_vec(orders()).validate_with_mode(ValidationMode::FailFast, None);
    match p.to_list() {
        Err(EtlError::Validation { record, errors }) => {
            assert_eq!(record, 1);
            assert_eq!(errors.len(), 1);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn required_fields_flags_missing_and_null() -> Result<()> {
    let rows = vec![
        row! { "name" => "Alice", "email" => "a@x.io" },
        row! { "name" => Value::Null, "email" => "b@x.io" },
        row! { "email" => "c@x.io" },
    ];
    let collector: SharedCollector = Arc::new(Mutex::new(ErrorCollector::new()));
    let valid = Pipeline::from_vec(rows)
        .validate(
            required_fields(["name", "email"]),
            ValidationMode::LogAndContinue,
            Some(Arc::clone(&collector)),
        )
        .count()?;
    assert_eq!(valid, 1);
    let c = collector.lock().unwrap();
    assert_eq!(c.error_count(), 2);
    assert_eq!(c.errors()[1].errors[0].code.as_deref(), Some("required"));
    Ok(())
}

#[test]
fn combined_row_rules() -> Result<()> {
    let rule = |r: &Row| {
        let email = r.try_get_typed::<String>("email").unwrap_or_default();
        let name = r.try_get_typed::<String>("name").unwrap_or_default();
        combine_validations(vec![
            validators::is_email("email", &email),
            validators::min_length("name", &name, 2),
            validators::max_length("name", &name, 10),
        ])
    };
    let rows = vec![
        row! { "name" => "Al", "email" => "al@example.com" },
        row! { "name" => "B", "email" => "nope" },
        row! { "name" => "Christopher", "email" => "c@example.com" },
    ];
    let p = Pipeline::from_vec(rows).validate(rule, ValidationMode::FailFast, None);
    match p.to_list() {
        Err(EtlError::Validation { record, errors }) => {
            assert_eq!(record, 1);
            assert_eq!(errors.len(), 2);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn collector_serializes_to_file() -> Result<()> {
    let mut c = ErrorCollector::new();
    c.add_error(4, vec![ValidationError::field("age", "too old").with_code("range")]);
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("errors.json");
    c.write_to_file(&path)?;
    let back: Vec<RecordError> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(back, c.errors());
    Ok(())
}

#[test]
fn pattern_validator() {
    let re = regex::Regex::new(r"^[A-Z]{3}-\d{2}$").unwrap();
    assert!(validators::matches_pattern("sku", "ABC-12", &re).is_ok());
    assert!(validators::matches_pattern("sku", "abc-12", &re).is_err());
    assert!(validators::not_empty("x", "").is_err());
    assert!(validators::contains("x", "hello", "ell").is_ok());
}
