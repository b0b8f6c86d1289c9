//! Tests for row extensions: deduplication and column helpers.

use anyhow::Result;
use rowbeam::testing::*;
use rowbeam::*;

#[test]
fn remove_duplicates_keeps_first_row_per_key() -> Result<()> {
    let rows = Pipeline::from_vec(duplicate_people())
        .remove_duplicates("id")?
        .to_list()?;
    assert_eq!(rows.len(), 2);
    assert_field_values(&rows, "name", &[Value::from("Alice"), Value::from("Bob")]);
    assert_field_values(&rows, "age", &[Value::Int(25), Value::Int(30)]);
    Ok(())
}

#[test]
fn remove_duplicates_groups_missing_keys_together() -> Result<()> {
    let rows = Pipeline::from_vec(vec![
        row! { "name" => "a" },
        row! { "id" => Value::Null, "name" => "b" },
        row! { "id" => 1, "name" => "c" },
    ])
    .remove_duplicates("ID")?
    .to_list()?;
    assert_field_values(&rows, "name", &[Value::from("a"), Value::from("c")]);
    Ok(())
}

#[test]
fn fill_missing_replaces_absent_and_null_only() -> Result<()> {
    let rows = Pipeline::from_vec(vec![
        row! { "city" => "Oslo" },
        row! { "city" => Value::Null },
        row! { "other" => 1 },
    ])
    .fill_missing("city", "unknown")?
    .to_list()?;
    assert_field_values(
        &rows,
        "city",
        &[Value::from("Oslo"), Value::from("unknown"), Value::from("unknown")],
    );
    Ok(())
}

#[test]
fn column_helpers_compose() -> Result<()> {
    let rows = Pipeline::from_vec(sample_people())
        .add_column("senior", |r: &Row| r.try_get_typed::<i64>("age").is_some_and(|a| a >= 30))?
        .remove_column("city")?
        .rename_column("name", "full_name")?
        .to_list()?;
    assert_all(&rows, |r| !r.contains("city") && r.contains("full_name"));
    assert_eq!(rows[0].field_names(), vec!["id", "full_name", "age", "senior"]);
    assert_field_values(
        &rows,
        "senior",
        &[false, true, true, false, false].map(Value::from),
    );
    Ok(())
}

#[test]
fn invalid_names_fail_before_execution() {
    let (source, pulled) = counting_source(sample_people());
    assert!(matches!(source.add_column("", |_: &Row| 1), Err(EtlError::Argument { .. })));
    assert!(source.rename_column("", "x").is_err());
    assert_eq!(pulled.get(), 0);
}

#[test]
fn parallel_column_helpers_match_sequential() -> Result<()> {
    let sequential = Pipeline::from_vec(sample_people())
        .fill_missing("email", "none")?
        .rename_column("age", "years")?
        .to_list()?;
    let parallel = Pipeline::from_vec(sample_people())
        .parallel(Some(2))?
        .fill_missing("email", "none")?
        .rename_column("age", "years")?
        .order_by(|r| r.try_get_typed::<i64>("id"))
        .to_list()?;
    assert_collections_equal(&parallel, &sequential);
    Ok(())
}

#[test]
fn parallel_remove_duplicates_keeps_one_row_per_key() -> Result<()> {
    let rows = Pipeline::from_vec(duplicate_people())
        .parallel(Some(2))?
        .remove_duplicates("id")?
        .to_list()?;
    assert_eq!(rows.len(), 2);
    assert_any(&rows, |r| r.try_get_typed::<i64>("id") == Some(2));
    Ok(())
}
