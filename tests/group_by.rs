//! Tests for grouped aggregation on sequential and parallel pipelines.

use anyhow::Result;
use rowbeam::testing::*;
use rowbeam::*;

fn aggregations() -> Vec<Aggregation> {
    vec![
        Aggregation::count("people"),
        Aggregation::sum("total_age", "age"),
        Aggregation::avg("avg_age", "age"),
        Aggregation::min("youngest", "age"),
        Aggregation::max("oldest", "age"),
        Aggregation::collect("names", "name"),
    ]
}

#[test]
fn groups_follow_encounter_order() -> Result<()> {
    let groups = Pipeline::from_vec(sample_people())
        .group_by("city", aggregations())?
        .to_list()?;
    assert_field_values(
        &groups,
        "city",
        &[Value::from("Oslo"), Value::from("Lima"), Value::from("Pune")],
    );
    assert_field_values(&groups, "people", &[Value::Int(2), Value::Int(2), Value::Int(1)]);
    assert_field_values(&groups, "total_age", &[Value::Int(60), Value::Int(52), Value::Int(28)]);
    assert_field_values(
        &groups,
        "avg_age",
        &[Value::Float(30.0), Value::Float(26.0), Value::Float(28.0)],
    );
    assert_field_values(&groups, "youngest", &[Value::Int(25), Value::Int(22), Value::Int(28)]);
    assert_field_values(&groups, "oldest", &[Value::Int(35), Value::Int(30), Value::Int(28)]);
    assert_eq!(
        groups[0].get("names"),
        Some(&Value::from(vec!["Alice", "Charlie"]))
    );
    Ok(())
}

#[test]
fn custom_aggregator_closure() -> Result<()> {
    let initials = Aggregation::new("initials", |rows: &[Row]| -> Result<Value, EtlError> {
        let s: String = rows
            .iter()
            .filter_map(|r| r.try_get_typed::<String>("name"))
            .filter_map(|n| n.chars().next())
            .collect();
        Ok(Value::from(s))
    });
    let groups = Pipeline::from_vec(sample_people())
        .group_by("city", [initials])?
        .to_list()?;
    assert_field_values(
        &groups,
        "initials",
        &[Value::from("AC"), Value::from("BE"), Value::from("D")],
    );
    Ok(())
}

#[test]
fn non_numeric_sum_fails_at_execution() -> Result<()> {
    let p = Pipeline::from_vec(sample_people()).group_by("city", [Aggregation::sum("s", "name")])?;
    assert!(matches!(p.to_list(), Err(EtlError::Conversion(_))));
    Ok(())
}

#[test]
fn duplicate_output_names_are_rejected() {
    let p = Pipeline::from_vec(sample_people());
    let err = p
        .group_by("city", [Aggregation::count("n"), Aggregation::sum("N", "age")])
        .unwrap_err();
    assert!(matches!(err, EtlError::Argument { .. }));
}

#[test]
fn parallel_group_by_matches_sequential() -> Result<()> {
    let sequential = Pipeline::from_vec(sample_people())
        .group_by("city", aggregations())?
        .to_list()?;
    let parallel = Pipeline::from_vec(sample_people())
        .parallel(Some(3))?
        .group_by("city", aggregations())?
        .to_list()?;
    assert_collections_equal(&parallel, &sequential);
    Ok(())
}

#[test]
fn group_by_on_empty_input_yields_nothing() -> Result<()> {
    let p: Pipeline<Row> = Pipeline::empty();
    assert_eq!(p.group_by("k", [Aggregation::count("n")])?.count()?, 0);
    Ok(())
}
