//! Tests for the JSON Lines source and writers.

#![cfg(feature = "io-jsonl")]

use anyhow::Result;
use rowbeam::*;
use serde::{Deserialize, Serialize};
use std::fs;
use tempfile::tempdir;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Event {
    id: u32,
    kind: String,
}

#[test]
fn typed_records_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("events.jsonl");
    let events = vec![
        Event { id: 1, kind: "click".into() },
        Event { id: 2, kind: "view".into() },
    ];
    write_jsonl_rows(&path, &events)?;

    let back = Pipeline::from_source(JsonlSource::<Event>::new(&path, JsonlOptions::default()))
        .to_list()?;
    assert_eq!(back, events);
    Ok(())
}

#[test]
fn rows_read_with_blank_lines_skipped() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("rows.jsonl");
    fs::write(&path, "{\"id\":1,\"name\":\"Alice\"}\n\n{\"id\":2,\"tags\":[\"x\"]}\n")?;
    let rows = read_jsonl_rows(&path, &JsonlOptions::default())?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get_typed::<String>("name")?, "Alice");
    assert_eq!(rows[1].get("tags"), Some(&Value::from(vec!["x"])));
    Ok(())
}

#[test]
fn blank_lines_fail_when_not_skipped() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("rows.jsonl");
    fs::write(&path, "{\"id\":1}\n\n")?;
    let options = JsonlOptions {
        skip_blank_lines: false,
    };
    assert!(read_jsonl_rows(&path, &options).is_err());
    Ok(())
}

#[test]
fn pipeline_writes_jsonl() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out.jsonl");
    let n = Pipeline::from_vec(vec![row! { "a" => 1 }, row! { "a" => 2 }])
        .filter(|r| r.try_get_typed::<i64>("a") == Some(2))
        .write_jsonl(&path)?;
    assert_eq!(n, 1);
    assert_eq!(fs::read_to_string(&path)?, "{\"a\":2}\n");
    Ok(())
}

#[test]
fn malformed_line_is_reported_in_band() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("bad.jsonl");
    fs::write(&path, "{\"id\":1}\nnot json\n")?;
    let p: Pipeline<Row> = Pipeline::from_source(JsonlSource::new(&path, JsonlOptions::default()));
    let results: Vec<_> = p.execute()?.collect();
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(EtlError::Adapter(_))));
    Ok(())
}
