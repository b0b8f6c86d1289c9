//! Tests for the CSV source and writers.

#![cfg(feature = "io-csv")]

use anyhow::Result;
use rowbeam::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn csv_source_is_lazy_and_re_iterable() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("people.csv");
    fs::write(&path, "id,name,age\n1,Alice,25\n2,Bob,30\n3,Eve,22\n")?;

    let options = CsvOptions {
        infer_types: true,
        ..Default::default()
    };
    let adults = Pipeline::from_source(CsvSource::new(&path, options))
        .filter(|r| r.try_get_typed::<i64>("age").is_some_and(|a| a >= 25));
    assert_eq!(adults.count()?, 2);

    fs::write(&path, "id,name,age\n9,Zed,40\n")?;
    assert_eq!(adults.count()?, 1);
    assert_eq!(adults.first()?.get("id"), Some(&Value::Int(9)));
    Ok(())
}

#[test]
fn cells_stay_strings_without_inference() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("raw.csv");
    fs::write(&path, "code\n007\n")?;
    let rows = read_csv_rows(&path, &CsvOptions::default())?;
    assert_eq!(rows[0].get("code"), Some(&Value::from("007")));
    assert_eq!(rows[0].get_typed::<i64>("code")?, 7);
    Ok(())
}

#[test]
fn write_then_read_with_union_header() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out/nested/rows.csv");
    let rows = vec![row! { "id" => 1, "name" => "a" }, row! { "id" => 2, "extra" => true }];
    let written = Pipeline::from_vec(rows).write_csv(&path, &CsvOptions::default())?;
    assert_eq!(written, 2);

    let text = fs::read_to_string(&path)?;
    assert_eq!(text, "id,name,extra\n1,a,\n2,,true\n");
    Ok(())
}

#[test]
fn glob_reads_files_in_sorted_order() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("b.csv"), "n\n2\n")?;
    fs::write(dir.path().join("a.csv"), "n\n1\n")?;
    let pattern = format!("{}/*.csv", dir.path().display());
    let source = CsvSource::from_glob(&pattern, CsvOptions::default())?;
    let values: Vec<String> = Pipeline::from_source(source)
        .try_map(|r| Ok(r.get_typed::<String>("n")?))
        .to_list()?;
    assert_eq!(values, vec!["1", "2"]);
    Ok(())
}

#[test]
fn missing_file_surfaces_as_adapter_error() {
    let p = Pipeline::from_source(CsvSource::new("/definitely/not/here.csv", CsvOptions::default()));
    assert!(matches!(p.to_list(), Err(EtlError::Adapter(_))));
}

#[test]
fn bad_delimiter_is_an_argument_error() {
    let options = CsvOptions {
        delimiter: 'é',
        ..Default::default()
    };
    let p = Pipeline::from_source(CsvSource::new("x.csv", options));
    assert!(matches!(p.count(), Err(EtlError::Argument { name: "delimiter", .. })));
}
