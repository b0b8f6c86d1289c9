//! Tests for async terminal operations.

#![cfg(feature = "async")]

use anyhow::Result;
use rowbeam::testing::*;
use rowbeam::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn execute_async_collects_on_background_worker() -> Result<()> {
    let p = Pipeline::from_vec(sample_people())
        .filter(|r| r.try_get_typed::<i64>("age").is_some_and(|a| a > 26))
        .map(|r| r.get_typed::<String>("name").unwrap_or_default());
    assert_eq!(p.execute_async().await?, vec!["Bob", "Charlie", "Diana"]);
    Ok(())
}

#[tokio::test]
async fn for_each_async_sees_every_element() -> Result<()> {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    Pipeline::from_vec(vec![1, 2, 3])
        .for_each_async(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        })
        .await?;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn parallel_async_terminals() -> Result<()> {
    let p = Pipeline::from_vec((1..=10).collect::<Vec<i64>>()).parallel(Some(2))?.map(|x| x * 3);
    let mut out = p.execute_async().await?;
    out.sort_unstable();
    assert_eq!(out.first(), Some(&3));

    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    p.for_each_async(move |_| {
        h.fetch_add(1, Ordering::SeqCst);
    })
    .await?;
    assert_eq!(hits.load(Ordering::SeqCst), 10);
    Ok(())
}

#[tokio::test]
async fn async_errors_are_pipeline_errors() {
    let p: Pipeline<Row> = Pipeline::empty();
    assert!(matches!(p.execute_async().await.map(|v| v.len()), Ok(0)));
    let failing = Pipeline::from_vec(vec![1]).try_map(|_: i32| -> anyhow::Result<i32> { anyhow::bail!("no") });
    assert!(matches!(failing.execute_async().await, Err(EtlError::Stage { .. })));
}
