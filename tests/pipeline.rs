//! Tests for sequential pipelines: laziness, re-execution, ordering and terminals.

use anyhow::Result;
use rowbeam::testing::*;
use rowbeam::*;

fn age(r: &Row) -> i64 {
    r.try_get_typed::<i64>("age").unwrap_or_default()
}

#[test]
fn chaining_does_not_touch_the_source() -> Result<()> {
    let (source, pulled) = counting_source(sample_people());
    let chained = source
        .filter(|r| age(r) >= 25)
        .order_by(|r| r.try_get_typed::<String>("name"))
        .map(|r| r.get_typed::<String>("name").unwrap_or_default());
    assert_eq!(pulled.get(), 0);

    chained.to_list()?;
    assert_eq!(pulled.get(), 5);
    Ok(())
}

#[test]
fn every_execution_starts_from_the_source() -> Result<()> {
    let (source, pulled) = counting_source((1..=4).collect::<Vec<i64>>());
    let doubled = source.map(|x| x * 2);
    assert_eq!(doubled.to_list()?, vec![2, 4, 6, 8]);
    assert_eq!(doubled.to_list()?, vec![2, 4, 6, 8]);
    assert_eq!(doubled.count()?, 4);
    assert_eq!(pulled.get(), 12);
    Ok(())
}

#[test]
fn first_stops_pulling_early() -> Result<()> {
    let (source, pulled) = counting_source((1..=1000).collect::<Vec<i64>>());
    assert_eq!(source.filter(|x| x % 10 == 0).first()?, 10);
    assert_eq!(pulled.get(), 10);
    Ok(())
}

#[test]
fn filter_count_matches_predicate_count() -> Result<()> {
    let data: Vec<i64> = (0..257).collect();
    let expected = data.iter().filter(|x| *x % 7 == 3).count();
    let p = Pipeline::from_vec(data);
    assert_eq!(p.filter(|x| x % 7 == 3).count()?, expected);
    Ok(())
}

#[test]
fn streaming_stages_preserve_order() -> Result<()> {
    let out = Pipeline::from_vec(vec![5, 3, 9, 1, 7])
        .filter(|x| *x != 9)
        .map(|x| x * 10)
        .to_list()?;
    assert_collections_equal(&out, &[50, 30, 10, 70]);
    Ok(())
}

#[test]
fn filter_order_take_map_scenario() -> Result<()> {
    let names = Pipeline::from_vec(sample_people())
        .filter(|r| age(r) >= 25)
        .order_by(|r| r.try_get_typed::<String>("name"))
        .take(3)
        .try_map(|r| Ok(r.get_typed::<String>("name")?))
        .to_list()?;
    assert_eq!(names, vec!["Alice", "Bob", "Charlie"]);
    Ok(())
}

#[test]
fn empty_source_counts_zero_and_first_fails() -> Result<()> {
    let p: Pipeline<Row> = Pipeline::empty();
    assert_eq!(p.filter(|_| true).count()?, 0);
    assert!(matches!(p.first(), Err(EtlError::Empty)));
    assert_eq!(p.first_or_default()?, Row::new());
    Ok(())
}

#[test]
fn order_by_is_stable_in_both_directions() -> Result<()> {
    let pairs = vec![(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')];
    let asc = Pipeline::from_vec(pairs.clone()).order_by(|p| p.0).to_list()?;
    assert_eq!(asc, vec![(1, 'b'), (1, 'd'), (2, 'a'), (2, 'c')]);
    let desc = Pipeline::from_vec(pairs).order_by_descending(|p| p.0).to_list()?;
    assert_eq!(desc, vec![(2, 'a'), (2, 'c'), (1, 'b'), (1, 'd')]);
    Ok(())
}

#[test]
fn distinct_keeps_first_occurrence() -> Result<()> {
    let out = Pipeline::from_vec(vec![3, 1, 3, 2, 1]).distinct().to_list()?;
    assert_eq!(out, vec![3, 1, 2]);
    let by_len = Pipeline::from_vec(vec!["aa", "b", "cc", "d"])
        .distinct_by(|s| s.len())
        .to_list()?;
    assert_eq!(by_len, vec!["aa", "b"]);
    Ok(())
}

#[test]
fn distinct_streams_instead_of_materializing() -> Result<()> {
    let (source, pulled) = counting_source(vec![1, 1, 2, 3, 4, 5]);
    let unique = source.distinct();
    assert_eq!(unique.explain().barriers, 0);
    assert_eq!(unique.take(2).to_list()?, vec![1, 2]);
    assert_eq!(pulled.get(), 3);
    Ok(())
}

#[test]
fn take_and_skip_handle_out_of_range_counts() -> Result<()> {
    let p = Pipeline::from_vec(vec![1, 2, 3]);
    assert_eq!(p.take(10).to_list()?, vec![1, 2, 3]);
    assert_eq!(p.take(0).count()?, 0);
    assert_eq!(p.skip(5).count()?, 0);
    assert!(matches!(p.try_take(-1), Err(EtlError::Range { .. })));
    Ok(())
}

#[test]
fn flat_map_and_inspect() -> Result<()> {
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&seen);
    let words = Pipeline::from_vec(vec!["a b", "c"])
        .flat_map(|line| line.split(' ').map(str::to_string).collect::<Vec<_>>())
        .inspect(move |w| sink.lock().unwrap().push(w.clone()))
        .to_list()?;
    assert_eq!(words, vec!["a", "b", "c"]);
    assert_eq!(*seen.lock().unwrap(), words);
    Ok(())
}

#[test]
fn try_map_failure_surfaces_at_terminal() {
    let p = Pipeline::from_vec(vec!["1", "x", "3"]).try_map(|s| Ok(s.parse::<i64>()?));
    match p.to_list() {
        Err(EtlError::Stage { stage, .. }) => assert_eq!(stage, "try_map"),
        other => panic!("expected stage error, got {other:?}"),
    }
}

#[test]
fn for_each_visits_in_order() -> Result<()> {
    let mut seen = Vec::new();
    Pipeline::from_vec(vec![1, 2, 3]).for_each(|x| seen.push(x))?;
    assert_eq!(seen, vec![1, 2, 3]);

    let mut total = 0;
    let err = Pipeline::from_vec(vec![1, 2, 3]).try_for_each(|x| {
        if x == 3 {
            anyhow::bail!("stop");
        }
        total += x;
        Ok(())
    });
    assert!(err.is_err());
    assert_eq!(total, 3);
    Ok(())
}

#[test]
fn to_array_matches_to_list() -> Result<()> {
    let p = Pipeline::from_vec(vec![1, 2]);
    assert_eq!(p.to_array()?.as_ref(), p.to_list()?.as_slice());
    Ok(())
}

#[test]
fn cancellation_stops_execution() {
    let token = CancelToken::new();
    let p = Pipeline::from_vec((0..10).collect::<Vec<i32>>()).with_cancellation(token.clone());
    token.cancel();
    assert!(matches!(p.to_list(), Err(EtlError::Cancelled)));
}

#[test]
fn explain_lists_stages_without_running() {
    let (source, pulled) = counting_source(vec![1, 2, 3]);
    let p = source.filter(|x| *x > 1).order_by(|x| *x).take(1);
    let explanation = p.explain();
    let names: Vec<&str> = explanation.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["source", "filter", "order_by", "take(1)"]);
    assert_eq!(explanation.barriers, 1);
    assert!(explanation.to_string().contains("[BARRIER]"));
    assert_eq!(pulled.get(), 0);
}

#[test]
fn composite_transforms_apply_like_stages() -> Result<()> {
    struct Adults;
    impl CompositeTransform<Row, String> for Adults {
        fn expand(&self, input: &Pipeline<Row>) -> Pipeline<String> {
            input
                .filter(|r| r.try_get_typed::<i64>("age").is_some_and(|a| a >= 30))
                .map(|r| r.get_typed::<String>("name").unwrap_or_default())
        }
    }
    let names = Pipeline::from_vec(sample_people()).apply(&Adults).to_list()?;
    assert_eq!(names, vec!["Bob", "Charlie"]);
    Ok(())
}
