//! Assertion functions for pipeline outputs.

use crate::row::Row;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections are equal in order and content.
///
/// # Panics
/// Panics at the first position where the collections diverge, including the
/// position where the shorter one runs out.
///
/// ```
/// use rowbeam::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    let longest = actual.len().max(expected.len());
    let Some(at) = (0..longest).find(|&i| actual.get(i) != expected.get(i)) else {
        return;
    };
    panic!(
        "outputs diverge at position {at} (actual has {} element(s), expected {}):\n  actual[{at}]:   {:?}\n  expected[{at}]: {:?}\n  actual:   {actual:?}\n  expected: {expected:?}",
        actual.len(),
        expected.len(),
        actual.get(at),
        expected.get(at),
    );
}

/// Assert that two collections hold the same elements with the same
/// multiplicities, in any order. Meant for parallel stages.
///
/// # Panics
/// Panics listing the missing and unexpected elements.
///
/// ```
/// use rowbeam::testing::assert_collections_unordered_equal;
///
/// assert_collections_unordered_equal(&[3, 1, 2, 1], &[1, 1, 2, 3]);
/// ```
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    let mut balance: HashMap<&T, isize> = HashMap::new();
    for e in expected {
        *balance.entry(e).or_default() += 1;
    }
    for a in actual {
        *balance.entry(a).or_default() -= 1;
    }
    let missing: Vec<_> = balance.iter().filter(|(_, n)| **n > 0).map(|(v, n)| (*v, *n)).collect();
    let extra: Vec<_> = balance.iter().filter(|(_, n)| **n < 0).map(|(v, n)| (*v, -*n)).collect();
    assert!(
        missing.is_empty() && extra.is_empty(),
        "Collection content mismatch:\n  Missing (element, count): {missing:?}\n  Extra (element, count): {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert that every element satisfies `predicate`.
pub fn assert_all<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    if let Some(at) = collection.iter().position(|item| !predicate(item)) {
        panic!(
            "element {at} does not satisfy the predicate: {:?}\n  in: {collection:?}",
            collection[at]
        );
    }
}

/// Assert that at least one element satisfies `predicate`.
pub fn assert_any<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    assert!(
        collection.iter().any(predicate),
        "none of the {} element(s) satisfies the predicate: {collection:?}",
        collection.len()
    );
}

/// Assert that no element satisfies `predicate`.
pub fn assert_none<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    if let Some(at) = collection.iter().position(predicate) {
        panic!(
            "element {at} satisfies the predicate but should not: {:?}\n  in: {collection:?}",
            collection[at]
        );
    }
}

/// Assert the sequence of values a field takes across `rows`, in order.
/// Missing fields read as `Null`.
///
/// ```
/// use rowbeam::{row, Value};
/// use rowbeam::testing::assert_field_values;
///
/// let rows = vec![row! { "id" => 1 }, row! { "x" => 0 }];
/// assert_field_values(&rows, "id", &[Value::Int(1), Value::Null]);
/// ```
pub fn assert_field_values(rows: &[Row], field: &str, expected: &[Value]) {
    let actual: Vec<Value> = rows
        .iter()
        .map(|r| r.get(field).cloned().unwrap_or_default())
        .collect();
    assert_eq!(
        actual, expected,
        "Values of field '{field}' differ:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_collections_pass() {
        assert_collections_equal::<i32>(&[], &[]);
        assert_collections_equal(&["a", "b"], &["a", "b"]);
    }

    #[test]
    #[should_panic(expected = "outputs diverge at position 1")]
    fn content_mismatch_names_the_position() {
        assert_collections_equal(&[1, 9, 3], &[1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "outputs diverge at position 2 (actual has 2 element(s), expected 3)")]
    fn short_output_diverges_where_it_ends() {
        assert_collections_equal(&[1, 2], &[1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "Missing (element, count): [(2, 1)]")]
    fn unordered_comparison_counts_multiplicity() {
        assert_collections_unordered_equal(&[1, 2], &[1, 2, 2]);
    }

    #[test]
    #[should_panic(expected = "element 1 does not satisfy")]
    fn assert_all_points_at_offender() {
        assert_all(&[2, 3, 4], |x| x % 2 == 0);
    }
}
