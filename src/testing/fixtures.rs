//! Small datasets and instrumented sources for tests.

use crate::pipeline::Pipeline;
use crate::row;
use crate::row::Row;
use crate::stage::EtlBound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Five people with `id`, `name`, `age` and `city`.
///
/// Ages are `[25, 30, 35, 28, 22]` for `Alice, Bob, Charlie, Diana, Eve`.
#[must_use]
pub fn sample_people() -> Vec<Row> {
    vec![
        row! { "id" => 1, "name" => "Alice", "age" => 25, "city" => "Oslo" },
        row! { "id" => 2, "name" => "Bob", "age" => 30, "city" => "Lima" },
        row! { "id" => 3, "name" => "Charlie", "age" => 35, "city" => "Oslo" },
        row! { "id" => 4, "name" => "Diana", "age" => 28, "city" => "Pune" },
        row! { "id" => 5, "name" => "Eve", "age" => 22, "city" => "Lima" },
    ]
}

/// Three rows where `id` 1 appears twice (`Alice`, then `Alice2`).
#[must_use]
pub fn duplicate_people() -> Vec<Row> {
    vec![
        row! { "id" => 1, "name" => "Alice", "age" => 25 },
        row! { "id" => 2, "name" => "Bob", "age" => 30 },
        row! { "id" => 1, "name" => "Alice2", "age" => 40 },
    ]
}

/// Shared count of elements pulled from a [`counting_source`].
#[derive(Clone, Debug, Default)]
pub struct AccessCounter(Arc<AtomicUsize>);

impl AccessCounter {
    /// Elements pulled so far, across every execution.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A re-iterable pipeline over `data` that counts every element it hands out.
#[must_use]
pub fn counting_source<T: EtlBound>(data: Vec<T>) -> (Pipeline<T>, AccessCounter) {
    let counter = AccessCounter::default();
    let pulls = counter.clone();
    let data = Arc::new(data);
    let pipeline = Pipeline::from_fn(move || {
        let data = Arc::clone(&data);
        let pulls = pulls.clone();
        (0..data.len()).map(move |i| {
            pulls.bump();
            data[i].clone()
        })
    });
    (pipeline, counter)
}
