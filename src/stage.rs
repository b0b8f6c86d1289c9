//! Building blocks shared by [`Pipeline`](crate::Pipeline) and
//! [`ParallelPipeline`](crate::ParallelPipeline).
//!
//! This module provides:
//! - [`EtlBound`]: the bound every element type flowing through a pipeline meets.
//! - [`Stream`]: the boxed, fallible iterator a stage consumes and produces.
//! - [`Source`]: the single seam through which adapters (files, databases, HTTP
//!   readers, in-memory collections) feed a pipeline.
//! - [`StageKind`] / [`StageInfo`]: descriptors recorded for every chain call so
//!   a pipeline can explain itself without running.
//!
//! A stage is an element-type-changing function `Stream<I> -> Stream<O>`. The
//! pipeline composes stages into a single opener closure that is only invoked
//! by terminal operations, so building a chain never touches the source.

use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// Bound for element types carried by a pipeline.
///
/// Elements cross thread boundaries in parallel stages and are cloned out of
/// re-iterable sources, hence `Send + Sync + Clone + 'static`.
pub trait EtlBound: 'static + Send + Sync + Clone {}
impl<T> EtlBound for T where T: 'static + Send + Sync + Clone {}

/// A lazily evaluated, fallible sequence of elements.
///
/// Errors travel in-band so a failing element is reported by the terminal call
/// instead of being dropped.
pub type Stream<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

/// Re-iterable producer of elements.
///
/// Every terminal operation calls [`open`](Source::open) again, so sources must
/// be able to start over (re-open a file, re-run a query, re-clone a buffer).
/// Single-pass producers should be materialized into a `Vec` first.
pub trait Source<T>: Send + Sync {
    /// Start a fresh pass over the data.
    ///
    /// # Errors
    /// Returns an error if the underlying store cannot be opened.
    fn open(&self) -> Result<Stream<T>>;

    /// Short human-readable description, shown by `explain()`.
    fn describe(&self) -> String {
        "custom source".to_string()
    }
}

/// In-memory source backed by a shared vector.
pub(crate) struct VecSource<T> {
    data: Arc<Vec<T>>,
}

impl<T> VecSource<T> {
    pub(crate) fn new(data: Vec<T>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }
}

impl<T: EtlBound> Source<T> for VecSource<T> {
    fn open(&self) -> Result<Stream<T>> {
        let data = Arc::clone(&self.data);
        Ok(Box::new((0..data.len()).map(move |i| Ok(data[i].clone()))))
    }

    fn describe(&self) -> String {
        format!("in-memory collection ({} elements)", self.data.len())
    }
}

/// Source that calls a factory closure for every pass.
pub(crate) struct FnSource<F> {
    factory: F,
}

impl<F> FnSource<F> {
    pub(crate) fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<T, F, I> Source<T> for FnSource<F>
where
    T: EtlBound,
    F: Fn() -> I + Send + Sync,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
{
    fn open(&self) -> Result<Stream<T>> {
        Ok(Box::new((self.factory)().into_iter().map(Ok)))
    }

    fn describe(&self) -> String {
        "iterator factory".to_string()
    }
}

/// What a recorded stage does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Source,
    Filter,
    Map,
    FlatMap,
    Inspect,
    Take(usize),
    Skip(usize),
    Distinct,
    OrderBy { descending: bool },
    Cancellable,
    Validate,
    RemoveDuplicates,
    GroupBy,
    ParallelFilter,
    ParallelMap,
    ParallelDistinct,
    ParallelGroupBy,
}

impl StageKind {
    /// Stable snake_case name, also used as the `stage` of errors.
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Source => "source",
            StageKind::Filter => "filter",
            StageKind::Map => "map",
            StageKind::FlatMap => "flat_map",
            StageKind::Inspect => "inspect",
            StageKind::Take(_) => "take",
            StageKind::Skip(_) => "skip",
            StageKind::Distinct => "distinct",
            StageKind::OrderBy { .. } => "order_by",
            StageKind::Cancellable => "cancellable",
            StageKind::Validate => "validate",
            StageKind::RemoveDuplicates => "remove_duplicates",
            StageKind::GroupBy => "group_by",
            StageKind::ParallelFilter => "parallel_filter",
            StageKind::ParallelMap => "parallel_map",
            StageKind::ParallelDistinct => "parallel_distinct",
            StageKind::ParallelGroupBy => "parallel_group_by",
        }
    }

    /// Whether the stage has to see its whole input before emitting anything.
    pub fn is_barrier(&self) -> bool {
        matches!(
            self,
            StageKind::OrderBy { .. }
                | StageKind::GroupBy
                | StageKind::ParallelFilter
                | StageKind::ParallelMap
                | StageKind::ParallelDistinct
                | StageKind::ParallelGroupBy
        )
    }

    /// Whether the stage fans work out across a worker pool.
    pub fn is_parallel(&self) -> bool {
        matches!(
            self,
            StageKind::ParallelFilter
                | StageKind::ParallelMap
                | StageKind::ParallelDistinct
                | StageKind::ParallelGroupBy
        )
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Take(n) => write!(f, "take({n})"),
            StageKind::Skip(n) => write!(f, "skip({n})"),
            StageKind::OrderBy { descending: true } => f.write_str("order_by_descending"),
            other => f.write_str(other.name()),
        }
    }
}

/// One recorded chain call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageInfo {
    pub kind: StageKind,
    /// Free-form detail (source description, field names, ...).
    pub detail: Option<String>,
}

impl StageInfo {
    pub(crate) fn new(kind: StageKind) -> Self {
        Self { kind, detail: None }
    }

    pub(crate) fn with_detail(kind: StageKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }
}
