//! The lazy, re-iterable [`Pipeline`].
//!
//! A pipeline is an immutable value: a shared opener for the source plus the
//! stages chained on top of it. Chain calls take `&self` and return a new
//! pipeline, so a common prefix can be branched freely and shared across
//! threads. Nothing runs until a terminal call ([`execute`](Pipeline::execute),
//! [`to_list`](Pipeline::to_list), [`count`](Pipeline::count), ...), and every
//! terminal call re-runs the whole chain from the source.
//!
//! ```
//! use rowbeam::Pipeline;
//!
//! let evens = Pipeline::from_vec((1..=10).collect())
//!     .filter(|x: &i32| x % 2 == 0)
//!     .map(|x| x * 10);
//! assert_eq!(evens.to_list().unwrap(), vec![20, 40, 60, 80, 100]);
//! assert_eq!(evens.count().unwrap(), 5);
//! ```

use crate::cancel::CancelToken;
use crate::error::{EtlError, Result};
use crate::parallel::ParallelPipeline;
use crate::plan::ExecutionExplanation;
use crate::stage::{EtlBound, FnSource, Source, StageInfo, StageKind, Stream, VecSource};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::iter;
use std::sync::Arc;

/// Starts a fresh pass over the source and every stage chained so far.
type Opener<T> = Arc<dyn Fn() -> Result<Stream<T>> + Send + Sync>;

/// A deferred chain of stages over a re-iterable source.
pub struct Pipeline<T> {
    open: Opener<T>,
    stages: Arc<Vec<StageInfo>>,
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            open: Arc::clone(&self.open),
            stages: Arc::clone(&self.stages),
        }
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "stages",
                &self.stages.iter().map(|s| s.kind.to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<T: EtlBound> From<Vec<T>> for Pipeline<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}

/* ===================== construction ===================== */

impl<T: EtlBound> Pipeline<T> {
    /// Pipeline over an in-memory vector. Each execution clones the elements.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self::from_source(VecSource::new(data))
    }

    /// Pipeline with no elements.
    pub fn empty() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Pipeline over a factory that produces a fresh iterator per execution.
    ///
    /// ```
    /// use rowbeam::Pipeline;
    ///
    /// let p = Pipeline::from_fn(|| 0..3);
    /// assert_eq!(p.to_list().unwrap(), vec![0, 1, 2]);
    /// assert_eq!(p.to_list().unwrap(), vec![0, 1, 2]);
    /// ```
    pub fn from_fn<F, I>(factory: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::from_source(FnSource::new(factory))
    }

    /// Pipeline over an adapter implementing [`Source`].
    pub fn from_source<S>(source: S) -> Self
    where
        S: Source<T> + 'static,
    {
        let info = StageInfo::with_detail(StageKind::Source, source.describe());
        let source = Arc::new(source);
        Self {
            open: Arc::new(move || source.open()),
            stages: Arc::new(vec![info]),
        }
    }
}

/* ===================== stage plumbing ===================== */

impl<T: EtlBound> Pipeline<T> {
    /// Append a streaming stage.
    pub(crate) fn chain<O, F>(&self, info: StageInfo, stage: F) -> Pipeline<O>
    where
        O: EtlBound,
        F: Fn(Stream<T>) -> Stream<O> + Send + Sync + 'static,
    {
        let upstream = Arc::clone(&self.open);
        let mut stages = Vec::with_capacity(self.stages.len() + 1);
        stages.extend(self.stages.iter().cloned());
        stages.push(info);
        Pipeline {
            open: Arc::new(move || Ok(stage(upstream()?))),
            stages: Arc::new(stages),
        }
    }

    /// Append a stage that needs its whole input before emitting anything.
    ///
    /// Materialization is itself deferred until the first element is pulled,
    /// and an upstream error short-circuits the stage.
    pub(crate) fn barrier<O, F>(&self, info: StageInfo, f: F) -> Pipeline<O>
    where
        O: EtlBound,
        F: Fn(Vec<T>) -> Result<Vec<O>> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.chain(info, move |upstream: Stream<T>| -> Stream<O> {
            let f = Arc::clone(&f);
            let materialize = move || -> Stream<O> {
                match upstream.collect::<Result<Vec<T>>>().and_then(|items| f(items)) {
                    Ok(out) => Box::new(out.into_iter().map(Ok)),
                    Err(e) => Box::new(iter::once(Err(e))),
                }
            };
            Box::new(iter::once_with(materialize).flatten())
        })
    }

    /// Per-element transform recorded under `info`.
    pub(crate) fn map_as<O, F>(&self, info: StageInfo, f: F) -> Pipeline<O>
    where
        O: EtlBound,
        F: Fn(T) -> O + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.chain(info, move |upstream: Stream<T>| -> Stream<O> {
            let f = Arc::clone(&f);
            Box::new(upstream.map(move |item| item.map(|v| f(v))))
        })
    }

    /// Keep elements whose key has not been seen earlier in the same pass.
    pub(crate) fn distinct_as<K, F>(&self, info: StageInfo, key: F) -> Self
    where
        K: Eq + Hash + Send + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let key = Arc::new(key);
        self.chain(info, move |upstream: Stream<T>| -> Stream<T> {
            let key = Arc::clone(&key);
            let mut seen = HashSet::new();
            Box::new(upstream.filter(move |item| match item {
                Ok(v) => seen.insert(key(v)),
                Err(_) => true,
            }))
        })
    }

    /// Recorded stages, source first.
    pub fn stages(&self) -> &[StageInfo] {
        &self.stages
    }

    /// Describe the chain without running it.
    pub fn explain(&self) -> ExecutionExplanation {
        ExecutionExplanation::from_stages(&self.stages)
    }
}

/* ===================== chain operations ===================== */

impl<T: EtlBound> Pipeline<T> {
    /// Keep the elements matching `predicate`. Relative order is preserved.
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        self.chain(StageInfo::new(StageKind::Filter), move |upstream: Stream<T>| -> Stream<T> {
            let predicate = Arc::clone(&predicate);
            Box::new(upstream.filter(move |item| match item {
                Ok(v) => predicate(v),
                Err(_) => true,
            }))
        })
    }

    /// Like [`filter`](Self::filter) with a fallible predicate.
    ///
    /// A predicate error is reported by the terminal call as [`EtlError::Stage`].
    pub fn try_filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        self.chain(StageInfo::new(StageKind::Filter), move |upstream: Stream<T>| -> Stream<T> {
            let predicate = Arc::clone(&predicate);
            Box::new(upstream.filter_map(move |item| match item {
                Ok(v) => match predicate(&v) {
                    Ok(true) => Some(Ok(v)),
                    Ok(false) => None,
                    Err(e) => Some(Err(EtlError::stage("try_filter", e))),
                },
                Err(e) => Some(Err(e)),
            }))
        })
    }

    /// Project every element. Deferred like every other stage.
    pub fn map<O, F>(&self, f: F) -> Pipeline<O>
    where
        O: EtlBound,
        F: Fn(T) -> O + Send + Sync + 'static,
    {
        self.map_as(StageInfo::new(StageKind::Map), f)
    }

    /// Like [`map`](Self::map) with a fallible selector.
    pub fn try_map<O, F>(&self, f: F) -> Pipeline<O>
    where
        O: EtlBound,
        F: Fn(T) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.chain(StageInfo::new(StageKind::Map), move |upstream: Stream<T>| -> Stream<O> {
            let f = Arc::clone(&f);
            Box::new(upstream.map(move |item| {
                item.and_then(|v| f(v).map_err(|e| EtlError::stage("try_map", e)))
            }))
        })
    }

    /// Expand every element into zero or more outputs.
    pub fn flat_map<O, I, F>(&self, f: F) -> Pipeline<O>
    where
        O: EtlBound,
        I: IntoIterator<Item = O>,
        I::IntoIter: Send + 'static,
        F: Fn(T) -> I + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.chain(StageInfo::new(StageKind::FlatMap), move |upstream: Stream<T>| -> Stream<O> {
            let f = Arc::clone(&f);
            Box::new(upstream.flat_map(move |item| -> Stream<O> {
                match item {
                    Ok(v) => Box::new(f(v).into_iter().map(Ok)),
                    Err(e) => Box::new(iter::once(Err(e))),
                }
            }))
        })
    }

    /// Observe elements as they flow past without changing them.
    pub fn inspect<F>(&self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.chain(StageInfo::new(StageKind::Inspect), move |upstream: Stream<T>| -> Stream<T> {
            let f = Arc::clone(&f);
            Box::new(upstream.inspect(move |item| {
                if let Ok(v) = item {
                    f(v);
                }
            }))
        })
    }

    /// Keep the first `n` elements.
    ///
    /// The source is not pulled past the `n`-th element, so `take` also
    /// truncates unbounded sources.
    pub fn take(&self, n: usize) -> Self {
        self.chain(
            StageInfo::new(StageKind::Take(n)),
            move |mut upstream: Stream<T>| -> Stream<T> {
                let mut remaining = n;
                Box::new(iter::from_fn(move || {
                    if remaining == 0 {
                        return None;
                    }
                    let item = upstream.next()?;
                    if item.is_ok() {
                        remaining -= 1;
                    }
                    Some(item)
                }))
            },
        )
    }

    /// Drop the first `n` elements.
    pub fn skip(&self, n: usize) -> Self {
        self.chain(StageInfo::new(StageKind::Skip(n)), move |upstream: Stream<T>| -> Stream<T> {
            let mut remaining = n;
            Box::new(upstream.filter(move |item| {
                if item.is_err() || remaining == 0 {
                    return true;
                }
                remaining -= 1;
                false
            }))
        })
    }

    /// [`take`](Self::take) for a signed count.
    ///
    /// # Errors
    /// [`EtlError::Range`] when `n` is negative.
    pub fn try_take(&self, n: i64) -> Result<Self> {
        Ok(self.take(non_negative("n", n)?))
    }

    /// [`skip`](Self::skip) for a signed count.
    ///
    /// # Errors
    /// [`EtlError::Range`] when `n` is negative.
    pub fn try_skip(&self, n: i64) -> Result<Self> {
        Ok(self.skip(non_negative("n", n)?))
    }

    /// Drop elements equal to one seen earlier; the first occurrence wins.
    pub fn distinct(&self) -> Self
    where
        T: Eq + Hash,
    {
        self.distinct_as(StageInfo::new(StageKind::Distinct), T::clone)
    }

    /// Drop elements whose key equals that of one seen earlier.
    pub fn distinct_by<K, F>(&self, key: F) -> Self
    where
        K: Eq + Hash + Send + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.distinct_as(StageInfo::with_detail(StageKind::Distinct, "by key"), key)
    }

    /// Stable ascending sort by `key`.
    ///
    /// ```
    /// use rowbeam::Pipeline;
    ///
    /// let words = Pipeline::from_vec(vec!["pear", "fig", "apple", "kiwi"]);
    /// let by_len = words.order_by(|w| w.len()).to_list().unwrap();
    /// assert_eq!(by_len, vec!["fig", "pear", "kiwi", "apple"]);
    /// ```
    pub fn order_by<K, F>(&self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.sort_stage(false, key)
    }

    /// Stable descending sort by `key`; equal keys keep their input order.
    pub fn order_by_descending<K, F>(&self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.sort_stage(true, key)
    }

    fn sort_stage<K, F>(&self, descending: bool, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.barrier(
            StageInfo::new(StageKind::OrderBy { descending }),
            move |items: Vec<T>| {
                let mut keyed: Vec<(K, T)> = items.into_iter().map(|v| (key(&v), v)).collect();
                if descending {
                    keyed.sort_by(|a, b| b.0.cmp(&a.0));
                } else {
                    keyed.sort_by(|a, b| a.0.cmp(&b.0));
                }
                Ok(keyed.into_iter().map(|(_, v)| v).collect())
            },
        )
    }

    /// Check `token` before pulling each element.
    ///
    /// Once cancellation is observed the pass yields [`EtlError::Cancelled`] and
    /// stops. An element already being processed downstream is not interrupted.
    pub fn with_cancellation(&self, token: CancelToken) -> Self {
        self.chain(
            StageInfo::new(StageKind::Cancellable),
            move |mut upstream: Stream<T>| -> Stream<T> {
                let token = token.clone();
                let mut done = false;
                Box::new(iter::from_fn(move || {
                    if done {
                        return None;
                    }
                    if token.is_cancelled() {
                        done = true;
                        return Some(Err(EtlError::Cancelled));
                    }
                    upstream.next()
                }))
            },
        )
    }

    /// Switch to parallel execution for subsequent stages.
    ///
    /// `workers = None` sizes the pool to the available hardware parallelism.
    ///
    /// # Errors
    /// [`EtlError::Argument`] for `Some(0)`, or [`EtlError::ThreadPool`] when the
    /// pool cannot be built.
    pub fn parallel(&self, workers: Option<usize>) -> Result<ParallelPipeline<T>> {
        ParallelPipeline::new(self.clone(), workers)
    }
}

fn non_negative(name: &'static str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| EtlError::Range { name, value })
}

/* ===================== terminal operations ===================== */

impl<T: EtlBound> Pipeline<T> {
    /// Run the chain and return its lazy output.
    ///
    /// Elements are produced as the returned stream is pulled. Errors raised by
    /// stages appear in-band, in the position where they occurred.
    ///
    /// # Errors
    /// Returns an error if the source cannot be opened.
    pub fn execute(&self) -> Result<Stream<T>> {
        log::debug!("executing pipeline with {} stage(s)", self.stages.len());
        (self.open)()
    }

    /// Run the chain and collect every element. Stops at the first error.
    pub fn to_list(&self) -> Result<Vec<T>> {
        self.execute()?.collect()
    }

    pub fn to_array(&self) -> Result<Box<[T]>> {
        self.to_list().map(Vec::into_boxed_slice)
    }

    /// Apply `action` to every element in order.
    ///
    /// # Errors
    /// The first stage error. Elements before it have already been acted on.
    pub fn for_each<F>(&self, mut action: F) -> Result<()>
    where
        F: FnMut(T),
    {
        for item in self.execute()? {
            action(item?);
        }
        Ok(())
    }

    /// Like [`for_each`](Self::for_each) with a fallible action; stops at the
    /// first failure.
    pub fn try_for_each<F>(&self, mut action: F) -> Result<()>
    where
        F: FnMut(T) -> anyhow::Result<()>,
    {
        for item in self.execute()? {
            action(item?).map_err(|e| EtlError::stage("for_each", e))?;
        }
        Ok(())
    }

    /// The first element.
    ///
    /// Only the first element is pulled from the chain.
    ///
    /// # Errors
    /// [`EtlError::Empty`] if the pipeline produces nothing.
    pub fn first(&self) -> Result<T> {
        self.execute()?.next().unwrap_or(Err(EtlError::Empty))
    }

    /// The first element, or `T::default()` if there is none.
    pub fn first_or_default(&self) -> Result<T>
    where
        T: Default,
    {
        self.execute()?.next().unwrap_or_else(|| Ok(T::default()))
    }

    pub fn count(&self) -> Result<usize> {
        let mut n = 0;
        for item in self.execute()? {
            item?;
            n += 1;
        }
        Ok(n)
    }
}

#[cfg(feature = "async")]
impl<T: EtlBound> Pipeline<T> {
    /// [`to_list`](Self::to_list) on a blocking background worker.
    pub async fn execute_async(&self) -> Result<Vec<T>> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.to_list()).await?
    }

    /// [`for_each`](Self::for_each) on a blocking background worker.
    pub async fn for_each_async<F>(&self, action: F) -> Result<()>
    where
        F: FnMut(T) + Send + 'static,
    {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.for_each(action)).await?
    }
}
