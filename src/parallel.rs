//! Data-parallel execution: [`ParallelPipeline`].
//!
//! A parallel pipeline wraps an ordinary [`Pipeline`] and a dedicated `rayon`
//! thread pool. `filter`, `map` and `distinct` become fan-out barriers: when
//! executed they materialize their input, split it into chunks, run the chunks
//! on the pool and gather each chunk's outputs with rayon's `collect`. The
//! gathered set is handed back to the sequential machinery, so order-sensitive stages
//! (`order_by`, `take`, `skip`) run sequentially on a stable snapshot.
//!
//! Ordering: fan-out stages do **not** preserve input order. Apply `order_by`
//! last when a deterministic order is needed.
//!
//! Failure: a fan-out stage is all-or-nothing. Every element runs; failing
//! elements (errors and panics alike) are collected into an
//! [`AggregateFailure`] and none of the stage's output escapes.
//!
//! ```
//! use rowbeam::Pipeline;
//!
//! let p = Pipeline::from_vec((1..=100).collect::<Vec<i64>>())
//!     .parallel(Some(4)).unwrap()
//!     .filter(|x| x % 3 == 0)
//!     .map(|x| x * 2)
//!     .order_by(|x| *x);
//! let out = p.to_list().unwrap();
//! assert_eq!(out.len(), 33);
//! assert_eq!(out[0], 6);
//! ```

use crate::cancel::CancelToken;
use crate::config::ParallelOptions;
use crate::error::{AggregateFailure, ElementFailure, EtlError, Result};
use crate::pipeline::Pipeline;
use crate::plan::ExecutionExplanation;
use crate::stage::{EtlBound, Source, StageInfo, StageKind, Stream};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::collections::HashSet;
use std::hash::Hash;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// What one worker produced for one chunk.
struct ChunkOutcome<O> {
    out: Vec<O>,
    failed: Vec<ElementFailure>,
    cancelled: bool,
}

/// The pool and sizing shared by every stage of a parallel pipeline.
#[derive(Clone)]
pub(crate) struct WorkerPool {
    pool: Arc<ThreadPool>,
    chunk_size: usize,
    cancel: Option<CancelToken>,
}

impl WorkerPool {
    fn build(options: &ParallelOptions) -> Result<Self> {
        options.check()?;
        let threads = options.resolved_workers();
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rowbeam-worker-{i}"))
            .build()?;
        Ok(Self {
            pool: Arc::new(pool),
            chunk_size: options.chunk_size,
            cancel: None,
        })
    }

    pub(crate) fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Run `f` over `items` on the pool.
    ///
    /// `f` returns `Ok(None)` to drop an element. Output order is unspecified.
    pub(crate) fn run<I, O, F>(&self, stage: &'static str, items: Vec<I>, f: F) -> Result<Vec<O>>
    where
        I: Send,
        O: Send,
        F: Fn(I) -> anyhow::Result<Option<O>> + Send + Sync,
    {
        let total = items.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        // Two chunks per worker evens out skewed per-element cost.
        let partitions = self.threads().max(1) * 2;
        let chunk = total.div_ceil(partitions).clamp(1, self.chunk_size);
        let chunks = split_indexed(items, chunk);
        log::debug!(
            "{stage}: {total} element(s) in {} chunk(s) on {} worker(s)",
            chunks.len(),
            self.threads()
        );

        // Each chunk owns its outputs; rayon gathers them in chunk order.
        let outcomes: Vec<ChunkOutcome<O>> = self.pool.install(|| {
            chunks
                .into_par_iter()
                .map(|chunk| self.run_chunk(chunk, &f))
                .collect()
        });

        if outcomes.iter().any(|o| o.cancelled) {
            return Err(EtlError::Cancelled);
        }
        let mut out = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for outcome in outcomes {
            out.extend(outcome.out);
            failures.extend(outcome.failed);
        }
        if !failures.is_empty() {
            failures.sort_by_key(|f| f.index);
            return Err(AggregateFailure {
                stage,
                total,
                failures,
            }
            .into());
        }
        Ok(out)
    }

    fn run_chunk<I, O, F>(&self, chunk: Vec<(usize, I)>, f: &F) -> ChunkOutcome<O>
    where
        F: Fn(I) -> anyhow::Result<Option<O>>,
    {
        let mut outcome = ChunkOutcome {
            out: Vec::with_capacity(chunk.len()),
            failed: Vec::new(),
            cancelled: false,
        };
        for (index, item) in chunk {
            if self.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| f(item))) {
                Ok(Ok(Some(v))) => outcome.out.push(v),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => outcome.failed.push(ElementFailure {
                    index,
                    message: format!("{e:#}"),
                }),
                Err(payload) => outcome.failed.push(ElementFailure {
                    index,
                    message: panic_message(payload.as_ref()),
                }),
            }
        }
        outcome
    }
}

fn split_indexed<I>(items: Vec<I>, chunk: usize) -> Vec<Vec<(usize, I)>> {
    let mut out = Vec::with_capacity(items.len().div_ceil(chunk));
    let mut current = Vec::with_capacity(chunk);
    for pair in items.into_iter().enumerate() {
        current.push(pair);
        if current.len() == chunk {
            out.push(mem::replace(&mut current, Vec::with_capacity(chunk)));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// A pipeline whose per-element stages fan out across a bounded worker pool.
pub struct ParallelPipeline<T> {
    pub(crate) inner: Pipeline<T>,
    pub(crate) workers: WorkerPool,
    options: ParallelOptions,
}

impl<T> Clone for ParallelPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            workers: self.workers.clone(),
            options: self.options.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ParallelPipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelPipeline")
            .field("inner", &self.inner)
            .field("options", &self.options)
            .finish()
    }
}

impl<T: EtlBound> ParallelPipeline<T> {
    /// Wrap `inner`; `workers = None` uses one worker per logical CPU.
    ///
    /// # Errors
    /// [`EtlError::Argument`] for `Some(0)`; [`EtlError::ThreadPool`] if the
    /// pool cannot be started.
    pub fn new(inner: Pipeline<T>, workers: Option<usize>) -> Result<Self> {
        Self::with_options(
            inner,
            ParallelOptions {
                workers,
                ..Default::default()
            },
        )
    }

    pub fn with_options(inner: Pipeline<T>, options: ParallelOptions) -> Result<Self> {
        let workers = WorkerPool::build(&options)?;
        log::debug!("parallel pipeline with {} worker(s)", workers.threads());
        Ok(Self {
            inner,
            workers,
            options,
        })
    }

    pub fn from_source<S>(source: S, workers: Option<usize>) -> Result<Self>
    where
        S: Source<T> + 'static,
    {
        Self::new(Pipeline::from_source(source), workers)
    }

    /// Number of threads in the pool.
    pub fn workers(&self) -> usize {
        self.workers.threads()
    }

    pub fn options(&self) -> &ParallelOptions {
        &self.options
    }

    /// The sequential pipeline equivalent to everything chained so far.
    pub fn sequential(&self) -> Pipeline<T> {
        self.inner.clone()
    }

    pub(crate) fn rewrap<O>(&self, inner: Pipeline<O>) -> ParallelPipeline<O> {
        ParallelPipeline {
            inner,
            workers: self.workers.clone(),
            options: self.options.clone(),
        }
    }

    /// Append a fan-out barrier running `f` per element.
    pub(crate) fn fan_out<O, F>(&self, info: StageInfo, f: F) -> ParallelPipeline<O>
    where
        O: EtlBound,
        F: Fn(T) -> anyhow::Result<Option<O>> + Send + Sync + 'static,
    {
        let workers = self.workers.clone();
        let stage = info.kind.name();
        self.rewrap(
            self.inner
                .barrier(info, move |items: Vec<T>| workers.run(stage, items, &f)),
        )
    }

    /// Check `token` between elements in stages chained after this call.
    ///
    /// Fan-out stages stop scheduling new elements once the token is cancelled
    /// and fail with [`EtlError::Cancelled`].
    pub fn with_cancellation(&self, token: CancelToken) -> Self {
        let mut next = self.rewrap(self.inner.with_cancellation(token.clone()));
        next.workers.cancel = Some(token);
        next
    }

    /// Keep the elements matching `predicate`. Output order is unspecified.
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.fan_out(StageInfo::new(StageKind::ParallelFilter), move |item: T| {
            Ok(predicate(&item).then_some(item))
        })
    }

    pub fn try_filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.fan_out(StageInfo::new(StageKind::ParallelFilter), move |item: T| {
            Ok(predicate(&item)?.then_some(item))
        })
    }

    /// Project every element. Output order is unspecified.
    pub fn map<O, F>(&self, f: F) -> ParallelPipeline<O>
    where
        O: EtlBound,
        F: Fn(T) -> O + Send + Sync + 'static,
    {
        self.fan_out(StageInfo::new(StageKind::ParallelMap), move |item: T| {
            Ok(Some(f(item)))
        })
    }

    pub fn try_map<O, F>(&self, f: F) -> ParallelPipeline<O>
    where
        O: EtlBound,
        F: Fn(T) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        self.fan_out(StageInfo::new(StageKind::ParallelMap), move |item: T| {
            f(item).map(Some)
        })
    }

    /// Drop duplicate elements. Which of several equal elements survives is
    /// unspecified.
    pub fn distinct(&self) -> Self
    where
        T: Eq + Hash,
    {
        let workers = self.workers.clone();
        let info = StageInfo::new(StageKind::ParallelDistinct);
        let stage = info.kind.name();
        self.rewrap(self.inner.barrier(info, move |items: Vec<T>| {
            let seen = Mutex::new(HashSet::with_capacity(items.len()));
            workers.run(stage, items, |item: T| {
                let fresh = seen
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(item.clone());
                Ok(fresh.then_some(item))
            })
        }))
    }

    /// Stable ascending sort of the gathered set; runs sequentially.
    pub fn order_by<K, F>(&self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.rewrap(self.inner.order_by(key))
    }

    pub fn order_by_descending<K, F>(&self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.rewrap(self.inner.order_by_descending(key))
    }

    pub fn take(&self, n: usize) -> Self {
        self.rewrap(self.inner.take(n))
    }

    pub fn skip(&self, n: usize) -> Self {
        self.rewrap(self.inner.skip(n))
    }

    pub fn try_take(&self, n: i64) -> Result<Self> {
        Ok(self.rewrap(self.inner.try_take(n)?))
    }

    pub fn try_skip(&self, n: i64) -> Result<Self> {
        Ok(self.rewrap(self.inner.try_skip(n)?))
    }

    pub fn explain(&self) -> ExecutionExplanation {
        self.inner.explain()
    }

    /* ---------- terminals ---------- */

    pub fn execute(&self) -> Result<Stream<T>> {
        self.inner.execute()
    }

    pub fn to_list(&self) -> Result<Vec<T>> {
        self.inner.to_list()
    }

    pub fn to_array(&self) -> Result<Box<[T]>> {
        self.inner.to_array()
    }

    pub fn first(&self) -> Result<T> {
        self.inner.first()
    }

    pub fn first_or_default(&self) -> Result<T>
    where
        T: Default,
    {
        self.inner.first_or_default()
    }

    pub fn count(&self) -> Result<usize> {
        self.inner.count()
    }

    /// Run `action` for every element concurrently on the pool.
    ///
    /// The action must tolerate concurrent calls; unsynchronized shared state
    /// inside it is a caller bug. A panicking action is reported as an
    /// [`AggregateFailure`] after all other elements have run.
    pub fn for_each<F>(&self, action: F) -> Result<()>
    where
        F: Fn(T) + Send + Sync,
    {
        let items = self.inner.to_list()?;
        self.workers.run("parallel_for_each", items, |item: T| {
            action(item);
            Ok(None::<()>)
        })?;
        Ok(())
    }

    pub fn try_for_each<F>(&self, action: F) -> Result<()>
    where
        F: Fn(T) -> anyhow::Result<()> + Send + Sync,
    {
        let items = self.inner.to_list()?;
        self.workers.run("parallel_for_each", items, |item: T| {
            action(item).map(|()| None::<()>)
        })?;
        Ok(())
    }
}

#[cfg(feature = "async")]
impl<T: EtlBound> ParallelPipeline<T> {
    pub async fn execute_async(&self) -> Result<Vec<T>> {
        self.inner.execute_async().await
    }

    /// [`for_each`](Self::for_each) driven from a blocking background task.
    pub async fn for_each_async<F>(&self, action: F) -> Result<()>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.for_each(action)).await?
    }
}
