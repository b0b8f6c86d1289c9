//! # Rowbeam
//!
//! A fluent, **lazily-composed ETL library**. Sources, transformations and
//! terminal operations chain into a [`Pipeline`]; nothing runs until a terminal
//! operation (`to_list`, `count`, `for_each`, `first`, ...) pulls data through.
//!
//! ## Key Features
//!
//! - **Lazy, re-iterable pipelines** - every execution starts from the source again
//! - **Uniform records** - [`Row`] is an ordered, case-insensitive field map of [`Value`]s
//! - **Parallel execution** - [`ParallelPipeline`] fans filter/map/distinct out to a worker pool
//! - **Row helpers** - deduplication, column edits and grouped aggregation
//! - **Validation** - per-record rules with skip, log-and-continue or fail-fast modes
//! - **I/O adapters** - CSV and JSON Lines (optional via feature flags)
//! - **Introspection** - `explain()` describes the stage chain without running it
//!
//! ## Quick Start
//!
//! ```
//! use rowbeam::{row, Pipeline};
//! # fn main() -> rowbeam::Result<()> {
//! let people = Pipeline::from_vec(vec![
//!     row! { "name" => "Alice", "age" => 25 },
//!     row! { "name" => "Bob", "age" => 30 },
//!     row! { "name" => "Eve", "age" => 22 },
//! ]);
//!
//! let names = people
//!     .filter(|r| r.try_get_typed::<i64>("age").is_some_and(|age| age >= 25))
//!     .order_by(|r| r.try_get_typed::<String>("name"))
//!     .try_map(|r| Ok(r.get_typed::<String>("name")?))
//!     .to_list()?;
//!
//! assert_eq!(names, vec!["Alice", "Bob"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! - **Stages** are recorded, never run, by chain calls. Streaming stages
//!   (including `distinct` and `remove_duplicates`, which only keep a set of
//!   seen keys) pull one element at a time; barriers (`order_by`, `group_by`
//!   and every parallel fan-out stage) materialize their input when first pulled.
//! - **Errors** travel in-band: a failing element surfaces as an [`EtlError`]
//!   at the position it occurred, and terminals stop at the first one.
//! - **Parallel stages** are all-or-nothing: failures of every element are
//!   gathered into an [`AggregateFailure`].
//!
//! ## Feature Flags
//!
//! - `io-jsonl` - JSON Lines source and sink
//! - `io-csv` - CSV source and sink
//! - `async` - `execute_async` / `for_each_async` on a tokio blocking worker

pub mod aggregate;
pub mod cancel;
pub mod config;
pub mod error;
pub mod extensions;
pub mod group;
pub mod io;
pub mod parallel;
pub mod pipeline;
pub mod plan;
pub mod row;
pub mod stage;
pub mod testing;
pub mod validation;
pub mod value;

pub use aggregate::{Aggregation, Aggregator};
pub use cancel::CancelToken;
pub use config::{CsvOptions, EtlConfig, JsonlOptions, ParallelOptions};
pub use error::{AggregateFailure, ConversionError, ElementFailure, EtlError, Result};
pub use extensions::CompositeTransform;
pub use parallel::ParallelPipeline;
pub use pipeline::Pipeline;
pub use plan::{ExecutionExplanation, ExplainStep};
pub use row::Row;
pub use stage::{EtlBound, Source, StageInfo, StageKind, Stream};
pub use validation::{
    ErrorCollector, RowValidator, SharedCollector, Validate, ValidationError, ValidationMode,
    ValidationResult,
};
pub use value::{FromValue, TimestampMs, Value};

#[cfg(feature = "io-csv")]
pub use io::csv::{CsvSource, read_csv_rows, write_csv_rows};
#[cfg(feature = "io-jsonl")]
pub use io::jsonl::{JsonlSource, read_jsonl_rows, write_jsonl_rows};
