//! Higher-level operators built from the core pipeline stages.
//!
//! - [`CompositeTransform`]: package a stage sequence into a reusable component.
//! - Row helpers on [`Pipeline<Row>`] and [`ParallelPipeline<Row>`]:
//!   [`remove_duplicates`](Pipeline::remove_duplicates),
//!   [`fill_missing`](Pipeline::fill_missing), [`add_column`](Pipeline::add_column),
//!   [`remove_column`](Pipeline::remove_column) and
//!   [`rename_column`](Pipeline::rename_column). Grouping lives in
//!   [`crate::group`].
//!
//! Field names are matched case-insensitively, like [`Row::get`]. An empty
//! field name is rejected with [`EtlError::Argument`] when the operator is
//! chained, not when the pipeline runs.

use crate::error::{EtlError, Result};
use crate::parallel::ParallelPipeline;
use crate::pipeline::Pipeline;
use crate::row::Row;
use crate::stage::{EtlBound, StageInfo, StageKind};
use crate::value::Value;

/// A reusable, packaged sequence of transformations.
///
/// # Example
/// ```
/// use rowbeam::Pipeline;
/// use rowbeam::extensions::CompositeTransform;
///
/// struct NormalizeEmails;
///
/// impl CompositeTransform<String, String> for NormalizeEmails {
///     fn expand(&self, input: &Pipeline<String>) -> Pipeline<String> {
///         input
///             .map(|email| email.trim().to_lowercase())
///             .filter(|email| email.contains('@'))
///     }
/// }
///
/// let emails = Pipeline::from_vec(vec![
///     "  Alice@EXAMPLE.com ".to_string(),
///     "invalid".to_string(),
///     "bob@test.com".to_string(),
/// ]);
/// let normalized = emails.apply(&NormalizeEmails).to_list().unwrap();
/// assert_eq!(normalized, vec!["alice@example.com", "bob@test.com"]);
/// ```
pub trait CompositeTransform<I, O>: Send + Sync {
    /// Build the output pipeline from `input`. Must not execute anything.
    fn expand(&self, input: &Pipeline<I>) -> Pipeline<O>;
}

impl<T: EtlBound> Pipeline<T> {
    /// Apply a composite transform to this pipeline.
    pub fn apply<O, CT>(&self, transform: &CT) -> Pipeline<O>
    where
        O: EtlBound,
        CT: CompositeTransform<T, O>,
    {
        transform.expand(self)
    }
}

pub(crate) fn require_name(param: &'static str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        Err(EtlError::argument(param, "field name must not be empty"))
    } else {
        Ok(())
    }
}

/// Per-row rewrite shared by the sequential and parallel column helpers.
struct ColumnOp {
    detail: String,
    apply: Box<dyn Fn(Row) -> Row + Send + Sync>,
}

impl ColumnOp {
    fn fill_missing(field: &str, default: Value) -> Result<Self> {
        require_name("field", field)?;
        let field = field.to_string();
        Ok(Self {
            detail: format!("fill_missing({field})"),
            apply: Box::new(move |mut row: Row| -> Row {
                if row.get(&field).is_none_or(Value::is_null) {
                    row.set(field.as_str(), default.clone());
                }
                row
            }),
        })
    }

    fn add_column<V, F>(name: &str, compute: F) -> Result<Self>
    where
        V: Into<Value>,
        F: Fn(&Row) -> V + Send + Sync + 'static,
    {
        require_name("name", name)?;
        let name = name.to_string();
        Ok(Self {
            detail: format!("add_column({name})"),
            apply: Box::new(move |mut row: Row| -> Row {
                let value = compute(&row).into();
                row.set(name.as_str(), value);
                row
            }),
        })
    }

    fn remove_column(name: &str) -> Result<Self> {
        require_name("name", name)?;
        let name = name.to_string();
        Ok(Self {
            detail: format!("remove_column({name})"),
            apply: Box::new(move |mut row: Row| -> Row {
                row.remove(&name);
                row
            }),
        })
    }

    fn rename_column(old: &str, new: &str) -> Result<Self> {
        require_name("old", old)?;
        require_name("new", new)?;
        let (old, new) = (old.to_string(), new.to_string());
        Ok(Self {
            detail: format!("rename_column({old} -> {new})"),
            apply: Box::new(move |mut row: Row| -> Row {
                row.rename(&old, new.as_str());
                row
            }),
        })
    }
}

impl Pipeline<Row> {
    fn column_op(&self, op: ColumnOp) -> Self {
        self.map_as(StageInfo::with_detail(StageKind::Map, op.detail), op.apply)
    }

    /// Keep the first row for each value of `key_field`, in encounter order.
    ///
    /// Rows without the field are keyed as `Null`. Memory grows with the number
    /// of distinct keys.
    ///
    /// ```
    /// use rowbeam::{row, Pipeline};
    ///
    /// let p = Pipeline::from_vec(vec![
    ///     row! { "id" => 1, "name" => "Alice" },
    ///     row! { "id" => 2, "name" => "Bob" },
    ///     row! { "id" => 1, "name" => "Alice2" },
    /// ]);
    /// let names: Vec<String> = p
    ///     .remove_duplicates("id").unwrap()
    ///     .to_list().unwrap()
    ///     .iter()
    ///     .map(|r| r.get_typed::<String>("name").unwrap())
    ///     .collect();
    /// assert_eq!(names, vec!["Alice", "Bob"]);
    /// ```
    pub fn remove_duplicates(&self, key_field: &str) -> Result<Self> {
        require_name("key_field", key_field)?;
        let key = key_field.to_string();
        Ok(self.distinct_as(
            StageInfo::with_detail(StageKind::RemoveDuplicates, key_field),
            move |row: &Row| row.get(&key).cloned().unwrap_or_default(),
        ))
    }

    /// Set `field` to `default` where it is missing or null.
    pub fn fill_missing(&self, field: &str, default: impl Into<Value>) -> Result<Self> {
        Ok(self.column_op(ColumnOp::fill_missing(field, default.into())?))
    }

    /// Derive `name` from each row; `compute` sees the row before the new field
    /// is added. An existing field with the same name is overwritten.
    pub fn add_column<V, F>(&self, name: &str, compute: F) -> Result<Self>
    where
        V: Into<Value>,
        F: Fn(&Row) -> V + Send + Sync + 'static,
    {
        Ok(self.column_op(ColumnOp::add_column(name, compute)?))
    }

    /// Drop `name` from every row that has it.
    pub fn remove_column(&self, name: &str) -> Result<Self> {
        Ok(self.column_op(ColumnOp::remove_column(name)?))
    }

    /// Rename `old` to `new`, keeping its position. A field already named `new`
    /// is overwritten. Rows without `old` pass through unchanged.
    pub fn rename_column(&self, old: &str, new: &str) -> Result<Self> {
        Ok(self.column_op(ColumnOp::rename_column(old, new)?))
    }
}

impl ParallelPipeline<Row> {
    fn column_op(&self, op: ColumnOp) -> Self {
        let apply = op.apply;
        self.fan_out(
            StageInfo::with_detail(StageKind::ParallelMap, op.detail),
            move |row: Row| Ok(Some(apply(row))),
        )
    }

    /// Sequential deduplication over the gathered set. Which duplicate survives
    /// follows the (unspecified) order produced by earlier parallel stages.
    pub fn remove_duplicates(&self, key_field: &str) -> Result<Self> {
        Ok(self.rewrap(self.inner.remove_duplicates(key_field)?))
    }

    pub fn fill_missing(&self, field: &str, default: impl Into<Value>) -> Result<Self> {
        Ok(self.column_op(ColumnOp::fill_missing(field, default.into())?))
    }

    pub fn add_column<V, F>(&self, name: &str, compute: F) -> Result<Self>
    where
        V: Into<Value>,
        F: Fn(&Row) -> V + Send + Sync + 'static,
    {
        Ok(self.column_op(ColumnOp::add_column(name, compute)?))
    }

    pub fn remove_column(&self, name: &str) -> Result<Self> {
        Ok(self.column_op(ColumnOp::remove_column(name)?))
    }

    pub fn rename_column(&self, old: &str, new: &str) -> Result<Self> {
        Ok(self.column_op(ColumnOp::rename_column(old, new)?))
    }
}
