//! Named aggregations for [`group_by`](crate::Pipeline::group_by).
//!
//! An [`Aggregation`] pairs an output field name with an [`Aggregator`], a
//! reduction over the member rows of one group. Built-ins cover the usual
//! reductions; any `Fn(&[Row]) -> Result<Value>` closure is an aggregator too.
//!
//! Numeric aggregators (`sum`, `avg`) skip rows where the field is missing or
//! null. Integers, floats and numeric strings are accepted; anything else fails
//! with a [`ConversionError`].
//!
//! ```
//! use rowbeam::{row, Aggregation, Value};
//!
//! let rows = vec![row! { "n" => 2 }, row! { "n" => 5 }, row! { "n" => Value::Null }];
//! assert_eq!(Aggregation::sum("total", "n").aggregate(&rows).unwrap(), Value::Int(7));
//! assert_eq!(Aggregation::count("rows").aggregate(&rows).unwrap(), Value::Int(3));
//! ```

use crate::error::{ConversionError, Result};
use crate::row::Row;
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Reduction over the rows of a single group.
pub trait Aggregator: Send + Sync {
    fn aggregate(&self, rows: &[Row]) -> Result<Value>;

    /// Short description shown by `Debug`.
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

impl<F> Aggregator for F
where
    F: Fn(&[Row]) -> Result<Value> + Send + Sync,
{
    fn aggregate(&self, rows: &[Row]) -> Result<Value> {
        self(rows)
    }
}

/// Output field name plus the aggregator that fills it.
#[derive(Clone)]
pub struct Aggregation {
    name: String,
    aggregator: Arc<dyn Aggregator>,
}

impl fmt::Debug for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.aggregator.describe())
    }
}

impl Aggregation {
    pub fn new(name: impl Into<String>, aggregator: impl Aggregator + 'static) -> Self {
        Self {
            name: name.into(),
            aggregator: Arc::new(aggregator),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aggregate(&self, rows: &[Row]) -> Result<Value> {
        self.aggregator.aggregate(rows)
    }

    /// Number of rows in the group.
    pub fn count(name: impl Into<String>) -> Self {
        Self::new(name, Count)
    }

    /// Sum of `field`; `Int` when every value is integral, `Float` otherwise.
    pub fn sum(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, Sum(field.into()))
    }

    /// Arithmetic mean of `field` as `Float`; `Null` for a group with no values.
    pub fn avg(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, Avg(field.into()))
    }

    pub fn min(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, Extreme { field: field.into(), keep: Ordering::Less })
    }

    pub fn max(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, Extreme { field: field.into(), keep: Ordering::Greater })
    }

    /// `field` of the first member row (`Null` if absent).
    pub fn first(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, Pick { field: field.into(), last: false })
    }

    /// `field` of the last member row (`Null` if absent).
    pub fn last(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, Pick { field: field.into(), last: true })
    }

    /// Number of distinct non-null values of `field`.
    pub fn count_distinct(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, CountDistinct(field.into()))
    }

    /// Non-null values of `field` as a `List`, in member order.
    pub fn collect(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, Collect(field.into()))
    }
}

/* ===================== numeric helpers ===================== */

#[derive(Clone, Copy, Debug, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

/// Numeric reading of `field` in `row`; `None` for missing or null.
fn number(row: &Row, field: &str) -> Result<Option<Number>> {
    let value = match row.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let n = match value {
        Value::Int(i) | Value::Timestamp(i) => Some(Number::Int(*i)),
        Value::Float(f) => Some(Number::Float(*f)),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(i) => Some(Number::Int(i)),
            Err(_) => value.as_f64().map(Number::Float),
        },
        _ => None,
    };
    n.map(Some).ok_or_else(|| {
        ConversionError {
            field: field.to_string(),
            source_type: value.type_name(),
            target_type: "number",
        }
        .into()
    })
}

fn present<'a>(rows: &'a [Row], field: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
    rows.iter()
        .filter_map(move |r| r.get(field))
        .filter(|v| !v.is_null())
}

/// Numbers compare numerically across `Int`/`Float`; everything else by `Ord`.
/// Two ints compare exactly, without going through `f64`.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (x, y) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            x.total_cmp(&y)
        }
        _ => a.cmp(b),
    }
}

/* ===================== built-ins ===================== */

struct Count;

impl Aggregator for Count {
    fn aggregate(&self, rows: &[Row]) -> Result<Value> {
        Ok(Value::Int(rows.len() as i64))
    }

    fn describe(&self) -> String {
        "count()".to_string()
    }
}

struct Sum(String);

impl Aggregator for Sum {
    fn aggregate(&self, rows: &[Row]) -> Result<Value> {
        let mut int_total: Option<i64> = Some(0);
        let mut float_total = 0.0;
        for row in rows {
            let Some(n) = number(row, &self.0)? else {
                continue;
            };
            float_total += n.as_f64();
            int_total = match (int_total, n) {
                (Some(acc), Number::Int(i)) => acc.checked_add(i),
                _ => None,
            };
        }
        Ok(match int_total {
            Some(i) => Value::Int(i),
            None => Value::Float(float_total),
        })
    }

    fn describe(&self) -> String {
        format!("sum({})", self.0)
    }
}

struct Avg(String);

impl Aggregator for Avg {
    fn aggregate(&self, rows: &[Row]) -> Result<Value> {
        let mut total = 0.0;
        let mut n = 0usize;
        for row in rows {
            if let Some(v) = number(row, &self.0)? {
                total += v.as_f64();
                n += 1;
            }
        }
        Ok(if n == 0 {
            Value::Null
        } else {
            Value::Float(total / n as f64)
        })
    }

    fn describe(&self) -> String {
        format!("avg({})", self.0)
    }
}

struct Extreme {
    field: String,
    keep: Ordering,
}

impl Aggregator for Extreme {
    fn aggregate(&self, rows: &[Row]) -> Result<Value> {
        let mut best: Option<&Value> = None;
        for v in present(rows, &self.field) {
            match best {
                Some(cur) if compare(v, cur) != self.keep => {}
                _ => best = Some(v),
            }
        }
        Ok(best.cloned().unwrap_or_default())
    }

    fn describe(&self) -> String {
        let op = if self.keep == Ordering::Less { "min" } else { "max" };
        format!("{op}({})", self.field)
    }
}

struct Pick {
    field: String,
    last: bool,
}

impl Aggregator for Pick {
    fn aggregate(&self, rows: &[Row]) -> Result<Value> {
        let row = if self.last { rows.last() } else { rows.first() };
        Ok(row.and_then(|r| r.get(&self.field)).cloned().unwrap_or_default())
    }

    fn describe(&self) -> String {
        let op = if self.last { "last" } else { "first" };
        format!("{op}({})", self.field)
    }
}

struct CountDistinct(String);

impl Aggregator for CountDistinct {
    fn aggregate(&self, rows: &[Row]) -> Result<Value> {
        let seen: HashSet<&Value> = present(rows, &self.0).collect();
        Ok(Value::Int(seen.len() as i64))
    }

    fn describe(&self) -> String {
        format!("count_distinct({})", self.0)
    }
}

struct Collect(String);

impl Aggregator for Collect {
    fn aggregate(&self, rows: &[Row]) -> Result<Value> {
        Ok(Value::List(present(rows, &self.0).cloned().collect()))
    }

    fn describe(&self) -> String {
        format!("collect({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::row;

    fn scores() -> Vec<Row> {
        vec![
            row! { "score" => 3 },
            row! { "score" => 2.5 },
            row! { "other" => 1 },
            row! { "score" => "4" },
        ]
    }

    #[test]
    fn sum_widens_to_float_when_needed() {
        assert_eq!(
            Aggregation::sum("s", "score").aggregate(&scores()).unwrap(),
            Value::Float(9.5)
        );
        let ints = vec![row! { "x" => 1 }, row! { "x" => "2" }];
        assert_eq!(Aggregation::sum("s", "x").aggregate(&ints).unwrap(), Value::Int(3));
        assert_eq!(Aggregation::sum("s", "x").aggregate(&[]).unwrap(), Value::Int(0));
    }

    #[test]
    fn avg_skips_missing_and_rejects_text() {
        let avg = Aggregation::avg("a", "score").aggregate(&scores()).unwrap();
        assert_eq!(avg, Value::Float(9.5 / 3.0));
        let bad = vec![row! { "score" => "n/a" }];
        assert!(matches!(
            Aggregation::avg("a", "score").aggregate(&bad),
            Err(EtlError::Conversion(_))
        ));
        assert_eq!(Aggregation::avg("a", "zzz").aggregate(&scores()).unwrap(), Value::Null);
    }

    #[test]
    fn min_max_compare_ints_and_floats_numerically() {
        let rows = vec![row! { "v" => 3 }, row! { "v" => 2.5 }, row! { "v" => 10 }];
        assert_eq!(Aggregation::min("m", "v").aggregate(&rows).unwrap(), Value::Float(2.5));
        assert_eq!(Aggregation::max("m", "v").aggregate(&rows).unwrap(), Value::Int(10));
    }

    #[test]
    fn min_max_keep_large_ints_exact() {
        let big = 1_i64 << 53;
        let rows = vec![row! { "v" => big }, row! { "v" => big + 1 }];
        assert_eq!(Aggregation::max("m", "v").aggregate(&rows).unwrap(), Value::Int(big + 1));
        let reversed: Vec<Row> = rows.into_iter().rev().collect();
        assert_eq!(Aggregation::min("m", "v").aggregate(&reversed).unwrap(), Value::Int(big));
    }

    #[test]
    fn closures_are_aggregators() {
        let longest = Aggregation::new("longest", |rows: &[Row]| -> Result<Value> {
            Ok(rows
                .iter()
                .filter_map(|r| r.try_get_typed::<String>("name"))
                .max_by_key(|s| s.len())
                .into())
        });
        let rows = vec![row! { "name" => "Al" }, row! { "name" => "Beatrice" }];
        assert_eq!(longest.aggregate(&rows).unwrap(), Value::from("Beatrice"));
        assert_eq!(format!("{longest:?}"), "longest = custom");
    }
}
