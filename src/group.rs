//! Grouped aggregation: `group_by(key_field, aggregations)`.
//!
//! Grouping is a barrier. Rows are bucketed by the raw [`Value`] of the key
//! field, so `"a"` and `"A"` are different groups while `Int(1)` and
//! `Float(1.0)` are different groups too. Rows without the key field fall into
//! the `Null` group. One output row is produced per group, in the order groups
//! were first encountered:
//!
//! ```text
//! { <key_field>: key, <aggregation 1>: ..., <aggregation 2>: ..., ... }
//! ```
//!
//! ```
//! use rowbeam::{row, Aggregation, Pipeline, Value};
//!
//! let sales = Pipeline::from_vec(vec![
//!     row! { "region" => "north", "amount" => 10 },
//!     row! { "region" => "south", "amount" => 7 },
//!     row! { "region" => "north", "amount" => 5 },
//! ]);
//! let totals = sales
//!     .group_by("region", [Aggregation::count("orders"), Aggregation::sum("total", "amount")])
//!     .unwrap()
//!     .to_list()
//!     .unwrap();
//! assert_eq!(totals.len(), 2);
//! assert_eq!(totals[0].get("total"), Some(&Value::Int(15)));
//! assert_eq!(totals[1].get("orders"), Some(&Value::Int(1)));
//! ```

use crate::aggregate::Aggregation;
use crate::error::{EtlError, Result};
use crate::extensions::require_name;
use crate::parallel::ParallelPipeline;
use crate::pipeline::Pipeline;
use crate::row::Row;
use crate::stage::{StageInfo, StageKind};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Validated key field plus aggregations.
struct GroupPlan {
    key_field: String,
    aggregations: Vec<Aggregation>,
}

impl GroupPlan {
    fn new(key_field: &str, aggregations: impl IntoIterator<Item = Aggregation>) -> Result<Self> {
        require_name("key_field", key_field)?;
        let aggregations: Vec<Aggregation> = aggregations.into_iter().collect();
        let mut names = HashSet::with_capacity(aggregations.len() + 1);
        names.insert(key_field.to_lowercase());
        for agg in &aggregations {
            require_name("aggregation", agg.name())?;
            if !names.insert(agg.name().to_lowercase()) {
                return Err(EtlError::argument(
                    "aggregations",
                    format!("output field '{}' is produced twice", agg.name()),
                ));
            }
        }
        Ok(Self {
            key_field: key_field.to_string(),
            aggregations,
        })
    }

    fn describe(&self) -> String {
        let aggs: Vec<&str> = self.aggregations.iter().map(Aggregation::name).collect();
        format!("by {} -> [{}]", self.key_field, aggs.join(", "))
    }

    fn output_row(&self, key: Value, members: &[Row]) -> Result<Row> {
        let mut out = Row::with_capacity(self.aggregations.len() + 1);
        out.set(self.key_field.as_str(), key);
        for agg in &self.aggregations {
            out.set(agg.name(), agg.aggregate(members)?);
        }
        Ok(out)
    }
}

/// Bucket rows by key value, keeping first-encounter order of the groups and
/// input order inside each group.
fn group_rows(key_field: &str, rows: Vec<Row>) -> Vec<(Value, Vec<Row>)> {
    let mut slots: HashMap<Value, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<Row>)> = Vec::new();
    for row in rows {
        let key = row.get(key_field).cloned().unwrap_or_default();
        match slots.get(&key) {
            Some(&i) => groups[i].1.push(row),
            None => {
                slots.insert(key.clone(), groups.len());
                groups.push((key, vec![row]));
            }
        }
    }
    groups
}

impl Pipeline<Row> {
    /// One aggregated row per distinct value of `key_field`.
    ///
    /// # Errors
    /// [`EtlError::Argument`] for an empty key field, an empty aggregation name,
    /// or two outputs (key included) with the same case-insensitive name.
    /// Aggregator failures surface at execution.
    pub fn group_by<A>(&self, key_field: &str, aggregations: A) -> Result<Self>
    where
        A: IntoIterator<Item = Aggregation>,
    {
        let plan = GroupPlan::new(key_field, aggregations)?;
        let info = StageInfo::with_detail(StageKind::GroupBy, plan.describe());
        Ok(self.barrier(info, move |rows: Vec<Row>| {
            group_rows(&plan.key_field, rows)
                .into_iter()
                .map(|(key, members)| plan.output_row(key, &members))
                .collect()
        }))
    }
}

impl ParallelPipeline<Row> {
    /// Like [`Pipeline::group_by`], with the aggregations of different groups
    /// evaluated concurrently. Output keeps group encounter order.
    pub fn group_by<A>(&self, key_field: &str, aggregations: A) -> Result<Self>
    where
        A: IntoIterator<Item = Aggregation>,
    {
        let plan = Arc::new(GroupPlan::new(key_field, aggregations)?);
        let info = StageInfo::with_detail(StageKind::ParallelGroupBy, plan.describe());
        let stage = info.kind.name();
        let workers = self.workers.clone();
        Ok(self.rewrap(self.inner.barrier(info, move |rows: Vec<Row>| {
            let groups: Vec<(usize, (Value, Vec<Row>))> =
                group_rows(&plan.key_field, rows).into_iter().enumerate().collect();
            let mut out = workers.run(stage, groups, |(slot, (key, members))| {
                Ok(Some((slot, plan.output_row(key, &members)?)))
            })?;
            out.sort_unstable_by_key(|(slot, _)| *slot);
            Ok(out.into_iter().map(|(_, row)| row).collect())
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn keys_are_compared_by_raw_value() {
        let rows = vec![
            row! { "k" => "a" },
            row! { "k" => "A" },
            row! { "k" => "a" },
            row! { "other" => 1 },
        ];
        let groups = group_rows("k", rows);
        let keys: Vec<Value> = groups.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![Value::from("a"), Value::from("A"), Value::Null]);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn duplicate_output_names_are_rejected() {
        let dup = GroupPlan::new("k", [Aggregation::count("n"), Aggregation::count("N")]);
        assert!(matches!(dup, Err(EtlError::Argument { name: "aggregations", .. })));
        let clash = GroupPlan::new("k", [Aggregation::count("K")]);
        assert!(clash.is_err());
        assert!(GroupPlan::new("", []).is_err());
    }
}
