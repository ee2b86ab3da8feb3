//! Query execution
//!
//! A [`QueryPlan`] fixes one [`Strategy`] up front; the executor dispatches
//! on it and streams [`Output`] items to the caller's consumer:
//!
//! - `SimpleScan`: one pass over the `from` table, formatting each
//!   matching row as it is read
//! - `Materialize`: collect bound rows (nested-loop join when there is a
//!   join), stable-sort them, then format
//! - `Aggregate`: one aggregated row over every materialized row
//! - `Group`: sort by the grouping key and emit each run of equal keys
//! - `GroupAggregate`: one aggregated row per run
//!
//! Source tables are never reordered; sorting works on a private copy.

pub mod planner;

pub use planner::{Binding, QueryPlan, QueryPlanner, SelectField};

use crate::expr::Expr;
use crate::record::Record;
use crate::value::Value;
use crate::{Error, Result};
use std::fmt;
use std::ops::Range;

/// Execution strategy, chosen from the clauses a query uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// No join, ordering, grouping or aggregation
    SimpleScan,
    /// Join and/or ordering without grouping or aggregation
    Materialize,
    /// Aggregation over the whole filtered set
    Aggregate,
    /// Grouping without aggregation
    Group,
    /// Grouping with aggregation
    GroupAggregate,
}

impl Strategy {
    /// Pick the strategy for a combination of clauses
    pub fn choose(has_join: bool, has_order: bool, has_group: bool, aggregating: bool) -> Self {
        match (has_group, aggregating) {
            (false, false) if !has_join && !has_order => Strategy::SimpleScan,
            (false, false) => Strategy::Materialize,
            (false, true) => Strategy::Aggregate,
            (true, false) => Strategy::Group,
            (true, true) => Strategy::GroupAggregate,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::SimpleScan => "SimpleScan",
            Strategy::Materialize => "Materialize",
            Strategy::Aggregate => "Aggregate",
            Strategy::Group => "Group",
            Strategy::GroupAggregate => "GroupAggregate",
        })
    }
}

/// One item handed to a query consumer
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// A formatted or aggregated row
    Row(Record),
    /// A group of formatted rows sharing one grouping key
    Group(Vec<Record>),
}

impl Output {
    /// The row, for row output
    pub fn as_row(&self) -> Option<&Record> {
        match self {
            Output::Row(record) => Some(record),
            Output::Group(_) => None,
        }
    }

    /// The group, for grouped output
    pub fn as_group(&self) -> Option<&[Record]> {
        match self {
            Output::Row(_) => None,
            Output::Group(records) => Some(records),
        }
    }

    /// Take the row, for row output
    pub fn into_row(self) -> Option<Record> {
        match self {
            Output::Row(record) => Some(record),
            Output::Group(_) => None,
        }
    }

    /// Take the group, for grouped output
    pub fn into_group(self) -> Option<Vec<Record>> {
        match self {
            Output::Row(_) => None,
            Output::Group(records) => Some(records),
        }
    }
}

/// Runs a [`QueryPlan`]
pub struct Executor<'p, 'a> {
    plan: &'p QueryPlan<'a>,
}

impl<'p, 'a> Executor<'p, 'a> {
    /// Create an executor for `plan`
    pub fn new(plan: &'p QueryPlan<'a>) -> Self {
        Self { plan }
    }

    /// Execute the plan, handing every emitted item to `consumer`
    pub fn run<F>(&self, mut consumer: F) -> Result<()>
    where
        F: FnMut(Output),
    {
        tracing::debug!(strategy = %self.plan.strategy, "executing query");
        match self.plan.strategy {
            Strategy::SimpleScan => self.simple_scan(&mut consumer),
            Strategy::Materialize => {
                for row in self.materialize()? {
                    let formatted = self.plan.format.format(&row)?;
                    self.emit_row(formatted, &mut consumer)?;
                }
                Ok(())
            }
            Strategy::Aggregate => {
                let rows = self.materialize()?;
                let aggregated = self.aggregate(&rows)?;
                self.emit_row(aggregated, &mut consumer)
            }
            Strategy::Group => {
                for group in self.groups()? {
                    let formatted = group
                        .iter()
                        .map(|row| self.plan.format.format(row))
                        .collect::<Result<Vec<_>>>()?;
                    let shape = self.plan.shape.record();
                    if let Some(bad) = formatted.iter().find(|row| !shape.conforms(row)) {
                        return Err(shape.mismatch(bad));
                    }
                    consumer(Output::Group(formatted));
                }
                Ok(())
            }
            Strategy::GroupAggregate => {
                for group in self.groups()? {
                    let aggregated = self.aggregate(&group)?;
                    self.emit_row(aggregated, &mut consumer)?;
                }
                Ok(())
            }
        }
    }

    fn simple_scan<F>(&self, consumer: &mut F) -> Result<()>
    where
        F: FnMut(Output),
    {
        for row in self.plan.from.table {
            let bound = self.bind(row, None)?;
            if holds(self.plan.condition.as_ref(), &bound)? {
                let formatted = self.plan.format.format(&bound)?;
                self.emit_row(formatted, consumer)?;
            }
        }
        Ok(())
    }

    fn bind(&self, left: &Record, right: Option<&Record>) -> Result<Record> {
        let mut bound = Record::with_capacity(2);
        bound.push(self.plan.from.alias.clone(), left.clone())?;
        if let (Some(join), Some(right)) = (&self.plan.join, right) {
            bound.push(join.alias.clone(), right.clone())?;
        }
        Ok(bound)
    }

    /// Bound rows passing `on` and `where`, sorted by `order_by` if present
    fn materialize(&self) -> Result<Vec<Record>> {
        let mut rows = Vec::new();
        match &self.plan.join {
            Some(join) => {
                for left in self.plan.from.table {
                    for right in join.table {
                        let bound = self.bind(left, Some(right))?;
                        if holds(self.plan.on.as_ref(), &bound)?
                            && holds(self.plan.condition.as_ref(), &bound)?
                        {
                            rows.push(bound);
                        }
                    }
                }
            }
            None => {
                for row in self.plan.from.table {
                    let bound = self.bind(row, None)?;
                    if holds(self.plan.condition.as_ref(), &bound)? {
                        rows.push(bound);
                    }
                }
            }
        }
        tracing::trace!(rows = rows.len(), "materialized bound rows");

        match &self.plan.order_by {
            Some(key) => sort_by_key(rows, key),
            None => Ok(rows),
        }
    }

    fn groups(&self) -> Result<Vec<Vec<Record>>> {
        let rows = self.materialize()?;
        let criteria = match &self.plan.group_by {
            Some(criteria) => criteria,
            None => return Err(Error::executor("grouping strategy without group_by")),
        };
        let groups = group_runs(rows, criteria)?;
        tracing::trace!(groups = groups.len(), "partitioned rows into groups");
        Ok(groups)
    }

    fn aggregate(&self, group: &[Record]) -> Result<Record> {
        let first = group.first();
        let mut out = Record::with_capacity(self.plan.fields.len());
        for field in &self.plan.fields {
            match field {
                SelectField::Aggregate { name, func, arg } => {
                    let seed = first.map(|row| arg.evaluate(row)).transpose()?;
                    let mut aggregator = func.initialize(seed.as_ref());
                    for row in group {
                        aggregator.take(&arg.evaluate(row)?)?;
                    }
                    out.push(name.clone(), aggregator.result())?;
                }
                SelectField::Plain { name, expr } => {
                    let value = match first {
                        Some(row) => expr.evaluate(row)?,
                        None => Value::Null,
                    };
                    out.push(name.clone(), value)?;
                }
            }
        }
        Ok(out)
    }

    fn emit_row<F>(&self, row: Record, consumer: &mut F) -> Result<()>
    where
        F: FnMut(Output),
    {
        let shape = self.plan.shape.record();
        if !shape.conforms(&row) {
            return Err(shape.mismatch(&row));
        }
        consumer(Output::Row(row));
        Ok(())
    }
}

fn holds(condition: Option<&Expr>, row: &Record) -> Result<bool> {
    match condition {
        Some(condition) => condition.evaluate(row)?.condition_holds(),
        None => Ok(true),
    }
}

fn keyed(rows: Vec<Record>, key: &Expr) -> Result<Vec<(Value, Record)>> {
    rows.into_iter()
        .map(|row| Ok((key.evaluate(&row)?, row)))
        .collect()
}

/// Stable ascending sort of `rows` by `key`, evaluating the key once per row
pub fn sort_by_key(rows: Vec<Record>, key: &Expr) -> Result<Vec<Record>> {
    let mut keyed = keyed(rows, key)?;
    keyed.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

/// Maximal runs of equal adjacent keys
///
/// Each run starts where the previous one ended and extends while the key
/// equals the run's first key.
pub fn partition_runs(keys: &[Value]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = 0;
    while start < keys.len() {
        let mut end = start + 1;
        while end < keys.len() && keys[start].total_cmp(&keys[end]).is_eq() {
            end += 1;
        }
        runs.push(start..end);
        start = end;
    }
    runs
}

/// Stable-sort `rows` by `criteria` and split them into groups of equal keys
pub fn group_runs(rows: Vec<Record>, criteria: &Expr) -> Result<Vec<Vec<Record>>> {
    let mut keyed = keyed(rows, criteria)?;
    keyed.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    let (keys, rows): (Vec<Value>, Vec<Record>) = keyed.into_iter().unzip();

    let mut rows = rows.into_iter();
    Ok(partition_runs(&keys)
        .into_iter()
        .map(|run| rows.by_ref().take(run.len()).collect())
        .collect())
}
