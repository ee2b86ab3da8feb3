//! Aggregate functions and running aggregators
//!
//! Each aggregating select field gets one [`Aggregator`] per group. The
//! lifecycle is `initialize` (seeded from the group's first element) →
//! `take` for every element in iteration order → `result` once.
//! `Null` inputs are skipped by every aggregator.

use crate::expr::{Expr, lit};
use crate::value::Value;
use crate::{Error, Result};
use std::fmt;

/// Supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// Number of non-null values
    Count,
    /// Sum of numeric values
    Sum,
    /// Average of numeric values (always a float)
    Avg,
    /// Smallest value
    Min,
    /// Largest value
    Max,
    /// All non-null values, in order, as a list
    Collect,
}

impl AggregateFunction {
    /// Create an aggregator seeded from the group's first element
    ///
    /// `sample` is `None` when the group is empty, which only happens for
    /// an implicit whole-table group over no rows.
    pub fn initialize(self, sample: Option<&Value>) -> Box<dyn Aggregator> {
        match self {
            AggregateFunction::Count => Box::new(CountAggregator { count: 0 }),
            AggregateFunction::Sum => Box::new(SumAggregator {
                sum: match sample {
                    Some(Value::Int(_)) => Value::Int(0),
                    Some(Value::Float(_)) => Value::Float(0.0),
                    _ => Value::Null,
                },
            }),
            AggregateFunction::Avg => Box::new(AvgAggregator { sum: 0.0, count: 0 }),
            AggregateFunction::Min => Box::new(ExtremumAggregator {
                best: Value::Null,
                keep: std::cmp::Ordering::Less,
            }),
            AggregateFunction::Max => Box::new(ExtremumAggregator {
                best: Value::Null,
                keep: std::cmp::Ordering::Greater,
            }),
            AggregateFunction::Collect => Box::new(CollectAggregator { items: Vec::new() }),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Collect => "collect",
        })
    }
}

/// Running aggregate state for one group
pub trait Aggregator {
    /// Feed one element's value
    fn take(&mut self, value: &Value) -> Result<()>;

    /// Final aggregate value
    fn result(&self) -> Value;
}

fn aggregate(func: AggregateFunction, arg: impl Into<Expr>) -> Expr {
    Expr::Aggregate {
        func,
        arg: Box::new(arg.into()),
    }
}

/// `count(expr)`: number of non-null values
pub fn count(arg: impl Into<Expr>) -> Expr {
    aggregate(AggregateFunction::Count, arg)
}

/// `count(*)`: number of rows
pub fn count_rows() -> Expr {
    aggregate(AggregateFunction::Count, lit(true))
}

/// `sum(expr)`
pub fn sum(arg: impl Into<Expr>) -> Expr {
    aggregate(AggregateFunction::Sum, arg)
}

/// `avg(expr)`
pub fn avg(arg: impl Into<Expr>) -> Expr {
    aggregate(AggregateFunction::Avg, arg)
}

/// `min(expr)`
pub fn min(arg: impl Into<Expr>) -> Expr {
    aggregate(AggregateFunction::Min, arg)
}

/// `max(expr)`
pub fn max(arg: impl Into<Expr>) -> Expr {
    aggregate(AggregateFunction::Max, arg)
}

/// `collect(expr)`
pub fn collect(arg: impl Into<Expr>) -> Expr {
    aggregate(AggregateFunction::Collect, arg)
}

struct CountAggregator {
    count: i64,
}

impl Aggregator for CountAggregator {
    fn take(&mut self, value: &Value) -> Result<()> {
        if !value.is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn result(&self) -> Value {
        Value::Int(self.count)
    }
}

/// Integer sums stay integers (checked); any float input widens the sum.
struct SumAggregator {
    sum: Value,
}

impl Aggregator for SumAggregator {
    fn take(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            Value::Int(_) | Value::Float(_) => {
                self.sum = match &self.sum {
                    Value::Null => value.clone(),
                    sum => sum.try_add(value)?,
                };
                Ok(())
            }
            other => Err(Error::type_mismatch("number", other.type_name())),
        }
    }

    fn result(&self) -> Value {
        self.sum.clone()
    }
}

struct AvgAggregator {
    sum: f64,
    count: i64,
}

impl Aggregator for AvgAggregator {
    fn take(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            other => {
                let number = other
                    .as_f64()
                    .ok_or_else(|| Error::type_mismatch("number", other.type_name()))?;
                self.sum += number;
                self.count += 1;
                Ok(())
            }
        }
    }

    fn result(&self) -> Value {
        if self.count == 0 {
            Value::Null
        } else {
            Value::Float(self.sum / self.count as f64)
        }
    }
}

/// Shared by min and max; `keep` is the ordering that replaces the best.
struct ExtremumAggregator {
    best: Value,
    keep: std::cmp::Ordering,
}

impl Aggregator for ExtremumAggregator {
    fn take(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if self.best.is_null() || value.total_cmp(&self.best) == self.keep {
            self.best = value.clone();
        }
        Ok(())
    }

    fn result(&self) -> Value {
        self.best.clone()
    }
}

struct CollectAggregator {
    items: Vec<Value>,
}

impl Aggregator for CollectAggregator {
    fn take(&mut self, value: &Value) -> Result<()> {
        if !value.is_null() {
            self.items.push(value.clone());
        }
        Ok(())
    }

    fn result(&self) -> Value {
        Value::List(self.items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(func: AggregateFunction, values: &[Value]) -> Result<Value> {
        let mut aggregator = func.initialize(values.first());
        for value in values {
            aggregator.take(value)?;
        }
        Ok(aggregator.result())
    }

    #[test]
    fn sum_keeps_integer_kind() {
        let values = [Value::Int(10), Value::Null, Value::Int(5)];
        assert_eq!(run(AggregateFunction::Sum, &values).unwrap(), Value::Int(15));
    }

    #[test]
    fn sum_widens_on_float_input() {
        let values = [Value::Int(1), Value::Float(0.5)];
        assert_eq!(run(AggregateFunction::Sum, &values).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn sum_rejects_non_numbers() {
        let values = [Value::Int(1), Value::from("x")];
        assert!(matches!(
            run(AggregateFunction::Sum, &values),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn empty_inputs_have_neutral_results() {
        assert_eq!(run(AggregateFunction::Count, &[]).unwrap(), Value::Int(0));
        assert_eq!(run(AggregateFunction::Sum, &[]).unwrap(), Value::Null);
        assert_eq!(run(AggregateFunction::Avg, &[]).unwrap(), Value::Null);
        assert_eq!(run(AggregateFunction::Max, &[]).unwrap(), Value::Null);
        assert_eq!(run(AggregateFunction::Collect, &[]).unwrap(), Value::List(vec![]));
    }

    #[test]
    fn min_max_avg_count_collect() {
        let values = [Value::Int(4), Value::Null, Value::Int(1), Value::Int(7)];
        assert_eq!(run(AggregateFunction::Min, &values).unwrap(), Value::Int(1));
        assert_eq!(run(AggregateFunction::Max, &values).unwrap(), Value::Int(7));
        assert_eq!(run(AggregateFunction::Avg, &values).unwrap(), Value::Float(4.0));
        assert_eq!(run(AggregateFunction::Count, &values).unwrap(), Value::Int(3));
        assert_eq!(
            run(AggregateFunction::Collect, &values).unwrap(),
            Value::List(vec![Value::Int(4), Value::Int(1), Value::Int(7)])
        );
    }
}
