//! Request validation and strategy selection

use super::Strategy;
use crate::aggregate::AggregateFunction;
use crate::expr::Expr;
use crate::query::{Request, Source};
use crate::record::Record;
use crate::shape::{OutputShape, RecordFormat, RecordShape};
use crate::symbol::{FROM_ALIAS, JOIN_ALIAS, Symbol};
use crate::table::Table;
use crate::value::Value;
use crate::{Error, Result};
use std::fmt;

/// A table bound under an alias
#[derive(Debug, Clone)]
pub struct Binding<'a> {
    /// Alias the rows are bound under
    pub alias: Symbol,
    /// Bound table
    pub table: &'a Table,
}

impl Binding<'_> {
    fn columns(&self) -> String {
        let names: Vec<&str> = self.table.columns().iter().map(Symbol::as_str).collect();
        names.join(", ")
    }
}

/// One output field of an aggregating query
#[derive(Debug, Clone, PartialEq)]
pub enum SelectField {
    /// Aggregated over the group
    Aggregate {
        /// Output name
        name: Symbol,
        /// Aggregate function
        func: AggregateFunction,
        /// Expression fed to the aggregator
        arg: Expr,
    },
    /// Evaluated on the group's first row
    Plain {
        /// Output name
        name: Symbol,
        /// Expression
        expr: Expr,
    },
}

/// Validated query with its execution strategy fixed
#[derive(Debug, Clone)]
pub struct QueryPlan<'a> {
    pub(crate) strategy: Strategy,
    pub(crate) from: Binding<'a>,
    pub(crate) join: Option<Binding<'a>>,
    pub(crate) on: Option<Expr>,
    pub(crate) condition: Option<Expr>,
    pub(crate) order_by: Option<Expr>,
    pub(crate) group_by: Option<Expr>,
    pub(crate) format: RecordFormat,
    pub(crate) fields: Vec<SelectField>,
    pub(crate) shape: OutputShape,
}

impl QueryPlan<'_> {
    /// Selected execution strategy
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Static shape of every emitted item
    pub fn shape(&self) -> &OutputShape {
        &self.shape
    }

    /// Row formatting rule
    pub fn format(&self) -> &RecordFormat {
        &self.format
    }

    /// Alias of the `from` table
    pub fn from_alias(&self) -> &Symbol {
        &self.from.alias
    }

    /// Alias of the joined table
    pub fn join_alias(&self) -> Option<&Symbol> {
        self.join.as_ref().map(|join| &join.alias)
    }

    /// True when the select clause holds at least one aggregator
    pub fn is_aggregating(&self) -> bool {
        self.fields
            .iter()
            .any(|field| matches!(field, SelectField::Aggregate { .. }))
    }
}

impl fmt::Display for QueryPlan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.strategy)?;
        writeln!(f, "  from {} [{}]", self.from.alias, self.from.columns())?;
        if let Some(join) = &self.join {
            write!(f, "  inner join {} [{}]", join.alias, join.columns())?;
            if let Some(on) = &self.on {
                write!(f, " on {}", on)?;
            }
            writeln!(f)?;
        }
        if let Some(condition) = &self.condition {
            writeln!(f, "  where {}", condition)?;
        }
        if let Some(key) = &self.order_by {
            writeln!(f, "  order by {}", key)?;
        }
        if let Some(criteria) = &self.group_by {
            writeln!(f, "  group by {}", criteria)?;
        }
        if self.is_aggregating() {
            f.write_str("  aggregate(")?;
            for (idx, field) in self.fields.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                match field {
                    SelectField::Aggregate { name, func, arg } => {
                        write!(f, "{} = {}({})", name, func, arg)?
                    }
                    SelectField::Plain { name, expr } => write!(f, "{} = first({})", name, expr)?,
                }
            }
            writeln!(f, ")")?;
        } else {
            writeln!(f, "  format {}", self.format)?;
        }
        write!(f, "  output {}", self.shape)
    }
}

/// Turns a [`Request`] into a [`QueryPlan`]
///
/// Every expression is evaluated once against a representative bound row
/// (all columns `Null`), so unknown or ambiguous fields, misplaced
/// aggregators and non-boolean literal conditions are rejected before any
/// real row is read.
pub struct QueryPlanner<'r, 'a> {
    request: &'r Request<'a>,
}

impl<'r, 'a> QueryPlanner<'r, 'a> {
    /// Create a planner for `request`
    pub fn new(request: &'r Request<'a>) -> Self {
        Self { request }
    }

    /// Validate the request and choose its strategy
    pub fn plan_query(&self) -> Result<QueryPlan<'a>> {
        let request = self.request;
        let from_source = request.from.as_ref().ok_or(Error::MissingSource)?;
        let from = bind(from_source, FROM_ALIAS);
        let join = request
            .inner_join
            .as_ref()
            .map(|source| bind(source, JOIN_ALIAS));
        if let Some(join) = &join {
            if join.alias == from.alias {
                return Err(Error::DuplicateAlias(join.alias.to_string()));
            }
        }
        // An alias named like a column would shadow that column in every clause.
        let bindings: Vec<&Binding<'a>> = std::iter::once(&from).chain(join.as_ref()).collect();
        for binding in &bindings {
            if bindings
                .iter()
                .any(|other| other.table.columns().contains(&binding.alias))
            {
                return Err(Error::DuplicateAlias(binding.alias.to_string()));
            }
        }

        let mut sample = Record::with_capacity(2);
        sample.push(from.alias.clone(), from.table.sample_row())?;
        if let Some(join) = &join {
            sample.push(join.alias.clone(), join.table.sample_row())?;
        }

        let on = request
            .inner_join
            .as_ref()
            .and_then(|source| source.condition().cloned());
        if let Some(on) = &on {
            check_condition(on, "on", &sample)?;
        }
        if let Some(condition) = &request.condition {
            check_condition(condition, "where", &sample)?;
        }
        if let Some(criteria) = &request.group_by {
            check_scalar(criteria, "group_by", &sample)?;
        }
        if let Some(key) = &request.order_by {
            check_scalar(key, "order_by", &sample)?;
        }

        let fields = request
            .select
            .iter()
            .map(|(name, expr)| select_field(name, expr, &sample))
            .collect::<Result<Vec<_>>>()?;
        let aggregating = fields
            .iter()
            .any(|field| matches!(field, SelectField::Aggregate { .. }));

        let format = RecordFormat::choose(
            &request.select,
            &from.alias,
            from_source.alias_name().is_some(),
            join.is_some(),
        );

        let shape = if aggregating {
            // Plain fields are Null for an empty whole-table group.
            let mut row = Record::with_capacity(fields.len());
            for field in &fields {
                let name = match field {
                    SelectField::Aggregate { name, .. } | SelectField::Plain { name, .. } => name,
                };
                row.push(name.clone(), Value::Null)?;
            }
            OutputShape::Row(RecordShape::of(&row))
        } else {
            let row = RecordShape::of(&format.format(&sample)?);
            if request.group_by.is_some() {
                OutputShape::Group(row)
            } else {
                OutputShape::Row(row)
            }
        };

        let strategy = Strategy::choose(
            join.is_some(),
            request.order_by.is_some(),
            request.group_by.is_some(),
            aggregating,
        );
        tracing::debug!(%strategy, %shape, "planned query");

        Ok(QueryPlan {
            strategy,
            from,
            join,
            on,
            condition: request.condition.clone(),
            order_by: request.order_by.clone(),
            group_by: request.group_by.clone(),
            format,
            fields,
            shape,
        })
    }
}

/// Plan `request`
pub fn plan<'a>(request: &Request<'a>) -> Result<QueryPlan<'a>> {
    QueryPlanner::new(request).plan_query()
}

fn bind<'a>(source: &Source<'a>, default_alias: Symbol) -> Binding<'a> {
    Binding {
        alias: source.alias_name().cloned().unwrap_or(default_alias),
        table: source.table(),
    }
}

fn check_scalar(expr: &Expr, clause: &str, sample: &Record) -> Result<Value> {
    if expr.contains_aggregate() {
        return Err(Error::InvalidAggregate(format!(
            "aggregators are not allowed in {}: {}",
            clause, expr
        )));
    }
    expr.evaluate(sample)
}

fn check_condition(expr: &Expr, clause: &str, sample: &Record) -> Result<()> {
    check_scalar(expr, clause, sample)?.condition_holds()?;
    Ok(())
}

fn select_field(name: &Symbol, expr: &Expr, sample: &Record) -> Result<SelectField> {
    match expr.as_aggregate() {
        Some((func, arg)) => {
            if arg.contains_aggregate() {
                return Err(Error::InvalidAggregate(format!(
                    "nested aggregator in {}: {}",
                    name, expr
                )));
            }
            arg.evaluate(sample)?;
            Ok(SelectField::Aggregate {
                name: name.clone(),
                func,
                arg: arg.clone(),
            })
        }
        None => {
            check_scalar(expr, "select expressions", sample)?;
            Ok(SelectField::Plain {
                name: name.clone(),
                expr: expr.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::sum;
    use crate::expr::{col, field, lit};
    use crate::query::linq;
    use crate::record;

    fn table() -> Table {
        Table::new(["id", "v"], vec![record! { "id" => 1, "v" => 10 }]).unwrap()
    }

    #[test]
    fn strategy_follows_clause_presence() {
        let t = table();
        let scan = linq().from(&t).filter(col("v").gt(1)).plan().unwrap();
        assert_eq!(scan.strategy(), Strategy::SimpleScan);

        let ordered = linq().from(&t).order_by(col("v")).plan().unwrap();
        assert_eq!(ordered.strategy(), Strategy::Materialize);

        let joined = linq().from(&t).inner_join(&t).plan().unwrap();
        assert_eq!(joined.strategy(), Strategy::Materialize);

        let total = linq().from(&t).select([("s", sum(col("v")))]).plan().unwrap();
        assert_eq!(total.strategy(), Strategy::Aggregate);

        let grouped = linq().from(&t).group_by(col("id")).plan().unwrap();
        assert_eq!(grouped.strategy(), Strategy::Group);

        let both = linq()
            .from(&t)
            .group_by(col("id"))
            .select([("s", sum(col("v")))])
            .plan()
            .unwrap();
        assert_eq!(both.strategy(), Strategy::GroupAggregate);
    }

    #[test]
    fn default_aliases() {
        let t = table();
        let plan = linq().from(&t).inner_join(&t).plan().unwrap();
        assert_eq!(plan.from_alias().as_str(), "_1");
        assert_eq!(plan.join_alias().map(Symbol::as_str), Some("_2"));
        assert_eq!(
            plan.shape().to_string(),
            "row {_1: {id, v}, _2: {id, v}}"
        );
    }

    #[test]
    fn missing_source_and_alias_clash() {
        assert_eq!(linq().plan().unwrap_err(), Error::MissingSource);

        let t = table();
        let clash = linq().from(t.alias("a")).inner_join(t.alias("a")).plan();
        assert_eq!(clash.unwrap_err(), Error::DuplicateAlias("a".to_string()));
    }

    #[test]
    fn alias_may_not_shadow_a_column() {
        let t = table();
        let own = linq().from(t.alias("v")).select([("x", col("v"))]).plan();
        assert_eq!(own.unwrap_err(), Error::DuplicateAlias("v".to_string()));

        let other = linq().from(&t).inner_join(t.alias("id")).plan();
        assert_eq!(other.unwrap_err(), Error::DuplicateAlias("id".to_string()));
    }

    #[test]
    fn fields_are_checked_against_the_sample_row() {
        let t = table();
        let unknown = linq().from(&t).filter(col("nope").equals(1)).plan();
        assert_eq!(unknown.unwrap_err(), Error::UnknownField("nope".to_string()));

        let ambiguous = linq().from(&t).inner_join(&t).select([("id", col("id"))]).plan();
        assert_eq!(ambiguous.unwrap_err(), Error::AmbiguousField("id".to_string()));

        let qualified = linq()
            .from(&t)
            .inner_join(&t)
            .select([("id", field("_2", "id"))])
            .plan();
        assert!(qualified.is_ok());
    }

    #[test]
    fn aggregators_only_as_whole_select_fields() {
        let t = table();
        let in_where = linq().from(&t).filter(sum(col("v")).gt(1)).plan();
        assert!(matches!(in_where, Err(Error::InvalidAggregate(_))));

        let nested = linq().from(&t).select([("s", sum(col("v")) + 1)]).plan();
        assert!(matches!(nested, Err(Error::InvalidAggregate(_))));

        let inner = linq().from(&t).select([("s", sum(sum(col("v"))))]).plan();
        assert!(matches!(inner, Err(Error::InvalidAggregate(_))));
    }

    #[test]
    fn literal_conditions_must_be_boolean() {
        let t = table();
        let bad = linq().from(&t).filter(lit(3)).plan();
        assert!(matches!(bad, Err(Error::TypeMismatch { .. })));
        assert!(linq().from(&t).filter(lit(true)).plan().is_ok());
    }

    #[test]
    fn explain_lists_the_clauses() {
        let t = table();
        let text = linq()
            .from(&t)
            .filter(col("v").gt(1))
            .group_by(col("id"))
            .select([("id", col("id")), ("total", sum(col("v")))])
            .explain()
            .unwrap();
        assert_eq!(
            text,
            "GroupAggregate\n  from _1 [id, v]\n  where (v > 1)\n  group by id\n  aggregate(id = first(id), total = sum(v))\n  output row {id, total}"
        );
    }
}
