//! Immutable fluent query builder
//!
//! Every clause call returns a new [`Query`] holding the previous request
//! plus the new clause; the receiver is never modified, so a partially
//! built query can be shared and extended in different directions.
//!
//! Construction errors (a repeated clause, a duplicate select name) are
//! recorded by the call that causes them and returned by every terminal
//! operation before any row is read.

use crate::Result;
use crate::error::Error;
use crate::executor::planner::{self, QueryPlan};
use crate::executor::{Executor, Output};
use crate::expr::Expr;
use crate::record::Record;
use crate::shape::OutputShape;
use crate::symbol::Symbol;
use crate::table::Table;

/// A table reference used by `from` and `inner_join`
///
/// Holds the table by reference: the table must outlive every query built
/// from it.
#[derive(Debug, Clone)]
pub struct Source<'a> {
    table: &'a Table,
    alias: Option<Symbol>,
    on: Option<Expr>,
}

impl<'a> Source<'a> {
    /// Reference `table` with no alias and no join condition
    pub fn new(table: &'a Table) -> Self {
        Self {
            table,
            alias: None,
            on: None,
        }
    }

    /// Bind the table's rows under `alias`
    ///
    /// The alias must differ from every column of the tables in the query;
    /// planning fails with [`Error::DuplicateAlias`](crate::Error::DuplicateAlias)
    /// otherwise.
    pub fn alias(mut self, alias: impl Into<Symbol>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Join condition (only meaningful for `inner_join`)
    pub fn on(mut self, condition: impl Into<Expr>) -> Self {
        self.on = Some(condition.into());
        self
    }

    /// Referenced table
    pub fn table(&self) -> &'a Table {
        self.table
    }

    /// Explicit alias, if one was given
    pub fn alias_name(&self) -> Option<&Symbol> {
        self.alias.as_ref()
    }

    /// Join condition, if one was given
    pub fn condition(&self) -> Option<&Expr> {
        self.on.as_ref()
    }
}

impl<'a> From<&'a Table> for Source<'a> {
    fn from(table: &'a Table) -> Self {
        Source::new(table)
    }
}

/// Accumulated clauses of a query
#[derive(Debug, Clone, Default)]
pub struct Request<'a> {
    /// `from` clause
    pub from: Option<Source<'a>>,
    /// `inner_join` clause
    pub inner_join: Option<Source<'a>>,
    /// `select` fields in order; empty passes rows through
    pub select: Vec<(Symbol, Expr)>,
    /// `where` condition; repeated calls are conjoined
    pub condition: Option<Expr>,
    /// `group_by` criteria
    pub group_by: Option<Expr>,
    /// `order_by` key
    pub order_by: Option<Expr>,
}

/// Start an empty query
pub fn linq<'a>() -> Query<'a> {
    Query::new()
}

/// Immutable query builder
#[derive(Debug, Clone, Default)]
pub struct Query<'a> {
    request: Request<'a>,
    error: Option<Error>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, clause: &str) -> Result<()> {
    if slot.is_some() {
        return Err(Error::DuplicateClause(clause.to_string()));
    }
    *slot = Some(value);
    Ok(())
}

impl<'a> Query<'a> {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    fn extend(&self, add: impl FnOnce(&mut Request<'a>) -> Result<()>) -> Self {
        let mut next = self.clone();
        if next.error.is_none() {
            if let Err(err) = add(&mut next.request) {
                next.error = Some(err);
            }
        }
        next
    }

    /// Add output fields
    ///
    /// An empty select passes rows through unchanged. Output names must be
    /// unique across all `select` calls.
    pub fn select<I, S>(&self, items: I) -> Self
    where
        I: IntoIterator<Item = (S, Expr)>,
        S: Into<Symbol>,
    {
        let items: Vec<(Symbol, Expr)> = items
            .into_iter()
            .map(|(name, expr)| (name.into(), expr))
            .collect();
        self.extend(move |request| {
            for (name, expr) in items {
                if request.select.iter().any(|(existing, _)| *existing == name) {
                    return Err(Error::duplicate_field(name.as_str()));
                }
                request.select.push((name, expr));
            }
            Ok(())
        })
    }

    /// Keep rows for which `condition` holds (the `where` clause)
    #[doc(alias = "where")]
    pub fn filter(&self, condition: impl Into<Expr>) -> Self {
        let condition = condition.into();
        self.extend(move |request| {
            request.condition = Some(match request.condition.take() {
                Some(existing) => existing.and(condition),
                None => condition,
            });
            Ok(())
        })
    }

    /// Partition rows into groups of equal `criteria`
    pub fn group_by(&self, criteria: impl Into<Expr>) -> Self {
        let criteria = criteria.into();
        self.extend(move |request| set_once(&mut request.group_by, criteria, "group_by"))
    }

    /// Source table
    pub fn from(&self, source: impl Into<Source<'a>>) -> Self {
        let source = source.into();
        self.extend(move |request| set_once(&mut request.from, source, "from"))
    }

    /// Inner-join a second table; its `on` condition defaults to true
    pub fn inner_join(&self, source: impl Into<Source<'a>>) -> Self {
        let source = source.into();
        self.extend(move |request| set_once(&mut request.inner_join, source, "inner_join"))
    }

    /// Sort rows ascending by `key` (stable)
    pub fn order_by(&self, key: impl Into<Expr>) -> Self {
        let key = key.into();
        self.extend(move |request| set_once(&mut request.order_by, key, "order_by"))
    }

    /// Accumulated clauses
    pub fn request(&self) -> &Request<'a> {
        &self.request
    }

    /// First construction error, if any
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Validate the request and fix its execution strategy
    pub fn plan(&self) -> Result<QueryPlan<'a>> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        planner::plan(&self.request)
    }

    /// Shape of the emitted items, computed without reading any row
    pub fn shape(&self) -> Result<OutputShape> {
        Ok(self.plan()?.shape().clone())
    }

    /// Human-readable plan
    pub fn explain(&self) -> Result<String> {
        Ok(self.plan()?.to_string())
    }

    /// Stream every emitted item to `consumer`
    pub fn pipe<F>(&self, consumer: F) -> Result<()>
    where
        F: FnMut(Output),
    {
        let plan = self.plan()?;
        Executor::new(&plan).run(consumer)
    }

    /// Collect every emitted item
    pub fn to_vec(&self) -> Result<Vec<Output>> {
        let mut out = Vec::new();
        self.pipe(|item| out.push(item))?;
        Ok(out)
    }

    /// Collect the emitted rows of a row-shaped query
    pub fn to_records(&self) -> Result<Vec<Record>> {
        let plan = self.plan()?;
        if plan.shape().is_group() {
            return Err(Error::GroupedOutput);
        }
        let mut out = Vec::new();
        Executor::new(&plan).run(|item| {
            if let Output::Row(record) = item {
                out.push(record);
            }
        })?;
        Ok(out)
    }
}
