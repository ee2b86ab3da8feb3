//! Linq Core - Embedded Query Engine
//!
//! This crate runs SQL-like queries over in-memory tables of records:
//! - Symbolic records (ordered `symbol -> value` maps) and uniform tables
//! - Expression trees over bound rows (`alias.field`, arithmetic, logic)
//! - Aggregators (count, sum, avg, min, max, collect)
//! - An immutable fluent builder: select, where, inner join, group by, order by
//! - Static output-shape inference, checked on every emitted row
//! - A planner that fixes one execution strategy per query
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Query Builder                   │
//! │  (select, filter, from, inner_join, ...)    │
//! └──────────────┬──────────────────────────────┘
//!                │ Request
//! ┌──────────────┴──────────────────────────────┐
//! │               Planner                        │
//! │  (alias binding, validation, shape, plan)   │
//! └──────────────┬──────────────────────────────┘
//!                │ QueryPlan
//! ┌──────────────┴──────────────────────────────┐
//! │               Executor                       │
//! │ (scan, join, sort, group, aggregate, emit)  │
//! └──────────────┬──────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────────────────────┐
//! │             Data Model                       │
//! │     (Symbol, Value, Record, Table)          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use linq_core::{Table, Value, col, linq, record, sum};
//!
//! let table = Table::new(
//!     ["id", "v"],
//!     vec![
//!         record! { "id" => 1, "v" => 10 },
//!         record! { "id" => 2, "v" => 5 },
//!     ],
//! )?;
//!
//! let rows = linq()
//!     .from(&table)
//!     .select([("total", sum(col("v")))])
//!     .to_records()?;
//! assert_eq!(rows[0].get("total"), Some(&Value::Int(15)));
//! # Ok::<(), linq_core::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod error;
pub mod executor;
pub mod expr;
pub mod query;
pub mod record;
pub mod shape;
pub mod symbol;
pub mod table;
pub mod value;

pub use aggregate::{
    AggregateFunction, Aggregator, avg, collect, count, count_rows, max, min, sum,
};
pub use error::{Error, Result};
pub use executor::{Executor, Output, QueryPlan, Strategy};
pub use expr::{BinaryOperator, Expr, UnaryOperator, col, field, lit};
pub use query::{Query, Request, Source, linq};
pub use record::Record;
pub use shape::{FieldShape, OutputShape, RecordFormat, RecordShape};
pub use symbol::{FROM_ALIAS, JOIN_ALIAS, Symbol, SymbolAccess, SymbolCall};
pub use table::Table;
pub use value::Value;
