//! Expression trees and their evaluation against bound rows
//!
//! Expressions are built with [`col`], [`field`], [`lit`] and the operator
//! methods, e.g. `col("age").gt(30).and(col("city").equals("NYC"))`.
//!
//! A bound row is a record of alias bindings, `{ _1: { id: 1, v: 10 } }`
//! for a single table or `{ u: {...}, o: {...} }` for a join. A bare field
//! symbol resolves to a top-level key first (so an alias names the whole
//! bound row) and otherwise to the one binding that carries the field.

use crate::aggregate::AggregateFunction;
use crate::record::Record;
use crate::symbol::Symbol;
use crate::value::Value;
use crate::{Error, Result};
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// Addition (string concatenation for strings)
    Add,
    /// Subtraction
    Subtract,
    /// Multiplication
    Multiply,
    /// Division
    Divide,
    /// Modulo
    Modulo,
    /// Equality
    Equal,
    /// Inequality
    NotEqual,
    /// Less than
    LessThan,
    /// Less than or equal
    LessThanOrEqual,
    /// Greater than
    GreaterThan,
    /// Greater than or equal
    GreaterThanOrEqual,
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl BinaryOperator {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        }
    }

    /// Apply the operator to two evaluated operands
    pub fn apply(self, left: &Value, right: &Value) -> Result<Value> {
        let ordered = |accept: fn(std::cmp::Ordering) -> bool| -> Result<Value> {
            Ok(match left.compare(right)? {
                Some(ordering) => Value::Bool(accept(ordering)),
                None => Value::Null,
            })
        };

        match self {
            BinaryOperator::Add => left.try_add(right),
            BinaryOperator::Subtract => left.try_sub(right),
            BinaryOperator::Multiply => left.try_mul(right),
            BinaryOperator::Divide => left.try_div(right),
            BinaryOperator::Modulo => left.try_rem(right),
            BinaryOperator::Equal => Ok(left.equals(right)),
            BinaryOperator::NotEqual => left.equals(right).logical_not(),
            BinaryOperator::LessThan => ordered(|o| o.is_lt()),
            BinaryOperator::LessThanOrEqual => ordered(|o| o.is_le()),
            BinaryOperator::GreaterThan => ordered(|o| o.is_gt()),
            BinaryOperator::GreaterThanOrEqual => ordered(|o| o.is_ge()),
            BinaryOperator::And => left.logical_and(right),
            BinaryOperator::Or => left.logical_or(right),
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Logical NOT
    Not,
    /// Unary minus
    Minus,
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal(Value),
    /// Field reference by symbol
    Field(Symbol),
    /// Field of a record-valued expression (`alias.field`)
    Member {
        /// Record-valued base expression
        base: Box<Expr>,
        /// Field read from the base
        field: Symbol,
    },
    /// Binary operation
    BinaryOp {
        /// Left operand
        left: Box<Expr>,
        /// Operator
        op: BinaryOperator,
        /// Right operand
        right: Box<Expr>,
    },
    /// Unary operation
    UnaryOp {
        /// Operator
        op: UnaryOperator,
        /// Operand
        operand: Box<Expr>,
    },
    /// Aggregator specification, legal only as a whole select field
    Aggregate {
        /// Aggregate function
        func: AggregateFunction,
        /// Expression fed to the aggregator for each row
        arg: Box<Expr>,
    },
}

/// Literal expression
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

/// Field reference
pub fn col(name: impl Into<Symbol>) -> Expr {
    Expr::Field(name.into())
}

/// Field of an aliased table, `alias.name`
pub fn field(alias: impl Into<Symbol>, name: impl Into<Symbol>) -> Expr {
    Expr::Member {
        base: Box::new(Expr::Field(alias.into())),
        field: name.into(),
    }
}

/// Resolve `symbol` against a bound row
pub fn resolve<'r>(row: &'r Record, symbol: &Symbol) -> Result<&'r Value> {
    if let Some(value) = row.get(symbol) {
        return Ok(value);
    }

    let mut found = None;
    for (_, binding) in row.iter() {
        if let Some(value) = binding.as_record().and_then(|inner| inner.get(symbol)) {
            if found.is_some() {
                return Err(Error::AmbiguousField(symbol.to_string()));
            }
            found = Some(value);
        }
    }
    found.ok_or_else(|| Error::unknown_field(symbol.as_str()))
}

impl Expr {
    fn binary(self, op: BinaryOperator, right: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self),
            op,
            right: Box::new(right.into()),
        }
    }

    /// `self == right`
    pub fn equals(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Equal, right)
    }

    /// `self != right`
    pub fn not_equals(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::NotEqual, right)
    }

    /// `self < right`
    pub fn lt(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::LessThan, right)
    }

    /// `self <= right`
    pub fn le(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::LessThanOrEqual, right)
    }

    /// `self > right`
    pub fn gt(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::GreaterThan, right)
    }

    /// `self >= right`
    pub fn ge(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::GreaterThanOrEqual, right)
    }

    /// `self AND right`
    pub fn and(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, right)
    }

    /// `self OR right`
    pub fn or(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Or, right)
    }

    /// `self.name`, for record-valued expressions
    pub fn member(self, name: impl Into<Symbol>) -> Expr {
        Expr::Member {
            base: Box::new(self),
            field: name.into(),
        }
    }

    /// Evaluate against a bound row
    pub fn evaluate(&self, row: &Record) -> Result<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Field(symbol) => resolve(row, symbol).cloned(),
            Expr::Member { base, field } => match base.evaluate(row)? {
                Value::Record(record) => record
                    .get(field)
                    .cloned()
                    .ok_or_else(|| Error::unknown_field(format!("{}.{}", base, field))),
                Value::Null => Ok(Value::Null),
                other => Err(Error::type_mismatch("record", other.type_name())),
            },
            Expr::BinaryOp { left, op, right } => {
                let left = left.evaluate(row)?;
                let right = right.evaluate(row)?;
                op.apply(&left, &right)
            }
            Expr::UnaryOp { op, operand } => {
                let value = operand.evaluate(row)?;
                match op {
                    UnaryOperator::Not => value.logical_not(),
                    UnaryOperator::Minus => value.try_neg(),
                }
            }
            Expr::Aggregate { .. } => Err(Error::InvalidAggregate(format!(
                "{} cannot be evaluated on a single row",
                self
            ))),
        }
    }

    /// Aggregate function and argument when this is an aggregator field
    pub fn as_aggregate(&self) -> Option<(AggregateFunction, &Expr)> {
        match self {
            Expr::Aggregate { func, arg } => Some((*func, arg)),
            _ => None,
        }
    }

    /// True if an aggregate appears anywhere in the tree
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::Field(_) => false,
            Expr::Member { base, .. } => base.contains_aggregate(),
            Expr::BinaryOp { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expr::UnaryOp { operand, .. } => operand.contains_aggregate(),
            Expr::Aggregate { .. } => true,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Field(symbol) => write!(f, "{}", symbol),
            Expr::Member { base, field } => write!(f, "{}.{}", base, field),
            Expr::BinaryOp { left, op, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::UnaryOp { op, operand } => match op {
                UnaryOperator::Not => write!(f, "NOT {}", operand),
                UnaryOperator::Minus => write!(f, "-{}", operand),
            },
            Expr::Aggregate { func, arg } => write!(f, "{}({})", func, arg),
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        Expr::Field(symbol)
    }
}

impl From<&Symbol> for Expr {
    fn from(symbol: &Symbol) -> Self {
        Expr::Field(symbol.clone())
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        lit(b)
    }
}

impl From<i64> for Expr {
    fn from(i: i64) -> Self {
        lit(i)
    }
}

impl From<i32> for Expr {
    fn from(i: i32) -> Self {
        lit(i)
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        lit(f)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        lit(s)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Into<Expr>> std::ops::$trait<T> for Expr {
            type Output = Expr;

            fn $method(self, rhs: T) -> Expr {
                self.binary($op, rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOperator::Add);
impl_binary_op!(Sub, sub, BinaryOperator::Subtract);
impl_binary_op!(Mul, mul, BinaryOperator::Multiply);
impl_binary_op!(Div, div, BinaryOperator::Divide);
impl_binary_op!(Rem, rem, BinaryOperator::Modulo);

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            operand: Box::new(self),
        }
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            operand: Box::new(self),
        }
    }
}
