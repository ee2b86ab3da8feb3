//! Record formatting and output-shape inference
//!
//! The formatting rule is picked once per query from the select clause and
//! the table aliasing, then applied to a representative all-`Null` row to
//! obtain the [`OutputShape`] before any real row is read. Every emitted
//! row is checked against that shape.

use crate::expr::Expr;
use crate::record::Record;
use crate::symbol::Symbol;
use crate::value::Value;
use crate::{Error, Result};
use std::fmt;

/// Shape of one field of an output row
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
    /// Any value
    Value,
    /// A nested record with a fixed shape (alias bindings)
    Record(RecordShape),
}

/// Ordered field names of a record, with nested record shapes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordShape {
    fields: Vec<(Symbol, FieldShape)>,
}

impl RecordShape {
    /// Shape of an existing record
    pub fn of(record: &Record) -> Self {
        let fields = record
            .iter()
            .map(|(key, value)| {
                let shape = match value {
                    Value::Record(inner) => FieldShape::Record(RecordShape::of(inner)),
                    _ => FieldShape::Value,
                };
                (key.clone(), shape)
            })
            .collect();
        Self { fields }
    }

    /// Field names in order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(key, _)| key.as_str()).collect()
    }

    /// Shape of one field
    pub fn get(&self, name: &str) -> Option<&FieldShape> {
        self.fields
            .iter()
            .find(|(key, _)| key.as_str() == name)
            .map(|(_, shape)| shape)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the shape has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `record` has exactly this shape
    ///
    /// A `Value` field accepts anything, including records.
    pub fn conforms(&self, record: &Record) -> bool {
        self.fields.len() == record.len()
            && self
                .fields
                .iter()
                .zip(record.iter())
                .all(|((name, shape), (key, value))| {
                    name == key
                        && match (shape, value) {
                            (FieldShape::Value, _) => true,
                            (FieldShape::Record(inner), Value::Record(nested)) => {
                                inner.conforms(nested)
                            }
                            (FieldShape::Record(_), _) => false,
                        }
                })
    }

    /// Error for a row that does not conform
    pub(crate) fn mismatch(&self, record: &Record) -> Error {
        Error::ShapeMismatch {
            expected: self.to_string(),
            actual: RecordShape::of(record).to_string(),
        }
    }
}

impl fmt::Display for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (name, shape)) in self.fields.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match shape {
                FieldShape::Value => write!(f, "{}", name)?,
                FieldShape::Record(inner) => write!(f, "{}: {}", name, inner)?,
            }
        }
        f.write_str("}")
    }
}

/// Static shape of everything a query emits
#[derive(Debug, Clone, PartialEq)]
pub enum OutputShape {
    /// One record per emitted item
    Row(RecordShape),
    /// A group of records per emitted item
    Group(RecordShape),
}

impl OutputShape {
    /// Shape of a single record (of a group, for grouped output)
    pub fn record(&self) -> &RecordShape {
        match self {
            OutputShape::Row(shape) | OutputShape::Group(shape) => shape,
        }
    }

    /// True for grouped output
    pub fn is_group(&self) -> bool {
        matches!(self, OutputShape::Group(_))
    }
}

impl fmt::Display for OutputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputShape::Row(shape) => write!(f, "row {}", shape),
            OutputShape::Group(shape) => write!(f, "group of {}", shape),
        }
    }
}

/// How a bound row becomes an output row
#[derive(Debug, Clone, PartialEq)]
pub enum RecordFormat {
    /// Non-empty select: evaluate each field against the bound row
    Project(Vec<(Symbol, Expr)>),
    /// Empty select over one unaliased table: the raw source row
    Unwrap(Symbol),
    /// Empty select with an explicit alias, or a join: the bound row itself
    Bound,
}

impl RecordFormat {
    /// Pick the rule for a request
    pub fn choose(
        select: &[(Symbol, Expr)],
        from_alias: &Symbol,
        explicit_alias: bool,
        has_join: bool,
    ) -> Self {
        if !select.is_empty() {
            RecordFormat::Project(select.to_vec())
        } else if explicit_alias || has_join {
            RecordFormat::Bound
        } else {
            RecordFormat::Unwrap(from_alias.clone())
        }
    }

    /// Format one bound row
    pub fn format(&self, row: &Record) -> Result<Record> {
        match self {
            RecordFormat::Project(items) => {
                let mut out = Record::with_capacity(items.len());
                for (name, expr) in items {
                    out.push(name.clone(), expr.evaluate(row)?)?;
                }
                Ok(out)
            }
            RecordFormat::Unwrap(alias) => match row.get(alias) {
                Some(Value::Record(inner)) => Ok(inner.clone()),
                _ => Err(Error::executor(format!(
                    "bound row has no binding for {}",
                    alias
                ))),
            },
            RecordFormat::Bound => Ok(row.clone()),
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFormat::Project(items) => {
                f.write_str("project(")?;
                for (idx, (name, expr)) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} = {}", name, expr)?;
                }
                f.write_str(")")
            }
            RecordFormat::Unwrap(alias) => write!(f, "unwrap({})", alias),
            RecordFormat::Bound => f.write_str("bound"),
        }
    }
}
