//! Dynamic values stored in records
//!
//! Operators follow SQL conventions: `Null` propagates through arithmetic
//! and comparisons, and the logical connectives use three-valued logic.
//! [`Value::total_cmp`] is the ordering used for sorting and grouping.

use crate::record::Record;
use crate::symbol::{Symbol, SymbolAccess};
use crate::{Error, Result};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A field value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Missing or unknown value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Ordered list of values
    List(Vec<Value>),
    /// Nested record (alias bindings are records of records)
    Record(Record),
}

impl Value {
    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    /// True for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric payload widened to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// List payload
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Record payload
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Str(_) => 3,
            Value::List(_) => 4,
            Value::Record(_) => 5,
        }
    }

    /// Total order over all values
    ///
    /// Null < Bool < numbers < Str < List < Record. Int and Float compare
    /// exactly by numeric value, with `-0.0 == 0.0`; NaN sorts after every
    /// number, or before them when its sign bit is set.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(a), Value::Float(b)) => int_float_cmp(*a, *b),
            (Value::Float(a), Value::Int(b)) => int_float_cmp(*b, *a).reverse(),
            (Value::Float(a), Value::Float(b)) => float_cmp(*a, *b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Value::Record(a), Value::Record(b)) => a.total_cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Whether a `where`/`on` condition holds for this result
    pub fn condition_holds(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Null => Ok(false),
            other => Err(Error::type_mismatch("bool", other.type_name())),
        }
    }

    fn mismatch(&self, rhs: &Value, expected: &str) -> Error {
        Error::type_mismatch(
            expected,
            format!("{} and {}", self.type_name(), rhs.type_name()),
        )
    }

    fn arithmetic(
        &self,
        rhs: &Value,
        int_op: fn(i64, i64) -> Result<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value> {
        match (self, rhs) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (Value::Int(a), Value::Int(b)) => int_op(*a, *b).map(Value::Int),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(float_op(*a as f64, *b))),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(float_op(*a, *b as f64))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(*a, *b))),
            _ => Err(self.mismatch(rhs, "numbers")),
        }
    }

    /// `self + rhs`; strings concatenate
    pub fn try_add(&self, rhs: &Value) -> Result<Value> {
        if let (Value::Str(a), Value::Str(b)) = (self, rhs) {
            return Ok(Value::Str(format!("{a}{b}")));
        }
        self.arithmetic(rhs, |a, b| a.checked_add(b).ok_or(Error::Overflow), |a, b| a + b)
    }

    /// `self - rhs`
    pub fn try_sub(&self, rhs: &Value) -> Result<Value> {
        self.arithmetic(rhs, |a, b| a.checked_sub(b).ok_or(Error::Overflow), |a, b| a - b)
    }

    /// `self * rhs`
    pub fn try_mul(&self, rhs: &Value) -> Result<Value> {
        self.arithmetic(rhs, |a, b| a.checked_mul(b).ok_or(Error::Overflow), |a, b| a * b)
    }

    /// `self / rhs`; integer division truncates
    pub fn try_div(&self, rhs: &Value) -> Result<Value> {
        self.arithmetic(
            rhs,
            |a, b| {
                if b == 0 {
                    return Err(Error::DivisionByZero);
                }
                a.checked_div(b).ok_or(Error::Overflow)
            },
            |a, b| a / b,
        )
    }

    /// `self % rhs`
    pub fn try_rem(&self, rhs: &Value) -> Result<Value> {
        self.arithmetic(
            rhs,
            |a, b| {
                if b == 0 {
                    return Err(Error::DivisionByZero);
                }
                a.checked_rem(b).ok_or(Error::Overflow)
            },
            |a, b| a % b,
        )
    }

    /// Unary minus
    pub fn try_neg(&self) -> Result<Value> {
        match self {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(Error::Overflow),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(Error::type_mismatch("number", other.type_name())),
        }
    }

    /// `self == rhs`; mismatched types are unequal, `Null` is unknown
    pub fn equals(&self, rhs: &Value) -> Value {
        match (self, rhs) {
            (Value::Null, _) | (_, Value::Null) => Value::Null,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Value::Bool(self.total_cmp(rhs).is_eq())
            }
            _ => Value::Bool(self == rhs),
        }
    }

    /// Ordering between comparable values, `None` when either is `Null`
    pub fn compare(&self, rhs: &Value) -> Result<Option<Ordering>> {
        match (self, rhs) {
            (Value::Null, _) | (_, Value::Null) => Ok(None),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_))
            | (Value::Str(_), Value::Str(_))
            | (Value::Bool(_), Value::Bool(_))
            | (Value::List(_), Value::List(_)) => Ok(Some(self.total_cmp(rhs))),
            _ => Err(self.mismatch(rhs, "comparable values")),
        }
    }

    fn logical(&self) -> Result<Option<bool>> {
        match self {
            Value::Bool(b) => Ok(Some(*b)),
            Value::Null => Ok(None),
            other => Err(Error::type_mismatch("bool", other.type_name())),
        }
    }

    /// Three-valued AND
    pub fn logical_and(&self, rhs: &Value) -> Result<Value> {
        Ok(match (self.logical()?, rhs.logical()?) {
            (Some(false), _) | (_, Some(false)) => Value::Bool(false),
            (Some(true), Some(true)) => Value::Bool(true),
            _ => Value::Null,
        })
    }

    /// Three-valued OR
    pub fn logical_or(&self, rhs: &Value) -> Result<Value> {
        Ok(match (self.logical()?, rhs.logical()?) {
            (Some(true), _) | (_, Some(true)) => Value::Bool(true),
            (Some(false), Some(false)) => Value::Bool(false),
            _ => Value::Null,
        })
    }

    /// Three-valued NOT
    pub fn logical_not(&self) -> Result<Value> {
        Ok(match self.logical()? {
            Some(b) => Value::Bool(!b),
            None => Value::Null,
        })
    }
}

/// Float order with both zeros equal; NaN falls back to `f64::total_cmp`.
fn float_cmp(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

/// Exact comparison of an integer against a float, without rounding the
/// integer through `f64`.
fn int_float_cmp(a: i64, b: f64) -> Ordering {
    // 2^63 is exact in f64; every float below it in magnitude floors into i64 range.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if b.is_nan() {
        return if b.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if b >= LIMIT {
        return Ordering::Less;
    }
    if b < -LIMIT {
        return Ordering::Greater;
    }
    let floor = b.floor();
    match i128::from(a).cmp(&(floor as i128)) {
        Ordering::Equal if b > floor => Ordering::Less,
        ordering => ordering,
    }
}

impl SymbolAccess for Value {
    fn member(&self, symbol: &Symbol) -> Option<&Value> {
        self.as_record().and_then(|record| record.get(symbol))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Record(record) => {
                let mut map = serializer.serialize_map(Some(record.len()))?;
                for (key, value) in record.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON-compatible value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        Value::deserialize(d)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(i))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> std::result::Result<Value, E> {
        Ok(i64::try_from(u).map(Value::Int).unwrap_or(Value::Float(u as f64)))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> std::result::Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> std::result::Result<Value, E> {
        Ok(Value::Str(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> std::result::Result<Value, E> {
        Ok(Value::Str(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<Value, A::Error> {
        Record::from_map_access(map).map(Value::Record)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
