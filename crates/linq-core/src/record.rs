//! Ordered symbolic records
//!
//! A [`Record`] keeps its fields in insertion order. Rows of a table,
//! alias bindings (`{ _1: row }`) and formatted output rows are all
//! records; concatenation is the disjoint union used to merge bindings.

use crate::symbol::{Symbol, SymbolAccess};
use crate::value::Value;
use crate::{Error, Result};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Ordered mapping from symbols to values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(Symbol, Value)>,
}

/// Build a [`Record`] from `key => value` pairs
///
/// A repeated key keeps its first position and the last value.
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $(
            record.insert($key, $value);
        )+
        record
    }};
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Create an empty record with room for `capacity` fields
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Build a record from pairs, rejecting repeated keys
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Symbol>,
        V: Into<Value>,
    {
        let mut record = Self::new();
        for (key, value) in pairs {
            record.push(key, value)?;
        }
        Ok(record)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Membership test
    pub fn has(&self, key: impl AsRef<str>) -> bool {
        self.position(key.as_ref()).is_some()
    }

    /// Value stored under `key`
    pub fn get(&self, key: impl AsRef<str>) -> Option<&Value> {
        self.position(key.as_ref()).map(|idx| &self.fields[idx].1)
    }

    /// Insert or replace a field, returning the previous value
    pub fn insert(&mut self, key: impl Into<Symbol>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.position(key.as_str()) {
            Some(idx) => Some(std::mem::replace(&mut self.fields[idx].1, value)),
            None => {
                self.fields.push((key, value));
                None
            }
        }
    }

    /// Append a field whose key must not be present yet
    pub fn push(&mut self, key: impl Into<Symbol>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        if self.has(&key) {
            return Err(Error::duplicate_field(key.as_str()));
        }
        self.fields.push((key, value.into()));
        Ok(())
    }

    /// Disjoint-key union, `self`'s fields first
    pub fn concat(&self, other: &Record) -> Result<Record> {
        let mut merged = Record::with_capacity(self.len() + other.len());
        for (key, value) in self.iter().chain(other.iter()) {
            merged.push(key.clone(), value.clone())?;
        }
        Ok(merged)
    }

    /// Field names in order
    pub fn keys(&self) -> impl Iterator<Item = &Symbol> {
        self.fields.iter().map(|(key, _)| key)
    }

    /// Field values in order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, value)| value)
    }

    /// Fields in order
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Value)> {
        self.fields.iter().map(|(key, value)| (key, value))
    }

    /// Field-wise lexicographic order (keys, then values)
    pub fn total_cmp(&self, other: &Record) -> Ordering {
        self.fields
            .iter()
            .zip(other.fields.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.total_cmp(vb)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| self.len().cmp(&other.len()))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|(k, _)| k.as_str() == key)
    }

    pub(crate) fn from_map_access<'de, A>(mut map: A) -> std::result::Result<Self, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut record = Record::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<Symbol, Value>()? {
            record.push(key, value).map_err(de::Error::custom)?;
        }
        Ok(record)
    }
}

impl SymbolAccess for Record {
    fn member(&self, symbol: &Symbol) -> Option<&Value> {
        self.get(symbol)
    }
}

impl IntoIterator for Record {
    type Item = (Symbol, Value);
    type IntoIter = std::vec::IntoIter<(Symbol, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object")
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<Record, A::Error> {
        Record::from_map_access(map)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}
