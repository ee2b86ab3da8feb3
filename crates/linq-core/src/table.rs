//! Source tables
//!
//! A [`Table`] is an ordered sequence of records that all carry the same
//! columns. The declared columns are what shape inference works from, so
//! an empty table still has a known row shape.

use crate::query::Source;
use crate::record::Record;
use crate::symbol::Symbol;
use crate::value::Value;
use crate::{Error, Result};

/// Uniformly-typed, ordered collection of records
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Symbol>,
    rows: Vec<Record>,
}

impl Table {
    /// Create a table, checking every row against `columns`
    ///
    /// Row fields are reordered into column order.
    pub fn new<I, S>(columns: I, rows: Vec<Record>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let columns: Vec<Symbol> = columns.into_iter().map(Into::into).collect();
        for (idx, column) in columns.iter().enumerate() {
            if columns[..idx].contains(column) {
                return Err(Error::duplicate_field(column.as_str()));
            }
        }

        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| Self::conform(&columns, idx, row))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns, rows })
    }

    /// Create a table whose columns are those of the first record
    pub fn from_records(rows: Vec<Record>) -> Result<Self> {
        let columns: Vec<Symbol> = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self::new(columns, rows)
    }

    /// Load a table from a JSON array of objects
    pub fn from_json(json: &str) -> Result<Self> {
        let rows: Vec<Record> = serde_json::from_str(json)?;
        Self::from_records(rows)
    }

    fn conform(columns: &[Symbol], idx: usize, row: Record) -> Result<Record> {
        if row.len() != columns.len() {
            return Err(Error::schema(format!(
                "row {} has {} fields, expected {}",
                idx,
                row.len(),
                columns.len()
            )));
        }
        let mut ordered = Record::with_capacity(columns.len());
        for column in columns {
            let value = row
                .get(column)
                .ok_or_else(|| Error::schema(format!("row {} has no column {}", idx, column)))?;
            ordered.push(column.clone(), value.clone())?;
        }
        Ok(ordered)
    }

    /// Declared columns
    pub fn columns(&self) -> &[Symbol] {
        &self.columns
    }

    /// All rows
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at `idx`
    pub fn get(&self, idx: usize) -> Option<&Record> {
        self.rows.get(idx)
    }

    /// Iterate rows in order
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.rows.iter()
    }

    /// Representative row: every declared column set to `Null`
    pub fn sample_row(&self) -> Record {
        let mut sample = Record::with_capacity(self.columns.len());
        for column in &self.columns {
            sample.insert(column.clone(), Value::Null);
        }
        sample
    }

    /// Reference this table without an alias
    pub fn source(&self) -> Source<'_> {
        Source::new(self)
    }

    /// Reference this table under `alias`
    pub fn alias(&self, alias: impl Into<Symbol>) -> Source<'_> {
        Source::new(self).alias(alias)
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn rows_are_reordered_into_column_order() {
        let table = Table::new(["id", "v"], vec![record! { "v" => 10, "id" => 1 }]).unwrap();
        let keys: Vec<&str> = table.rows()[0].keys().map(Symbol::as_str).collect();
        assert_eq!(keys, vec!["id", "v"]);
    }

    #[test]
    fn rows_must_match_the_declared_columns() {
        let missing = Table::new(["id", "v"], vec![record! { "id" => 1, "w" => 2 }]);
        assert!(matches!(missing, Err(Error::Schema(_))));

        let extra = Table::new(["id"], vec![record! { "id" => 1, "v" => 2 }]);
        assert!(matches!(extra, Err(Error::Schema(_))));

        let repeated = Table::new(["id", "id"], Vec::new());
        assert!(matches!(repeated, Err(Error::DuplicateField(_))));
    }

    #[test]
    fn from_json_takes_columns_from_first_object() {
        let table = Table::from_json(r#"[{"id": 1, "v": 10}, {"v": 20, "id": 2}]"#).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.columns(), &[Symbol::new("id"), Symbol::new("v")]);
        assert_eq!(table.get(1).and_then(|row| row.get("v")), Some(&Value::Int(20)));
        assert!(table.get(2).is_none());
    }

    #[test]
    fn sample_row_is_all_null() {
        let table = Table::new(["id", "v"], Vec::new()).unwrap();
        assert_eq!(table.sample_row(), record! { "id" => Value::Null, "v" => Value::Null });
    }
}
