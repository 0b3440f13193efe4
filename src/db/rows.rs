//! Row materialization.
//!
//! Turns the positional grid of a `RawResult` into owned rows. Column names
//! are read once per call and shared by every row, so the name accessor is
//! hit `field_count` times regardless of the row count. Each call re-reads
//! the grid; nothing is cached between calls.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::result::RawResult;
use super::value::CellValue;

/// One row keyed by column name, in column order.
///
/// Column names are not guaranteed unique (`SELECT a, a`). Inserting an
/// existing name replaces its value and keeps its original position, so the
/// map form of such a row holds fewer entries than the result has columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedRow {
    entries: Vec<(String, CellValue)>,
    positions: HashMap<String, usize>,
}

impl NamedRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    /// Inserts or replaces the value for `name`, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: CellValue) -> Option<CellValue> {
        let name = name.into();
        if let Some(&position) = self.positions.get(&name) {
            return Some(std::mem::replace(&mut self.entries[position].1, value));
        }
        self.positions.insert(name.clone(), self.entries.len());
        self.entries.push((name, value));
        None
    }

    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.positions
            .get(name)
            .map(|&position| &self.entries[position].1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &CellValue> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for NamedRow {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        let mut row = NamedRow::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

impl Serialize for NamedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Column names in column order.
pub fn column_names(result: &dyn RawResult) -> Vec<String> {
    (0..result.field_count())
        .map(|col| result.field_name(col).unwrap_or_default().to_string())
        .collect()
}

fn read_row(result: &dyn RawResult, row: usize, field_count: usize) -> Vec<CellValue> {
    (0..field_count)
        .map(|col| {
            result
                .cell_value(row, col)
                .cloned()
                .unwrap_or(CellValue::Null)
        })
        .collect()
}

/// Every row as an ordered list of cells.
pub fn positional_rows(result: &dyn RawResult) -> Vec<Vec<CellValue>> {
    let field_count = result.field_count();
    (0..result.row_count())
        .map(|row| read_row(result, row, field_count))
        .collect()
}

/// Every row keyed by column name.
pub fn named_rows(result: &dyn RawResult) -> Vec<NamedRow> {
    let names = column_names(result);
    (0..result.row_count())
        .map(|row| zip_row(&names, read_row(result, row, names.len())))
        .collect()
}

/// Row `index` as an ordered list of cells, `None` past the last row.
pub fn row(result: &dyn RawResult, index: usize) -> Option<Vec<CellValue>> {
    (index < result.row_count()).then(|| read_row(result, index, result.field_count()))
}

/// Row `index` keyed by column name, `None` past the last row.
pub fn named_row(result: &dyn RawResult, index: usize) -> Option<NamedRow> {
    if index >= result.row_count() {
        return None;
    }
    let names = column_names(result);
    Some(zip_row(&names, read_row(result, index, names.len())))
}

fn zip_row(names: &[String], cells: Vec<CellValue>) -> NamedRow {
    let mut row = NamedRow::with_capacity(names.len());
    for (name, cell) in names.iter().zip(cells) {
        row.insert(name.as_str(), cell);
    }
    row
}
