//! Generic column-major table container.
//!
//! [`Frame`] knows nothing about Anki. It stores ordered, equally long
//! columns of [`Value`]s and an optional promoted integer index. The
//! Anki-specific behaviour lives in [`AnkiTable`](crate::AnkiTable), which
//! owns a frame next to its format metadata.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::value::Value;

/// A named column of cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// A column promoted to primary key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Index {
    pub name: String,
    pub keys: Vec<i64>,
}

/// Ordered collection of equally long columns with an optional index.
///
/// # Examples
///
/// ```
/// use ankiframe_core::{Frame, Value};
///
/// let mut frame = Frame::new(["id", "name"]);
/// frame.push_row(vec![Value::Int(7), Value::from("seven")]).unwrap();
/// frame.set_index("id").unwrap();
///
/// assert_eq!(frame.keys(), Some(&[7][..]));
/// assert_eq!(frame.column_names().collect::<Vec<_>>(), vec!["name"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    index: Option<Index>,
    columns: Vec<Column>,
    len: usize,
}

impl Frame {
    /// Creates an empty frame with the given column names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index: None,
            columns: names
                .into_iter()
                .map(|name| Column {
                    name: name.into(),
                    values: Vec::new(),
                })
                .collect(),
            len: 0,
        }
    }

    /// Builds a frame from row-major data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`] if a row has the wrong width.
    pub fn from_rows<I, S>(names: I, rows: Vec<Vec<Value>>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut frame = Self::new(names);
        for row in rows {
            frame.push_row(row)?;
        }
        Ok(frame)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.position(name).map(|i| self.columns[i].values.as_slice())
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Vec<Value>> {
        let i = self.position(name)?;
        Some(&mut self.columns[i].values)
    }

    /// Like [`column`](Self::column) but fails with
    /// [`Error::MissingColumn`].
    pub fn require(&self, name: &str) -> Result<&[Value]> {
        self.column(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    pub fn require_mut(&mut self, name: &str) -> Result<&mut Vec<Value>> {
        let i = self
            .position(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))?;
        Ok(&mut self.columns[i].values)
    }

    /// Replaces a column's values, or appends a new column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`] if `values` has the wrong length
    /// for a non-empty frame.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        self.check_len(name, values.len())?;
        match self.position(name) {
            Some(i) => self.columns[i].values = values,
            None => {
                self.len = values.len();
                self.columns.push(Column {
                    name: name.to_string(),
                    values,
                });
            }
        }
        Ok(())
    }

    /// Inserts a column at `at`, or replaces it in place if it exists.
    pub fn insert_column(&mut self, at: usize, name: &str, values: Vec<Value>) -> Result<()> {
        if self.has_column(name) {
            return self.set_column(name, values);
        }
        self.check_len(name, values.len())?;
        self.len = values.len();
        let at = at.min(self.columns.len());
        self.columns.insert(
            at,
            Column {
                name: name.to_string(),
                values,
            },
        );
        Ok(())
    }

    fn check_len(&self, name: &str, len: usize) -> Result<()> {
        let empty_shape = self.columns.is_empty() && self.index.is_none();
        if !empty_shape && len != self.len {
            return Err(Error::SchemaViolation(format!(
                "column '{name}' has {len} values but the table has {} rows",
                self.len
            )));
        }
        Ok(())
    }

    /// Adds a column filled with `fill` unless it already exists.
    pub fn ensure_column(&mut self, name: &str, fill: Value) {
        if !self.has_column(name) {
            let values = vec![fill; self.len];
            self.columns.push(Column {
                name: name.to_string(),
                values,
            });
        }
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Vec<Value>> {
        let i = self.position(name)?;
        Some(self.columns.remove(i).values)
    }

    /// Keeps only the columns for which `keep` returns true.
    pub fn retain_columns(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.columns.retain(|c| keep(&c.name));
    }

    /// Renames every column for which `rename` yields a new name.
    pub fn rename_columns<'a>(&mut self, rename: impl Fn(&str) -> Option<&'a str>) {
        for column in &mut self.columns {
            if let Some(new) = rename(&column.name) {
                column.name = new.to_string();
            }
        }
    }

    /// Reorders the frame to exactly `names`, dropping everything else.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] for the first name not present.
    pub fn select(&mut self, names: &[&str]) -> Result<()> {
        let mut by_name: HashMap<String, Vec<Value>> = self
            .columns
            .drain(..)
            .map(|c| (c.name, c.values))
            .collect();
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let values = by_name
                .remove(*name)
                .ok_or_else(|| Error::MissingColumn(name.to_string()))?;
            selected.push(Column {
                name: name.to_string(),
                values,
            });
        }
        self.columns = selected;
        Ok(())
    }

    pub fn index(&self) -> Option<&Index> {
        self.index.as_ref()
    }

    pub fn keys(&self) -> Option<&[i64]> {
        self.index.as_ref().map(|i| i.keys.as_slice())
    }

    /// Promotes an integer column to the index.
    ///
    /// # Errors
    ///
    /// Fails if the column is missing, holds non-integer cells, or
    /// another index is already set.
    pub fn set_index(&mut self, name: &str) -> Result<()> {
        if let Some(index) = &self.index {
            return Err(Error::SchemaViolation(format!(
                "index '{}' is already set",
                index.name
            )));
        }
        let values = self
            .drop_column(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))?;
        let mut keys = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Value::Int(i) => keys.push(i),
                other => {
                    return Err(Error::InvalidCast {
                        value: format!("{other:?}"),
                        target: "int",
                    });
                }
            }
        }
        self.index = Some(Index {
            name: name.to_string(),
            keys,
        });
        Ok(())
    }

    /// Demotes the index back to the first column. No-op without index.
    pub fn reset_index(&mut self) {
        if let Some(index) = self.index.take() {
            self.columns.insert(
                0,
                Column {
                    name: index.name,
                    values: index.keys.into_iter().map(Value::Int).collect(),
                },
            );
        }
    }

    /// Maps index keys to row positions.
    pub fn key_positions(&self) -> HashMap<i64, usize> {
        self.keys()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(pos, key)| (*key, pos))
            .collect()
    }

    pub fn key_set(&self) -> HashSet<i64> {
        self.keys().unwrap_or_default().iter().copied().collect()
    }

    /// Appends a row in column order. The index, if any, is not extended;
    /// use [`push_keyed_row`](Self::push_keyed_row) for indexed frames.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if self.index.is_some() {
            return Err(Error::SchemaViolation(
                "indexed frames need a key for every row".into(),
            ));
        }
        self.push_values(row)
    }

    /// Appends a row together with its index key.
    pub fn push_keyed_row(&mut self, key: i64, row: Vec<Value>) -> Result<()> {
        let Some(index) = &self.index else {
            return Err(Error::SchemaViolation("frame has no index".into()));
        };
        if index.keys.contains(&key) {
            return Err(Error::SchemaViolation(format!(
                "duplicate {} {key}",
                index.name
            )));
        }
        self.push_values(row)?;
        if let Some(index) = &mut self.index {
            index.keys.push(key);
        }
        Ok(())
    }

    fn push_values(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::SchemaViolation(format!(
                "row has {} values but the table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.values.push(value);
        }
        self.len += 1;
        Ok(())
    }

    /// Returns the cells of row `pos` in column order.
    pub fn row(&self, pos: usize) -> Option<Vec<&Value>> {
        if pos >= self.len {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[pos]).collect())
    }

    pub fn value(&self, pos: usize, column: &str) -> Option<&Value> {
        self.column(column).and_then(|values| values.get(pos))
    }

    /// Row `pos` as a JSON object, index first.
    pub fn record(&self, pos: usize) -> Option<serde_json::Map<String, serde_json::Value>> {
        if pos >= self.len {
            return None;
        }
        let mut record = serde_json::Map::new();
        if let Some(index) = &self.index {
            record.insert(index.name.clone(), index.keys[pos].into());
        }
        for column in &self.columns {
            let value = serde_json::to_value(&column.values[pos]).unwrap_or_default();
            record.insert(column.name.clone(), value);
        }
        Some(record)
    }

    /// Returns a new frame with the rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Frame {
        let pick = |values: &[Value]| -> Vec<Value> {
            values
                .iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(v, _)| v.clone())
                .collect()
        };
        let index = self.index.as_ref().map(|index| Index {
            name: index.name.clone(),
            keys: index
                .keys
                .iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(k, _)| *k)
                .collect(),
        });
        Frame {
            index,
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: pick(&c.values),
                })
                .collect(),
            len: mask.iter().take(self.len).filter(|k| **k).count(),
        }
    }

    /// Appends the rows of `other`, matching columns by name. Columns only
    /// present on one side are filled with [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Fails if exactly one side is indexed or a key would be duplicated.
    pub fn append(&mut self, other: Frame) -> Result<()> {
        match (&mut self.index, other.index) {
            (None, None) => {}
            (Some(mine), Some(theirs)) => {
                let existing: HashSet<i64> = mine.keys.iter().copied().collect();
                if let Some(dup) = theirs.keys.iter().find(|k| existing.contains(k)) {
                    return Err(Error::SchemaViolation(format!(
                        "duplicate {} {dup}",
                        mine.name
                    )));
                }
                mine.keys.extend(theirs.keys);
            }
            _ => {
                return Err(Error::SchemaViolation(
                    "cannot append indexed and unindexed frames".into(),
                ));
            }
        }
        let added = other.len;
        let mut incoming: HashMap<String, Vec<Value>> = other
            .columns
            .into_iter()
            .map(|c| (c.name, c.values))
            .collect();
        for column in &mut self.columns {
            match incoming.remove(&column.name) {
                Some(values) => column.values.extend(values),
                None => column.values.extend(std::iter::repeat_n(Value::Null, added)),
            }
        }
        let old_len = self.len;
        for (name, values) in incoming {
            let mut filled = vec![Value::Null; old_len];
            filled.extend(values);
            self.columns.push(Column { name, values: filled });
        }
        self.len = old_len + added;
        Ok(())
    }
}
