//! Conversion between SQLite rows and [`ankiframe_core`] values.
//!
//! Cells map one to one onto SQLite storage classes. Models and decks live
//! as JSON objects in the `col` row, keyed by their id rendered as a
//! string; only the keys needed here are typed, everything else is carried
//! through untouched.

use std::collections::HashMap;

use ankiframe_core::{Deck, Model, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{Result, SqliteError};

/// Converts a cell to an SQL parameter.
///
/// # Errors
///
/// Returns [`SqliteError::ConversionError`] for list cells, which only
/// exist in the convenience format.
pub(crate) fn to_sql(value: &Value) -> Result<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Int(i) => Ok(SqlValue::Integer(*i)),
        Value::Real(f) => Ok(SqlValue::Real(*f)),
        Value::Text(s) => Ok(SqlValue::Text(s.clone())),
        Value::List(items) => Err(SqliteError::ConversionError(format!(
            "list value {items:?} cannot be stored; convert the table to raw first"
        ))),
    }
}

/// Converts a column read from SQLite to a cell.
pub(crate) fn from_sql(value: ValueRef<'_>) -> Result<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::Int(i)),
        ValueRef::Real(f) => Ok(Value::Real(f)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Value::Text(s.to_string()))
            .map_err(|e| SqliteError::ConversionError(format!("invalid UTF-8 text: {e}"))),
        ValueRef::Blob(_) => Err(SqliteError::ConversionError(
            "blob columns are not supported".into(),
        )),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FieldEntry {
    pub name: String,
    pub ord: i64,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ModelEntry {
    pub id: i64,
    pub name: String,
    pub flds: Vec<FieldEntry>,
    #[serde(default)]
    pub sortf: usize,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DeckEntry {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl From<ModelEntry> for Model {
    fn from(mut entry: ModelEntry) -> Self {
        entry.flds.sort_by_key(|f| f.ord);
        Model {
            id: entry.id,
            name: entry.name,
            fields: entry.flds.into_iter().map(|f| f.name).collect(),
            sort_field: entry.sortf,
        }
    }
}

impl From<DeckEntry> for Deck {
    fn from(entry: DeckEntry) -> Self {
        Deck {
            id: entry.id,
            name: entry.name,
        }
    }
}

/// Parses `col.models` into models sorted by id.
pub(crate) fn parse_models(json: &str) -> Result<Vec<Model>> {
    let entries: HashMap<String, ModelEntry> = serde_json::from_str(json)?;
    let mut models: Vec<Model> = entries.into_values().map(Model::from).collect();
    models.sort_by_key(|m| m.id);
    Ok(models)
}

/// Parses `col.decks` into decks sorted by id.
pub(crate) fn parse_decks(json: &str) -> Result<Vec<Deck>> {
    let entries: HashMap<String, DeckEntry> = serde_json::from_str(json)?;
    let mut decks: Vec<Deck> = entries.into_values().map(Deck::from).collect();
    decks.sort_by_key(|d| d.id);
    Ok(decks)
}
