//! Insertion of new notes into a normalized notes table.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use tracing::debug;

use crate::checksum::guid64;
use crate::columns::TableKind;
use crate::error::{Error, Result};
use crate::ids::IdResolver;
use crate::stamp::USN_NEEDS_SYNC;
use crate::table::{AnkiTable, FieldsFormat};
use crate::value::Value;

/// Field contents of the notes to add.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteFields {
    /// One row per note, each holding every field of the model in order.
    Positional(Vec<Vec<String>>),
    /// Field name → one value per note. Fields left out are empty.
    Named(BTreeMap<String, Vec<String>>),
}

/// A batch of notes of one model.
///
/// Everything except the model and the fields is optional and filled in
/// with fresh ids, GUIDs, the current time and the needs-sync usn.
///
/// # Examples
///
/// ```
/// use ankiframe_core::{NoteBatch, NoteFields};
///
/// let batch = NoteBatch::new(
///     "Basic",
///     NoteFields::Positional(vec![vec!["front".into(), "back".into()]]),
/// )
/// .with_tags(vec![vec!["new".into()]]);
/// assert_eq!(batch.model, "Basic");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NoteBatch {
    pub model: String,
    pub fields: NoteFields,
    pub tags: Option<Vec<Vec<String>>>,
    pub nids: Option<Vec<i64>>,
    pub guids: Option<Vec<String>>,
    pub mods: Option<Vec<i64>>,
    pub usn: i64,
}

impl NoteBatch {
    pub fn new(model: impl Into<String>, fields: NoteFields) -> Self {
        Self {
            model: model.into(),
            fields,
            tags: None,
            nids: None,
            guids: None,
            mods: None,
            usn: USN_NEEDS_SYNC,
        }
    }

    pub fn with_tags(mut self, tags: Vec<Vec<String>>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_nids(mut self, nids: Vec<i64>) -> Self {
        self.nids = Some(nids);
        self
    }

    pub fn with_guids(mut self, guids: Vec<String>) -> Self {
        self.guids = Some(guids);
        self
    }

    pub fn with_mods(mut self, mods: Vec<i64>) -> Self {
        self.mods = Some(mods);
        self
    }

    pub fn with_usn(mut self, usn: i64) -> Self {
        self.usn = usn;
        self
    }
}

/// Fails unless an optional per-note list has one entry per note.
fn check_count<T>(what: &str, values: &Option<Vec<T>>, notes: usize) -> Result<()> {
    match values {
        Some(values) if values.len() != notes => Err(Error::SchemaViolation(format!(
            "got {} {what} for {notes} notes",
            values.len()
        ))),
        _ => Ok(()),
    }
}

/// Millisecond timestamp, bumped past every id in `used`.
fn next_id(used: &HashSet<i64>) -> i64 {
    let mut id = Utc::now().timestamp_millis();
    while used.contains(&id) {
        id += 1;
    }
    id
}

impl AnkiTable {
    /// Appends notes of one model and returns their ids.
    ///
    /// Works with fields as a list or as columns. The table is left
    /// untouched if any check fails.
    ///
    /// # Errors
    ///
    /// - [`Error::ResolutionFailure`] if the model does not exist.
    /// - [`Error::SchemaViolation`] for wrong field counts, unknown field
    ///   names, inconsistent numbers of notes, or note ids / GUIDs that
    ///   are duplicated or already present.
    /// - [`Error::FormatState`] on anything but the notes table.
    pub fn add_notes(&mut self, ids: &IdResolver<'_>, batch: NoteBatch) -> Result<Vec<i64>> {
        self.check_ours()?;
        self.check_fields_settled()?;
        if self.kind() != TableKind::Notes {
            return Err(Error::FormatState(format!(
                "add_notes() is not supported on the {} table, only on notes",
                self.kind()
            )));
        }
        let mid = ids.model_id(&batch.model)?;
        let field_names = ids.model_fields(mid)?;
        let rows = Self::field_rows(&batch.model, field_names, batch.fields)?;
        let count = rows.len();

        check_count("tag lists", &batch.tags, count)?;
        check_count("note ids", &batch.nids, count)?;
        check_count("GUIDs", &batch.guids, count)?;
        check_count("modification times", &batch.mods, count)?;

        let existing = self.frame.key_set();
        let nids = match batch.nids {
            Some(nids) => {
                let mut present: Vec<i64> = nids.iter().copied().filter(|n| existing.contains(n)).collect();
                if !present.is_empty() {
                    present.sort_unstable();
                    return Err(Error::SchemaViolation(format!(
                        "note ids already present: {present:?}"
                    )));
                }
                if nids.iter().collect::<HashSet<_>>().len() < nids.len() {
                    return Err(Error::SchemaViolation("note ids contain duplicates".into()));
                }
                nids
            }
            None => {
                let mut used = existing;
                (0..count)
                    .map(|_| {
                        let id = next_id(&used);
                        used.insert(id);
                        id
                    })
                    .collect()
            }
        };

        let guids = batch
            .guids
            .unwrap_or_else(|| (0..count).map(|_| guid64()).collect());
        let known: HashSet<&str> = self
            .frame
            .require("nguid")?
            .iter()
            .filter_map(Value::as_text)
            .collect();
        let mut clashing: Vec<&str> = guids
            .iter()
            .map(String::as_str)
            .filter(|g| known.contains(g))
            .collect();
        if !clashing.is_empty() {
            clashing.sort_unstable();
            return Err(Error::SchemaViolation(format!(
                "GUIDs already present: {}",
                clashing.join(", ")
            )));
        }
        if guids.iter().collect::<HashSet<_>>().len() < guids.len() {
            return Err(Error::SchemaViolation("GUIDs contain duplicates".into()));
        }

        let now = Utc::now().timestamp();
        let mods = batch.mods.unwrap_or_else(|| vec![now; count]);
        let tags = batch.tags.unwrap_or_else(|| vec![Vec::new(); count]);
        let fields_format = self.meta.fields;
        let field_columns: Vec<String> = field_names.iter().map(|f| self.field_column(f)).collect();

        let mut frame = self.frame.clone();
        if fields_format == Some(FieldsFormat::Columns) {
            for column in &field_columns {
                frame.ensure_column(column, Value::from(""));
            }
        }
        let prefix = self.meta.fields_prefix.clone();
        let names: Vec<String> = frame.column_names().map(str::to_string).collect();

        for (i, fields) in rows.into_iter().enumerate() {
            let row = names
                .iter()
                .map(|name| match name.as_str() {
                    "nguid" => Value::from(guids[i].as_str()),
                    "nmodel" => Value::from(batch.model.as_str()),
                    "nmod" => Value::Int(mods[i]),
                    "nusn" => Value::Int(batch.usn),
                    "ntags" => Value::List(tags[i].clone()),
                    "nflds" if fields_format == Some(FieldsFormat::List) => Value::List(fields.clone()),
                    column if fields_format == Some(FieldsFormat::Columns) && column.starts_with(&prefix) => {
                        match field_columns.iter().position(|c| c == column) {
                            Some(at) => Value::from(fields[at].as_str()),
                            None => Value::from(""),
                        }
                    }
                    _ => Value::Null,
                })
                .collect();
            frame.push_keyed_row(nids[i], row)?;
        }

        debug!(model = %batch.model, notes = count, "added notes");
        self.frame = frame;
        Ok(nids)
    }

    /// Adds a single note. `fields` is one positional row or a name →
    /// value map.
    pub fn add_note(
        &mut self,
        ids: &IdResolver<'_>,
        model: &str,
        fields: NoteFields,
        tags: Vec<String>,
    ) -> Result<i64> {
        let batch = NoteBatch::new(model, fields).with_tags(vec![tags]);
        let nids = self.add_notes(ids, batch)?;
        match nids.as_slice() {
            [nid] => Ok(*nid),
            _ => Err(Error::SchemaViolation(format!(
                "add_note takes exactly one note, got {}",
                nids.len()
            ))),
        }
    }

    /// Turns either field layout into one ordered row per note.
    fn field_rows(model: &str, names: &[String], fields: NoteFields) -> Result<Vec<Vec<String>>> {
        match fields {
            NoteFields::Positional(rows) => {
                if let Some(row) = rows.iter().find(|row| row.len() != names.len()) {
                    return Err(Error::SchemaViolation(format!(
                        "model '{model}' has {} fields but {} were supplied",
                        names.len(),
                        row.len()
                    )));
                }
                Ok(rows)
            }
            NoteFields::Named(mut by_name) => {
                let unknown: Vec<&str> = by_name
                    .keys()
                    .map(String::as_str)
                    .filter(|name| !names.iter().any(|n| n == name))
                    .collect();
                if !unknown.is_empty() {
                    return Err(Error::SchemaViolation(format!(
                        "unknown fields for model '{model}': {}",
                        unknown.join(", ")
                    )));
                }
                let lengths: HashSet<usize> = by_name.values().map(Vec::len).collect();
                let count = match lengths.len() {
                    1 => lengths.into_iter().next().unwrap_or_default(),
                    0 => {
                        return Err(Error::SchemaViolation("no field values supplied".into()));
                    }
                    _ => {
                        let mut lengths: Vec<usize> = lengths.into_iter().collect();
                        lengths.sort_unstable();
                        return Err(Error::SchemaViolation(format!(
                            "inconsistent number of notes: {lengths:?}"
                        )));
                    }
                };
                let mut columns: Vec<Vec<String>> = names
                    .iter()
                    .map(|name| by_name.remove(name).unwrap_or_else(|| vec![String::new(); count]))
                    .collect();
                Ok((0..count)
                    .map(|i| columns.iter_mut().map(|c| std::mem::take(&mut c[i])).collect())
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_rows_checked_against_model() {
        let model = names(&["Front", "Back"]);
        let ok = AnkiTable::field_rows("Basic", &model, NoteFields::Positional(vec![names(&["a", "b"])]));
        assert_eq!(ok.unwrap(), vec![names(&["a", "b"])]);

        let err = AnkiTable::field_rows("Basic", &model, NoteFields::Positional(vec![names(&["a"])]));
        assert!(matches!(err, Err(Error::SchemaViolation(_))));
    }

    #[test]
    fn test_named_fields_fill_missing_with_empty() {
        let model = names(&["Front", "Back", "Extra"]);
        let mut by_name = BTreeMap::new();
        by_name.insert("Back".to_string(), names(&["b1", "b2"]));
        by_name.insert("Front".to_string(), names(&["f1", "f2"]));
        let rows = AnkiTable::field_rows("Basic", &model, NoteFields::Named(by_name)).unwrap();
        assert_eq!(rows, vec![names(&["f1", "b1", ""]), names(&["f2", "b2", ""])]);
    }

    #[test]
    fn test_named_fields_reject_unknown_and_ragged() {
        let model = names(&["Front", "Back"]);
        let mut unknown = BTreeMap::new();
        unknown.insert("Side".to_string(), names(&["x"]));
        assert!(matches!(
            AnkiTable::field_rows("Basic", &model, NoteFields::Named(unknown)),
            Err(Error::SchemaViolation(msg)) if msg.contains("Side")
        ));

        let mut ragged = BTreeMap::new();
        ragged.insert("Front".to_string(), names(&["a", "b"]));
        ragged.insert("Back".to_string(), names(&["a"]));
        assert!(matches!(
            AnkiTable::field_rows("Basic", &model, NoteFields::Named(ragged)),
            Err(Error::SchemaViolation(msg)) if msg.contains("inconsistent")
        ));
    }

    #[test]
    fn test_next_id_skips_used() {
        let now = Utc::now().timestamp_millis();
        let used: HashSet<i64> = (now..now + 1000).collect();
        assert!(next_id(&used) >= now + 1000);
    }

    #[test]
    fn test_check_count() {
        assert!(check_count::<i64>("ids", &None, 3).is_ok());
        assert!(check_count("ids", &Some(vec![1, 2]), 2).is_ok());
        assert!(check_count("ids", &Some(vec![1]), 2).is_err());
    }
}
