//! Explosion of the note field list into one column per field name, and
//! back.
//!
//! Field names come from each row's model. A field name shared by two
//! models maps to a single column, so columns are only dropped once every
//! model has been collapsed.

use std::collections::HashSet;

use tracing::debug;

use crate::columns::TableKind;
use crate::error::{Error, Result};
use crate::ids::IdResolver;
use crate::table::{AnkiTable, FieldsFormat};
use crate::value::Value;

const FIELDS_COLUMN: &str = "nflds";

/// Model id of notes whose model could not be determined.
const NO_MODEL: i64 = 0;

fn distinct(mids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    mids.iter().copied().filter(|mid| seen.insert(*mid)).collect()
}

impl AnkiTable {
    /// Replaces the `nflds` list column by one text column per field,
    /// named `fields_prefix + field name`.
    ///
    /// Rows of other models get an empty string in columns they do not
    /// have.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FormatState`] on a raw table or after an
    /// interrupted field conversion (unless `force`), and
    /// [`Error::SchemaViolation`] when a note holds a different number of
    /// fields than its model declares.
    pub fn fields_as_columns(&mut self, ids: &IdResolver<'_>, force: bool) -> Result<()> {
        self.check_fields_table()?;
        self.fields_transition(FieldsFormat::Columns, force, |work| work.explode_fields(ids))
    }

    /// Reverses [`fields_as_columns`](Self::fields_as_columns).
    pub fn fields_as_list(&mut self, ids: &IdResolver<'_>, force: bool) -> Result<()> {
        self.check_fields_table()?;
        self.fields_transition(FieldsFormat::List, force, |work| work.collapse_fields(ids))
    }

    pub fn with_fields_as_columns(&self, ids: &IdResolver<'_>, force: bool) -> Result<Self> {
        let mut copy = self.clone();
        copy.fields_as_columns(ids, force)?;
        Ok(copy)
    }

    pub fn with_fields_as_list(&self, ids: &IdResolver<'_>, force: bool) -> Result<Self> {
        let mut copy = self.clone();
        copy.fields_as_list(ids, force)?;
        Ok(copy)
    }

    fn check_fields_table(&self) -> Result<()> {
        self.check_ours()?;
        if self.kind() != TableKind::Notes {
            return Err(Error::FormatState(format!(
                "field format changes are not supported on the {} table; only notes have fields",
                self.kind()
            )));
        }
        Ok(())
    }

    /// Column name of field `name` in the exploded layout.
    pub fn field_column(&self, name: &str) -> String {
        format!("{}{name}", self.meta.fields_prefix)
    }

    pub(crate) fn explode_fields(&mut self, ids: &IdResolver<'_>) -> Result<()> {
        let mids = self.mid_unchecked(ids)?;
        let packed = self
            .frame
            .drop_column(FIELDS_COLUMN)
            .ok_or_else(|| Error::MissingColumn(FIELDS_COLUMN.into()))?;

        for mid in distinct(&mids) {
            if mid == NO_MODEL {
                continue;
            }
            let names = ids.model_fields(mid)?;
            debug!(mid, fields = names.len(), "exploding fields");
            let columns: Vec<String> = names.iter().map(|name| self.field_column(name)).collect();
            for column in &columns {
                self.frame.ensure_column(column, Value::from(""));
            }

            for (pos, _) in mids.iter().enumerate().filter(|(_, m)| **m == mid) {
                let values = match &packed[pos] {
                    Value::List(values) => values.as_slice(),
                    Value::Null => &[],
                    other => {
                        return Err(Error::SchemaViolation(format!(
                            "note fields must be a list, got {other:?}"
                        )));
                    }
                };
                if values.len() != names.len() {
                    return Err(Error::SchemaViolation(format!(
                        "note has {} fields but model {mid} declares {}",
                        values.len(),
                        names.len()
                    )));
                }
                for (column, value) in columns.iter().zip(values) {
                    self.frame.require_mut(column)?[pos] = Value::from(value.as_str());
                }
            }
        }
        Ok(())
    }

    pub(crate) fn collapse_fields(&mut self, ids: &IdResolver<'_>) -> Result<()> {
        let mids = self.mid_unchecked(ids)?;
        let mut packed = vec![Value::List(Vec::new()); mids.len()];
        let mut exploded: Vec<String> = Vec::new();

        for mid in distinct(&mids) {
            if mid == NO_MODEL {
                continue;
            }
            let columns: Vec<String> = ids
                .model_fields(mid)?
                .iter()
                .map(|name| self.field_column(name))
                .collect();
            for column in &columns {
                self.frame.require(column)?;
            }
            for (pos, _) in mids.iter().enumerate().filter(|(_, m)| **m == mid) {
                let values = columns
                    .iter()
                    .map(|column| {
                        self.frame
                            .value(pos, column)
                            .map(Value::to_string)
                            .unwrap_or_default()
                    })
                    .collect();
                packed[pos] = Value::List(values);
            }
            for column in columns {
                if !exploded.contains(&column) {
                    exploded.push(column);
                }
            }
        }

        // Put the list back where the first field column was.
        let at = self
            .frame
            .column_names()
            .position(|name| exploded.iter().any(|c| c == name))
            .unwrap_or(self.frame.width());
        self.frame
            .retain_columns(|name| !exploded.iter().any(|c| c == name));
        self.frame.insert_column(at, FIELDS_COLUMN, packed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_keeps_first_seen_order() {
        assert_eq!(distinct(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert!(distinct(&[]).is_empty());
    }

    #[test]
    fn test_fields_need_normalized_notes() {
        let table = AnkiTable::empty(TableKind::Notes);
        assert!(matches!(
            table.check_fields_table(),
            Err(Error::FormatState(_))
        ));
    }

    #[test]
    fn test_field_column_uses_prefix() {
        let mut table = AnkiTable::empty(TableKind::Notes);
        assert_eq!(table.field_column("Front"), "nfld_Front");
        table.set_fields_prefix("f.");
        assert_eq!(table.field_column("Front"), "f.Front");
    }
}
