//! Change detection against a stored snapshot and the sync stamps written
//! for changed rows.
//!
//! All comparisons are keyed by the promoted index and look only at the
//! columns both tables share. Without an explicit reference the table is
//! compared to a fresh load of the same table from storage. The reference
//! is brought to the table's field format first, so exploded field columns
//! are compared too.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use tracing::debug;

use crate::checksum::guid64;
use crate::columns::TableKind;
use crate::error::Result;
use crate::ids::IdResolver;
use crate::table::{AnkiTable, FieldsFormat};
use crate::value::Value;

/// Update sequence number marking a row as needing upload.
pub const USN_NEEDS_SYNC: i64 = -1;

impl AnkiTable {
    /// Flags rows that are new or differ from `reference` in any shared
    /// column.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # fn demo(collection: &dyn ankiframe_core::Collection) -> ankiframe_core::Result<()> {
    /// use ankiframe_core::{AnkiTable, IdResolver, TableKind};
    ///
    /// let ids = IdResolver::new(collection);
    /// let mut notes = AnkiTable::load(&ids, TableKind::Notes)?;
    /// notes.add_tag(&["reviewed"])?;
    /// let changed = notes.was_modified(&ids, None)?;
    /// println!("{} notes changed", changed.iter().filter(|c| **c).count());
    /// # Ok(())
    /// # }
    /// ```
    pub fn was_modified(
        &self,
        ids: &IdResolver<'_>,
        reference: Option<&AnkiTable>,
    ) -> Result<Vec<bool>> {
        self.check_ours()?;
        let reference = self.comparable_reference(ids, reference)?;
        self.modified_rows(&reference)
    }

    /// Flags rows whose key is not present in `reference`, or in storage
    /// when no reference is given.
    pub fn was_added(&self, ids: &IdResolver<'_>, reference: Option<&AnkiTable>) -> Result<Vec<bool>> {
        self.check_ours()?;
        let known = self.reference_keys(ids, reference)?;
        Ok(self.row_keys().iter().map(|key| !known.contains(key)).collect())
    }

    /// Sorted keys present in `reference` (or storage) but missing here.
    pub fn was_deleted(&self, ids: &IdResolver<'_>, reference: Option<&AnkiTable>) -> Result<Vec<i64>> {
        self.check_ours()?;
        let mine = self.frame.key_set();
        let mut deleted: Vec<i64> = self
            .reference_keys(ids, reference)?
            .into_iter()
            .filter(|key| !mine.contains(key))
            .collect();
        deleted.sort_unstable();
        Ok(deleted)
    }

    /// For every modified row that also exists in the reference, the
    /// shared columns whose values differ. Keyed by row id.
    pub fn modified_columns(
        &self,
        ids: &IdResolver<'_>,
        reference: Option<&AnkiTable>,
    ) -> Result<BTreeMap<i64, Vec<String>>> {
        self.check_ours()?;
        let reference = self.comparable_reference(ids, reference)?;

        let positions = reference.frame.key_positions();
        let shared = self.shared_columns(&reference);
        let mut changes = BTreeMap::new();
        for (pos, key) in self.row_keys().iter().enumerate() {
            let Some(&other) = positions.get(key) else {
                continue;
            };
            let differing: Vec<String> = shared
                .iter()
                .filter(|(_, mine, theirs)| mine[pos] != theirs[other])
                .map(|(name, _, _)| name.to_string())
                .collect();
            if !differing.is_empty() {
                changes.insert(*key, differing);
            }
        }
        Ok(changes)
    }

    /// Marks modified rows as needing sync, bumps their modification time
    /// and gives notes without a GUID a fresh one.
    pub(crate) fn stamp(&mut self, reference: &AnkiTable) -> Result<()> {
        let kind = self.kind();
        let modified = self.modified_rows(reference)?;
        let count = modified.iter().filter(|m| **m).count();
        debug!(table = %kind, rows = count, "stamping modified rows");

        if count > 0 {
            let usn = self.frame.require_mut(kind.usn_column())?;
            for (value, _) in usn.iter_mut().zip(&modified).filter(|(_, m)| **m) {
                *value = Value::Int(USN_NEEDS_SYNC);
            }
            if let Some(column) = kind.mod_column() {
                let now = Utc::now().timestamp();
                let stamps = self.frame.require_mut(column)?;
                for (value, _) in stamps.iter_mut().zip(&modified).filter(|(_, m)| **m) {
                    *value = Value::Int(now);
                }
            }
        }

        if kind == TableKind::Notes {
            for guid in self.frame.require_mut("nguid")?.iter_mut() {
                if !guid.is_truthy() {
                    *guid = Value::Text(guid64());
                }
            }
        }
        Ok(())
    }

    /// `reference` (or a fresh load) in the same field format and with the
    /// same field column prefix as `self`.
    fn comparable_reference<'r>(
        &self,
        ids: &IdResolver<'_>,
        reference: Option<&'r AnkiTable>,
    ) -> Result<Cow<'r, AnkiTable>> {
        let mut reference = match reference {
            Some(reference) => Cow::Borrowed(reference),
            None => Cow::Owned(AnkiTable::load(ids, self.kind())?),
        };
        reference.check_ours()?;
        if self.kind() != TableKind::Notes {
            return Ok(reference);
        }
        self.check_fields_settled()?;

        let prefix = &self.meta.fields_prefix;
        match (self.fields_format(), reference.fields_format()) {
            (Some(FieldsFormat::Columns), Some(FieldsFormat::Columns))
                if reference.meta.fields_prefix != *prefix =>
            {
                let owned = reference.to_mut();
                owned.fields_as_list(ids, false)?;
                owned.set_fields_prefix(prefix.clone());
                owned.fields_as_columns(ids, false)?;
            }
            (Some(FieldsFormat::Columns), Some(FieldsFormat::List)) => {
                let owned = reference.to_mut();
                owned.set_fields_prefix(prefix.clone());
                owned.fields_as_columns(ids, false)?;
            }
            (Some(FieldsFormat::List), Some(FieldsFormat::Columns)) => {
                reference.to_mut().fields_as_list(ids, false)?;
            }
            _ => {}
        }
        Ok(reference)
    }

    /// Per-row change flags without the format check.
    pub(crate) fn modified_rows(&self, reference: &AnkiTable) -> Result<Vec<bool>> {
        reference.check_ours()?;
        let positions = reference.frame.key_positions();
        let shared = self.shared_columns(reference);
        Ok(self
            .row_keys()
            .iter()
            .enumerate()
            .map(|(pos, key)| match positions.get(key) {
                Some(&other) => shared.iter().any(|(_, mine, theirs)| mine[pos] != theirs[other]),
                None => true,
            })
            .collect())
    }

    /// `(name, mine, theirs)` for every column present in both tables.
    fn shared_columns<'t>(&'t self, reference: &'t AnkiTable) -> Vec<(&'t str, &'t [Value], &'t [Value])> {
        self.frame
            .columns()
            .iter()
            .filter_map(|column| {
                reference
                    .frame
                    .column(&column.name)
                    .map(|theirs| (column.name.as_str(), column.values.as_slice(), theirs))
            })
            .collect()
    }

    pub(crate) fn row_keys(&self) -> &[i64] {
        self.frame.keys().unwrap_or_default()
    }

    fn reference_keys(
        &self,
        ids: &IdResolver<'_>,
        reference: Option<&AnkiTable>,
    ) -> Result<HashSet<i64>> {
        match reference {
            Some(reference) => Ok(reference.frame.key_set()),
            None => Ok(ids
                .collection()
                .table_ids(self.kind())?
                .into_iter()
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn revs(rows: &[(i64, i64, i64)]) -> AnkiTable {
        let rows = rows
            .iter()
            .map(|(rid, usn, ease)| vec![Value::Int(*rid), Value::Int(*usn), Value::Int(*ease)])
            .collect();
        let mut frame = Frame::from_rows(["rid", "rusn", "rease"], rows).unwrap();
        frame.set_index("rid").unwrap();
        AnkiTable::ours(TableKind::Revs, frame)
    }

    #[test]
    fn test_modified_rows_flags_changed_and_new() {
        let reference = revs(&[(1, 5, 3), (2, 5, 3), (3, 5, 3)]);
        let current = revs(&[(1, 5, 3), (2, 5, 4), (4, 5, 1)]);
        assert_eq!(
            current.modified_rows(&reference).unwrap(),
            vec![false, true, true]
        );
    }

    #[test]
    fn test_only_shared_columns_compared() {
        let reference = revs(&[(1, 5, 3)]);
        let mut current = reference.clone();
        current
            .frame
            .set_column("extra", vec![Value::from("x")])
            .unwrap();
        assert_eq!(current.modified_rows(&reference).unwrap(), vec![false]);
    }

    #[test]
    fn test_stamp_sets_usn_on_modified_rows_only() {
        let reference = revs(&[(1, 5, 3), (2, 5, 3)]);
        let mut current = revs(&[(1, 5, 3), (2, 5, 1)]);
        current.stamp(&reference).unwrap();
        let usn = current.frame().column("rusn").unwrap();
        assert_eq!(usn, &[Value::Int(5), Value::Int(USN_NEEDS_SYNC)]);
    }

    #[test]
    fn test_stamp_fills_missing_guids_and_mod() {
        let mut frame = Frame::from_rows(
            ["nid", "nguid", "nmod", "nusn"],
            vec![
                vec![Value::Int(1), Value::from("keep"), Value::Int(10), Value::Int(3)],
                vec![Value::Int(2), Value::from(""), Value::Int(10), Value::Int(3)],
            ],
        )
        .unwrap();
        frame.set_index("nid").unwrap();
        let reference = AnkiTable::ours(TableKind::Notes, frame.clone());
        let mut current = AnkiTable::ours(TableKind::Notes, frame);
        current.frame_mut().column_mut("nusn").unwrap()[0] = Value::Int(0);
        current.stamp(&reference).unwrap();

        let guids = current.frame().column("nguid").unwrap();
        assert_eq!(guids[0], Value::from("keep"));
        assert!(guids[1].is_truthy());
        let mods = current.frame().column("nmod").unwrap();
        assert!(mods[0].as_int().unwrap() > 10);
        assert_eq!(mods[1], Value::Int(10));
    }
}
