//! Left joins of the notes or cards table into another table.
//!
//! Joining is by note id ([`AnkiTable::merge_notes`]) or card id
//! ([`AnkiTable::merge_cards`]). Incoming columns whose name is already
//! taken are prefixed, so that for example the cards table's `nid` stays
//! distinguishable after merging.
//!
//! # Example
//!
//! ```no_run
//! # fn demo(collection: &dyn ankiframe_core::Collection) -> ankiframe_core::Result<()> {
//! use ankiframe_core::{AnkiTable, IdResolver, MergeOptions, TableKind};
//!
//! let ids = IdResolver::new(collection);
//! let mut revs = AnkiTable::load(&ids, TableKind::Revs)?;
//! revs.merge_cards(&ids, &MergeOptions::cards())?;
//! revs.merge_notes(&ids, &MergeOptions::notes())?;
//! println!("review tags: {:?}", revs.list_tags()?);
//! # Ok(())
//! # }
//! ```

use tracing::debug;

use crate::columns::TableKind;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::ids::IdResolver;
use crate::table::AnkiTable;
use crate::value::Value;

/// Column selection and naming for a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Only merge these columns (default: all).
    pub columns: Option<Vec<String>>,
    /// Never merge these columns.
    pub drop_columns: Vec<String>,
    /// Prefix for incoming column names.
    pub prefix: String,
    /// Only prefix names that would otherwise clash.
    pub prefix_clash_only: bool,
}

impl MergeOptions {
    /// Defaults for merging the notes table (prefix `n`).
    pub fn notes() -> Self {
        Self::with_prefix("n")
    }

    /// Defaults for merging the cards table (prefix `c`).
    pub fn cards() -> Self {
        Self::with_prefix("c")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            columns: None,
            drop_columns: Vec::new(),
            prefix: prefix.into(),
            prefix_clash_only: true,
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_drop_columns(mut self, columns: Vec<String>) -> Self {
        self.drop_columns = columns;
        self
    }

    fn wants(&self, column: &str) -> bool {
        let selected = self
            .columns
            .as_ref()
            .is_none_or(|columns| columns.iter().any(|c| c == column));
        selected && !self.drop_columns.iter().any(|c| c == column)
    }
}

impl AnkiTable {
    /// Merges the notes table into a cards or revs table by note id.
    ///
    /// A revs table first gets an `nid` column derived through its cards.
    pub fn merge_notes(&mut self, ids: &IdResolver<'_>, options: &MergeOptions) -> Result<()> {
        self.check_ours()?;
        match self.kind() {
            TableKind::Notes => {
                return Err(Error::FormatState(
                    "merge_notes() is not supported on the notes table itself".into(),
                ));
            }
            TableKind::Revs if !self.frame.has_column("nid") => {
                let nids = self.nid(ids)?.into_iter().map(Value::Int).collect();
                self.frame.set_column("nid", nids)?;
            }
            _ => {}
        }
        let keys = self.required_keys("nid")?;
        let notes = AnkiTable::load(ids, TableKind::Notes)?;
        self.join(&keys, notes.frame(), options)
    }

    /// Merges the cards table into a revs table by card id.
    pub fn merge_cards(&mut self, ids: &IdResolver<'_>, options: &MergeOptions) -> Result<()> {
        self.check_ours()?;
        match self.kind() {
            TableKind::Cards => {
                return Err(Error::FormatState(
                    "merge_cards() is not supported on the cards table itself".into(),
                ));
            }
            TableKind::Notes => {
                return Err(Error::FormatState(
                    "merge_cards() is not supported on the notes table: a note can have several cards"
                        .into(),
                ));
            }
            TableKind::Revs => {}
        }
        let keys = self.required_keys("cid")?;
        let cards = AnkiTable::load(ids, TableKind::Cards)?;
        self.join(&keys, cards.frame(), options)
    }

    fn required_keys(&self, column: &str) -> Result<Vec<Option<i64>>> {
        Ok(self.frame.require(column)?.iter().map(Value::as_int).collect())
    }

    /// Adds the wanted columns of `other`, matched on its index.
    fn join(&mut self, keys: &[Option<i64>], other: &Frame, options: &MergeOptions) -> Result<()> {
        let positions = other.key_positions();
        let index_name = self.frame.index().map(|i| i.name.clone());
        let mut added = 0;
        for column in other.columns().iter().filter(|c| options.wants(&c.name)) {
            let clashes = self.frame.has_column(&column.name)
                || index_name.as_deref() == Some(column.name.as_str());
            let name = if clashes || !options.prefix_clash_only {
                format!("{}{}", options.prefix, column.name)
            } else {
                column.name.clone()
            };
            let values = keys
                .iter()
                .map(|key| {
                    key.and_then(|k| positions.get(&k))
                        .map(|&pos| column.values[pos].clone())
                        .unwrap_or_default()
                })
                .collect();
            self.frame.set_column(&name, values)?;
            added += 1;
        }
        debug!(table = %self.kind(), columns = added, "merged columns");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revs_with_cids(cids: &[i64]) -> AnkiTable {
        let rows = cids
            .iter()
            .enumerate()
            .map(|(i, cid)| vec![Value::Int(100 + i as i64), Value::Int(*cid), Value::Int(-1)])
            .collect();
        let mut frame = Frame::from_rows(["rid", "cid", "rusn"], rows).unwrap();
        frame.set_index("rid").unwrap();
        AnkiTable::ours(TableKind::Revs, frame)
    }

    fn cards() -> Frame {
        let mut frame = Frame::from_rows(
            ["cid", "cusn", "cdeck"],
            vec![
                vec![Value::Int(1), Value::Int(4), Value::from("Default")],
                vec![Value::Int(2), Value::Int(5), Value::from("Verbs")],
            ],
        )
        .unwrap();
        frame.set_index("cid").unwrap();
        frame
    }

    #[test]
    fn test_join_left_fills_missing_with_null() {
        let mut revs = revs_with_cids(&[2, 9]);
        let keys = revs.required_keys("cid").unwrap();
        revs.join(&keys, &cards(), &MergeOptions::cards()).unwrap();
        let decks = revs.frame().column("cdeck").unwrap();
        assert_eq!(decks, &[Value::from("Verbs"), Value::Null]);
    }

    #[test]
    fn test_join_prefixes_clashes_only() {
        let mut revs = revs_with_cids(&[1]);
        revs.frame.set_column("cdeck", vec![Value::from("old")]).unwrap();
        let keys = revs.required_keys("cid").unwrap();
        revs.join(&keys, &cards(), &MergeOptions::cards()).unwrap();
        assert_eq!(revs.frame().column("cdeck").unwrap()[0], Value::from("old"));
        assert_eq!(revs.frame().column("ccdeck").unwrap()[0], Value::from("Default"));
        assert_eq!(revs.frame().column("cusn").unwrap()[0], Value::Int(4));
    }

    #[test]
    fn test_join_respects_column_selection() {
        let mut revs = revs_with_cids(&[1]);
        let keys = revs.required_keys("cid").unwrap();
        let options = MergeOptions::with_prefix("x_")
            .with_columns(vec!["cusn".into(), "cdeck".into()])
            .with_drop_columns(vec!["cdeck".into()]);
        revs.join(&keys, &cards(), &options).unwrap();
        assert!(revs.frame().has_column("cusn"));
        assert!(!revs.frame().has_column("cdeck"));
    }
}
