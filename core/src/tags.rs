//! Tag queries and edits on the list-valued `ntags` column.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::table::AnkiTable;
use crate::value::Value;

const TAGS_COLUMN: &str = "ntags";

fn tag_list(value: &Value) -> &[String] {
    value.as_list().unwrap_or_default()
}

impl AnkiTable {
    fn tag_column(&self) -> Result<&[Value]> {
        self.check_ours()?;
        self.frame.column(TAGS_COLUMN).ok_or_else(|| {
            Error::MissingColumn(format!(
                "{TAGS_COLUMN} (use the notes table or merge it into {})",
                self.kind()
            ))
        })
    }

    /// All tags in use, sorted and without duplicates.
    pub fn list_tags(&self) -> Result<Vec<String>> {
        let tags: BTreeSet<&str> = self
            .tag_column()?
            .iter()
            .flat_map(tag_list)
            .map(String::as_str)
            .collect();
        Ok(tags.into_iter().map(str::to_string).collect())
    }

    /// Rows carrying any of `tags`; with `None`, rows carrying any tag at
    /// all.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # fn demo(notes: &ankiframe_core::AnkiTable) -> ankiframe_core::Result<()> {
    /// let asian = notes.has_tag(Some(&["Japanese", "Chinese"]))?;
    /// let untagged: Vec<bool> = notes.has_tag(None)?.iter().map(|t| !t).collect();
    /// let subset = notes.frame().filter(&asian);
    /// # let _ = (untagged, subset);
    /// # Ok(())
    /// # }
    /// ```
    pub fn has_tag(&self, tags: Option<&[&str]>) -> Result<Vec<bool>> {
        let column = self.tag_column()?;
        Ok(column
            .iter()
            .map(|value| {
                let row = tag_list(value);
                match tags {
                    Some(tags) => row.iter().any(|t| tags.contains(&t.as_str())),
                    None => !row.is_empty(),
                }
            })
            .collect())
    }

    /// Rows carrying every one of `tags`; with `None`, same as
    /// [`has_tag(None)`](Self::has_tag).
    pub fn has_tags(&self, tags: Option<&[&str]>) -> Result<Vec<bool>> {
        let Some(tags) = tags else {
            return self.has_tag(None);
        };
        Ok(self
            .tag_column()?
            .iter()
            .map(|value| {
                let row = tag_list(value);
                tags.iter().all(|t| row.iter().any(|have| have == t))
            })
            .collect())
    }

    /// Appends the missing `tags` to every row, in sorted order.
    pub fn add_tag(&mut self, tags: &[&str]) -> Result<()> {
        self.tag_column()?;
        if tags.is_empty() {
            return Ok(());
        }
        let wanted: BTreeSet<&str> = tags.iter().copied().collect();
        for value in self.frame.require_mut(TAGS_COLUMN)? {
            let mut row = tag_list(value).to_vec();
            for tag in &wanted {
                if !row.iter().any(|have| have == tag) {
                    row.push(tag.to_string());
                }
            }
            *value = Value::List(row);
        }
        Ok(())
    }

    /// Removes `tags` from every row; `None` clears all tags.
    pub fn remove_tag(&mut self, tags: Option<&[&str]>) -> Result<()> {
        self.tag_column()?;
        for value in self.frame.require_mut(TAGS_COLUMN)? {
            let row = match tags {
                Some(tags) => tag_list(value)
                    .iter()
                    .filter(|t| !tags.contains(&t.as_str()))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };
            *value = Value::List(row);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::TableKind;
    use crate::frame::Frame;

    fn notes(tags: &[&[&str]]) -> AnkiTable {
        let rows = tags
            .iter()
            .enumerate()
            .map(|(i, row)| {
                vec![
                    Value::Int(i as i64 + 1),
                    Value::List(row.iter().map(|t| t.to_string()).collect()),
                ]
            })
            .collect();
        let mut frame = Frame::from_rows(["nid", "ntags"], rows).unwrap();
        frame.set_index("nid").unwrap();
        AnkiTable::ours(TableKind::Notes, frame)
    }

    fn tags_of(table: &AnkiTable, pos: usize) -> Vec<String> {
        table.frame().column("ntags").unwrap()[pos]
            .as_list()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_list_tags_sorted_unique() {
        let table = notes(&[&["b", "a"], &[], &["a", "c"]]);
        assert_eq!(table.list_tags().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_has_tag_any_and_has_tags_all() {
        let table = notes(&[&["jp", "verb"], &["cn"], &[]]);
        assert_eq!(
            table.has_tag(Some(&["jp", "cn"])).unwrap(),
            vec![true, true, false]
        );
        assert_eq!(table.has_tag(None).unwrap(), vec![true, true, false]);
        assert_eq!(
            table.has_tags(Some(&["jp", "verb"])).unwrap(),
            vec![true, false, false]
        );
    }

    #[test]
    fn test_add_tag_appends_missing_sorted() {
        let mut table = notes(&[&["z"], &["b"]]);
        table.add_tag(&["b", "a"]).unwrap();
        assert_eq!(tags_of(&table, 0), vec!["z", "a", "b"]);
        assert_eq!(tags_of(&table, 1), vec!["b", "a"]);
    }

    #[test]
    fn test_remove_tag_and_clear() {
        let mut table = notes(&[&["a", "b", "c"]]);
        table.remove_tag(Some(&["b"])).unwrap();
        assert_eq!(tags_of(&table, 0), vec!["a", "c"]);
        table.remove_tag(None).unwrap();
        assert!(tags_of(&table, 0).is_empty());
    }

    #[test]
    fn test_tags_need_tag_column_and_normalized_table() {
        let raw = AnkiTable::empty(TableKind::Notes);
        assert!(matches!(raw.list_tags(), Err(Error::FormatState(_))));

        let mut frame = Frame::from_rows(["cid"], vec![vec![Value::Int(1)]]).unwrap();
        frame.set_index("cid").unwrap();
        let cards = AnkiTable::ours(TableKind::Cards, frame);
        assert!(matches!(cards.has_tag(None), Err(Error::MissingColumn(_))));
    }
}
