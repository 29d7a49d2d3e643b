//! The [`AnkiTable`] wrapper and its format state.
//!
//! An `AnkiTable` owns a generic [`Frame`] plus a [`TableMeta`] describing
//! which table it holds and which representation the frame is currently
//! in. Column semantics are only trusted when the format tag says so.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::columns::TableKind;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::ids::IdResolver;
use crate::value::Value;

/// Default prefix for per-field columns.
pub const DEFAULT_FIELDS_PREFIX: &str = "nfld_";

/// Overall representation of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Native rows exactly as stored by Anki.
    Anki,
    /// Renamed, decoded, list-valued convenience representation.
    Ours,
    /// A conversion failed part way; only a forced retry is allowed.
    InProgress,
}

/// Layout of note field contents inside the convenience representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldsFormat {
    /// One list-valued `nflds` column.
    List,
    /// One text column per field name, prefixed.
    Columns,
    InProgress,
}

/// Table kind and format bookkeeping carried next to the frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableMeta {
    pub kind: TableKind,
    pub(crate) format: Format,
    pub(crate) fields: Option<FieldsFormat>,
    /// Prefix used when fields are exploded into columns.
    pub fields_prefix: String,
    /// Last terminal state; the frame always matches it.
    pub(crate) settled: Format,
    pub(crate) settled_fields: Option<FieldsFormat>,
}

impl TableMeta {
    fn new(kind: TableKind) -> Self {
        Self {
            kind,
            format: Format::Anki,
            fields: None,
            fields_prefix: DEFAULT_FIELDS_PREFIX.to_string(),
            settled: Format::Anki,
            settled_fields: None,
        }
    }
}

/// One Anki table together with its format state.
///
/// Tables come from storage in [`Format::Anki`] and are usually
/// normalized straight away:
///
/// ```no_run
/// # fn demo(collection: &dyn ankiframe_core::Collection) -> ankiframe_core::Result<()> {
/// use ankiframe_core::{AnkiTable, IdResolver, TableKind};
///
/// let ids = IdResolver::new(collection);
/// let notes = AnkiTable::load(&ids, TableKind::Notes)?;
/// println!("{} notes, tags: {:?}", notes.len(), notes.list_tags()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnkiTable {
    pub(crate) meta: TableMeta,
    pub(crate) frame: Frame,
}

impl AnkiTable {
    /// Wraps a native frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] if a native column is absent.
    pub fn from_native(kind: TableKind, frame: Frame) -> Result<Self> {
        for column in kind.native_columns() {
            frame.require(column)?;
        }
        Ok(Self {
            meta: TableMeta::new(kind),
            frame,
        })
    }

    /// An empty native table.
    pub fn empty(kind: TableKind) -> Self {
        Self {
            meta: TableMeta::new(kind),
            frame: Frame::new(kind.native_columns().iter().copied()),
        }
    }

    /// Loads `kind` from the resolver's collection and normalizes it.
    pub fn load(ids: &IdResolver<'_>, kind: TableKind) -> Result<Self> {
        let mut table = Self::load_raw(ids, kind)?;
        table.normalize(ids, false)?;
        Ok(table)
    }

    /// Loads `kind` in native format.
    pub fn load_raw(ids: &IdResolver<'_>, kind: TableKind) -> Result<Self> {
        let frame = ids.collection().load_table(kind)?;
        Self::from_native(kind, frame)
    }

    pub fn kind(&self) -> TableKind {
        self.meta.kind
    }

    pub fn format(&self) -> Format {
        self.meta.format
    }

    pub fn fields_format(&self) -> Option<FieldsFormat> {
        self.meta.fields
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Mutable access for content edits. Column layout changes are the
    /// caller's responsibility; removing required columns surfaces as
    /// [`Error::MissingColumn`] later.
    pub fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }

    pub fn into_frame(self) -> Frame {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    pub fn set_fields_prefix(&mut self, prefix: impl Into<String>) {
        self.meta.fields_prefix = prefix.into();
    }

    /// Fails if a previous conversion did not complete.
    pub fn check_format(&self) -> Result<()> {
        match self.meta.format {
            Format::InProgress => Err(Error::FormatState(
                "previous call to normalize() or raw() did not complete; \
                 retry it with force = true"
                    .into(),
            )),
            Format::Anki | Format::Ours => Ok(()),
        }
    }

    /// Fails unless the table is in the convenience format.
    pub fn check_ours(&self) -> Result<()> {
        self.check_format()?;
        if self.meta.format != Format::Ours {
            return Err(Error::FormatState(
                "operation is not supported in the raw format; call normalize() first".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn check_fields_settled(&self) -> Result<()> {
        if self.meta.fields == Some(FieldsFormat::InProgress) {
            return Err(Error::FormatState(
                "previous call to fields_as_columns() or fields_as_list() did not \
                 complete; retry it with force = true"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Wraps an already normalized frame; unit tests only.
    #[cfg(test)]
    pub(crate) fn ours(kind: TableKind, frame: Frame) -> Self {
        let mut meta = TableMeta::new(kind);
        meta.format = Format::Ours;
        meta.settled = Format::Ours;
        if kind == TableKind::Notes {
            meta.fields = Some(FieldsFormat::List);
            meta.settled_fields = meta.fields;
        }
        Self { meta, frame }
    }

    /// Runs a whole-table transition on a working copy.
    ///
    /// On failure the frame is left untouched and the format becomes
    /// [`Format::InProgress`]. A forced call from `InProgress` resumes from
    /// the last terminal state.
    pub(crate) fn transition(
        &mut self,
        target: Format,
        force: bool,
        run: impl FnOnce(&mut AnkiTable) -> Result<()>,
    ) -> Result<()> {
        if self.meta.format == Format::InProgress {
            if !force {
                self.check_format()?;
            }
            warn!(table = %self.kind(), "forcing conversion after an interrupted one");
            self.meta.format = self.meta.settled;
            self.meta.fields = self.meta.settled_fields;
        } else if self.meta.fields == Some(FieldsFormat::InProgress) && force {
            self.meta.fields = self.meta.settled_fields;
        }
        if self.meta.format == target {
            warn!(
                table = %self.kind(),
                format = ?target,
                "table already in requested format, nothing to do"
            );
            return Ok(());
        }
        let mut work = self.clone();
        work.meta.format = Format::InProgress;
        self.meta.format = Format::InProgress;
        run(&mut work)?;
        work.meta.format = target;
        work.meta.settled = target;
        work.meta.settled_fields = work.meta.fields;
        *self = work;
        Ok(())
    }

    /// Runs a field sub-format transition on a working copy.
    pub(crate) fn fields_transition(
        &mut self,
        target: FieldsFormat,
        force: bool,
        run: impl FnOnce(&mut AnkiTable) -> Result<()>,
    ) -> Result<()> {
        if self.meta.fields == Some(FieldsFormat::InProgress) {
            if !force {
                self.check_fields_settled()?;
            }
            warn!(table = %self.kind(), "forcing field conversion after an interrupted one");
            self.meta.fields = self.meta.settled_fields;
        }
        if self.meta.fields == Some(target) {
            warn!(format = ?target, "fields already in requested format, nothing to do");
            return Ok(());
        }
        let mut work = self.clone();
        self.meta.fields = Some(FieldsFormat::InProgress);
        run(&mut work)?;
        work.meta.fields = Some(target);
        work.meta.settled_fields = Some(target);
        *self = work;
        Ok(())
    }

    fn int_values(values: &[Value], column: &str) -> Result<Vec<i64>> {
        values
            .iter()
            .map(|v| {
                v.as_int().ok_or_else(|| Error::InvalidCast {
                    value: format!("{column}: {v:?}"),
                    target: "int",
                })
            })
            .collect()
    }

    fn index_keys(&self) -> Result<Vec<i64>> {
        self.frame
            .keys()
            .map(<[i64]>::to_vec)
            .ok_or_else(|| Error::MissingColumn(self.kind().index_column().to_string()))
    }

    fn required_ids(&self, column: &str) -> Result<Vec<i64>> {
        Self::int_values(self.frame.require(column)?, column)
    }

    fn no_such_id(&self, operation: &str, what: &str, why: &str) -> Error {
        Error::FormatState(format!(
            "{operation}() is not supported on the {} table, which has no {what}: {why}",
            self.kind()
        ))
    }

    /// Note id of every row.
    pub fn nid(&self, ids: &IdResolver<'_>) -> Result<Vec<i64>> {
        self.check_ours()?;
        match self.kind() {
            TableKind::Notes => self.index_keys(),
            TableKind::Cards => self.required_ids("nid"),
            TableKind::Revs => {
                if self.frame.has_column("nid") {
                    self.required_ids("nid")
                } else {
                    self.cid()?
                        .into_iter()
                        .map(|cid| ids.card_note(cid))
                        .collect()
                }
            }
        }
    }

    /// Card id of every row.
    pub fn cid(&self) -> Result<Vec<i64>> {
        self.check_ours()?;
        match self.kind() {
            TableKind::Cards => self.index_keys(),
            TableKind::Revs => self.required_ids("cid"),
            TableKind::Notes => Err(self.no_such_id(
                "cid",
                "card id",
                "a note can belong to several cards",
            )),
        }
    }

    /// Review id of every row.
    pub fn rid(&self) -> Result<Vec<i64>> {
        self.check_ours()?;
        match self.kind() {
            TableKind::Revs => self.index_keys(),
            _ => self.required_ids("rid"),
        }
    }

    /// Model id of every row.
    pub fn mid(&self, ids: &IdResolver<'_>) -> Result<Vec<i64>> {
        self.check_ours()?;
        self.mid_unchecked(ids)
    }

    pub(crate) fn mid_unchecked(&self, ids: &IdResolver<'_>) -> Result<Vec<i64>> {
        match self.frame.column("nmodel") {
            Some(models) => models
                .iter()
                .map(|v| match v {
                    Value::Text(name) => ids.model_id(name),
                    other => Err(Error::unresolved("model", format!("{other:?}"))),
                })
                .collect(),
            None if self.kind() == TableKind::Notes => {
                Err(Error::MissingColumn("nmodel".into()))
            }
            None => {
                let nids = match self.kind() {
                    TableKind::Cards => self.required_ids("nid")?,
                    _ => self.nid(ids)?,
                };
                nids.into_iter().map(|nid| ids.note_model(nid)).collect()
            }
        }
    }

    /// Deck id of every row.
    pub fn did(&self, ids: &IdResolver<'_>) -> Result<Vec<i64>> {
        self.check_ours()?;
        match self.kind() {
            TableKind::Cards => self.deck_ids("cdeck", ids),
            TableKind::Revs => {
                if self.frame.has_column("cdeck") {
                    self.deck_ids("cdeck", ids)
                } else {
                    self.cid()?
                        .into_iter()
                        .map(|cid| ids.card_deck(cid))
                        .collect()
                }
            }
            TableKind::Notes => {
                Err(self.no_such_id("did", "deck id", "a note can belong to several decks"))
            }
        }
    }

    /// Original deck id (filtered decks) of every row.
    pub fn odid(&self, ids: &IdResolver<'_>) -> Result<Vec<i64>> {
        self.check_ours()?;
        match self.kind() {
            TableKind::Cards | TableKind::Revs => self.deck_ids("codeck", ids),
            TableKind::Notes => Err(self.no_such_id("odid", "original deck id", "only cards have one")),
        }
    }

    fn deck_ids(&self, column: &str, ids: &IdResolver<'_>) -> Result<Vec<i64>> {
        self.frame
            .require(column)?
            .iter()
            .map(|v| match v {
                Value::Text(name) => ids.deck_id(name),
                Value::Null => Ok(crate::ids::NO_DECK),
                other => Err(Error::unresolved("deck", format!("{other:?}"))),
            })
            .collect()
    }

    /// Sorted deck names, without the empty name.
    pub fn list_decks(ids: &IdResolver<'_>) -> Result<Vec<String>> {
        let mut names: Vec<String> = ids
            .decks()?
            .iter()
            .filter(|d| !d.name.is_empty())
            .map(|d| d.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Sorted model names.
    pub fn list_models(ids: &IdResolver<'_>) -> Result<Vec<String>> {
        let mut names: Vec<String> = ids.models()?.iter().map(|m| m.name.clone()).collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_native_requires_native_columns() {
        let frame = Frame::new(["id", "guid"]);
        assert!(matches!(
            AnkiTable::from_native(TableKind::Notes, frame),
            Err(Error::MissingColumn(_))
        ));
    }

    #[test]
    fn test_empty_table_is_anki_format() {
        let table = AnkiTable::empty(TableKind::Revs);
        assert_eq!(table.format(), Format::Anki);
        assert_eq!(table.fields_format(), None);
        assert!(table.is_empty());
        assert_eq!(table.frame().width(), 9);
    }

    #[test]
    fn test_check_ours_rejects_raw_tables() {
        let table = AnkiTable::empty(TableKind::Cards);
        assert!(table.check_format().is_ok());
        assert!(matches!(table.check_ours(), Err(Error::FormatState(_))));
    }

    #[test]
    fn test_failed_transition_leaves_frame_and_marks_in_progress() {
        let mut table = AnkiTable::empty(TableKind::Notes);
        let before = table.frame().clone();
        let err = table
            .transition(Format::Ours, false, |work| {
                work.frame.drop_column("flds");
                Err(Error::MissingColumn("flds".into()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(_)));
        assert_eq!(table.format(), Format::InProgress);
        assert_eq!(table.frame(), &before);

        let again = table.transition(Format::Ours, false, |_| Ok(()));
        assert!(matches!(again, Err(Error::FormatState(_))));

        table.transition(Format::Ours, true, |_| Ok(())).unwrap();
        assert_eq!(table.format(), Format::Ours);
    }

    #[test]
    fn test_transition_to_current_format_is_noop() {
        let mut table = AnkiTable::empty(TableKind::Revs);
        let mut ran = false;
        table
            .transition(Format::Anki, false, |_| {
                ran = true;
                Ok(())
            })
            .unwrap();
        assert!(!ran);
    }
}
