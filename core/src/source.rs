//! Interface to the storage collaborator.
//!
//! The conversion engine never talks SQL. Everything it needs from the
//! collection file goes through [`Collection`], which the
//! `ankiframe-sqlite` crate implements on top of `rusqlite`.

use serde::{Deserialize, Serialize};

use crate::columns::TableKind;
use crate::error::Result;
use crate::frame::Frame;

/// A note type: ordered field names and the field used for sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub name: String,
    /// Field names in field order.
    pub fields: Vec<String>,
    /// Position in `fields` of the sort field.
    pub sort_field: usize,
}

/// A deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub id: i64,
    pub name: String,
}

/// How rows are written back to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Overwrite rows whose id already exists; ignore new rows.
    #[default]
    Update,
    /// Insert rows with new ids; leave existing rows untouched.
    Append,
    /// Insert new rows, overwrite existing ones and delete rows missing
    /// from the in-memory table.
    Replace,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Update => "update",
            WriteMode::Append => "append",
            WriteMode::Replace => "replace",
        }
    }
}

/// Read access to an Anki collection plus the native write path.
///
/// Implementations may be called repeatedly within one session; results
/// are cached by [`IdResolver`](crate::IdResolver), not here.
pub trait Collection {
    /// Loads a whole table in native format, columns in
    /// [`TableKind::native_columns`] order, without an index.
    fn load_table(&self, kind: TableKind) -> Result<Frame>;

    /// Lists the primary keys currently stored for `kind`.
    fn table_ids(&self, kind: TableKind) -> Result<Vec<i64>>;

    fn models(&self) -> Result<Vec<Model>>;

    fn decks(&self) -> Result<Vec<Deck>>;

    /// Writes a native frame back. `deleted` is only honoured in
    /// [`WriteMode::Replace`].
    fn write_table(
        &self,
        kind: TableKind,
        frame: &Frame,
        mode: WriteMode,
        deleted: &[i64],
    ) -> Result<()>;
}
