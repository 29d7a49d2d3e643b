//! [`Collection`] over a collection file.

use std::path::Path;

use ankiframe_core::{Collection, Deck, Frame, Model, TableKind, WriteMode};
use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::write::WriteReport;
use crate::{query, schema, write};

/// An open Anki collection file.
///
/// # Examples
///
/// ```no_run
/// use ankiframe_core::{AnkiTable, IdResolver, TableKind};
/// use ankiframe_sqlite::SqliteCollection;
///
/// let collection = SqliteCollection::open("collection.anki2").unwrap();
/// let ids = IdResolver::new(&collection);
/// let cards = AnkiTable::load(&ids, TableKind::Cards).unwrap();
/// println!("{} cards in {:?}", cards.len(), AnkiTable::list_decks(&ids).unwrap());
/// ```
#[derive(Debug)]
pub struct SqliteCollection {
    conn: Connection,
}

impl SqliteCollection {
    /// Opens an existing collection file.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidCollection`](crate::SqliteError::InvalidCollection)
    /// if the file lacks the collection tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening collection");
        Self::from_connection(Connection::open(path)?)
    }

    /// Creates a new, empty collection file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::create_collection(&conn)?;
        Ok(Self { conn })
    }

    /// Wraps an open connection to a collection.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        query::check_collection(&conn)?;
        Ok(Self { conn })
    }

    /// See [`insert_model`](crate::insert_model).
    pub fn add_model(&self, name: &str, fields: &[&str], sort_field: usize) -> Result<i64> {
        schema::insert_model(&self.conn, name, fields, sort_field)
    }

    /// See [`insert_deck`](crate::insert_deck).
    pub fn add_deck(&self, name: &str) -> Result<i64> {
        schema::insert_deck(&self.conn, name)
    }

    /// Writes a native frame and reports what happened to each row.
    pub fn write_rows(
        &self,
        kind: TableKind,
        frame: &Frame,
        mode: WriteMode,
        deleted: &[i64],
    ) -> Result<WriteReport> {
        write::write_table(&self.conn, kind, frame, mode, deleted)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

impl Collection for SqliteCollection {
    fn load_table(&self, kind: TableKind) -> ankiframe_core::Result<Frame> {
        Ok(query::load_table(&self.conn, kind)?)
    }

    fn table_ids(&self, kind: TableKind) -> ankiframe_core::Result<Vec<i64>> {
        Ok(query::table_ids(&self.conn, kind)?)
    }

    fn models(&self) -> ankiframe_core::Result<Vec<Model>> {
        Ok(query::models(&self.conn)?)
    }

    fn decks(&self) -> ankiframe_core::Result<Vec<Deck>> {
        Ok(query::decks(&self.conn)?)
    }

    fn write_table(
        &self,
        kind: TableKind,
        frame: &Frame,
        mode: WriteMode,
        deleted: &[i64],
    ) -> ankiframe_core::Result<()> {
        self.write_rows(kind, frame, mode, deleted)?;
        Ok(())
    }
}
