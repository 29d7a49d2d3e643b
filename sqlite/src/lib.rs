//! SQLite storage for `ankiframe`.
//!
//! [`SqliteCollection`] implements [`ankiframe_core::Collection`] over an
//! Anki collection file in the legacy schema 11 layout (`col`, `notes`,
//! `cards`, `revlog`, `graves`). Models and decks are parsed from the JSON
//! stored in the `col` row.
//!
//! # Quick start
//!
//! ```no_run
//! use ankiframe_core::{AnkiTable, IdResolver, TableKind, WriteMode};
//! use ankiframe_sqlite::SqliteCollection;
//!
//! let collection = SqliteCollection::open("collection.anki2").unwrap();
//! let ids = IdResolver::new(&collection);
//!
//! let mut notes = AnkiTable::load(&ids, TableKind::Notes).unwrap();
//! notes.remove_tag(Some(&["leech"])).unwrap();
//! notes.write(&ids, WriteMode::Update).unwrap();
//! ```
//!
//! # Building a collection
//!
//! ```
//! use ankiframe_core::Collection;
//! use ankiframe_sqlite::{SqliteCollection, create_collection};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! create_collection(&conn).unwrap();
//! let collection = SqliteCollection::from_connection(conn).unwrap();
//! collection.add_model("Basic", &["Front", "Back"], 0).unwrap();
//! assert_eq!(collection.models().unwrap()[0].fields, vec!["Front", "Back"]);
//! ```

mod collection;
mod convert;
mod error;
mod query;
mod schema;
mod write;

pub use collection::SqliteCollection;
pub use error::{Result, SqliteError};
pub use schema::{SCHEMA_VERSION, create_collection, insert_deck, insert_model};
pub use write::WriteReport;
