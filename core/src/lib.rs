//! Tabular, reversible access to the tables of an Anki collection.
//!
//! This crate converts the `notes`, `cards` and `revlog` tables between
//! Anki's native row format and a convenience format that is easier to
//! analyse and edit:
//!
//! - [`AnkiTable`]: a [`Frame`] plus its [`TableKind`] and format state.
//!   [`normalize`](AnkiTable::normalize) and [`raw`](AnkiTable::raw)
//!   convert between [`Format::Anki`] and [`Format::Ours`].
//! - [`IdResolver`]: cached model/deck name lookups and card → note → model
//!   id chains, read from a [`Collection`].
//! - [`columns`]: renames, casts, categorical value maps and native
//!   column order of each table.
//! - [`codec`]: packing of tags and note fields.
//!
//! Storage is reached only through the [`Collection`] trait; the
//! `ankiframe-sqlite` crate provides the implementation for collection
//! files.
//!
//! # Example
//!
//! ```no_run
//! # fn demo(collection: &dyn ankiframe_core::Collection) -> ankiframe_core::Result<()> {
//! use ankiframe_core::*;
//!
//! let ids = IdResolver::new(collection);
//! let mut notes = AnkiTable::load(&ids, TableKind::Notes)?;
//!
//! let verbs = notes.has_tag(Some(&["verb"]))?;
//! println!("{} of {} notes are verbs", verbs.iter().filter(|v| **v).count(), notes.len());
//!
//! notes.add_tag(&["reviewed"])?;
//! notes.write(&ids, WriteMode::Update)?;
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod codec;
pub mod columns;
mod config;
mod convert;
mod error;
mod fields;
mod frame;
mod ids;
mod merge;
mod notes;
mod source;
mod stamp;
mod table;
mod tags;
mod value;
mod write;

pub use columns::{TableKind, ValueMap};
pub use config::Config;
pub use error::{Error, Result};
pub use frame::{Column, Frame, Index};
pub use ids::{IdResolver, NO_DECK};
pub use merge::MergeOptions;
pub use notes::{NoteBatch, NoteFields};
pub use source::{Collection, Deck, Model, WriteMode};
pub use stamp::USN_NEEDS_SYNC;
pub use table::{AnkiTable, DEFAULT_FIELDS_PREFIX, FieldsFormat, Format, TableMeta};
pub use value::{ScalarType, Value};
