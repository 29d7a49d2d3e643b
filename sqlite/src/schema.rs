//! Collection file layout (schema version 11) and bootstrap helpers.
//!
//! # Table structure
//!
//! - `col`: a single row holding collection metadata plus the model and
//!   deck definitions as JSON text
//! - `notes`, `cards`, `revlog`: the tables loaded as frames
//! - `graves`: ids deleted locally, pending sync
//!
//! [`create_collection`], [`insert_model`] and [`insert_deck`] build a
//! minimal collection from scratch; they are enough for tests and for
//! `ankiframe init`, not a replacement for Anki's own collection setup.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value as JsonValue, json};
use tracing::debug;

use crate::convert::{self, DeckEntry, FieldEntry, ModelEntry};
use crate::error::{Result, SqliteError};

/// Collection schema version written by [`create_collection`].
pub const SCHEMA_VERSION: i64 = 11;

/// Tables that must exist for a file to be opened as a collection.
pub(crate) const REQUIRED_TABLES: &[&str] = &["col", "notes", "cards", "revlog", "graves"];

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS col (
    id     INTEGER PRIMARY KEY,
    crt    INTEGER NOT NULL,
    mod    INTEGER NOT NULL,
    scm    INTEGER NOT NULL,
    ver    INTEGER NOT NULL,
    dty    INTEGER NOT NULL,
    usn    INTEGER NOT NULL,
    ls     INTEGER NOT NULL,
    conf   TEXT NOT NULL,
    models TEXT NOT NULL,
    decks  TEXT NOT NULL,
    dconf  TEXT NOT NULL,
    tags   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notes (
    id    INTEGER PRIMARY KEY,
    guid  TEXT NOT NULL,
    mid   INTEGER NOT NULL,
    mod   INTEGER NOT NULL,
    usn   INTEGER NOT NULL,
    tags  TEXT NOT NULL,
    flds  TEXT NOT NULL,
    sfld  INTEGER NOT NULL,
    csum  INTEGER NOT NULL,
    flags INTEGER NOT NULL,
    data  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cards (
    id     INTEGER PRIMARY KEY,
    nid    INTEGER NOT NULL,
    did    INTEGER NOT NULL,
    ord    INTEGER NOT NULL,
    mod    INTEGER NOT NULL,
    usn    INTEGER NOT NULL,
    type   INTEGER NOT NULL,
    queue  INTEGER NOT NULL,
    due    INTEGER NOT NULL,
    ivl    INTEGER NOT NULL,
    factor INTEGER NOT NULL,
    reps   INTEGER NOT NULL,
    lapses INTEGER NOT NULL,
    "left" INTEGER NOT NULL,
    odue   INTEGER NOT NULL,
    odid   INTEGER NOT NULL,
    flags  INTEGER NOT NULL,
    data   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS revlog (
    id      INTEGER PRIMARY KEY,
    cid     INTEGER NOT NULL,
    usn     INTEGER NOT NULL,
    ease    INTEGER NOT NULL,
    ivl     INTEGER NOT NULL,
    lastIvl INTEGER NOT NULL,
    factor  INTEGER NOT NULL,
    time    INTEGER NOT NULL,
    type    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS graves (
    usn  INTEGER NOT NULL,
    oid  INTEGER NOT NULL,
    type INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS ix_notes_usn ON notes (usn);
CREATE INDEX IF NOT EXISTS ix_cards_usn ON cards (usn);
CREATE INDEX IF NOT EXISTS ix_revlog_usn ON revlog (usn);
CREATE INDEX IF NOT EXISTS ix_cards_nid ON cards (nid);
CREATE INDEX IF NOT EXISTS ix_cards_sched ON cards (did, queue, due);
CREATE INDEX IF NOT EXISTS ix_revlog_cid ON revlog (cid);
CREATE INDEX IF NOT EXISTS ix_notes_csum ON notes (csum);
"#;

/// Creates the collection tables and the `col` row with no models or
/// decks.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidCollection`] if a `col` row already
/// exists.
pub fn create_collection(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(SCHEMA_SQL)?;
    let existing: i64 = tx.query_row("SELECT COUNT(*) FROM col", [], |row| row.get(0))?;
    if existing > 0 {
        return Err(SqliteError::InvalidCollection(
            "collection is already initialised".into(),
        ));
    }
    let now = Utc::now();
    tx.execute(
        "INSERT INTO col (id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags) \
         VALUES (1, ?1, ?2, ?2, ?3, 0, 0, 0, '{}', '{}', '{}', '{}', '{}')",
        params![now.timestamp(), now.timestamp_millis(), SCHEMA_VERSION],
    )?;
    tx.commit()?;
    debug!(version = SCHEMA_VERSION, "created collection");
    Ok(())
}

/// Adds a note type and returns its id.
///
/// # Errors
///
/// Returns [`SqliteError::ConversionError`] if `fields` is empty,
/// `sort_field` is out of range or the name is taken.
pub fn insert_model(
    conn: &Connection,
    name: &str,
    fields: &[&str],
    sort_field: usize,
) -> Result<i64> {
    if fields.is_empty() {
        return Err(SqliteError::ConversionError(format!(
            "model '{name}' needs at least one field"
        )));
    }
    if sort_field >= fields.len() {
        return Err(SqliteError::ConversionError(format!(
            "sort field {sort_field} out of range for model '{name}' with {} fields",
            fields.len()
        )));
    }

    let tx = conn.unchecked_transaction()?;
    let json = read_col_json(&tx, "models")?;
    if convert::parse_models(&json)?.iter().any(|m| m.name == name) {
        return Err(SqliteError::ConversionError(format!(
            "model '{name}' already exists"
        )));
    }
    let mut entries: Map<String, JsonValue> = serde_json::from_str(&json)?;
    let id = next_id(&entries);
    let entry = ModelEntry {
        id,
        name: name.to_string(),
        flds: fields
            .iter()
            .zip(0..)
            .map(|(field, ord)| FieldEntry {
                name: field.to_string(),
                ord,
                extra: Map::new(),
            })
            .collect(),
        sortf: sort_field,
        extra: stamp_extra(),
    };
    entries.insert(id.to_string(), serde_json::to_value(entry)?);
    write_col_json(&tx, "models", &entries)?;
    tx.commit()?;
    debug!(model = name, id, "inserted model");
    Ok(id)
}

/// Adds a deck and returns its id.
///
/// # Errors
///
/// Returns [`SqliteError::ConversionError`] if the name is empty or taken.
pub fn insert_deck(conn: &Connection, name: &str) -> Result<i64> {
    if name.is_empty() {
        return Err(SqliteError::ConversionError("deck name is empty".into()));
    }
    let tx = conn.unchecked_transaction()?;
    let json = read_col_json(&tx, "decks")?;
    if convert::parse_decks(&json)?.iter().any(|d| d.name == name) {
        return Err(SqliteError::ConversionError(format!(
            "deck '{name}' already exists"
        )));
    }
    let mut entries: Map<String, JsonValue> = serde_json::from_str(&json)?;
    let id = next_id(&entries);
    let entry = DeckEntry {
        id,
        name: name.to_string(),
        extra: stamp_extra(),
    };
    entries.insert(id.to_string(), serde_json::to_value(entry)?);
    write_col_json(&tx, "decks", &entries)?;
    tx.commit()?;
    debug!(deck = name, id, "inserted deck");
    Ok(id)
}

/// Reads the `models` or `decks` JSON of the `col` row.
pub(crate) fn read_col_json(conn: &Connection, column: &str) -> Result<String> {
    let json: Option<String> = conn
        .query_row(&format!("SELECT {column} FROM col LIMIT 1"), [], |row| {
            row.get(0)
        })
        .optional()?;
    json.ok_or_else(|| SqliteError::InvalidCollection("the col table has no row".into()))
}

fn write_col_json(conn: &Connection, column: &str, entries: &Map<String, JsonValue>) -> Result<()> {
    let json = serde_json::to_string(entries)?;
    conn.execute(
        &format!("UPDATE col SET {column} = ?1, mod = ?2"),
        params![json, Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

/// Millisecond timestamp, bumped past the largest id already used.
fn next_id(entries: &Map<String, JsonValue>) -> i64 {
    let largest = entries
        .keys()
        .filter_map(|key| key.parse::<i64>().ok())
        .max()
        .unwrap_or(0);
    Utc::now().timestamp_millis().max(largest + 1)
}

fn stamp_extra() -> Map<String, JsonValue> {
    let mut extra = Map::new();
    extra.insert("mod".into(), json!(Utc::now().timestamp()));
    extra.insert("usn".into(), json!(-1));
    extra
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_collection(&conn).unwrap();
        conn
    }

    #[test]
    fn test_create_collection_tables() {
        let conn = collection();
        for table in REQUIRED_TABLES {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
        let ver: i64 = conn
            .query_row("SELECT ver FROM col", [], |row| row.get(0))
            .unwrap();
        assert_eq!(ver, SCHEMA_VERSION);
    }

    #[test]
    fn test_create_collection_twice_fails() {
        let conn = collection();
        assert!(matches!(
            create_collection(&conn),
            Err(SqliteError::InvalidCollection(_))
        ));
    }

    #[test]
    fn test_insert_model_and_deck() {
        let conn = collection();
        let mid = insert_model(&conn, "Basic", &["Front", "Back"], 0).unwrap();
        let did = insert_deck(&conn, "Default").unwrap();

        let models = convert::parse_models(&read_col_json(&conn, "models").unwrap()).unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, mid);
        assert_eq!(models[0].fields, vec!["Front", "Back"]);

        let decks = convert::parse_decks(&read_col_json(&conn, "decks").unwrap()).unwrap();
        assert_eq!(decks[0].id, did);
        assert_eq!(decks[0].name, "Default");
    }

    #[test]
    fn test_insert_model_ids_are_unique() {
        let conn = collection();
        let first = insert_model(&conn, "A", &["X"], 0).unwrap();
        let second = insert_model(&conn, "B", &["X"], 0).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_insert_model_rejects_bad_input() {
        let conn = collection();
        assert!(insert_model(&conn, "Empty", &[], 0).is_err());
        assert!(insert_model(&conn, "Sort", &["A"], 1).is_err());
        insert_model(&conn, "Basic", &["A"], 0).unwrap();
        assert!(insert_model(&conn, "Basic", &["A"], 0).is_err());
    }

    #[test]
    fn test_insert_deck_rejects_duplicates() {
        let conn = collection();
        insert_deck(&conn, "Japanese").unwrap();
        assert!(insert_deck(&conn, "Japanese").is_err());
        assert!(insert_deck(&conn, "").is_err());
    }
}
