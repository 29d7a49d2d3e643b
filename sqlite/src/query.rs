//! Read access to the collection tables.

use ankiframe_core::{Deck, Frame, Model, TableKind};
use rusqlite::Connection;

use crate::convert;
use crate::error::{Result, SqliteError};
use crate::schema::{REQUIRED_TABLES, read_col_json};

/// Comma separated, quoted native column list of `kind`.
pub(crate) fn column_list(kind: TableKind) -> String {
    kind.native_columns()
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fails unless every collection table is present.
pub(crate) fn check_collection(conn: &Connection) -> Result<()> {
    let mut stmt =
        conn.prepare("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    for table in REQUIRED_TABLES {
        let count: i64 = stmt.query_row([table], |row| row.get(0))?;
        if count == 0 {
            return Err(SqliteError::InvalidCollection(format!(
                "missing table '{table}'"
            )));
        }
    }
    Ok(())
}

/// Loads a whole table in native column order, sorted by id.
pub(crate) fn load_table(conn: &Connection, kind: TableKind) -> Result<Frame> {
    let columns = kind.native_columns();
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} ORDER BY id",
        column_list(kind),
        kind.storage_name()
    ))?;

    let mut frame = Frame::new(columns.iter().copied());
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|i| convert::from_sql(row.get_ref(i)?))
            .collect::<Result<Vec<_>>>()?;
        frame
            .push_row(values)
            .map_err(|e| SqliteError::ConversionError(e.to_string()))?;
    }
    Ok(frame)
}

pub(crate) fn table_ids(conn: &Connection, kind: TableKind) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id FROM {} ORDER BY id",
        kind.storage_name()
    ))?;
    let ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub(crate) fn models(conn: &Connection) -> Result<Vec<Model>> {
    convert::parse_models(&read_col_json(conn, "models")?)
}

pub(crate) fn decks(conn: &Connection) -> Result<Vec<Deck>> {
    convert::parse_decks(&read_col_json(conn, "decks")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::create_collection;
    use ankiframe_core::Value;

    fn collection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_collection(&conn).unwrap();
        conn
    }

    #[test]
    fn test_column_list_quotes_names() {
        let list = column_list(TableKind::Revs);
        assert!(list.starts_with("\"id\", \"cid\""));
        assert!(list.contains("\"lastIvl\""));
    }

    #[test]
    fn test_check_collection_rejects_plain_database() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            check_collection(&conn),
            Err(SqliteError::InvalidCollection(_))
        ));
        assert!(check_collection(&collection()).is_ok());
    }

    #[test]
    fn test_load_table_native_order() {
        let conn = collection();
        conn.execute(
            "INSERT INTO revlog VALUES (20, 1, 0, 3, 4, 1, 2500, 6000, 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO revlog VALUES (10, 1, 0, 1, 0, 0, 0, 3000, 0)",
            [],
        )
        .unwrap();

        let frame = load_table(&conn, TableKind::Revs).unwrap();
        assert_eq!(
            frame.column_names().collect::<Vec<_>>(),
            TableKind::Revs.native_columns()
        );
        assert_eq!(
            frame.column("id").unwrap(),
            &[Value::Int(10), Value::Int(20)]
        );
        assert_eq!(table_ids(&conn, TableKind::Revs).unwrap(), vec![10, 20]);
    }

    #[test]
    fn test_empty_collection_has_no_models() {
        let conn = collection();
        assert!(models(&conn).unwrap().is_empty());
        assert!(decks(&conn).unwrap().is_empty());
        assert!(load_table(&conn, TableKind::Notes).unwrap().is_empty());
    }
}
