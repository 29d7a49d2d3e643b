//! The native write path.
//!
//! A frame is written in a single transaction. Rows are matched on `id`:
//!
//! | mode      | id stored | id new  | `deleted` ids           |
//! |-----------|-----------|---------|-------------------------|
//! | `update`  | UPDATE    | skipped | ignored                 |
//! | `append`  | skipped   | INSERT  | ignored                 |
//! | `replace` | UPDATE    | INSERT  | DELETE + grave (usn -1) |

use std::collections::HashSet;

use ankiframe_core::{Frame, TableKind, USN_NEEDS_SYNC, WriteMode};
use chrono::Utc;
use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

use crate::convert;
use crate::error::{Result, SqliteError};
use crate::query::{column_list, table_ids};

/// Row counts of one write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub updated: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub deleted: usize,
}

/// Grave type of deleted rows; the review log has none.
fn grave_type(kind: TableKind) -> Option<i64> {
    match kind {
        TableKind::Cards => Some(0),
        TableKind::Notes => Some(1),
        TableKind::Revs => None,
    }
}

fn check_native_layout(kind: TableKind, frame: &Frame) -> Result<()> {
    if frame.index().is_some() || !frame.column_names().eq(kind.native_columns().iter().copied()) {
        return Err(SqliteError::ConversionError(format!(
            "{kind} frame is not in native column order: {:?}",
            frame.column_names().collect::<Vec<_>>()
        )));
    }
    Ok(())
}

pub(crate) fn write_table(
    conn: &Connection,
    kind: TableKind,
    frame: &Frame,
    mode: WriteMode,
    deleted: &[i64],
) -> Result<WriteReport> {
    check_native_layout(kind, frame)?;
    let table = kind.storage_name();
    let columns = kind.native_columns();
    let mut report = WriteReport::default();

    let tx = conn.unchecked_transaction()?;
    {
        let existing: HashSet<i64> = table_ids(&tx, kind)?.into_iter().collect();
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let assignments = columns
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| format!("\"{c}\" = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            column_list(kind)
        ))?;
        let mut update = tx.prepare(&format!("UPDATE {table} SET {assignments} WHERE id = ?1"))?;

        for pos in 0..frame.len() {
            let row = frame.row(pos).unwrap_or_default();
            let Some(id) = row.first().and_then(|v| v.as_int()) else {
                return Err(SqliteError::ConversionError(format!(
                    "{kind} row {pos} has no integer id"
                )));
            };
            let params = row
                .into_iter()
                .map(convert::to_sql)
                .collect::<Result<Vec<_>>>()?;
            match (mode, existing.contains(&id)) {
                (WriteMode::Update | WriteMode::Replace, true) => {
                    update.execute(params_from_iter(params))?;
                    report.updated += 1;
                }
                (WriteMode::Append | WriteMode::Replace, false) => {
                    insert.execute(params_from_iter(params))?;
                    report.inserted += 1;
                }
                _ => report.skipped += 1,
            }
        }

        if mode == WriteMode::Replace {
            let mut delete = tx.prepare(&format!("DELETE FROM {table} WHERE id = ?1"))?;
            let mut grave = tx.prepare("INSERT INTO graves (usn, oid, type) VALUES (?1, ?2, ?3)")?;
            for id in deleted {
                report.deleted += delete.execute([id])?;
                if let Some(grave_kind) = grave_type(kind) {
                    grave.execute(params![USN_NEEDS_SYNC, id, grave_kind])?;
                }
            }
        }

        tx.execute(
            "UPDATE col SET mod = ?1",
            params![Utc::now().timestamp_millis()],
        )?;
    }
    tx.commit()?;

    debug!(
        table,
        mode = mode.as_str(),
        updated = report.updated,
        inserted = report.inserted,
        skipped = report.skipped,
        deleted = report.deleted,
        "wrote rows"
    );
    Ok(report)
}
