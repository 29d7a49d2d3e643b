//! Handing a table back to the storage collaborator.

use std::collections::HashSet;

use tracing::info;

use crate::error::Result;
use crate::ids::IdResolver;
use crate::source::WriteMode;
use crate::table::{AnkiTable, Format};

impl AnkiTable {
    /// Writes the table to the resolver's collection.
    ///
    /// A normalized table is converted to raw on a copy first, so `self`
    /// keeps its format. In [`WriteMode::Replace`] the rows deleted since
    /// loading are computed against storage and removed there too.
    ///
    /// Cached cross-table lookups in `ids` may be stale afterwards; call
    /// [`IdResolver::refresh`] before relying on them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FormatState`](crate::Error::FormatState) after an
    /// interrupted conversion, any error of [`raw`](Self::raw), and
    /// [`Error::Storage`](crate::Error::Storage) from the collection.
    pub fn write(&self, ids: &IdResolver<'_>, mode: WriteMode) -> Result<()> {
        self.check_format()?;
        let (native, deleted) = match self.format() {
            Format::Ours => {
                let deleted = match mode {
                    WriteMode::Replace => self.was_deleted(ids, None)?,
                    WriteMode::Update | WriteMode::Append => Vec::new(),
                };
                (self.to_raw(ids, false)?, deleted)
            }
            _ => {
                let deleted = match mode {
                    WriteMode::Replace => self.deleted_native_ids(ids)?,
                    WriteMode::Update | WriteMode::Append => Vec::new(),
                };
                (self.clone(), deleted)
            }
        };

        info!(
            table = %self.kind(),
            mode = mode.as_str(),
            rows = native.len(),
            deleted = deleted.len(),
            "writing table"
        );
        ids.collection()
            .write_table(self.kind(), native.frame(), mode, &deleted)
    }

    /// Stored ids missing from the `id` column of a raw table, sorted.
    fn deleted_native_ids(&self, ids: &IdResolver<'_>) -> Result<Vec<i64>> {
        let present: HashSet<i64> = self
            .frame
            .require("id")?
            .iter()
            .filter_map(|v| v.as_int())
            .collect();
        let mut deleted: Vec<i64> = ids
            .collection()
            .table_ids(self.kind())?
            .into_iter()
            .filter(|id| !present.contains(id))
            .collect();
        deleted.sort_unstable();
        Ok(deleted)
    }
}
