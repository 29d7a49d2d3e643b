//! The `normalize`/`raw` conversion state machine.
//!
//! `normalize` turns native rows into the convenience representation:
//!
//! 1. forward dtype casts
//! 2. native → convenience column names
//! 3. coded categorical columns → symbolic names
//! 4. id column promoted to the index
//! 5. deck and model names derived from their ids
//! 6. tags and fields split into lists
//! 7. everything outside the convenience allowlist dropped
//!
//! `raw` walks the same steps backwards, stamping modified rows on the way
//! and recomputing the note sort field and checksum. Both run through
//! a working copy, so a failure leaves the frame untouched and
//! the format at [`Format::InProgress`].

use tracing::{debug, warn};

use crate::checksum::field_checksum;
use crate::codec::{join_fields, join_tags, split_fields, split_tags};
use crate::columns::{TableKind, ValueMap};
use crate::error::{Error, Result};
use crate::ids::IdResolver;
use crate::table::{AnkiTable, FieldsFormat, Format};
use crate::value::{ScalarType, Value};

/// The sort field as stored in `sfld`, whose INTEGER affinity turns
/// numeric text into a number.
fn sort_field_value(text: &str) -> Value {
    let trimmed = text.trim_matches(|c: char| c.is_ascii_whitespace());
    let numeric = !trimmed.is_empty()
        && trimmed
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if numeric {
        if let Ok(int) = trimmed.parse::<i64>() {
            return Value::Int(int);
        }
        if let Ok(real) = trimmed.parse::<f64>() {
            if real.fract() == 0.0 && real.abs() < 9.0e18 {
                return Value::Int(real as i64);
            }
            return Value::Real(real);
        }
    }
    Value::from(text)
}

impl AnkiTable {
    /// Converts the table from the native to the convenience format in
    /// place.
    ///
    /// Already normalized tables are left alone with a warning. After a
    /// failed conversion, pass `force = true` to try again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FormatState`] if a previous conversion did not
    /// complete and `force` is false, [`Error::ResolutionFailure`] for deck
    /// or model ids that do not exist, and [`Error::MissingColumn`] /
    /// [`Error::InvalidCast`] for malformed native frames.
    pub fn normalize(&mut self, ids: &IdResolver<'_>, force: bool) -> Result<()> {
        self.transition(Format::Ours, force, |work| {
            debug!(table = %work.kind(), rows = work.len(), "normalizing");
            work.normalize_frame(ids)
        })
    }

    /// Returns a normalized copy, leaving `self` as it is.
    pub fn normalized(&self, ids: &IdResolver<'_>, force: bool) -> Result<Self> {
        let mut copy = self.clone();
        copy.normalize(ids, force)?;
        Ok(copy)
    }

    /// Converts the table back to the native format in place, stamping
    /// rows that differ from the stored version.
    ///
    /// # Errors
    ///
    /// Same as [`normalize`](Self::normalize), plus
    /// [`Error::SchemaViolation`] when a note's field list does not reach
    /// its model's sort field.
    pub fn raw(&mut self, ids: &IdResolver<'_>, force: bool) -> Result<()> {
        self.raw_against(ids, None, force)
    }

    /// Like [`raw`](Self::raw) but detects modified rows against
    /// `reference` instead of a fresh load from storage.
    pub fn raw_against(
        &mut self,
        ids: &IdResolver<'_>,
        reference: Option<&AnkiTable>,
        force: bool,
    ) -> Result<()> {
        if !force {
            self.check_fields_settled()?;
        }
        self.transition(Format::Anki, force, |work| {
            debug!(table = %work.kind(), rows = work.len(), "converting to raw");
            work.raw_frame(ids, reference)
        })
    }

    /// Returns a raw copy, leaving `self` as it is.
    pub fn to_raw(&self, ids: &IdResolver<'_>, force: bool) -> Result<Self> {
        let mut copy = self.clone();
        copy.raw(ids, force)?;
        Ok(copy)
    }

    fn normalize_frame(&mut self, ids: &IdResolver<'_>) -> Result<()> {
        let kind = self.kind();
        self.apply_casts(kind.casts_forward())?;
        self.frame.rename_columns(|name| kind.convenience_name(name));
        for map in kind.value_maps() {
            self.decode_values(map)?;
        }
        self.frame.set_index(kind.index_column())?;

        match kind {
            TableKind::Cards => {
                for (id_column, name_column) in [("did", "cdeck"), ("odid", "codeck")] {
                    let names = IdResolver::map_ids(self.frame.require(id_column)?, "deck id", |did| {
                        ids.deck_name(did).map(Value::from)
                    })?;
                    self.frame.set_column(name_column, names)?;
                }
            }
            TableKind::Notes => {
                let names = IdResolver::map_ids(self.frame.require("mid")?, "model id", |mid| {
                    ids.model_name(mid).map(Value::from)
                })?;
                self.frame.set_column("nmodel", names)?;
                self.map_text("ntags", |joined| Value::List(split_tags(joined)))?;
                self.map_text("nflds", |joined| Value::List(split_fields(joined)))?;
                self.meta.fields = Some(FieldsFormat::List);
            }
            TableKind::Revs => {}
        }

        self.frame.select(kind.convenience_columns())
    }

    fn raw_frame(&mut self, ids: &IdResolver<'_>, reference: Option<&AnkiTable>) -> Result<()> {
        let kind = self.kind();
        if kind == TableKind::Notes {
            match self.meta.fields {
                Some(FieldsFormat::Columns) => {
                    self.collapse_fields(ids)?;
                    self.meta.fields = Some(FieldsFormat::List);
                }
                Some(FieldsFormat::InProgress) => self.check_fields_settled()?,
                Some(FieldsFormat::List) | None => {}
            }
        }

        match reference {
            Some(reference) => self.stamp(reference)?,
            None => {
                let stored = AnkiTable::load(ids, kind)?;
                self.stamp(&stored)?;
            }
        }

        self.frame.reset_index();

        match kind {
            TableKind::Cards => {
                for (name_column, id_column) in [("cdeck", "did"), ("codeck", "odid")] {
                    let dids = IdResolver::map_names(self.frame.require(name_column)?, "deck", |name| {
                        ids.deck_id(name)
                    })?;
                    self.frame.set_column(id_column, dids)?;
                }
            }
            TableKind::Notes => {
                let mids = IdResolver::map_names(self.frame.require("nmodel")?, "model", |name| {
                    ids.model_id(name)
                })?;
                self.frame.set_column("mid", mids)?;
                self.pack_notes(ids)?;
            }
            TableKind::Revs => {}
        }

        for map in kind.value_maps() {
            self.encode_values(map)?;
        }
        self.frame.rename_columns(|name| kind.native_name(name));
        self.apply_casts(kind.casts_backward())?;

        if kind.has_legacy_columns() {
            let rows = self.len();
            self.frame.set_column("data", vec![Value::from(""); rows])?;
            self.frame.set_column("flags", vec![Value::Int(0); rows])?;
        }

        self.frame.select(kind.native_columns())
    }

    /// Recomputes sort field and checksum, then packs fields and tags.
    fn pack_notes(&mut self, ids: &IdResolver<'_>) -> Result<()> {
        let mids = self.frame.require("mid")?.to_vec();
        let fields = self.frame.require("nflds")?.to_vec();
        let mut sort_fields = Vec::with_capacity(fields.len());
        let mut checksums = Vec::with_capacity(fields.len());
        let mut packed = Vec::with_capacity(fields.len());

        for (mid, value) in mids.iter().zip(&fields) {
            let list = match value {
                Value::List(list) => list.as_slice(),
                Value::Null => &[],
                other => {
                    return Err(Error::SchemaViolation(format!(
                        "note fields must be a list, got {other:?}"
                    )));
                }
            };
            let sort_field = match mid.as_int() {
                Some(mid) => ids.sort_field(mid)?,
                None => 0,
            };
            let sort_value = list.get(sort_field).ok_or_else(|| {
                Error::SchemaViolation(format!(
                    "note has {} fields but its sort field is number {}",
                    list.len(),
                    sort_field + 1
                ))
            })?;
            sort_fields.push(sort_field_value(sort_value));
            checksums.push(Value::Int(field_checksum(&list[0])));
            packed.push(Value::Text(join_fields(list)));
        }

        self.frame.set_column("nsfld", sort_fields)?;
        self.frame.set_column("ncsum", checksums)?;
        self.frame.set_column("nflds", packed)?;
        self.map_list("ntags", |tags| Value::Text(join_tags(tags)))
    }

    fn apply_casts(&mut self, casts: &[(&str, ScalarType)]) -> Result<()> {
        for (column, target) in casts {
            let values = self.frame.require_mut(column)?;
            let cast = std::mem::take(values)
                .into_iter()
                .map(|v| v.cast(*target))
                .collect::<Result<Vec<_>>>()?;
            *values = cast;
        }
        Ok(())
    }

    fn decode_values(&mut self, map: &ValueMap) -> Result<()> {
        let kind = self.kind();
        for value in self.frame.require_mut(map.column)?.iter_mut() {
            let decoded = match &*value {
                Value::Int(code) => match map.symbol(*code) {
                    Some(symbol) => Value::from(symbol),
                    None => {
                        warn!(table = %kind, column = map.column, code = *code, "unmapped value");
                        Value::Null
                    }
                },
                Value::Null => Value::Null,
                other => {
                    warn!(table = %kind, column = map.column, value = ?other, "unmapped value");
                    Value::Null
                }
            };
            *value = decoded;
        }
        Ok(())
    }

    fn encode_values(&mut self, map: &ValueMap) -> Result<()> {
        for value in self.frame.require_mut(map.column)?.iter_mut() {
            let encoded = match &*value {
                Value::Text(symbol) => match map.code(symbol) {
                    Some(code) => Value::Int(code),
                    None => return Err(Error::unresolved("value", format!("{}={symbol}", map.column))),
                },
                Value::Null => Value::Null,
                Value::Int(code) if map.symbol(*code).is_some() => Value::Int(*code),
                other => {
                    return Err(Error::unresolved("value", format!("{}={other:?}", map.column)));
                }
            };
            *value = encoded;
        }
        Ok(())
    }

    /// Rewrites every text cell of `column`; nulls are treated as empty.
    fn map_text(&mut self, column: &str, f: impl Fn(&str) -> Value) -> Result<()> {
        for value in self.frame.require_mut(column)?.iter_mut() {
            let mapped = match value {
                Value::Text(text) => f(text),
                Value::Null => f(""),
                other => {
                    return Err(Error::InvalidCast {
                        value: format!("{column}: {other:?}"),
                        target: "text",
                    });
                }
            };
            *value = mapped;
        }
        Ok(())
    }

    /// Rewrites every list cell of `column`; nulls are treated as empty.
    fn map_list(&mut self, column: &str, f: impl Fn(&[String]) -> Value) -> Result<()> {
        for value in self.frame.require_mut(column)?.iter_mut() {
            let mapped = match value {
                Value::List(items) => f(items),
                Value::Null => f(&[]),
                // A hand-edited scalar cell is taken as already packed.
                Value::Text(text) => Value::Text(std::mem::take(text)),
                other => {
                    return Err(Error::InvalidCast {
                        value: format!("{column}: {other:?}"),
                        target: "list",
                    });
                }
            };
            *value = mapped;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn table(kind: TableKind, rows: Vec<Vec<Value>>) -> AnkiTable {
        let frame = Frame::from_rows(kind.native_columns().iter().copied(), rows).unwrap();
        AnkiTable::from_native(kind, frame).unwrap()
    }

    fn review(id: Value, rtype: i64) -> Vec<Value> {
        let mut row = vec![id];
        row.extend([2, 0, 3, 1, 0, 2500, 100, rtype].map(Value::Int));
        row
    }

    #[test]
    fn test_decode_maps_unknown_codes_to_null() {
        let mut revs = table(
            TableKind::Revs,
            vec![review(Value::Int(1), 1), review(Value::Int(2), 9)],
        );
        revs.frame.rename_columns(|name| TableKind::Revs.convenience_name(name));
        revs.decode_values(TableKind::Revs.value_map("rtype").unwrap()).unwrap();
        let types = revs.frame.column("rtype").unwrap();
        assert_eq!(types[0], Value::from("review"));
        assert_eq!(types[1], Value::Null);
    }

    #[test]
    fn test_sort_field_follows_integer_affinity() {
        assert_eq!(sort_field_value("42"), Value::Int(42));
        assert_eq!(sort_field_value(" -7 "), Value::Int(-7));
        assert_eq!(sort_field_value("2.5"), Value::Real(2.5));
        assert_eq!(sort_field_value("3.0"), Value::Int(3));
        assert_eq!(sort_field_value("to eat"), Value::from("to eat"));
        assert_eq!(sort_field_value("1-2"), Value::from("1-2"));
        assert_eq!(sort_field_value("inf"), Value::from("inf"));
        assert_eq!(sort_field_value(""), Value::from(""));
    }

    #[test]
    fn test_encode_rejects_unknown_symbols() {
        let mut frame = Frame::new(["ctype"]);
        frame.push_row(vec![Value::from("graduated")]).unwrap();
        let mut cards = AnkiTable {
            meta: AnkiTable::empty(TableKind::Cards).meta,
            frame,
        };
        let err = cards
            .encode_values(TableKind::Cards.value_map("ctype").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::ResolutionFailure { what: "value", .. }));
    }

    #[test]
    fn test_casts_parse_text_ids() {
        let mut revs = table(TableKind::Revs, vec![review(Value::from("17"), 1)]);
        revs.apply_casts(TableKind::Revs.casts_forward()).unwrap();
        assert_eq!(revs.frame.column("id").unwrap()[0], Value::Int(17));
    }
}
