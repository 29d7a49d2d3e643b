//! Id ↔ name lookups and cross-table id chains.
//!
//! [`IdResolver`] fetches each lookup table from the [`Collection`] the
//! first time it is needed and caches it for the rest of the session. It
//! never writes. If the collection file is changed out of band, call
//! [`IdResolver::refresh`] to drop the caches.

use std::cell::OnceCell;
use std::collections::HashMap;

use tracing::debug;

use crate::columns::TableKind;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::source::{Collection, Deck, Model};
use crate::value::Value;

/// Deck id stored in `odid` for cards that are not in a filtered deck.
pub const NO_DECK: i64 = 0;

/// Cached lookups over one opened collection.
pub struct IdResolver<'a> {
    collection: &'a dyn Collection,
    models: OnceCell<Vec<Model>>,
    decks: OnceCell<Vec<Deck>>,
    card_links: OnceCell<HashMap<i64, (i64, i64)>>,
    note_models: OnceCell<HashMap<i64, i64>>,
}

fn cached<T>(cell: &OnceCell<T>, load: impl FnOnce() -> Result<T>) -> Result<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = load()?;
    Ok(cell.get_or_init(|| value))
}

fn int_column(frame: &Frame, name: &str) -> Result<Vec<i64>> {
    frame
        .require(name)?
        .iter()
        .map(|v| {
            v.as_int().ok_or_else(|| Error::InvalidCast {
                value: format!("{name}: {v:?}"),
                target: "int",
            })
        })
        .collect()
}

impl<'a> IdResolver<'a> {
    pub fn new(collection: &'a dyn Collection) -> Self {
        Self {
            collection,
            models: OnceCell::new(),
            decks: OnceCell::new(),
            card_links: OnceCell::new(),
            note_models: OnceCell::new(),
        }
    }

    pub fn collection(&self) -> &'a dyn Collection {
        self.collection
    }

    /// Drops every cached lookup table.
    pub fn refresh(&mut self) {
        self.models = OnceCell::new();
        self.decks = OnceCell::new();
        self.card_links = OnceCell::new();
        self.note_models = OnceCell::new();
    }

    pub fn models(&self) -> Result<&[Model]> {
        cached(&self.models, || {
            debug!("loading models");
            self.collection.models()
        })
        .map(Vec::as_slice)
    }

    pub fn decks(&self) -> Result<&[Deck]> {
        cached(&self.decks, || {
            debug!("loading decks");
            self.collection.decks()
        })
        .map(Vec::as_slice)
    }

    pub fn model(&self, mid: i64) -> Result<&Model> {
        self.models()?
            .iter()
            .find(|m| m.id == mid)
            .ok_or_else(|| Error::unresolved("model id", mid))
    }

    pub fn model_name(&self, mid: i64) -> Result<&str> {
        self.model(mid).map(|m| m.name.as_str())
    }

    pub fn model_id(&self, name: &str) -> Result<i64> {
        self.models()?
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.id)
            .ok_or_else(|| Error::unresolved("model", name))
    }

    pub fn model_fields(&self, mid: i64) -> Result<&[String]> {
        self.model(mid).map(|m| m.fields.as_slice())
    }

    pub fn sort_field(&self, mid: i64) -> Result<usize> {
        self.model(mid).map(|m| m.sort_field)
    }

    /// Deck name for `did`; [`NO_DECK`] maps to the empty name.
    pub fn deck_name(&self, did: i64) -> Result<&str> {
        if did == NO_DECK {
            return Ok("");
        }
        self.decks()?
            .iter()
            .find(|d| d.id == did)
            .map(|d| d.name.as_str())
            .ok_or_else(|| Error::unresolved("deck id", did))
    }

    /// Deck id for `name`; the empty name maps to [`NO_DECK`].
    pub fn deck_id(&self, name: &str) -> Result<i64> {
        if name.is_empty() {
            return Ok(NO_DECK);
        }
        self.decks()?
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.id)
            .ok_or_else(|| Error::unresolved("deck", name))
    }

    fn card_links(&self) -> Result<&HashMap<i64, (i64, i64)>> {
        cached(&self.card_links, || {
            debug!("loading card links");
            let cards = self.collection.load_table(TableKind::Cards)?;
            let links = int_column(&cards, "id")?
                .into_iter()
                .zip(int_column(&cards, "nid")?.into_iter().zip(int_column(&cards, "did")?))
                .collect();
            Ok(links)
        })
    }

    /// Note id of card `cid`.
    pub fn card_note(&self, cid: i64) -> Result<i64> {
        self.card_links()?
            .get(&cid)
            .map(|(nid, _)| *nid)
            .ok_or_else(|| Error::unresolved("card id", cid))
    }

    /// Deck id of card `cid`.
    pub fn card_deck(&self, cid: i64) -> Result<i64> {
        self.card_links()?
            .get(&cid)
            .map(|(_, did)| *did)
            .ok_or_else(|| Error::unresolved("card id", cid))
    }

    /// Model id of note `nid`.
    pub fn note_model(&self, nid: i64) -> Result<i64> {
        cached(&self.note_models, || {
            debug!("loading note models");
            let notes = self.collection.load_table(TableKind::Notes)?;
            Ok(int_column(&notes, "id")?
                .into_iter()
                .zip(int_column(&notes, "mid")?)
                .collect())
        })?
        .get(&nid)
        .copied()
        .ok_or_else(|| Error::unresolved("note id", nid))
    }

    /// Applies `lookup` to every integer cell of a column.
    pub(crate) fn map_ids(
        values: &[Value],
        what: &'static str,
        mut lookup: impl FnMut(i64) -> Result<Value>,
    ) -> Result<Vec<Value>> {
        values
            .iter()
            .map(|v| match v {
                Value::Int(id) => lookup(*id),
                Value::Null => Ok(Value::Null),
                other => Err(Error::unresolved(what, format!("{other:?}"))),
            })
            .collect()
    }

    /// Applies `lookup` to every text cell of a column.
    pub(crate) fn map_names(
        values: &[Value],
        what: &'static str,
        mut lookup: impl FnMut(&str) -> Result<i64>,
    ) -> Result<Vec<Value>> {
        values
            .iter()
            .map(|v| match v {
                Value::Text(name) => lookup(name).map(Value::Int),
                Value::Null => Ok(Value::Null),
                other => Err(Error::unresolved(what, format!("{other:?}"))),
            })
            .collect()
    }
}
