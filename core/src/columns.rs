//! Static column schema for the three Anki tables.
//!
//! Everything here is constant data keyed by [`TableKind`]: the rename map
//! between native and convenience column names, dtype casts, categorical
//! value maps, the promoted index column and the exact native column
//! order needed to rebuild a row for storage.
//!
//! # Naming
//!
//! Convenience names carry a one-letter table prefix (`n` notes, `c` cards,
//! `r` revs) so that merged tables keep unambiguous column names. Columns
//! that are replaced by a derived column during normalization (`mid`,
//! `did`, `odid`) keep their native name while they are in flight.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::ScalarType;

/// The three tables of an Anki collection that can be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Notes,
    Cards,
    Revs,
}

/// Bidirectional map between integer codes and symbolic names.
///
/// Declared as constant tables; bijectivity is checked by the unit tests
/// of this module rather than at runtime.
#[derive(Debug)]
pub struct ValueMap {
    /// Convenience column the map applies to.
    pub column: &'static str,
    /// `(code, symbol)` pairs.
    pub entries: &'static [(i64, &'static str)],
}

impl ValueMap {
    pub fn symbol(&self, code: i64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, s)| *s)
    }

    pub fn code(&self, symbol: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(_, s)| *s == symbol)
            .map(|(c, _)| *c)
    }
}

const NOTES_NATIVE: &[&str] = &[
    "id", "guid", "mid", "mod", "usn", "tags", "flds", "sfld", "csum", "flags", "data",
];

const CARDS_NATIVE: &[&str] = &[
    "id", "nid", "did", "ord", "mod", "usn", "type", "queue", "due", "ivl", "factor", "reps",
    "lapses", "left", "odue", "odid", "flags", "data",
];

const REVS_NATIVE: &[&str] = &[
    "id", "cid", "usn", "ease", "ivl", "lastIvl", "factor", "time", "type",
];

const NOTES_RENAME: &[(&str, &str)] = &[
    ("id", "nid"),
    ("guid", "nguid"),
    ("mid", "mid"),
    ("mod", "nmod"),
    ("usn", "nusn"),
    ("tags", "ntags"),
    ("flds", "nflds"),
    ("sfld", "nsfld"),
    ("csum", "ncsum"),
    ("flags", "nflags"),
    ("data", "ndata"),
];

const CARDS_RENAME: &[(&str, &str)] = &[
    ("id", "cid"),
    ("nid", "nid"),
    ("did", "did"),
    ("ord", "cord"),
    ("mod", "cmod"),
    ("usn", "cusn"),
    ("type", "ctype"),
    ("queue", "cqueue"),
    ("due", "cdue"),
    ("ivl", "civl"),
    ("factor", "cfactor"),
    ("reps", "creps"),
    ("lapses", "clapses"),
    ("left", "cleft"),
    ("odue", "codue"),
    ("odid", "odid"),
    ("flags", "cflags"),
    ("data", "cdata"),
];

const REVS_RENAME: &[(&str, &str)] = &[
    ("id", "rid"),
    ("cid", "cid"),
    ("usn", "rusn"),
    ("ease", "rease"),
    ("ivl", "rivl"),
    ("lastIvl", "rlastivl"),
    ("factor", "rfactor"),
    ("time", "rtime"),
    ("type", "rtype"),
];

const NOTES_OURS: &[&str] = &["nguid", "nmodel", "nmod", "nusn", "ntags", "nflds"];

const CARDS_OURS: &[&str] = &[
    "nid", "cdeck", "codeck", "cord", "cmod", "cusn", "ctype", "cqueue", "cdue", "civl",
    "cfactor", "creps", "clapses", "cleft", "codue",
];

const REVS_OURS: &[&str] = &[
    "cid", "rusn", "rease", "rivl", "rlastivl", "rfactor", "rtime", "rtype",
];

const NOTES_CASTS: &[(&str, ScalarType)] = &[
    ("id", ScalarType::Int),
    ("guid", ScalarType::Text),
    ("mid", ScalarType::Int),
    ("mod", ScalarType::Int),
    ("usn", ScalarType::Int),
    ("tags", ScalarType::Text),
    ("flds", ScalarType::Text),
    ("csum", ScalarType::Int),
];

const CARDS_CASTS: &[(&str, ScalarType)] = &[
    ("id", ScalarType::Int),
    ("nid", ScalarType::Int),
    ("did", ScalarType::Int),
    ("ord", ScalarType::Int),
    ("mod", ScalarType::Int),
    ("usn", ScalarType::Int),
    ("type", ScalarType::Int),
    ("queue", ScalarType::Int),
    ("due", ScalarType::Int),
    ("ivl", ScalarType::Int),
    ("factor", ScalarType::Int),
    ("reps", ScalarType::Int),
    ("lapses", ScalarType::Int),
    ("left", ScalarType::Int),
    ("odue", ScalarType::Int),
    ("odid", ScalarType::Int),
];

const REVS_CASTS: &[(&str, ScalarType)] = &[
    ("id", ScalarType::Int),
    ("cid", ScalarType::Int),
    ("usn", ScalarType::Int),
    ("ease", ScalarType::Int),
    ("ivl", ScalarType::Int),
    ("lastIvl", ScalarType::Int),
    ("factor", ScalarType::Int),
    ("time", ScalarType::Int),
    ("type", ScalarType::Int),
];

const CARD_QUEUE: ValueMap = ValueMap {
    column: "cqueue",
    entries: &[
        (-3, "sched buried"),
        (-2, "user buried"),
        (-1, "suspended"),
        (0, "new"),
        (1, "learning"),
        (2, "due"),
        (3, "in learning"),
        (4, "preview"),
    ],
};

const CARD_TYPE: ValueMap = ValueMap {
    column: "ctype",
    entries: &[(0, "new"), (1, "learning"), (2, "review"), (3, "relearn")],
};

const REV_TYPE: ValueMap = ValueMap {
    column: "rtype",
    entries: &[
        (0, "learning"),
        (1, "review"),
        (2, "relearn"),
        (3, "cram"),
        (4, "manual"),
    ],
};

const CARDS_VALUE_MAPS: &[ValueMap] = &[CARD_QUEUE, CARD_TYPE];
const REVS_VALUE_MAPS: &[ValueMap] = &[REV_TYPE];

impl TableKind {
    pub const ALL: [TableKind; 3] = [TableKind::Notes, TableKind::Cards, TableKind::Revs];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Notes => "notes",
            TableKind::Cards => "cards",
            TableKind::Revs => "revs",
        }
    }

    /// Name of the backing table in the collection file.
    pub fn storage_name(&self) -> &'static str {
        match self {
            TableKind::Notes => "notes",
            TableKind::Cards => "cards",
            TableKind::Revs => "revlog",
        }
    }

    /// Native columns in the exact order storage expects.
    pub fn native_columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::Notes => NOTES_NATIVE,
            TableKind::Cards => CARDS_NATIVE,
            TableKind::Revs => REVS_NATIVE,
        }
    }

    /// Native → convenience column names.
    pub fn renames(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            TableKind::Notes => NOTES_RENAME,
            TableKind::Cards => CARDS_RENAME,
            TableKind::Revs => REVS_RENAME,
        }
    }

    pub fn convenience_name(&self, native: &str) -> Option<&'static str> {
        self.renames()
            .iter()
            .find(|(n, _)| *n == native)
            .map(|(_, ours)| *ours)
    }

    pub fn native_name(&self, ours: &str) -> Option<&'static str> {
        self.renames()
            .iter()
            .find(|(_, o)| *o == ours)
            .map(|(native, _)| *native)
    }

    /// Convenience columns kept after normalization, excluding the index.
    pub fn convenience_columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::Notes => NOTES_OURS,
            TableKind::Cards => CARDS_OURS,
            TableKind::Revs => REVS_OURS,
        }
    }

    /// Convenience name of the column promoted to the index.
    pub fn index_column(&self) -> &'static str {
        match self {
            TableKind::Notes => "nid",
            TableKind::Cards => "cid",
            TableKind::Revs => "rid",
        }
    }

    /// Casts applied to native columns right after reading.
    pub fn casts_forward(&self) -> &'static [(&'static str, ScalarType)] {
        match self {
            TableKind::Notes => NOTES_CASTS,
            TableKind::Cards => CARDS_CASTS,
            TableKind::Revs => REVS_CASTS,
        }
    }

    /// Casts applied to native columns right before writing.
    pub fn casts_backward(&self) -> &'static [(&'static str, ScalarType)] {
        // Same storage classes in both directions.
        self.casts_forward()
    }

    pub fn value_maps(&self) -> &'static [ValueMap] {
        match self {
            TableKind::Notes => &[],
            TableKind::Cards => CARDS_VALUE_MAPS,
            TableKind::Revs => REVS_VALUE_MAPS,
        }
    }

    pub fn value_map(&self, column: &str) -> Option<&'static ValueMap> {
        self.value_maps().iter().find(|m| m.column == column)
    }

    /// Convenience name of the update sequence number column.
    pub fn usn_column(&self) -> &'static str {
        match self {
            TableKind::Notes => "nusn",
            TableKind::Cards => "cusn",
            TableKind::Revs => "rusn",
        }
    }

    /// Convenience name of the modification timestamp column; reviews are
    /// immutable and have none.
    pub fn mod_column(&self) -> Option<&'static str> {
        match self {
            TableKind::Notes => Some("nmod"),
            TableKind::Cards => Some("cmod"),
            TableKind::Revs => None,
        }
    }

    /// Whether the native table carries the legacy `flags`/`data` pair.
    pub fn has_legacy_columns(&self) -> bool {
        !matches!(self, TableKind::Revs)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "notes" => Ok(TableKind::Notes),
            "cards" => Ok(TableKind::Cards),
            "revs" | "revlog" => Ok(TableKind::Revs),
            other => Err(Error::InvalidTableKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_value_maps_are_bijective() {
        for kind in TableKind::ALL {
            for map in kind.value_maps() {
                let codes: HashSet<_> = map.entries.iter().map(|(c, _)| *c).collect();
                let symbols: HashSet<_> = map.entries.iter().map(|(_, s)| *s).collect();
                assert_eq!(codes.len(), map.entries.len(), "{kind}.{}", map.column);
                assert_eq!(symbols.len(), map.entries.len(), "{kind}.{}", map.column);
                for (code, symbol) in map.entries {
                    assert_eq!(map.code(map.symbol(*code).unwrap()), Some(*code));
                    assert_eq!(map.symbol(map.code(symbol).unwrap()), Some(*symbol));
                }
            }
        }
    }

    #[test]
    fn test_rename_maps_are_invertible() {
        for kind in TableKind::ALL {
            let ours: HashSet<_> = kind.renames().iter().map(|(_, o)| *o).collect();
            assert_eq!(ours.len(), kind.renames().len(), "{kind}");
            for (native, conv) in kind.renames() {
                assert_eq!(kind.native_name(conv), Some(*native));
            }
        }
    }

    #[test]
    fn test_rename_covers_every_native_column() {
        for kind in TableKind::ALL {
            for column in kind.native_columns() {
                assert!(kind.convenience_name(column).is_some(), "{kind}.{column}");
            }
            assert_eq!(kind.native_name(kind.index_column()), Some("id"));
        }
    }

    #[test]
    fn test_value_maps_target_kept_columns() {
        for kind in TableKind::ALL {
            for map in kind.value_maps() {
                assert!(kind.convenience_columns().contains(&map.column));
            }
        }
    }

    #[test]
    fn test_casts_name_native_columns() {
        for kind in TableKind::ALL {
            for (column, _) in kind.casts_forward() {
                assert!(kind.native_columns().contains(column), "{kind}.{column}");
            }
        }
    }

    #[test]
    fn test_parse_table_kind() {
        assert_eq!("revlog".parse::<TableKind>().unwrap(), TableKind::Revs);
        assert_eq!("notes".parse::<TableKind>().unwrap(), TableKind::Notes);
        assert!(matches!(
            "graves".parse::<TableKind>(),
            Err(Error::InvalidTableKind(name)) if name == "graves"
        ));
    }
}
