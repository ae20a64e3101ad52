use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{RankedEntries, SizeEntry};

/// Order in which measured entries are reported.
///
/// Any configured value other than `ASC` or `DESC` maps to `Unordered`, which
/// keeps discovery order. Callers must not rely on that order meaning anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
    Unordered,
}

impl SortDirection {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "ASC" => SortDirection::Asc,
            "DESC" => SortDirection::Desc,
            _ => SortDirection::Unordered,
        }
    }
}

impl From<&str> for SortDirection {
    fn from(value: &str) -> Self {
        SortDirection::parse(value)
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
            SortDirection::Unordered => "UNORDERED",
        };
        f.write_str(s)
    }
}

/// Stable sort of `items` by the byte count `size_of` returns.
///
/// Equal sizes keep their input order in both directions.
pub fn rank_by<T, F>(mut items: Vec<T>, direction: SortDirection, size_of: F) -> Vec<T>
where
    F: Fn(&T) -> u64,
{
    match direction {
        SortDirection::Asc => items.sort_by(|a, b| size_of(a).cmp(&size_of(b))),
        SortDirection::Desc => items.sort_by(|a, b| size_of(b).cmp(&size_of(a))),
        SortDirection::Unordered => {}
    }
    items
}

/// Ranks folder entries, and their child breakdowns, in `direction`.
pub fn rank(entries: Vec<SizeEntry>, direction: SortDirection) -> RankedEntries {
    let entries = entries
        .into_iter()
        .map(|mut e| {
            let children = std::mem::take(&mut e.children);
            e.children = rank_by(children, direction, |c| c.bytes);
            e
        })
        .collect();
    RankedEntries { direction, entries: rank_by(entries, direction, |e| e.bytes) }
}
