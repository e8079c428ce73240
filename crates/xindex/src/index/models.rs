//! Data structures describing the built index.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::locref::LocationReference;

/// A raw entry after style semantics were applied, before tree assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Display spelling of each hierarchy level.
    pub key: Vec<String>,
    /// Explicit display override from `:tkey`, when given.
    pub display_key: Option<Vec<String>>,
    /// Merge-rewritten key used for equality and grouping.
    pub canonical_key: Vec<String>,
    pub attribute: Option<String>,
    pub locrefs: Vec<LocationReference>,
    pub xref_target: Option<Vec<String>>,
    /// Crossref class selected for this entry's `:xref`.
    pub xref_class: Option<String>,
    pub xref_verified: bool,
    /// Input stream position, the final sorting tie-breaker.
    pub position: usize,
}

/// A cross-reference attached to a tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crossref {
    /// Target key layers, joined by the crossref-layer-list separator.
    pub target: Vec<String>,
    pub class: String,
    pub attribute: Option<String>,
    pub verified: bool,
}

/// A range endpoint pair; both fields index into the owning node's
/// `locrefs` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRef {
    pub start: usize,
    pub end: usize,
}

/// One node of the hierarchical index tree.
///
/// Children are uniquely keyed by their canonical key prefix. `suppressed`
/// holds locref indices covered by a range (or dropped by a `merge-to
/// :drop` edge); they stay in `locrefs` so `ranges` indices remain valid
/// but are skipped for standalone emission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexNode {
    pub term: String,
    /// Canonical key prefix identifying this node.
    pub key_prefix: Vec<String>,
    pub attribute: Option<String>,
    pub locrefs: Vec<LocationReference>,
    pub ranges: Vec<RangeRef>,
    pub suppressed: BTreeSet<usize>,
    /// Ordinal strings removed per source attribute by drop-merges, so the
    /// renderer never re-emits them.
    pub dropped_ordnums: IndexMap<String, BTreeSet<String>>,
    pub crossrefs: Vec<Crossref>,
    pub children: Vec<IndexNode>,
}

impl IndexNode {
    #[must_use]
    pub fn new(term: String, key_prefix: Vec<String>) -> Self {
        Self {
            term,
            key_prefix,
            ..Self::default()
        }
    }

    /// Merges `refs` in, de-duplicating by `(locref_string, attribute)`.
    /// Returns whether anything was added.
    pub fn add_locrefs<I>(&mut self, refs: I) -> bool
    where
        I: IntoIterator<Item = LocationReference>,
    {
        let mut added = false;
        for reference in refs {
            let duplicate = self.locrefs.iter().any(|existing| {
                existing.locref_string == reference.locref_string
                    && existing.attribute == reference.attribute
            });
            if !duplicate {
                self.locrefs.push(reference);
                added = true;
            }
        }
        added
    }

    /// Attaches a crossref unless an identical one is already present.
    pub fn add_crossref(&mut self, crossref: Crossref) {
        if !self.crossrefs.contains(&crossref) {
            self.crossrefs.push(crossref);
        }
    }
}

/// One output bucket (e.g. `A`, `B`, `Symbols`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterGroup {
    pub label: String,
    pub nodes: Vec<IndexNode>,
    pub entry_count: usize,
}

/// The fully built index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub groups: Vec<LetterGroup>,
    pub total_entries: usize,
    /// Entry counts at each decile, for progress reporting.
    pub progress_markers: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;
    use crate::locref::RefState;

    fn reference(text: &str, attr: Option<&str>) -> LocationReference {
        LocationReference {
            class: "pages".to_owned(),
            class_ordnum: 1,
            attribute: attr.map(str::to_owned),
            layers: vec![text.to_owned()],
            ordnums: smallvec![text.parse().unwrap_or(0)],
            locref_string: text.to_owned(),
            state: RefState::Normal,
            is_virtual: false,
            merge_drop: false,
            origin_attr: None,
            position: 0,
        }
    }

    #[test]
    fn add_locrefs_dedups_by_string_and_attribute() {
        let mut node = IndexNode::new("term".to_owned(), vec!["term".to_owned()]);
        assert!(node.add_locrefs([reference("7", Some("def"))]));
        assert!(!node.add_locrefs([reference("7", Some("def"))]));
        assert!(node.add_locrefs([reference("7", Some("imp"))]));
        assert_eq!(node.locrefs.len(), 2);
    }

    #[test]
    fn add_crossref_dedups_exact_duplicates() {
        let mut node = IndexNode::new("a".to_owned(), vec!["a".to_owned()]);
        let crossref = Crossref {
            target: vec!["b".to_owned()],
            class: "see".to_owned(),
            attribute: None,
            verified: true,
        };
        node.add_crossref(crossref.clone());
        node.add_crossref(crossref);
        assert_eq!(node.crossrefs.len(), 1);
    }
}
