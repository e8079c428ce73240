//! Matched location references and category attributes.

use serde::{Deserialize, Serialize};

use crate::locclass::{LocationClass, OrdnumVec};

/// A declared attribute (`define-attributes`), ordered three ways:
/// `group_ord` picks the rendering partition, `sort_ord` breaks ties
/// between references with equal ordinals, `processing_ord` is the overall
/// declaration position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAttribute {
    pub name: String,
    /// 1-based index of the group this attribute was declared in.
    pub group_ord: usize,
    pub sort_ord: usize,
    pub processing_ord: usize,
    /// Name of the last attribute declared in the same group.
    pub last_in_group: String,
}

/// Range state carried over from the raw entry's markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
pub enum RefState {
    Normal,
    OpenRange,
    CloseRange,
}

/// A location string successfully matched against a location class.
///
/// Mutated only while the index tree is assembled; frozen for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReference {
    /// Name of the matched class.
    pub class: String,
    /// Cached `ordnum` of the matched class, for inter-class ordering.
    pub class_ordnum: u32,
    pub attribute: Option<String>,
    /// Matched text per non-separator layer.
    pub layers: Vec<String>,
    pub ordnums: OrdnumVec,
    /// The original location string from the raw entry.
    pub locref_string: String,
    pub state: RefState,
    /// True for emissions produced by a `merge-to` edge rather than the
    /// entry's own attribute.
    pub is_virtual: bool,
    /// `:drop` flag of the `merge-to` edge that produced this reference.
    pub merge_drop: bool,
    /// Source attribute of a virtual reference, used to suppress the
    /// original references when the merged one ends up inside a range.
    pub origin_attr: Option<String>,
    /// Raw-entry stream position, the final tie-breaker.
    pub position: usize,
}

impl LocationReference {
    /// Builds a reference for `class` from an already successful match.
    #[must_use]
    pub fn new(
        class: &LocationClass,
        locref_string: impl Into<String>,
        layers: Vec<String>,
        ordnums: OrdnumVec,
        attribute: Option<String>,
        position: usize,
    ) -> Self {
        Self {
            class: class.name.clone(),
            class_ordnum: class.ordnum,
            attribute,
            layers,
            ordnums,
            locref_string: locref_string.into(),
            state: RefState::Normal,
            is_virtual: false,
            merge_drop: false,
            origin_attr: None,
            position,
        }
    }

    /// The ordinal of the final layer, which drives range detection.
    #[must_use]
    pub fn last_ordnum(&self) -> Option<i64> {
        self.ordnums.last().copied()
    }

    /// The ordinal prefix shared by references that may form a range.
    #[must_use]
    pub fn ordnum_prefix(&self) -> &[i64] {
        let len = self.ordnums.len();
        &self.ordnums[..len.saturating_sub(1)]
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;

    #[test]
    fn prefix_and_last_split_the_ordnums() {
        let ordnums: OrdnumVec = smallvec![2, 13];
        let reference = LocationReference {
            class: "pages".to_owned(),
            class_ordnum: 1,
            attribute: None,
            layers: vec!["2".to_owned(), "13".to_owned()],
            ordnums,
            locref_string: "2-13".to_owned(),
            state: RefState::Normal,
            is_virtual: false,
            merge_drop: false,
            origin_attr: None,
            position: 0,
        };
        assert_eq!(reference.ordnum_prefix(), &[2]);
        assert_eq!(reference.last_ordnum(), Some(13));
    }
}
