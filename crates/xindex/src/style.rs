//! The materialised result of evaluating style files.
//!
//! [`StyleState`] is populated by the evaluator and read-only afterwards:
//! the index builder and the renderer only ever borrow it.

use std::path::PathBuf;

use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;

use crate::{
    basetype::{Alphabet, BaseType, EnumMatcher, Enumeration},
    error::IndexBuilderError,
    locclass::LocationClass,
    locref::CategoryAttribute,
    markup::MarkupOptions,
    rules::{self, Orientation, RewriteRule},
};

/// A declared cross-reference class (`define-crossref-class`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossrefClass {
    /// Unverified classes skip target validation.
    pub unverified: bool,
}

/// One `merge-to` edge: emit the location reference again under `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTo {
    pub from: String,
    pub to: String,
    /// With `:drop`, the source reference is removed once the merged one
    /// is covered by a range.
    pub drop: bool,
}

/// An uncompiled rule stored in a named rule set; compiled when
/// `use-rule-set` instantiates it for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTemplate {
    pub pattern: String,
    pub replacement: String,
    pub again: bool,
}

/// Everything a style defines, immutable once loading finishes.
#[derive(Debug)]
pub struct StyleState {
    pub basetypes: IndexMap<String, BaseType>,
    /// Insertion order doubles as the default matching order.
    pub location_classes: IndexMap<String, LocationClass>,
    /// Explicit override of the matching order (`define-location-class-order`).
    pub location_class_order: Vec<String>,
    pub attributes: IndexMap<String, CategoryAttribute>,
    pub attribute_groups: Vec<Vec<String>>,
    pub letter_groups: Vec<String>,
    pub crossref_classes: IndexMap<String, CrossrefClass>,
    pub sort_rules: Vec<RewriteRule>,
    pub sort_rule_orientations: Vec<Orientation>,
    pub merge_rules: Vec<MergeTo>,
    /// Rewrites applied to key strings for grouping and equality.
    pub keyword_merge_rules: Vec<RewriteRule>,
    pub rule_sets: AHashMap<String, Vec<RuleTemplate>>,
    pub markup: MarkupOptions,
    /// Feature symbols tested by `#+FEATURE` reader conditionals.
    pub features: AHashSet<String>,
    pub search_paths: Vec<PathBuf>,
    /// Canonical paths (or `builtin:` keys) already evaluated by `require`.
    pub loaded_files: AHashSet<String>,
    next_class_ordnum: u32,
}

impl Default for StyleState {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleState {
    /// Creates a state with the built-in base types registered.
    #[must_use]
    pub fn new() -> Self {
        let mut state = Self {
            basetypes: IndexMap::new(),
            location_classes: IndexMap::new(),
            location_class_order: Vec::new(),
            attributes: IndexMap::new(),
            attribute_groups: Vec::new(),
            letter_groups: Vec::new(),
            crossref_classes: IndexMap::new(),
            sort_rules: Vec::new(),
            sort_rule_orientations: vec![Orientation::Forward; 8],
            merge_rules: Vec::new(),
            keyword_merge_rules: Vec::new(),
            rule_sets: AHashMap::new(),
            markup: MarkupOptions::default(),
            features: AHashSet::new(),
            search_paths: Vec::new(),
            loaded_files: AHashSet::new(),
            next_class_ordnum: 0,
        };
        state.register_default_basetypes();
        state
    }

    fn register_default_basetypes(&mut self) {
        let uppercase: Vec<String> = ('A'..='Z').map(|c| c.to_string()).collect();
        let lowercase: Vec<String> = ('a'..='z').map(|c| c.to_string()).collect();
        let digits: Vec<String> = ('0'..='9').map(|c| c.to_string()).collect();
        self.register_basetype(BaseType::Alphabet(Alphabet::new("ALPHA", uppercase)));
        self.register_basetype(BaseType::Alphabet(Alphabet::new("alpha", lowercase)));
        self.register_basetype(BaseType::Alphabet(Alphabet::new("digits", digits)));
        self.register_basetype(BaseType::Enumeration(Enumeration::new(
            "arabic-numbers",
            "0123456789",
            EnumMatcher::Radix(10),
        )));
        self.register_basetype(BaseType::Enumeration(Enumeration::new(
            "roman-numbers-uppercase",
            "IVXLCDM",
            EnumMatcher::RomanUppercase,
        )));
        self.register_basetype(BaseType::Enumeration(Enumeration::new(
            "roman-numbers-lowercase",
            "ivxlcdm",
            EnumMatcher::RomanLowercase,
        )));
    }

    pub fn register_basetype(&mut self, basetype: BaseType) {
        self.basetypes.insert(basetype.name().to_owned(), basetype);
    }

    /// Allocates the next location-class ordnum; ids are unique per state
    /// and stable for its lifetime.
    pub(crate) fn next_class_ordnum(&mut self) -> u32 {
        self.next_class_ordnum += 1;
        self.next_class_ordnum
    }

    /// Location classes in matching order: the explicit
    /// `define-location-class-order` list when given, insertion order
    /// otherwise.
    pub fn effective_class_order(&self) -> Result<Vec<&LocationClass>, IndexBuilderError> {
        if self.location_classes.is_empty() {
            return Err(IndexBuilderError::new(
                "no location classes defined in style",
            ));
        }
        if self.location_class_order.is_empty() {
            return Ok(self.location_classes.values().collect());
        }
        let mut ordered = Vec::with_capacity(self.location_classes.len());
        for name in &self.location_class_order {
            let class = self.location_classes.get(name).ok_or_else(|| {
                IndexBuilderError::new(format!("unknown location class {name:?} in class order"))
            })?;
            ordered.push(class);
        }
        // classes missing from the explicit order keep their insertion order
        for class in self.location_classes.values() {
            if !self.location_class_order.contains(&class.name) {
                ordered.push(class);
            }
        }
        Ok(ordered)
    }

    /// Attribute used for entries without `:attr`.
    #[must_use]
    pub fn default_attribute_name(&self) -> String {
        if self.attributes.contains_key("default") {
            return "default".to_owned();
        }
        match self.attributes.keys().next() {
            Some(first) => first.clone(),
            None => "default".to_owned(),
        }
    }

    /// Sort ordinal of a declared attribute; undeclared attributes sort
    /// after all declared ones.
    #[must_use]
    pub fn attribute_sort_ord(&self, name: Option<&str>) -> usize {
        name.and_then(|n| self.attributes.get(n))
            .map_or(usize::MAX, |attr| attr.sort_ord)
    }

    /// Number of sort-rule runs (at least one).
    #[must_use]
    pub fn sort_run_count(&self) -> usize {
        self.sort_rules
            .iter()
            .map(|rule| rule.run + 1)
            .max()
            .unwrap_or(1)
    }

    fn merge_run_count(&self) -> usize {
        self.keyword_merge_rules
            .iter()
            .map(|rule| rule.run + 1)
            .max()
            .unwrap_or(1)
    }

    /// Multi-run sort key for one key part.
    #[must_use]
    pub fn sort_key(&self, part: &str) -> Vec<String> {
        rules::apply_runs(
            part,
            &self.sort_rules,
            &self.sort_rule_orientations,
            self.sort_run_count(),
        )
    }

    /// Canonical (merge-rewritten) form of one key part.
    #[must_use]
    pub fn merge_key(&self, part: &str) -> String {
        rules::apply_runs_collapsed(
            part,
            &self.keyword_merge_rules,
            &self.sort_rule_orientations,
            self.merge_run_count(),
        )
    }

    /// Letter-group labels: the declared list, or the first base type's
    /// base alphabet when nothing was declared.
    #[must_use]
    pub fn resolve_letter_groups(&self) -> Vec<String> {
        if !self.letter_groups.is_empty() {
            return self.letter_groups.clone();
        }
        match self.basetypes.values().next() {
            Some(basetype) => basetype
                .base_alphabet()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_basetypes_are_registered() {
        let state = StyleState::new();
        for name in [
            "ALPHA",
            "alpha",
            "digits",
            "arabic-numbers",
            "roman-numbers-uppercase",
            "roman-numbers-lowercase",
        ] {
            assert!(state.basetypes.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn class_ordnums_are_unique_and_increasing() {
        let mut state = StyleState::new();
        let first = state.next_class_ordnum();
        let second = state.next_class_ordnum();
        assert!(second > first);
    }

    #[test]
    fn default_attribute_prefers_declared_default() {
        let mut state = StyleState::new();
        assert_eq!(state.default_attribute_name(), "default");
        state.attributes.insert(
            "def".to_owned(),
            CategoryAttribute {
                name: "def".to_owned(),
                group_ord: 1,
                sort_ord: 0,
                processing_ord: 0,
                last_in_group: "def".to_owned(),
            },
        );
        assert_eq!(state.default_attribute_name(), "def");
        state.attributes.insert(
            "default".to_owned(),
            CategoryAttribute {
                name: "default".to_owned(),
                group_ord: 2,
                sort_ord: 1,
                processing_ord: 1,
                last_in_group: "default".to_owned(),
            },
        );
        assert_eq!(state.default_attribute_name(), "default");
    }

    #[test]
    fn letter_groups_fall_back_to_first_base_alphabet() {
        let state = StyleState::new();
        let groups = state.resolve_letter_groups();
        assert_eq!(groups.first().map(String::as_str), Some("A"));
        assert_eq!(groups.len(), 26);
    }
}
