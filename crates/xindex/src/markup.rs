//! Declarative markup templates collected from `markup-*` style forms.
//!
//! Every form stores a [`MarkupSpec`] under a structured key; forms that
//! accept `:depth`, `:class`, or `:layer` arguments land in nested maps
//! with a `__default__` bucket for unspecialised declarations. The
//! renderer merges specialised specs over the defaults and falls back to
//! built-in values, so lookups never fail.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Key for unspecialised markup buckets.
pub const DEFAULT_KEY: &str = "__default__";

/// Template parameters of a single `markup-*` form.
///
/// `None` means "not declared" and lets lookups fall through to less
/// specialised declarations or the renderer's defaults, which is distinct
/// from an explicitly empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupSpec {
    pub open: Option<String>,
    pub close: Option<String>,
    pub sep: Option<String>,
    pub open_head: Option<String>,
    pub close_head: Option<String>,
    pub prefix: Option<String>,
    pub template: Option<String>,
    pub unverified_suffix: Option<String>,
    pub capitalize: bool,
}

impl MarkupSpec {
    /// Stores one keyword argument, normalising `~`-escapes in strings.
    /// Unknown parameter names are ignored; the renderer is total.
    pub fn assign(&mut self, key: &str, value: Option<&str>, flag: bool) {
        let text = value.map(normalize_template);
        match key {
            "open" => self.open = text,
            "close" => self.close = text,
            "sep" => self.sep = text,
            "open-head" => self.open_head = text,
            "close-head" => self.close_head = text,
            "prefix" => self.prefix = text,
            "template" => self.template = text,
            "unverified-suffix" => self.unverified_suffix = text,
            "capitalize" => self.capitalize = flag,
            _ => {}
        }
    }

    /// Layers `self` over `base`: declared fields win, undeclared fields
    /// fall through.
    #[must_use]
    pub fn merged_over(&self, base: &Self) -> Self {
        Self {
            open: self.open.clone().or_else(|| base.open.clone()),
            close: self.close.clone().or_else(|| base.close.clone()),
            sep: self.sep.clone().or_else(|| base.sep.clone()),
            open_head: self.open_head.clone().or_else(|| base.open_head.clone()),
            close_head: self.close_head.clone().or_else(|| base.close_head.clone()),
            prefix: self.prefix.clone().or_else(|| base.prefix.clone()),
            template: self.template.clone().or_else(|| base.template.clone()),
            unverified_suffix: self
                .unverified_suffix
                .clone()
                .or_else(|| base.unverified_suffix.clone()),
            capitalize: self.capitalize || base.capitalize,
        }
    }

    #[must_use]
    pub fn open_or(&self, default: &str) -> String {
        self.open.clone().unwrap_or_else(|| default.to_owned())
    }

    #[must_use]
    pub fn close_or(&self, default: &str) -> String {
        self.close.clone().unwrap_or_else(|| default.to_owned())
    }

    #[must_use]
    pub fn sep_or(&self, default: &str) -> String {
        self.sep.clone().unwrap_or_else(|| default.to_owned())
    }
}

/// All markup declarations of a style, keyed as described in the module
/// docs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkupOptions {
    pub index: MarkupSpec,
    pub letter_group_list: MarkupSpec,
    pub letter_group: MarkupSpec,
    /// `markup-indexentry`, by depth.
    pub indexentry: BTreeMap<usize, MarkupSpec>,
    /// `markup-indexentry-list`, by depth.
    pub indexentry_list: BTreeMap<usize, MarkupSpec>,
    /// `markup-locref`, by attribute name.
    pub locref: IndexMap<String, MarkupSpec>,
    /// `markup-locref-list`, by class name then depth.
    pub locref_list: IndexMap<String, BTreeMap<usize, MarkupSpec>>,
    /// `markup-locref-layer`, by class name, depth, then layer index.
    pub locref_layer: IndexMap<String, BTreeMap<usize, BTreeMap<usize, MarkupSpec>>>,
    pub locclass_list: MarkupSpec,
    pub attribute_group_list: MarkupSpec,
    /// `markup-attribute-group`, by attribute name.
    pub attribute_group: IndexMap<String, MarkupSpec>,
    /// `markup-crossref-list`, by crossref class name.
    pub crossref_list: IndexMap<String, MarkupSpec>,
    pub crossref_layer_list: MarkupSpec,
    pub range: MarkupSpec,
    /// Whether any `markup-*` form was evaluated at all.
    pub any_set: bool,
}

impl MarkupOptions {
    /// Effective `markup-indexentry` spec at `depth` (specialised over the
    /// depth-0 declaration).
    #[must_use]
    pub fn indexentry_at(&self, depth: usize) -> MarkupSpec {
        merge_by_depth(&self.indexentry, depth)
    }

    /// Effective `markup-indexentry-list` spec at `depth`.
    #[must_use]
    pub fn indexentry_list_at(&self, depth: usize) -> MarkupSpec {
        merge_by_depth(&self.indexentry_list, depth)
    }

    /// Effective `markup-locref` spec for an attribute.
    #[must_use]
    pub fn locref_for(&self, attribute: Option<&str>) -> MarkupSpec {
        let default = self.locref.get(DEFAULT_KEY).cloned().unwrap_or_default();
        match attribute.and_then(|attr| self.locref.get(attr)) {
            Some(spec) => spec.merged_over(&default),
            None => default,
        }
    }

    /// Effective `markup-locref-list` spec for a class at `depth`.
    ///
    /// Merge order (most specific wins): exact class and depth, class at
    /// depth 0, default at depth, default at depth 0.
    #[must_use]
    pub fn locref_list_for(&self, class: &str, depth: usize) -> MarkupSpec {
        let mut spec = MarkupSpec::default();
        for (class_key, depth_key) in [
            (DEFAULT_KEY, 0),
            (DEFAULT_KEY, depth),
            (class, 0),
            (class, depth),
        ] {
            if let Some(found) = self
                .locref_list
                .get(class_key)
                .and_then(|by_depth| by_depth.get(&depth_key))
            {
                spec = found.merged_over(&spec);
            }
        }
        spec
    }

    /// Effective `markup-locref-layer` spec for a class/depth/layer triple.
    #[must_use]
    pub fn locref_layer_for(&self, class: &str, depth: usize, layer: usize) -> MarkupSpec {
        let mut spec = MarkupSpec::default();
        for class_key in [DEFAULT_KEY, class] {
            if let Some(found) = self
                .locref_layer
                .get(class_key)
                .and_then(|by_depth| by_depth.get(&depth))
                .and_then(|by_layer| by_layer.get(&layer))
            {
                spec = found.merged_over(&spec);
            }
        }
        spec
    }

    /// Effective `markup-crossref-list` spec for a crossref class.
    #[must_use]
    pub fn crossref_list_for(&self, class: &str) -> MarkupSpec {
        let default = self
            .crossref_list
            .get(DEFAULT_KEY)
            .cloned()
            .unwrap_or_default();
        match self.crossref_list.get(class) {
            Some(spec) => spec.merged_over(&default),
            None => default,
        }
    }
}

fn merge_by_depth(map: &BTreeMap<usize, MarkupSpec>, depth: usize) -> MarkupSpec {
    let base = map.get(&0).cloned().unwrap_or_default();
    if depth == 0 {
        return base;
    }
    match map.get(&depth) {
        Some(spec) => spec.merged_over(&base),
        None => base,
    }
}

/// Expands the `~`-escapes of template strings: `~n` is a newline, `~~` a
/// literal tilde. Any other `~X` keeps both characters.
#[must_use]
pub fn normalize_template(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '~' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('~') => out.push('~'),
            Some(other) => {
                out.push('~');
                out.push(other);
            }
            None => out.push('~'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tilde_escapes() {
        assert_eq!(normalize_template("a~nb"), "a\nb");
        assert_eq!(normalize_template("50~~100"), "50~100");
        assert_eq!(normalize_template("~x~"), "~x~");
    }

    #[test]
    fn merged_over_prefers_specialised_fields() {
        let mut base = MarkupSpec::default();
        base.assign("open", Some("["), false);
        base.assign("sep", Some(", "), false);
        let mut special = MarkupSpec::default();
        special.assign("open", Some("{"), false);
        let merged = special.merged_over(&base);
        assert_eq!(merged.open.as_deref(), Some("{"));
        assert_eq!(merged.sep.as_deref(), Some(", "));
    }

    #[test]
    fn locref_list_lookup_falls_back_by_class_and_depth() {
        let mut options = MarkupOptions::default();
        let mut default_spec = MarkupSpec::default();
        default_spec.assign("sep", Some(", "), false);
        options
            .locref_list
            .entry(DEFAULT_KEY.to_owned())
            .or_default()
            .insert(0, default_spec);
        let mut page_spec = MarkupSpec::default();
        page_spec.assign("open", Some("p. "), false);
        options
            .locref_list
            .entry("pages".to_owned())
            .or_default()
            .insert(0, page_spec);

        let spec = options.locref_list_for("pages", 1);
        assert_eq!(spec.open.as_deref(), Some("p. "));
        assert_eq!(spec.sep.as_deref(), Some(", "));
        let other = options.locref_list_for("appendix", 0);
        assert_eq!(other.open, None);
        assert_eq!(other.sep.as_deref(), Some(", "));
    }
}
