//! Letter grouping and hierarchy assembly for sorted entries.

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    index::{
        models::{Crossref, IndexEntry, IndexNode, LetterGroup},
        ranges,
    },
    style::StyleState,
};

/// Buckets sorted entries into letter groups and builds each group's node
/// tree.
///
/// Declared labels keep their declared order; spill labels produced for
/// entries matching no declared label are appended after them in
/// first-seen order. Empty groups are suppressed.
pub(crate) fn group_entries(
    entries: Vec<IndexEntry>,
    state: &StyleState,
    display_for_prefix: &AHashMap<Vec<String>, String>,
) -> Vec<LetterGroup> {
    let labels = state.resolve_letter_groups();
    let mut buckets: IndexMap<String, Vec<IndexEntry>> = IndexMap::new();
    for label in &labels {
        buckets.entry(label.clone()).or_default();
    }
    for entry in entries {
        let label = label_for_entry(&entry, &labels, state);
        buckets.entry(label).or_default().push(entry);
    }

    let mut groups = Vec::new();
    for (label, bucket) in buckets {
        if bucket.is_empty() {
            continue;
        }
        let entry_count = bucket.len();
        let nodes = build_hierarchy(&bucket, state, display_for_prefix);
        if !nodes.is_empty() {
            groups.push(LetterGroup {
                label,
                nodes,
                entry_count,
            });
        }
    }
    groups
}

/// Picks the letter-group label for an entry.
///
/// The first canonical key part is put through the sort rules (first run),
/// lowercased, and stripped of leading non-alphanumerics; the longest label
/// that is a case-insensitive prefix wins. An entry matching no declared
/// label spills into a fresh label made from its leading character; only
/// entries with nothing left to derive a label from fall back to the first
/// declared label.
fn label_for_entry(entry: &IndexEntry, labels: &[String], state: &StyleState) -> String {
    let text = entry
        .canonical_key
        .first()
        .map(|part| {
            state
                .sort_key(part)
                .into_iter()
                .next()
                .unwrap_or_else(|| part.clone())
        })
        .unwrap_or_default();
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .skip_while(|c| !c.is_alphanumeric())
        .collect();
    let normalized = if stripped.is_empty() { lowered } else { stripped };

    let mut best: Option<&str> = None;
    for label in labels {
        if normalized.starts_with(&label.to_lowercase())
            && best.is_none_or(|current| label.len() > current.len())
        {
            best = Some(label);
        }
    }
    if let Some(label) = best {
        return label.to_owned();
    }
    match normalized.chars().next() {
        Some(first) => first.to_string(),
        None => labels.first().cloned().unwrap_or_else(|| "#".to_owned()),
    }
}

/// Builds the node tree of one bucket, walking every entry's canonical key
/// prefixes and reusing nodes with equal prefixes.
fn build_hierarchy(
    entries: &[IndexEntry],
    state: &StyleState,
    display_for_prefix: &AHashMap<Vec<String>, String>,
) -> Vec<IndexNode> {
    let mut roots: Vec<IndexNode> = Vec::new();
    for entry in entries {
        if entry.canonical_key.is_empty() {
            continue;
        }
        insert_entry(&mut roots, entry, display_for_prefix);
    }
    for root in &mut roots {
        finalize_node(root, state);
    }
    roots
}

fn insert_entry(
    roots: &mut Vec<IndexNode>,
    entry: &IndexEntry,
    display_for_prefix: &AHashMap<Vec<String>, String>,
) {
    let depth_count = entry.canonical_key.len();
    let mut level = roots;
    for depth in 0..depth_count {
        let prefix = &entry.canonical_key[..=depth];
        let idx = match level.iter().position(|node| node.key_prefix == prefix) {
            Some(found) => found,
            None => {
                let term = display_for_prefix
                    .get(prefix)
                    .cloned()
                    .unwrap_or_else(|| entry.canonical_key[depth].clone());
                level.push(IndexNode::new(term, prefix.to_vec()));
                level.len() - 1
            }
        };
        if depth + 1 == depth_count {
            let node = &mut level[idx];
            if node.attribute.is_none() {
                node.attribute = entry.attribute.clone();
            }
            if let Some(target) = &entry.xref_target {
                node.add_crossref(Crossref {
                    target: target.clone(),
                    class: entry.xref_class.clone().unwrap_or_default(),
                    attribute: entry.attribute.clone(),
                    verified: entry.xref_verified,
                });
            } else {
                node.add_locrefs(entry.locrefs.iter().cloned());
            }
        } else {
            level = &mut level[idx].children;
        }
    }
}

/// Sorts a node's references into rendering order and detects its ranges,
/// recursively.
fn finalize_node(node: &mut IndexNode, state: &StyleState) {
    node.locrefs.sort_by(|a, b| {
        (a.class_ordnum, a.ordnums.as_slice())
            .cmp(&(b.class_ordnum, b.ordnums.as_slice()))
            .then_with(|| {
                state
                    .attribute_sort_ord(a.attribute.as_deref())
                    .cmp(&state.attribute_sort_ord(b.attribute.as_deref()))
            })
            .then_with(|| a.position.cmp(&b.position))
    });
    ranges::detect_ranges(node, state);
    for child in &mut node.children {
        finalize_node(child, state);
    }
}
