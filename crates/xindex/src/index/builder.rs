//! Turns raw entries into the sorted, hierarchical [`Index`] tree.

use ahash::{AHashMap, AHashSet};

use crate::{
    error::IndexBuilderError,
    index::{
        grouping,
        models::{Index, IndexEntry},
    },
    locclass::LocationClass,
    locref::{LocationReference, RefState},
    raw::RawEntry,
    style::StyleState,
};

/// Builds the index using every location class in the configured order.
pub fn build_index(
    raw_entries: &[RawEntry],
    state: &StyleState,
) -> Result<Index, IndexBuilderError> {
    build_index_with(raw_entries, state, None)
}

/// Builds the index, optionally restricting matching to one named class.
pub fn build_index_with(
    raw_entries: &[RawEntry],
    state: &StyleState,
    locclass: Option<&str>,
) -> Result<Index, IndexBuilderError> {
    let classes: Vec<&LocationClass> = match locclass {
        Some(name) => {
            let class = state.location_classes.get(name).ok_or_else(|| {
                IndexBuilderError::new(format!("unknown location class {name:?}"))
            })?;
            vec![class]
        }
        None => state.effective_class_order()?,
    };

    // materialise entries in stream order; the first spelling of every
    // canonical prefix freezes how that node is displayed
    let mut entries: Vec<IndexEntry> = Vec::new();
    let mut display_for_prefix: AHashMap<Vec<String>, String> = AHashMap::new();
    for (position, raw) in raw_entries.iter().enumerate() {
        let display_parts: &[String] = raw.display_key.as_deref().unwrap_or(&raw.key);
        let canonical: Vec<String> = raw.key.iter().map(|part| state.merge_key(part)).collect();
        for depth in 0..canonical.len() {
            let prefix = canonical[..=depth].to_vec();
            display_for_prefix.entry(prefix).or_insert_with(|| {
                display_parts
                    .get(depth)
                    .cloned()
                    .unwrap_or_else(|| canonical[depth].clone())
            });
        }

        if let Some(target) = raw.xref_target() {
            let (xref_class, unverified) = select_crossref_class(state, raw.attr.as_deref());
            if xref_class.is_none() {
                log::warn!(
                    "no crossref class declared; treating xref to {target:?} as verified"
                );
            }
            entries.push(IndexEntry {
                key: display_parts.to_vec(),
                display_key: raw.display_key.clone(),
                canonical_key: canonical,
                attribute: raw.attr.clone(),
                locrefs: Vec::new(),
                xref_target: Some(target),
                xref_class,
                xref_verified: !unverified,
                position,
            });
            continue;
        }

        let Some(locref_str) = raw.locref.as_deref() else {
            log::warn!("entry {:?} has no :locref and no :xref; skipped", raw.key);
            continue;
        };
        let base_attr = raw
            .attr
            .clone()
            .unwrap_or_else(|| state.default_attribute_name());
        let edges: Vec<_> = state
            .merge_rules
            .iter()
            .filter(|edge| edge.from == base_attr)
            .collect();
        let drop_base =
            edges.iter().any(|edge| edge.drop) && !state.attributes.contains_key(&base_attr);

        let mut matched = None;
        for class in &classes {
            if let Ok((layers, ordnums)) = class.perform_match(locref_str) {
                matched = Some((*class, layers, ordnums));
                break;
            }
        }
        let Some((class, layers, ordnums)) = matched else {
            log::warn!(
                "no location class matches {locref_str:?} for entry {:?}; skipped",
                raw.key
            );
            continue;
        };

        let mut base =
            LocationReference::new(class, locref_str, layers, ordnums, Some(base_attr.clone()), position);
        base.state = if raw.open_range() {
            RefState::OpenRange
        } else if raw.close_range() {
            RefState::CloseRange
        } else {
            RefState::Normal
        };

        let mut locrefs = Vec::with_capacity(1 + edges.len());
        if !drop_base {
            locrefs.push(base.clone());
        }
        for edge in &edges {
            let mut merged = base.clone();
            merged.attribute = Some(edge.to.clone());
            merged.is_virtual = true;
            merged.merge_drop = edge.drop;
            merged.origin_attr = Some(base_attr.clone());
            locrefs.push(merged);
        }

        entries.push(IndexEntry {
            key: display_parts.to_vec(),
            display_key: raw.display_key.clone(),
            canonical_key: canonical,
            attribute: Some(base_attr),
            locrefs,
            xref_target: None,
            xref_class: None,
            xref_verified: false,
            position,
        });
    }

    let total_entries = entries.len();

    // multi-run sort key per part, then lowercased display, then position
    entries.sort_by_cached_key(|entry| {
        let sort_parts: Vec<Vec<String>> = entry
            .canonical_key
            .iter()
            .map(|part| state.sort_key(part))
            .collect();
        let display_lower: Vec<String> = entry.key.iter().map(|part| part.to_lowercase()).collect();
        (sort_parts, display_lower, entry.position)
    });

    let verify_targets: Vec<Vec<String>> = entries
        .iter()
        .filter(|entry| entry.xref_verified)
        .filter_map(|entry| entry.xref_target.clone())
        .collect();

    let groups = grouping::group_entries(entries, state, &display_for_prefix);

    // verified crossref targets must exist as nodes in the finished tree
    if !verify_targets.is_empty() {
        let mut known: AHashSet<Vec<String>> = AHashSet::new();
        for group in &groups {
            let mut stack: Vec<_> = group.nodes.iter().collect();
            while let Some(node) = stack.pop() {
                known.insert(node.key_prefix.clone());
                stack.extend(node.children.iter());
            }
        }
        for target in verify_targets {
            let canonical: Vec<String> =
                target.iter().map(|part| state.merge_key(part)).collect();
            if !known.contains(&canonical) {
                log::warn!("cross-reference target {target:?} does not exist in the index");
            }
        }
    }

    let progress_markers = compute_progress_markers(total_entries);
    for (decile, marker) in progress_markers.iter().enumerate() {
        log::debug!("progress marker {}0%: {marker} entries", decile + 1);
    }

    Ok(Index {
        groups,
        total_entries,
        progress_markers,
    })
}

/// Selects the crossref class for an entry: its attribute when that names
/// a declared class, the first declared class otherwise.
fn select_crossref_class(state: &StyleState, attr: Option<&str>) -> (Option<String>, bool) {
    if let Some(name) = attr {
        if let Some(class) = state.crossref_classes.get(name) {
            return (Some(name.to_owned()), class.unverified);
        }
    }
    match state.crossref_classes.first() {
        Some((name, class)) => (Some(name.clone()), class.unverified),
        None => (None, false),
    }
}

/// Decile markers: always exactly ten monotonically increasing values for
/// a non-empty index.
fn compute_progress_markers(total_entries: usize) -> Vec<usize> {
    if total_entries == 0 {
        return Vec::new();
    }
    (1..=10)
        .map(|decile| ((total_entries * decile) / 10).max(1))
        .collect()
}
