//! Range detection and coalescing for one tree node.
//!
//! References are grouped by `(attribute, class, ordinal prefix)`; ranges
//! only ever span the final layer within such a group. Detection runs two
//! passes — explicit `:open-range`/`:close-range` pairs first, contiguous
//! ordinal runs second — then merges overlapping or adjacent results and
//! suppresses every covered reference from standalone emission.

use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::{
    index::models::{IndexNode, RangeRef},
    locclass::ClassVariant,
    locref::RefState,
    style::StyleState,
};

/// An accepted range while it is still being merged.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: usize,
    end: usize,
    start_val: i64,
    end_val: i64,
}

/// Detects and coalesces ranges on `node`, filling `ranges`, `suppressed`,
/// and `dropped_ordnums`.
pub(crate) fn detect_ranges(node: &mut IndexNode, state: &StyleState) {
    node.ranges.clear();
    node.suppressed.clear();
    node.dropped_ordnums.clear();

    // group locref indices by (attribute, class, ordinal prefix)
    let mut groups: IndexMap<(Option<String>, String, Vec<i64>), Vec<usize>> = IndexMap::new();
    for (idx, reference) in node.locrefs.iter().enumerate() {
        if reference.ordnums.is_empty() {
            continue;
        }
        let Some(class) = state.location_classes.get(&reference.class) else {
            continue;
        };
        if class.variant == ClassVariant::Var {
            continue;
        }
        groups
            .entry((
                reference.attribute.clone(),
                reference.class.clone(),
                reference.ordnum_prefix().to_vec(),
            ))
            .or_default()
            .push(idx);
    }

    let mut accepted: Vec<Candidate> = Vec::new();
    for ((_, class_name, _), indices) in &groups {
        let min_range_length = state
            .location_classes
            .get(class_name)
            .map_or(2, |class| class.min_range_length) as i64;

        // first pass: explicit markers, paired first-open to first-close
        let mut by_position: Vec<usize> = indices.clone();
        by_position.sort_by_key(|&idx| node.locrefs[idx].position);
        let mut open_queue: VecDeque<usize> = VecDeque::new();
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for &idx in &by_position {
            match node.locrefs[idx].state {
                RefState::OpenRange => open_queue.push_back(idx),
                RefState::CloseRange => {
                    if let Some(open_idx) = open_queue.pop_front() {
                        pairs.push((open_idx, idx));
                    }
                    // an unmatched close degrades to a normal reference
                }
                RefState::Normal => {}
            }
        }
        let mut group_ranges: Vec<Candidate> = Vec::new();
        let mut explicit_endpoints: Vec<usize> = Vec::new();
        for (open_idx, close_idx) in pairs {
            let (Some(start_val), Some(end_val)) = (
                node.locrefs[open_idx].last_ordnum(),
                node.locrefs[close_idx].last_ordnum(),
            ) else {
                continue;
            };
            if end_val - start_val >= min_range_length {
                group_ranges.push(Candidate {
                    start: open_idx,
                    end: close_idx,
                    start_val,
                    end_val,
                });
                explicit_endpoints.push(open_idx);
                explicit_endpoints.push(close_idx);
            }
            // too-short pairs revert to normal references
        }

        // second pass: contiguous runs over the remaining references
        let mut remaining: Vec<(usize, i64)> = indices
            .iter()
            .filter(|idx| !explicit_endpoints.contains(idx))
            .filter_map(|&idx| node.locrefs[idx].last_ordnum().map(|val| (idx, val)))
            .collect();
        remaining.sort_by_key(|&(idx, val)| (val, node.locrefs[idx].position));
        let mut run: Option<(usize, usize, i64, i64, i64)> = None; // start, end, start_val, end_val, distinct
        for (idx, val) in remaining {
            match run {
                Some((start, _, start_val, end_val, distinct)) if val == end_val => {
                    // duplicate ordinal, the run continues unchanged
                    run = Some((start, idx, start_val, end_val, distinct));
                    continue;
                }
                Some((start, _, start_val, end_val, distinct)) if val == end_val + 1 => {
                    run = Some((start, idx, start_val, val, distinct + 1));
                    continue;
                }
                Some((start, end, start_val, end_val, distinct)) => {
                    if distinct >= min_range_length {
                        group_ranges.push(Candidate {
                            start,
                            end,
                            start_val,
                            end_val,
                        });
                    }
                    run = Some((idx, idx, val, val, 1));
                }
                None => run = Some((idx, idx, val, val, 1)),
            }
        }
        if let Some((start, end, start_val, end_val, distinct)) = run {
            if distinct >= min_range_length {
                group_ranges.push(Candidate {
                    start,
                    end,
                    start_val,
                    end_val,
                });
            }
        }

        // merge overlapping or adjacent ranges (gap of at most one)
        group_ranges.sort_by_key(|candidate| (candidate.start_val, candidate.end_val));
        let mut merged: Vec<Candidate> = Vec::new();
        for candidate in group_ranges {
            match merged.last_mut() {
                Some(last) if candidate.start_val <= last.end_val + 1 => {
                    if candidate.end_val > last.end_val {
                        last.end = candidate.end;
                        last.end_val = candidate.end_val;
                    }
                }
                _ => merged.push(candidate),
            }
        }

        // covered references never appear standalone
        for candidate in &merged {
            for &idx in indices {
                if let Some(val) = node.locrefs[idx].last_ordnum() {
                    if (candidate.start_val..=candidate.end_val).contains(&val) {
                        node.suppressed.insert(idx);
                    }
                }
            }
        }
        accepted.extend(merged);
    }

    // drop-merge handling: a virtual endpoint with :drop removes the
    // source attribute's references inside the range
    let mut drops: Vec<(String, String, Vec<i64>, i64, i64)> = Vec::new();
    for candidate in &accepted {
        for endpoint in [candidate.start, candidate.end] {
            let reference = &node.locrefs[endpoint];
            if !(reference.is_virtual && reference.merge_drop) {
                continue;
            }
            let Some(source_attr) = reference.origin_attr.clone() else {
                continue;
            };
            drops.push((
                source_attr,
                reference.class.clone(),
                reference.ordnum_prefix().to_vec(),
                candidate.start_val,
                candidate.end_val,
            ));
        }
    }
    for (source_attr, class, prefix, start_val, end_val) in drops {
        for idx in 0..node.locrefs.len() {
            let reference = &node.locrefs[idx];
            if reference.attribute.as_deref() != Some(source_attr.as_str())
                || reference.class != class
                || reference.ordnum_prefix() != prefix.as_slice()
            {
                continue;
            }
            let Some(val) = reference.last_ordnum() else {
                continue;
            };
            if (start_val..=end_val).contains(&val) {
                let locref_string = reference.locref_string.clone();
                node.suppressed.insert(idx);
                node.dropped_ordnums
                    .entry(source_attr.clone())
                    .or_default()
                    .insert(locref_string);
            }
        }
    }

    node.ranges = accepted
        .iter()
        .map(|candidate| RangeRef {
            start: candidate.start,
            end: candidate.end,
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;
    use crate::{
        basetype::{BaseType, EnumMatcher, Enumeration},
        locclass::{LayerElement, LocationClass},
        locref::LocationReference,
    };

    fn state_with_pages(min_range_length: usize) -> StyleState {
        let mut state = StyleState::new();
        let ordnum = state.next_class_ordnum();
        state.location_classes.insert(
            "pages".to_owned(),
            LocationClass {
                name: "pages".to_owned(),
                ordnum,
                layers: vec![LayerElement::Layer(BaseType::Enumeration(
                    Enumeration::new("arabic-numbers", "0123456789", EnumMatcher::Radix(10)),
                ))],
                hierdepth: 0,
                min_range_length,
                variant: ClassVariant::Standard,
            },
        );
        state
    }

    fn page(value: i64, position: usize) -> LocationReference {
        LocationReference {
            class: "pages".to_owned(),
            class_ordnum: 1,
            attribute: Some("default".to_owned()),
            layers: vec![value.to_string()],
            ordnums: smallvec![value],
            locref_string: value.to_string(),
            state: RefState::Normal,
            is_virtual: false,
            merge_drop: false,
            origin_attr: None,
            position,
        }
    }

    fn node_with(refs: Vec<LocationReference>) -> IndexNode {
        let mut node = IndexNode::new("t".to_owned(), vec!["t".to_owned()]);
        node.locrefs = refs;
        node
    }

    #[test]
    fn contiguous_run_becomes_range() {
        let state = state_with_pages(2);
        let mut node = node_with(vec![page(10, 0), page(11, 1)]);
        detect_ranges(&mut node, &state);
        assert_eq!(node.ranges.len(), 1);
        let range = node.ranges[0];
        assert_eq!(node.locrefs[range.start].locref_string, "10");
        assert_eq!(node.locrefs[range.end].locref_string, "11");
        // both endpoints are suppressed from standalone emission
        assert_eq!(node.suppressed.len(), 2);
    }

    #[test]
    fn short_run_stays_standalone() {
        let state = state_with_pages(3);
        let mut node = node_with(vec![page(10, 0), page(11, 1)]);
        detect_ranges(&mut node, &state);
        assert!(node.ranges.is_empty());
        assert!(node.suppressed.is_empty());
    }

    #[test]
    fn gap_splits_runs() {
        let state = state_with_pages(2);
        let mut node = node_with(vec![page(1, 0), page(2, 1), page(5, 2), page(6, 3)]);
        detect_ranges(&mut node, &state);
        assert_eq!(node.ranges.len(), 2);
    }

    #[test]
    fn adjacent_ranges_merge() {
        let state = state_with_pages(2);
        // 1,2 and 3,4 are separate runs only if something splits them;
        // as one sorted sequence they already form a single run
        let mut node = node_with(vec![page(1, 0), page(2, 1), page(3, 2), page(4, 3)]);
        detect_ranges(&mut node, &state);
        assert_eq!(node.ranges.len(), 1);
        let range = node.ranges[0];
        assert_eq!(node.locrefs[range.start].locref_string, "1");
        assert_eq!(node.locrefs[range.end].locref_string, "4");
    }

    #[test]
    fn explicit_pair_forms_range_when_long_enough() {
        let state = state_with_pages(2);
        let mut open = page(3, 0);
        open.state = RefState::OpenRange;
        let mut close = page(10, 1);
        close.state = RefState::CloseRange;
        let mut node = node_with(vec![open, close]);
        detect_ranges(&mut node, &state);
        assert_eq!(node.ranges.len(), 1);
        assert_eq!(node.suppressed.len(), 2);
    }

    #[test]
    fn unmatched_open_range_degrades_to_normal() {
        let state = state_with_pages(2);
        let mut open = page(3, 0);
        open.state = RefState::OpenRange;
        let mut node = node_with(vec![open, page(9, 1)]);
        detect_ranges(&mut node, &state);
        assert!(node.ranges.is_empty());
        assert!(node.suppressed.is_empty());
    }

    #[test]
    fn drop_merge_removes_source_references() {
        let state = state_with_pages(2);
        let mut virtual_a = page(7, 0);
        virtual_a.attribute = Some("def".to_owned());
        virtual_a.is_virtual = true;
        virtual_a.merge_drop = true;
        virtual_a.origin_attr = Some("imp".to_owned());
        let mut virtual_b = page(8, 1);
        virtual_b.attribute = Some("def".to_owned());
        virtual_b.is_virtual = true;
        virtual_b.merge_drop = true;
        virtual_b.origin_attr = Some("imp".to_owned());
        let mut source = page(7, 0);
        source.attribute = Some("imp".to_owned());
        let mut node = node_with(vec![virtual_a, virtual_b, source]);
        detect_ranges(&mut node, &state);
        assert_eq!(node.ranges.len(), 1);
        // the imp reference inside the def range is dropped and recorded
        assert!(node.suppressed.contains(&2));
        assert!(node.dropped_ordnums["imp"].contains("7"));
    }

    #[test]
    fn different_attributes_never_share_a_range() {
        let state = state_with_pages(2);
        let mut other = page(11, 1);
        other.attribute = Some("imp".to_owned());
        let mut node = node_with(vec![page(10, 0), other]);
        detect_ranges(&mut node, &state);
        assert!(node.ranges.is_empty());
    }
}
