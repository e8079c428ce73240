//! Template-driven renderer producing the final index text.
//!
//! Rendering is total: every markup option missing from the style falls
//! back to a built-in default, so this module never fails. Two backends
//! exist — plain `text` and `tex`, the latter selected implicitly when the
//! style's `index` open template contains a LaTeX preamble marker. The
//! backends only differ in their defaults (indentation, letter-group
//! headers, separators); declared markup always wins.

use indexmap::IndexMap;

use crate::{
    index::{Crossref, Index, IndexNode, LetterGroup, RangeRef},
    locref::LocationReference,
    markup::MarkupSpec,
    style::StyleState,
};

/// Renderer knobs not driven by the style file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Deepest entry level to render children for; `None` is unlimited.
    pub max_depth: Option<usize>,
    pub enable_crossrefs: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            enable_crossrefs: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Text,
    Tex,
}

/// Renders `index` with default configuration.
#[must_use]
pub fn render_index(index: &Index, state: &StyleState) -> String {
    render_index_with(index, state, &RenderConfig::default())
}

/// Renders `index` using the style's markup templates.
#[must_use]
pub fn render_index_with(index: &Index, state: &StyleState, config: &RenderConfig) -> String {
    let backend = if state
        .markup
        .index
        .open
        .as_deref()
        .is_some_and(|open| open.contains("\\begin{"))
    {
        Backend::Tex
    } else {
        Backend::Text
    };
    let renderer = Renderer {
        state,
        config,
        backend,
    };
    renderer.render(index)
}

/// One renderable location item: a standalone reference or a range.
#[derive(Debug, Clone, Copy)]
struct Item {
    /// Final-layer ordinal, the primary ordering key.
    ord: i64,
    attr_sort: usize,
    position: usize,
    kind: ItemKind,
}

#[derive(Debug, Clone, Copy)]
enum ItemKind {
    Scalar(usize),
    Range(RangeRef),
}

struct Renderer<'a> {
    state: &'a StyleState,
    config: &'a RenderConfig,
    backend: Backend,
}

impl Renderer<'_> {
    fn render(&self, index: &Index) -> String {
        let markup = &self.state.markup;
        let mut out = markup.index.open_or("");
        out.push_str(&markup.letter_group_list.open_or(""));
        let group_sep = markup.letter_group_list.sep_or("");
        for (i, group) in index.groups.iter().enumerate() {
            if i > 0 {
                out.push_str(&group_sep);
            }
            out.push_str(&self.render_group(group));
        }
        out.push_str(&markup.letter_group_list.close_or(""));
        out.push_str(&markup.index.close_or(""));
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    fn render_group(&self, group: &LetterGroup) -> String {
        let spec = &self.state.markup.letter_group;
        let mut out = spec.open_or("");
        if spec.open_head.is_some() || spec.close_head.is_some() {
            let label = if spec.capitalize {
                capitalize_first(&group.label)
            } else {
                group.label.clone()
            };
            out.push_str(&spec.open_head.clone().unwrap_or_default());
            out.push_str(&label);
            out.push_str(&spec.close_head.clone().unwrap_or_default());
        } else if self.backend == Backend::Text {
            // plain text default: the label as an uppercased heading line
            out.push_str(&group.label.to_uppercase());
            out.push('\n');
        }
        out.push_str(&self.render_node_list(&group.nodes, 0));
        out.push_str(&spec.close_or(""));
        out
    }

    fn render_node_list(&self, nodes: &[IndexNode], depth: usize) -> String {
        if nodes.is_empty() {
            return String::new();
        }
        let spec = self.state.markup.indexentry_list_at(depth);
        let sep = spec.sep_or("");
        let rendered: Vec<String> = nodes
            .iter()
            .map(|node| self.render_node(node, depth))
            .collect();
        let mut out = spec.open_or("");
        out.push_str(&rendered.join(&sep));
        out.push_str(&spec.close_or(""));
        out
    }

    fn render_node(&self, node: &IndexNode, depth: usize) -> String {
        let spec = self.state.markup.indexentry_at(depth);
        let (default_open, default_close) = match self.backend {
            Backend::Text => ("  ".repeat(depth), "\n".to_owned()),
            Backend::Tex => (String::new(), String::new()),
        };
        let mut out = spec.open.clone().unwrap_or(default_open);
        out.push_str(&node.term);
        out.push_str(&self.location_section(node, depth));
        out.push_str(&spec.close.clone().unwrap_or(default_close));
        let descend = self
            .config
            .max_depth
            .is_none_or(|max_depth| depth + 1 <= max_depth);
        if descend {
            out.push_str(&self.render_node_list(&node.children, depth + 1));
        }
        out
    }

    /// The complete location section of one entry: per-class segments plus
    /// cross-references, joined as a locclass list.
    fn location_section(&self, node: &IndexNode, depth: usize) -> String {
        let mut by_class: IndexMap<(u32, String), Vec<Item>> = IndexMap::new();
        for (idx, reference) in node.locrefs.iter().enumerate() {
            if node.suppressed.contains(&idx) {
                continue;
            }
            if let (Some(attr), true) = (
                reference.attribute.as_deref(),
                !node.dropped_ordnums.is_empty(),
            ) {
                if node
                    .dropped_ordnums
                    .get(attr)
                    .is_some_and(|dropped| dropped.contains(&reference.locref_string))
                {
                    continue;
                }
            }
            by_class
                .entry((reference.class_ordnum, reference.class.clone()))
                .or_default()
                .push(Item {
                    ord: reference.last_ordnum().unwrap_or(0),
                    attr_sort: self.state.attribute_sort_ord(reference.attribute.as_deref()),
                    position: reference.position,
                    kind: ItemKind::Scalar(idx),
                });
        }
        for range in &node.ranges {
            let start = &node.locrefs[range.start];
            by_class
                .entry((start.class_ordnum, start.class.clone()))
                .or_default()
                .push(Item {
                    ord: start.last_ordnum().unwrap_or(0),
                    attr_sort: self.state.attribute_sort_ord(start.attribute.as_deref()),
                    position: start.position,
                    kind: ItemKind::Range(*range),
                });
        }
        by_class.sort_keys();

        let mut segments: Vec<String> = Vec::new();
        for ((_, class_name), items) in by_class {
            let segment = self.render_class_segment(node, &class_name, items, depth);
            if !segment.is_empty() {
                segments.push(segment);
            }
        }
        if self.config.enable_crossrefs {
            segments.extend(self.render_crossrefs(node));
        }
        if segments.is_empty() {
            return String::new();
        }

        let spec = &self.state.markup.locclass_list;
        let default_open = match self.backend {
            Backend::Text => " ",
            Backend::Tex => "",
        };
        let mut out = spec.open_or(default_open);
        out.push_str(&segments.join(&spec.sep_or(", ")));
        out.push_str(&spec.close_or(""));
        out
    }

    /// One class's segment: items partitioned by attribute group, with
    /// same-ordinal claiming, wrapped in the locref-list markup.
    fn render_class_segment(
        &self,
        node: &IndexNode,
        class_name: &str,
        items: Vec<Item>,
        depth: usize,
    ) -> String {
        let list_spec = self.state.markup.locref_list_for(class_name, depth);

        // attribute groups in declared order, then synthetic one-attribute
        // groups for undeclared attributes in first-seen order
        let mut groups: Vec<Vec<String>> = self.state.attribute_groups.clone();
        for item in &items {
            let attr = self.item_attribute(node, item);
            let known = groups.iter().flatten().any(|name| Some(name.as_str()) == attr);
            if !known {
                groups.push(vec![attr.unwrap_or_default().to_owned()]);
            }
        }
        if groups.is_empty() {
            groups.push(vec![String::new()]);
        }

        let mut group_segments: Vec<String> = Vec::new();
        for group in &groups {
            let mut group_items: Vec<&Item> = items
                .iter()
                .filter(|item| {
                    let attr = self.item_attribute(node, item).unwrap_or_default();
                    group.iter().any(|name| name == attr)
                })
                .collect();
            if group_items.is_empty() {
                continue;
            }
            group_items.sort_by_key(|item| {
                let range_after = self.backend == Backend::Text
                    && matches!(item.kind, ItemKind::Range(_));
                (item.ord, range_after, item.attr_sort, item.position)
            });

            // a higher-priority attribute in the group claims its ordinals
            let mut claimed: Vec<(i64, &str)> = Vec::new();
            let mut kept: Vec<&Item> = Vec::new();
            for item in group_items {
                if let ItemKind::Scalar(_) = item.kind {
                    let attr = self.item_attribute(node, item).unwrap_or_default();
                    match claimed.iter().find(|(ord, _)| *ord == item.ord) {
                        Some((_, owner)) if *owner != attr => continue,
                        Some(_) => {}
                        None => claimed.push((item.ord, attr)),
                    }
                }
                kept.push(item);
            }

            // contiguous same-attribute chunks share one locref format
            let mut chunk_texts: Vec<String> = Vec::new();
            let mut chunk: Vec<&Item> = Vec::new();
            let mut chunk_attr: Option<String> = None;
            for item in kept {
                let attr = self.item_attribute(node, item).map(str::to_owned);
                if chunk_attr != attr && !chunk.is_empty() {
                    chunk_texts.push(self.render_chunk(
                        node,
                        class_name,
                        &chunk,
                        chunk_attr.as_deref(),
                        &list_spec,
                        depth,
                    ));
                    chunk.clear();
                }
                chunk_attr = attr;
                chunk.push(item);
            }
            if !chunk.is_empty() {
                chunk_texts.push(self.render_chunk(
                    node,
                    class_name,
                    &chunk,
                    chunk_attr.as_deref(),
                    &list_spec,
                    depth,
                ));
            }
            group_segments.push(chunk_texts.join(&list_spec.sep_or(", ")));
        }

        if group_segments.is_empty() {
            return String::new();
        }
        let agl = &self.state.markup.attribute_group_list;
        let joined = group_segments.join(&agl.sep_or(&list_spec.sep_or(", ")));
        let mut inner = agl.open_or("");
        inner.push_str(&joined);
        inner.push_str(&agl.close_or(""));

        let mut out = list_spec.open_or("");
        out.push_str(&inner);
        out.push_str(&list_spec.close_or(""));
        out
    }

    fn item_attribute<'n>(&self, node: &'n IndexNode, item: &Item) -> Option<&'n str> {
        let reference = match item.kind {
            ItemKind::Scalar(idx) => &node.locrefs[idx],
            ItemKind::Range(range) => &node.locrefs[range.start],
        };
        reference.attribute.as_deref()
    }

    /// Renders one same-attribute chunk of items.
    fn render_chunk(
        &self,
        node: &IndexNode,
        class_name: &str,
        chunk: &[&Item],
        attribute: Option<&str>,
        list_spec: &MarkupSpec,
        depth: usize,
    ) -> String {
        let fmt = self.state.markup.locref_for(attribute);
        let sep = fmt
            .sep
            .clone()
            .unwrap_or_else(|| list_spec.sep_or(", "));
        let hierdepth = self
            .state
            .location_classes
            .get(class_name)
            .map_or(0, |class| class.hierdepth);

        let texts: Vec<String> = if hierdepth > 1 {
            self.render_hier_chunk(node, class_name, chunk, depth, hierdepth)
        } else {
            chunk
                .iter()
                .map(|item| self.render_item(node, item, &fmt))
                .collect()
        };
        let body = texts.join(&sep);

        match attribute.and_then(|attr| self.state.markup.attribute_group.get(attr)) {
            Some(wrap) => {
                let mut out = wrap.open_or("");
                out.push_str(&body);
                out.push_str(&wrap.close_or(""));
                out
            }
            None => body,
        }
    }

    fn render_item(&self, node: &IndexNode, item: &Item, fmt: &MarkupSpec) -> String {
        let range_sep = self.state.markup.range.sep_or("-");
        let body = match item.kind {
            ItemKind::Scalar(idx) => node.locrefs[idx].locref_string.clone(),
            ItemKind::Range(range) => format!(
                "{}{}{}",
                node.locrefs[range.start].locref_string, range_sep,
                node.locrefs[range.end].locref_string
            ),
        };
        let mut out = fmt.prefix.clone().unwrap_or_default();
        out.push_str(&fmt.open_or(""));
        out.push_str(&body);
        out.push_str(&fmt.close_or(""));
        out
    }

    /// Renders a chunk of a class with `hierdepth > 1`: items are grouped
    /// by their leading layers, and contiguous final-layer runs collapse
    /// into ranges.
    fn render_hier_chunk(
        &self,
        node: &IndexNode,
        class_name: &str,
        chunk: &[&Item],
        depth: usize,
        hierdepth: usize,
    ) -> Vec<String> {
        let min_range_length = self
            .state
            .location_classes
            .get(class_name)
            .map_or(2, |class| class.min_range_length);
        let range_sep = self.state.markup.range.sep_or("-");
        let layer_fmt = |layer_idx: usize, text: &str| -> String {
            let spec = self
                .state
                .markup
                .locref_layer_for(class_name, depth, layer_idx);
            let mut out = spec.open_or("");
            out.push_str(text);
            out.push_str(&spec.close_or(""));
            out
        };
        let prefix_text = |reference: &LocationReference| -> String {
            reference.layers[..(hierdepth - 1).min(reference.layers.len())]
                .iter()
                .enumerate()
                .map(|(layer_idx, layer)| layer_fmt(layer_idx, layer))
                .collect::<Vec<_>>()
                .join("-")
        };
        let final_layer = hierdepth - 1;

        // group scalars by their prefix layers, keep explicit ranges apart
        let mut by_prefix: IndexMap<Vec<String>, Vec<usize>> = IndexMap::new();
        let mut elements: Vec<(i64, String)> = Vec::new();
        for item in chunk {
            match item.kind {
                ItemKind::Scalar(idx) => {
                    let reference = &node.locrefs[idx];
                    let prefix =
                        reference.layers[..(hierdepth - 1).min(reference.layers.len())].to_vec();
                    by_prefix.entry(prefix).or_default().push(idx);
                }
                ItemKind::Range(range) => {
                    let start = &node.locrefs[range.start];
                    let end = &node.locrefs[range.end];
                    elements.push((
                        item.ord,
                        format!(
                            "{}-{}{}{}",
                            prefix_text(start),
                            layer_fmt(final_layer, start.layers.last().map_or("", String::as_str)),
                            range_sep,
                            layer_fmt(final_layer, end.layers.last().map_or("", String::as_str)),
                        ),
                    ));
                }
            }
        }

        for (_, mut indices) in by_prefix {
            indices.sort_by_key(|&idx| node.locrefs[idx].last_ordnum().unwrap_or(0));
            let mut run: Vec<usize> = Vec::new();
            let flush = |run: &mut Vec<usize>, elements: &mut Vec<(i64, String)>| {
                let Some((&first_idx, &last_idx)) = run.first().zip(run.last()) else {
                    return;
                };
                let first = &node.locrefs[first_idx];
                let ord = first.last_ordnum().unwrap_or(0);
                let head = prefix_text(first);
                let first_text =
                    layer_fmt(final_layer, first.layers.last().map_or("", String::as_str));
                if run.len() >= min_range_length {
                    let last = &node.locrefs[last_idx];
                    let last_text =
                        layer_fmt(final_layer, last.layers.last().map_or("", String::as_str));
                    elements.push((ord, format!("{head}-{first_text}{range_sep}{last_text}")));
                } else {
                    for &idx in run.iter() {
                        let reference = &node.locrefs[idx];
                        let text = layer_fmt(
                            final_layer,
                            reference.layers.last().map_or("", String::as_str),
                        );
                        elements.push((
                            reference.last_ordnum().unwrap_or(0),
                            format!("{head}-{text}"),
                        ));
                    }
                }
                run.clear();
            };
            for idx in indices {
                let val = node.locrefs[idx].last_ordnum().unwrap_or(0);
                let prev = run
                    .last()
                    .and_then(|&prev_idx| node.locrefs[prev_idx].last_ordnum());
                match prev {
                    Some(prev_val) if val == prev_val + 1 => run.push(idx),
                    Some(prev_val) if val == prev_val => {}
                    Some(_) => {
                        flush(&mut run, &mut elements);
                        run.push(idx);
                    }
                    None => run.push(idx),
                }
            }
            flush(&mut run, &mut elements);
        }
        elements.sort_by_key(|(ord, _)| *ord);
        elements.into_iter().map(|(_, text)| text).collect()
    }

    /// Cross-reference segments, one per crossref class present.
    fn render_crossrefs(&self, node: &IndexNode) -> Vec<String> {
        let mut by_class: IndexMap<String, Vec<&Crossref>> = IndexMap::new();
        for crossref in &node.crossrefs {
            by_class
                .entry(crossref.class.clone())
                .or_default()
                .push(crossref);
        }
        let default_open = match self.backend {
            Backend::Text => "see ",
            Backend::Tex => "",
        };
        let layer_list = &self.state.markup.crossref_layer_list;
        let mut segments = Vec::new();
        for (class, crossrefs) in by_class {
            let spec = self.state.markup.crossref_list_for(&class);
            let unverified_suffix = spec.unverified_suffix.clone().unwrap_or_default();
            let bodies: Vec<String> = crossrefs
                .iter()
                .map(|crossref| {
                    let mut body = layer_list.open_or("");
                    body.push_str(&crossref.target.join(&layer_list.sep_or(", ")));
                    body.push_str(&layer_list.close_or(""));
                    if !crossref.verified {
                        body.push_str(&unverified_suffix);
                    }
                    body
                })
                .collect();
            let mut out = spec.open_or(default_open);
            out.push_str(&bodies.join(&spec.sep_or(", ")));
            out.push_str(&spec.close_or(""));
            segments.push(out);
        }
        segments
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{eval::StyleEvaluator, index::build_index, raw::parse_raw_index};

    fn render(style: &str, raw: &str) -> String {
        let mut evaluator = StyleEvaluator::new();
        evaluator.eval_inline(style).unwrap();
        let state = evaluator.into_state();
        let entries = parse_raw_index(raw).unwrap();
        let index = build_index(&entries, &state).unwrap();
        render_index(&index, &state)
    }

    const PAGES: &str = r#"(define-location-class "pages" ("arabic-numbers"))"#;

    #[test]
    fn empty_index_renders_empty_output() {
        assert_eq!(render(PAGES, ""), "");
    }

    #[test]
    fn single_group_default_text_layout() {
        let out = render(
            r#"(define-location-class "pages" ("arabic-numbers"))
               (define-letter-groups ("a"))"#,
            r#"(indexentry :key ("apple") :locref "1")
               (indexentry :key ("apple") :locref "5")"#,
        );
        assert_eq!(out, "A\napple 1, 5\n");
    }

    #[test]
    fn range_renders_with_default_separator() {
        let out = render(
            PAGES,
            r#"(indexentry :key ("apple") :locref "10")
               (indexentry :key ("apple") :locref "11")"#,
        );
        assert_eq!(out, "A\napple 10-11\n");
        assert!(!out.contains("10,"));
        assert!(!out.contains("11,"));
    }

    #[test]
    fn hierarchy_indents_children() {
        let out = render(
            PAGES,
            r#"(indexentry :key ("topic") :locref "3")
               (indexentry :key ("topic" "subtopic") :locref "4")"#,
        );
        assert_eq!(out, "T\ntopic 3\n  subtopic 4\n");
    }

    #[test]
    fn crossref_renders_with_see_prefix() {
        let out = render(
            r#"(define-location-class "pages" ("arabic-numbers"))
               (define-crossref-class "see")"#,
            r#"(indexentry :key ("A") :xref ("target"))"#,
        );
        assert_eq!(out, "A\nA see target\n");
    }

    #[test]
    fn unverified_crossref_gets_suffix() {
        let out = render(
            r#"(define-location-class "pages" ("arabic-numbers"))
               (define-crossref-class "see also" :unverified)
               (markup-crossref-list :class "see also" :open "see also " :unverified-suffix "?")"#,
            r#"(indexentry :key ("A") :xref ("missing"))"#,
        );
        assert_eq!(out, "A\nA see also missing?\n");
    }

    #[test]
    fn merge_drop_emits_page_once_under_target() {
        let style = r#"
            (define-location-class "pages" ("arabic-numbers"))
            (define-attributes (("def" "imp")))
            (merge-to "imp" "def" :drop)
        "#;
        let out = render(
            style,
            r#"(indexentry :key ("entry") :locref "7" :attr "imp")
               (indexentry :key ("entry") :locref "7" :attr "def")"#,
        );
        // page 7 appears exactly once, claimed by def
        assert_eq!(out, "E\nentry 7\n");
    }

    #[test]
    fn custom_markup_templates_drive_output() {
        let style = r#"
            (define-location-class "pages" ("arabic-numbers"))
            (define-letter-groups ("a"))
            (markup-index :open "<index>~n" :close "</index>")
            (markup-letter-group :open-head "[" :close-head "]~n" :capitalize)
            (markup-indexentry :open "<e>" :close "</e>~n")
            (markup-locclass-list :open " := ")
            (markup-locref :open "{" :close "}" :sep "+")
        "#;
        let out = render(style, r#"(indexentry :key ("apple") :locref "1")
                                   (indexentry :key ("apple") :locref "5")"#);
        assert_eq!(out, "<index>\n[A]\n<e>apple := {1}+{5}</e>\n</index>\n");
    }

    #[test]
    fn tex_backend_suppresses_text_defaults() {
        let style = r#"
            (define-location-class "pages" ("arabic-numbers"))
            (markup-index :open "\begin{theindex}~n" :close "~n\end{theindex}~n")
            (markup-indexentry :open "  \item ")
            (markup-locclass-list :open ", ")
        "#;
        let out = render(style, r#"(indexentry :key ("alpha") :locref "3")"#);
        assert_eq!(out, "\\begin{theindex}\n  \\item alpha, 3\n\\end{theindex}\n");
    }

    #[test]
    fn attribute_groups_order_segments() {
        let style = r#"
            (define-location-class "pages" ("arabic-numbers"))
            (define-attributes (("def") ("imp")))
            (markup-locref :attr "def" :open "<" :close ">")
        "#;
        let out = render(
            style,
            r#"(indexentry :key ("x") :locref "9" :attr "imp")
               (indexentry :key ("x") :locref "2" :attr "def")"#,
        );
        // def's group is declared first, so its segment precedes imp's
        assert_eq!(out, "X\nx <2>, 9\n");
    }

    #[test]
    fn same_ordinal_claimed_by_higher_priority_attribute() {
        let style = r#"
            (define-location-class "pages" ("arabic-numbers"))
            (define-attributes (("def" "imp")))
        "#;
        let out = render(
            style,
            r#"(indexentry :key ("x") :locref "7" :attr "imp")
               (indexentry :key ("x") :locref "7" :attr "def")"#,
        );
        assert_eq!(out, "X\nx 7\n");
    }

    #[test]
    fn hierdepth_groups_prefix_layers() {
        let style = r#"
            (define-location-class "appendix"
              ("ALPHA" :sep "-" "arabic-numbers")
              :hierdepth 2 :min-range-length 2)
        "#;
        let out = render(
            style,
            r#"(indexentry :key ("x") :locref "A-3")
               (indexentry :key ("x") :locref "A-4")
               (indexentry :key ("x") :locref "B-9")"#,
        );
        assert_eq!(out, "X\nx A-3-4, B-9\n");
    }

    #[test]
    fn max_depth_limits_children() {
        let config = RenderConfig {
            max_depth: Some(0),
            enable_crossrefs: true,
        };
        let mut evaluator = StyleEvaluator::new();
        evaluator.eval_inline(PAGES).unwrap();
        let state = evaluator.into_state();
        let entries = parse_raw_index(
            r#"(indexentry :key ("topic") :locref "3")
               (indexentry :key ("topic" "sub") :locref "4")"#,
        )
        .unwrap();
        let index = build_index(&entries, &state).unwrap();
        let out = render_index_with(&index, &state, &config);
        assert_eq!(out, "T\ntopic 3\n");
    }

    #[test]
    fn crossrefs_can_be_disabled() {
        let config = RenderConfig {
            max_depth: None,
            enable_crossrefs: false,
        };
        let mut evaluator = StyleEvaluator::new();
        evaluator
            .eval_inline(
                r#"(define-location-class "pages" ("arabic-numbers"))
                   (define-crossref-class "see")"#,
            )
            .unwrap();
        let state = evaluator.into_state();
        let entries = parse_raw_index(r#"(indexentry :key ("A") :xref ("b"))"#).unwrap();
        let index = build_index(&entries, &state).unwrap();
        let out = render_index_with(&index, &state, &config);
        assert_eq!(out, "A\nA\n");
    }
}
