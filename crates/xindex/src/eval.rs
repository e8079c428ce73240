//! Evaluator for style files: walks parsed forms and populates a
//! [`StyleState`].
//!
//! Only the declarative subset of the DSL is dispatched; any other head
//! raises a [`StyleError`]. Reader conditionals are handled here rather
//! than in the parser: a standalone `#+FEATURE` symbol arms a one-shot
//! latch deciding the fate of the next form, and a list whose head is
//! `#+FEATURE` guards its body elements.

use std::path::{Path, PathBuf};

use crate::{
    basetype::{Alphabet, BaseType, EnumMatcher, Enumeration},
    error::{ModuleNotFound, StyleError, XindexError, XindexResult},
    locclass::{ClassVariant, LayerElement, LocationClass},
    locref::CategoryAttribute,
    markup::{DEFAULT_KEY, MarkupSpec},
    modules,
    rules::{self, Orientation, RewriteRule},
    sexpr::{self, Value},
    style::{CrossrefClass, MergeTo, RuleTemplate, StyleState},
};

/// Evaluates `.xdy` sources into a [`StyleState`].
#[derive(Debug, Default)]
pub struct StyleEvaluator {
    state: StyleState,
    file_stack: Vec<PathBuf>,
}

impl StyleEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: StyleState::new(),
            file_stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &StyleState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> StyleState {
        self.state
    }

    /// Puts `paths` in front of the search list, keeping their order.
    pub fn prepend_search_paths<I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut combined: Vec<PathBuf> = paths.into_iter().collect();
        combined.append(&mut self.state.search_paths);
        self.state.search_paths = combined;
    }

    /// Evaluates a style file given by path.
    pub fn load_file(&mut self, path: &Path) -> XindexResult<()> {
        if !path.exists() {
            return Err(ModuleNotFound {
                name: path.display().to_string(),
            }
            .into());
        }
        self.eval_file_at(path.to_path_buf())
    }

    /// Locates and evaluates a module the way `require` does: filesystem
    /// search path first (with and without an `.xdy` suffix), bundled
    /// modules second.
    pub fn load_module(&mut self, name: &str) -> XindexResult<()> {
        if let Some(path) = self.resolve_module(name) {
            return self.eval_file_at(path);
        }
        if let Some(source) = modules::builtin_module(name) {
            return self.eval_builtin(name, source);
        }
        Err(ModuleNotFound {
            name: name.to_owned(),
        }
        .into())
    }

    /// Evaluates style source text directly, without `require` bookkeeping.
    pub fn eval_inline(&mut self, source: &str) -> XindexResult<()> {
        self.eval_source(source)
    }

    fn current_dir(&self) -> PathBuf {
        self.file_stack
            .last()
            .and_then(|file| file.parent().map(Path::to_path_buf))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn eval_file_at(&mut self, path: PathBuf) -> XindexResult<()> {
        let canonical = path.canonicalize().unwrap_or(path);
        let key = canonical.to_string_lossy().into_owned();
        if !self.state.loaded_files.insert(key) {
            return Ok(());
        }
        log::debug!("evaluating style file {}", canonical.display());
        let bytes = std::fs::read(&canonical)?;
        let content = sexpr::decode_text(&bytes);
        self.file_stack.push(canonical.clone());
        let result = self.eval_source(&content);
        self.file_stack.pop();
        result.map_err(|err| match err {
            XindexError::Style(style_err) => XindexError::Style(style_err.in_file(canonical)),
            other => other,
        })
    }

    fn eval_builtin(&mut self, name: &str, source: &'static str) -> XindexResult<()> {
        let key = format!("builtin:{}", name.strip_prefix("./").unwrap_or(name));
        if !self.state.loaded_files.insert(key) {
            return Ok(());
        }
        log::debug!("evaluating bundled module {name}");
        self.eval_source(source)
    }

    fn eval_source(&mut self, source: &str) -> XindexResult<()> {
        let content = sexpr::preprocess(source);
        let forms = sexpr::parse_many(&content)?;
        let mut pending_feature: Option<String> = None;
        for form in &forms {
            if let Some(feature) = pending_feature.take() {
                if self.state.features.contains(&feature) {
                    self.eval_form(form)?;
                }
                continue;
            }
            if let Value::Symbol(name) = form {
                if let Some(feature) = name.strip_prefix("#+") {
                    pending_feature = Some(feature.to_owned());
                    continue;
                }
            }
            self.eval_form(form)?;
        }
        Ok(())
    }

    fn eval_form(&mut self, form: &Value) -> XindexResult<()> {
        let Some(items) = form.as_list() else {
            return Err(StyleError::new(format!("unexpected top-level form {form}")).into());
        };
        let Some((head, args)) = items.split_first() else {
            return Ok(());
        };
        let Value::Symbol(name) = head else {
            return Err(StyleError::new(format!("form head must be a symbol, found {head}")).into());
        };
        if let Some(feature) = name.strip_prefix("#+") {
            if self.state.features.contains(feature) {
                for subform in args {
                    self.eval_form(subform)?;
                }
            }
            return Ok(());
        }
        match name.as_str() {
            "searchpath" => self.handle_searchpath(args),
            "require" => self.handle_require(args),
            "define-alphabet" | "define-alphabet*" => self.handle_define_alphabet(args),
            "define-enumeration" => self.handle_define_enumeration(args),
            "define-location-class" => self.handle_define_location_class(args),
            "define-location-class-order" => self.handle_define_location_class_order(args),
            "define-attributes" => self.handle_define_attributes(args),
            "define-letter-groups" => self.handle_define_letter_groups(args),
            "define-letter-group" => self.handle_define_letter_group(args),
            "define-sort-rule-orientations" => self.handle_define_sort_orientations(args),
            "sort-rule" => self.handle_sort_rule(args),
            "define-rule-set" => self.handle_define_rule_set(args),
            "use-rule-set" => self.handle_use_rule_set(args),
            "merge-to" => self.handle_merge_to(args),
            "merge-rule" => self.handle_merge_rule(args),
            "define-crossref-class" => self.handle_define_crossref_class(args),
            "progn" => {
                for subform in args {
                    self.eval_form(subform)?;
                }
                Ok(())
            }
            "mapc" => {
                self.handle_mapc(args);
                Ok(())
            }
            markup if markup.starts_with("markup-") => self.handle_markup(markup, args),
            other => Err(StyleError::new(format!("unknown form head {other:?}")).into()),
        }
    }

    // ------------------------------------------------------------------
    // search path and modules

    fn handle_searchpath(&mut self, args: &[Value]) -> XindexResult<()> {
        let [Value::List(entries)] = args else {
            return Err(StyleError::new("searchpath expects one list argument").into());
        };
        let current = self.current_dir();
        let mut new_paths = Vec::with_capacity(entries.len());
        for entry in entries {
            let rel = expect_name(entry)?;
            let candidate = PathBuf::from(rel);
            if candidate.is_absolute() {
                new_paths.push(candidate);
            } else {
                new_paths.push(current.join(candidate));
            }
        }
        self.prepend_search_paths(new_paths);
        Ok(())
    }

    fn handle_require(&mut self, args: &[Value]) -> XindexResult<()> {
        let [target] = args else {
            return Err(StyleError::new("require expects exactly one argument").into());
        };
        let name = expect_name(target)?.to_owned();
        self.load_module(&name)
    }

    fn resolve_module(&self, name: &str) -> Option<PathBuf> {
        let mut candidates = vec![name.to_owned()];
        if !name.ends_with(".xdy") {
            candidates.push(format!("{name}.xdy"));
        }
        for candidate in &candidates {
            let path = PathBuf::from(candidate);
            if path.is_absolute() {
                if path.exists() {
                    return Some(path);
                }
                continue;
            }
            for root in std::iter::once(self.current_dir())
                .chain(self.state.search_paths.iter().cloned())
            {
                let target = root.join(candidate);
                if target.exists() {
                    return Some(target);
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // base types and location classes

    fn handle_define_alphabet(&mut self, args: &[Value]) -> XindexResult<()> {
        let [name, Value::List(symbol_values)] = args else {
            return Err(StyleError::new("define-alphabet expects a name and a symbol list").into());
        };
        let name = expect_name(name)?;
        let mut symbols = Vec::with_capacity(symbol_values.len());
        for value in symbol_values {
            symbols.push(expect_name(value)?.to_owned());
        }
        if symbols.is_empty() {
            return Err(
                StyleError::new(format!("alphabet {name:?} requires at least one symbol")).into(),
            );
        }
        self.state
            .register_basetype(BaseType::Alphabet(Alphabet::new(name, symbols)));
        Ok(())
    }

    fn handle_define_enumeration(&mut self, args: &[Value]) -> XindexResult<()> {
        let Some(name) = args.first() else {
            return Err(StyleError::new("define-enumeration expects a name").into());
        };
        let name = expect_name(name)?;
        let matcher = extract_matcher(name, args.get(1))?;
        let base_alphabet = match args.get(2).and_then(Value::as_list) {
            Some(symbols) => {
                let mut chars = String::new();
                for symbol in symbols {
                    chars.push_str(expect_name(symbol)?);
                }
                chars
            }
            None => default_base_alphabet(matcher),
        };
        self.state
            .register_basetype(BaseType::Enumeration(Enumeration::new(
                name,
                &base_alphabet,
                matcher,
            )));
        Ok(())
    }

    fn handle_define_location_class(&mut self, args: &[Value]) -> XindexResult<()> {
        if args.len() < 2 {
            return Err(StyleError::new("define-location-class requires name and layers").into());
        }
        let name = expect_name(&args[0])?.to_owned();
        let Some(layer_tokens) = args[1].as_list() else {
            return Err(StyleError::new("location-class layer list must be a list").into());
        };
        let kwargs = KwArgs::parse(&args[2..])?;
        let hierdepth = usize::try_from(kwargs.int("hierdepth", 0)?.max(0)).unwrap_or(0);
        let contains_roman = layer_tokens
            .iter()
            .filter(|token| !token.is_keyword())
            .any(|token| token.name().is_some_and(|n| n.contains("roman")));
        let default_min = if hierdepth != 0 || contains_roman { 3 } else { 2 };
        let min_range_length =
            usize::try_from(kwargs.int("min-range-length", default_min)?.max(2)).unwrap_or(2);
        let variant = if kwargs.flag("var") {
            ClassVariant::Var
        } else {
            ClassVariant::Standard
        };

        let layers = self.build_layers(layer_tokens)?;
        let ordnum = self.state.next_class_ordnum();
        self.state.location_classes.insert(
            name.clone(),
            LocationClass {
                name,
                ordnum,
                layers,
                hierdepth,
                min_range_length,
                variant,
            },
        );
        Ok(())
    }

    fn build_layers(&self, tokens: &[Value]) -> Result<Vec<LayerElement>, StyleError> {
        let mut layers = Vec::with_capacity(tokens.len());
        let mut idx = 0;
        while idx < tokens.len() {
            let token = &tokens[idx];
            if token.as_keyword() == Some("sep") {
                idx += 1;
                let Some(sep) = tokens.get(idx) else {
                    return Err(StyleError::new("unexpected end of layer list after :sep"));
                };
                layers.push(LayerElement::Separator(expect_name(sep)?.to_owned()));
            } else {
                let basetype_name = expect_name(token)?;
                let Some(basetype) = self.state.basetypes.get(basetype_name) else {
                    return Err(StyleError::new(format!("unknown base type {basetype_name:?}")));
                };
                layers.push(LayerElement::Layer(basetype.clone()));
            }
            idx += 1;
        }
        Ok(layers)
    }

    fn handle_define_location_class_order(&mut self, args: &[Value]) -> XindexResult<()> {
        let [Value::List(names)] = args else {
            return Err(StyleError::new("define-location-class-order expects one list").into());
        };
        let mut order = Vec::with_capacity(names.len());
        for name in names {
            let name = expect_name(name)?;
            if !self.state.location_classes.contains_key(name) {
                return Err(StyleError::new(format!(
                    "unknown location class {name:?} in class order"
                ))
                .into());
            }
            order.push(name.to_owned());
        }
        self.state.location_class_order = order;
        Ok(())
    }

    // ------------------------------------------------------------------
    // attributes, letter groups, crossref classes

    fn handle_define_attributes(&mut self, args: &[Value]) -> XindexResult<()> {
        let [Value::List(groups)] = args else {
            return Err(StyleError::new("define-attributes requires one list argument").into());
        };
        let mut ord = self.state.attributes.len();
        for group in groups {
            let names: Vec<String> = match group {
                Value::List(items) => {
                    let mut names = Vec::with_capacity(items.len());
                    for item in items {
                        names.push(expect_name(item)?.to_owned());
                    }
                    names
                }
                single => vec![expect_name(single)?.to_owned()],
            };
            if names.is_empty() {
                continue;
            }
            let group_ord = self.state.attribute_groups.len() + 1;
            let last_in_group = names.last().cloned().unwrap_or_default();
            for name in &names {
                if !self.state.attributes.contains_key(name) {
                    self.state.attributes.insert(
                        name.clone(),
                        CategoryAttribute {
                            name: name.clone(),
                            group_ord,
                            sort_ord: ord,
                            processing_ord: ord,
                            last_in_group: last_in_group.clone(),
                        },
                    );
                    ord += 1;
                }
            }
            self.state.attribute_groups.push(names);
        }
        Ok(())
    }

    fn handle_define_letter_groups(&mut self, args: &[Value]) -> XindexResult<()> {
        let [Value::List(labels)] = args else {
            return Err(StyleError::new("define-letter-groups expects one list argument").into());
        };
        let mut groups = Vec::with_capacity(labels.len());
        for label in labels {
            groups.push(expect_name(label)?.to_owned());
        }
        self.state.letter_groups = groups;
        Ok(())
    }

    fn handle_define_letter_group(&mut self, args: &[Value]) -> XindexResult<()> {
        let Some(name) = args.first() else {
            return Err(StyleError::new("define-letter-group expects a name").into());
        };
        let name = expect_name(name)?.to_owned();
        let kwargs = KwArgs::parse(&args[1..])?;
        let mut groups = self.state.letter_groups.clone();
        if groups.is_empty() {
            // seed with the first base type's alphabet so :after/:before
            // markers have something to attach to
            groups = self.state.resolve_letter_groups();
        }
        if let Some(marker) = kwargs.value("after") {
            let marker = expect_name(marker)?;
            if let Some(idx) = groups.iter().position(|g| g == marker) {
                groups.insert(idx + 1, name);
                self.state.letter_groups = groups;
                return Ok(());
            }
        }
        if let Some(marker) = kwargs.value("before") {
            let marker = expect_name(marker)?;
            if let Some(idx) = groups.iter().position(|g| g == marker) {
                groups.insert(idx, name);
                self.state.letter_groups = groups;
                return Ok(());
            }
        }
        if !groups.contains(&name) {
            groups.push(name);
        }
        self.state.letter_groups = groups;
        Ok(())
    }

    fn handle_define_crossref_class(&mut self, args: &[Value]) -> XindexResult<()> {
        let Some(name) = args.first() else {
            return Err(StyleError::new("define-crossref-class expects a name").into());
        };
        let name = expect_name(name)?.to_owned();
        let kwargs = KwArgs::parse(&args[1..])?;
        let unverified = kwargs.flag("unverified");
        self.state
            .crossref_classes
            .insert(name, CrossrefClass { unverified });
        Ok(())
    }

    // ------------------------------------------------------------------
    // rules

    fn handle_define_sort_orientations(&mut self, args: &[Value]) -> XindexResult<()> {
        if args.is_empty() {
            return Err(StyleError::new("define-sort-rule-orientations expects arguments").into());
        }
        let mut orientations = Vec::new();
        for arg in args {
            match arg {
                Value::List(items) => {
                    for item in items {
                        orientations.push(Orientation::parse(expect_name(item)?)?);
                    }
                }
                other => orientations.push(Orientation::parse(expect_name(other)?)?),
            }
        }
        if orientations.is_empty() {
            orientations = vec![Orientation::Forward; 8];
        }
        self.state.sort_rule_orientations = orientations;
        Ok(())
    }

    fn handle_sort_rule(&mut self, args: &[Value]) -> XindexResult<()> {
        if args.len() < 2 {
            return Err(StyleError::new("sort-rule requires pattern and replacement").into());
        }
        let mut pattern = expect_name(&args[0])?.to_owned();
        let replacement = expect_name(&args[1])?.to_owned();
        let kwargs = KwArgs::parse(&args[2..])?;
        if kwargs.flag("bregexp") {
            pattern = rules::bre_to_ere(&pattern);
        }
        let run = usize::try_from(kwargs.int("run", 0)?.max(0)).unwrap_or(0);
        let rule = RewriteRule::new(pattern, replacement, kwargs.flag("again"), run)?;
        self.state.sort_rules.push(rule);
        Ok(())
    }

    fn handle_define_rule_set(&mut self, args: &[Value]) -> XindexResult<()> {
        let Some(name) = args.first() else {
            return Err(StyleError::new("define-rule-set requires a name").into());
        };
        let name = expect_name(name)?.to_owned();
        let kwargs = KwArgs::parse(&args[1..])?;
        let Some(rules_data) = kwargs.value("rules").and_then(Value::as_list) else {
            return Err(StyleError::new("define-rule-set expects a :rules list").into());
        };
        let mut parsed: Vec<RuleTemplate> = Vec::new();
        if let Some(inherit) = kwargs.value("inherit-from") {
            let parents: Vec<&Value> = match inherit {
                Value::List(items) => items.iter().collect(),
                single => vec![single],
            };
            for parent in parents {
                let parent_name = expect_name(parent)?;
                let Some(inherited) = self.state.rule_sets.get(parent_name) else {
                    return Err(StyleError::new(format!(
                        "unknown parent rule set {parent_name:?}"
                    ))
                    .into());
                };
                parsed.extend(inherited.iter().cloned());
            }
        }
        for entry in rules_data {
            let Some(items) = entry.as_list() else {
                continue;
            };
            if items.len() < 2 {
                continue;
            }
            let mut pattern = expect_name(&items[0])?.to_owned();
            let replacement = expect_name(&items[1])?.to_owned();
            let again = items[2..]
                .iter()
                .any(|token| token.as_keyword() == Some("again"));
            let is_string = items[2..]
                .iter()
                .any(|token| token.as_keyword() == Some("string"));
            if is_string {
                pattern = regex::escape(&pattern);
            }
            parsed.push(RuleTemplate {
                pattern,
                replacement,
                again,
            });
        }
        self.state.rule_sets.insert(name, parsed);
        Ok(())
    }

    fn handle_use_rule_set(&mut self, args: &[Value]) -> XindexResult<()> {
        let kwargs = KwArgs::parse(args)?;
        let Some(rule_names) = kwargs.value("rule-set") else {
            return Err(StyleError::new("use-rule-set expects :rule-set").into());
        };
        let run = usize::try_from(kwargs.int("run", 0)?.max(0)).unwrap_or(0);
        let names: Vec<&Value> = match rule_names {
            Value::List(items) => items.iter().collect(),
            single => vec![single],
        };
        for name in names {
            let name = expect_name(name)?;
            let templates = match self.state.rule_sets.get(name) {
                Some(templates) => templates.clone(),
                None => return Err(StyleError::new(format!("unknown rule set {name:?}")).into()),
            };
            for template in templates {
                let rule = RewriteRule::new(
                    template.pattern,
                    template.replacement,
                    template.again,
                    run,
                )?;
                self.state.sort_rules.push(rule);
            }
        }
        Ok(())
    }

    fn handle_merge_to(&mut self, args: &[Value]) -> XindexResult<()> {
        if args.len() < 2 {
            return Err(StyleError::new("merge-to requires from and to attributes").into());
        }
        let from = expect_name(&args[0])?.to_owned();
        let to = expect_name(&args[1])?.to_owned();
        let drop = args[2..]
            .iter()
            .any(|token| token.as_keyword() == Some("drop"));
        self.state.merge_rules.push(MergeTo { from, to, drop });
        Ok(())
    }

    fn handle_merge_rule(&mut self, args: &[Value]) -> XindexResult<()> {
        let Some(first) = args.first() else {
            return Err(StyleError::new("merge-rule requires a pattern").into());
        };
        let mut pattern = expect_name(first)?.to_owned();
        let mut idx = 1;
        let mut replacement = String::new();
        if let Some(value) = args.get(1) {
            if !value.is_keyword() {
                replacement = expect_name(value)?.to_owned();
                idx = 2;
            }
        }
        let kwargs = KwArgs::parse(&args[idx..])?;
        if kwargs.flag("string") {
            pattern = regex::escape(&pattern);
        } else if kwargs.flag("bregexp") {
            pattern = rules::bre_to_ere(&pattern);
        }
        let run = usize::try_from(kwargs.int("run", 0)?.max(0)).unwrap_or(0);
        let rule = RewriteRule::new(pattern, replacement, kwargs.flag("again"), run)?;
        self.state.keyword_merge_rules.push(rule);
        Ok(())
    }

    // ------------------------------------------------------------------
    // features

    fn handle_mapc(&mut self, args: &[Value]) {
        // (mapc #'(lambda (x) (pushnew x *features*)) '(SYM1 SYM2 ...))
        for arg in args {
            let Some(items) = arg.as_list() else {
                continue;
            };
            let [head, Value::List(symbols)] = items else {
                continue;
            };
            if head.name() != Some("quote") {
                continue;
            }
            for symbol in symbols {
                if let Value::Symbol(name) = symbol {
                    self.state.features.insert(name.clone());
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // markup

    fn handle_markup(&mut self, head: &str, args: &[Value]) -> XindexResult<()> {
        let kwargs = KwArgs::parse(args)?;
        let mut spec = MarkupSpec::default();
        for &(key, value) in &kwargs.items {
            if matches!(key, "depth" | "layer" | "class" | "attr" | "name") {
                continue;
            }
            spec.assign(key, value.and_then(Value::name), true);
        }
        let depth = usize::try_from(kwargs.int("depth", 0)?.max(0)).unwrap_or(0);
        let layer = usize::try_from(kwargs.int("layer", 0)?.max(0)).unwrap_or(0);
        let class_key = match kwargs.value("class") {
            Some(value) => expect_name(value)?.to_owned(),
            None => DEFAULT_KEY.to_owned(),
        };

        let markup = &mut self.state.markup;
        match head {
            "markup-index" => merge_into(&mut markup.index, spec),
            "markup-letter-group-list" => merge_into(&mut markup.letter_group_list, spec),
            "markup-letter-group" => merge_into(&mut markup.letter_group, spec),
            "markup-indexentry" => {
                merge_into(markup.indexentry.entry(depth).or_default(), spec);
            }
            "markup-indexentry-list" => {
                merge_into(markup.indexentry_list.entry(depth).or_default(), spec);
            }
            "markup-locref" => {
                let attr_key = match kwargs.value("attr") {
                    Some(value) => expect_name(value)?.to_owned(),
                    None => DEFAULT_KEY.to_owned(),
                };
                merge_into(markup.locref.entry(attr_key).or_default(), spec);
            }
            "markup-locref-list" => {
                let slot = markup
                    .locref_list
                    .entry(class_key)
                    .or_default()
                    .entry(depth)
                    .or_default();
                merge_into(slot, spec);
            }
            "markup-locref-layer" => {
                let slot = markup
                    .locref_layer
                    .entry(class_key)
                    .or_default()
                    .entry(depth)
                    .or_default()
                    .entry(layer)
                    .or_default();
                merge_into(slot, spec);
            }
            "markup-locclass-list" => merge_into(&mut markup.locclass_list, spec),
            "markup-attribute-group-list" => merge_into(&mut markup.attribute_group_list, spec),
            "markup-attribute-group" => {
                let name_key = match kwargs.value("name") {
                    Some(value) => expect_name(value)?.to_owned(),
                    None => DEFAULT_KEY.to_owned(),
                };
                merge_into(markup.attribute_group.entry(name_key).or_default(), spec);
            }
            "markup-crossref-list" => {
                merge_into(markup.crossref_list.entry(class_key).or_default(), spec);
            }
            "markup-crossref-layer-list" => merge_into(&mut markup.crossref_layer_list, spec),
            "markup-range" => merge_into(&mut markup.range, spec),
            other => {
                return Err(StyleError::new(format!("unknown markup form {other:?}")).into());
            }
        }
        markup.any_set = true;
        Ok(())
    }
}

/// Later declarations win field-by-field over earlier ones.
fn merge_into(slot: &mut MarkupSpec, spec: MarkupSpec) {
    *slot = spec.merged_over(slot);
}

/// Extracts a string-like value (string literal or symbol).
fn expect_name(value: &Value) -> Result<&str, StyleError> {
    value
        .name()
        .ok_or_else(|| StyleError::new(format!("expected string-like value, got {value}")))
}

/// Recognises the matcher of a `define-enumeration` form, either from the
/// matcher expression (`(prefix-match-for-radix-numbers 16)`) or from the
/// enumeration's naming convention.
fn extract_matcher(name: &str, expr: Option<&Value>) -> Result<EnumMatcher, StyleError> {
    if let Some(items) = expr.and_then(Value::as_list) {
        if let Some(head) = items.first().and_then(Value::name) {
            if head.contains("prefix-match-for-radix-numbers") {
                let radix = items.get(1).and_then(Value::as_int).unwrap_or(10);
                if !(2..=36).contains(&radix) {
                    return Err(StyleError::new(format!("invalid radix {radix}")));
                }
                return Ok(EnumMatcher::Radix(radix as u32));
            }
        }
    }
    let hint = expr
        .and_then(Value::name)
        .map_or_else(|| name.to_owned(), str::to_owned);
    for candidate in [hint.as_str(), name] {
        if candidate.contains("roman") {
            if candidate.contains("upper") {
                return Ok(EnumMatcher::RomanUppercase);
            }
            if candidate.contains("lower") {
                return Ok(EnumMatcher::RomanLowercase);
            }
        }
        if candidate.contains("arabic") {
            return Ok(EnumMatcher::Radix(10));
        }
    }
    Err(StyleError::new(format!(
        "cannot determine matcher for enumeration {name:?}"
    )))
}

fn default_base_alphabet(matcher: EnumMatcher) -> String {
    match matcher {
        EnumMatcher::Radix(radix) => "0123456789abcdefghijklmnopqrstuvwxyz"
            .chars()
            .take(radix as usize)
            .collect(),
        EnumMatcher::RomanUppercase => "IVXLCDM".to_owned(),
        EnumMatcher::RomanLowercase => "ivxlcdm".to_owned(),
    }
}

/// Parsed keyword arguments: every keyword either consumes the following
/// non-keyword value or stands alone as a boolean flag.
struct KwArgs<'a> {
    items: Vec<(&'a str, Option<&'a Value>)>,
}

impl<'a> KwArgs<'a> {
    fn parse(tokens: &'a [Value]) -> Result<Self, StyleError> {
        let mut items = Vec::new();
        let mut idx = 0;
        while idx < tokens.len() {
            let Some(key) = tokens[idx].as_keyword() else {
                return Err(StyleError::new(format!(
                    "unexpected token {} in argument list",
                    tokens[idx]
                )));
            };
            match tokens.get(idx + 1) {
                Some(value) if !value.is_keyword() => {
                    items.push((key, Some(value)));
                    idx += 2;
                }
                _ => {
                    items.push((key, None));
                    idx += 1;
                }
            }
        }
        Ok(Self { items })
    }

    /// The value of `key`, when it was given with one.
    fn value(&self, key: &str) -> Option<&'a Value> {
        self.items
            .iter()
            .find(|(name, _)| *name == key)
            .and_then(|(_, value)| *value)
    }

    /// True when `key` appeared at all.
    fn flag(&self, key: &str) -> bool {
        self.items.iter().any(|(name, _)| *name == key)
    }

    /// Integer option; accepts numbers, numeric strings/symbols, and the
    /// spelling `none` (mapped to 0).
    fn int(&self, key: &str, default: i64) -> Result<i64, StyleError> {
        let Some(value) = self.value(key) else {
            return Ok(default);
        };
        if let Some(int) = value.as_int() {
            return Ok(int);
        }
        if let Some(name) = value.name() {
            if name.eq_ignore_ascii_case("none") {
                return Ok(0);
            }
            if let Ok(int) = name.parse::<i64>() {
                return Ok(int);
            }
        }
        Err(StyleError::new(format!(
            "cannot convert {value} to an integer for :{key}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn eval(source: &str) -> StyleState {
        let mut evaluator = StyleEvaluator::new();
        evaluator.eval_inline(source).unwrap();
        evaluator.into_state()
    }

    #[test]
    fn location_class_with_defaults() {
        let state = eval(r#"(define-location-class "pages" ("arabic-numbers"))"#);
        let class = &state.location_classes["pages"];
        assert_eq!(class.min_range_length, 2);
        assert_eq!(class.hierdepth, 0);
        assert_eq!(class.variant, ClassVariant::Standard);
    }

    #[test]
    fn roman_layer_raises_default_min_range_length() {
        let state = eval(r#"(define-location-class "front" ("roman-numbers-lowercase"))"#);
        assert_eq!(state.location_classes["front"].min_range_length, 3);
    }

    #[test]
    fn location_class_options() {
        let state = eval(
            r#"(define-location-class "sections"
                 ("arabic-numbers" :sep "." "arabic-numbers")
                 :hierdepth 2 :min-range-length 4 :var)"#,
        );
        let class = &state.location_classes["sections"];
        assert_eq!(class.hierdepth, 2);
        assert_eq!(class.min_range_length, 4);
        assert_eq!(class.variant, ClassVariant::Var);
        assert_eq!(class.layers.len(), 3);
    }

    #[test]
    fn unknown_base_type_is_fatal() {
        let mut evaluator = StyleEvaluator::new();
        let err = evaluator
            .eval_inline(r#"(define-location-class "x" ("nope"))"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown base type"));
    }

    #[test]
    fn unknown_form_head_is_fatal() {
        let mut evaluator = StyleEvaluator::new();
        assert!(evaluator.eval_inline("(define-frobnicator)").is_err());
    }

    #[test]
    fn attributes_get_group_and_sort_ordinals() {
        let state = eval(r#"(define-attributes (("def" "imp") ("follows")))"#);
        let def = &state.attributes["def"];
        let imp = &state.attributes["imp"];
        let follows = &state.attributes["follows"];
        assert_eq!(def.group_ord, 1);
        assert_eq!(imp.group_ord, 1);
        assert_eq!(follows.group_ord, 2);
        assert!(def.sort_ord < imp.sort_ord);
        assert!(imp.sort_ord < follows.sort_ord);
        assert_eq!(def.last_in_group, "imp");
        assert_eq!(
            state.attribute_groups,
            vec![
                vec!["def".to_owned(), "imp".to_owned()],
                vec!["follows".to_owned()],
            ]
        );
    }

    #[test]
    fn letter_group_insertion_markers() {
        let state = eval(
            r#"(define-letter-groups ("a" "b" "d"))
               (define-letter-group "c" :after "b")
               (define-letter-group "symbols" :before "a")"#,
        );
        assert_eq!(state.letter_groups, vec!["symbols", "a", "b", "c", "d"]);
    }

    #[test]
    fn sort_rule_flags_and_runs() {
        let state = eval(
            r#"(sort-rule "a" "b")
               (sort-rule "x" "y" :again :run 2)
               (sort-rule "\(z\)" "$1" :bregexp)"#,
        );
        assert_eq!(state.sort_rules.len(), 3);
        assert!(state.sort_rules[1].again);
        assert_eq!(state.sort_rules[1].run, 2);
        assert_eq!(state.sort_rules[2].pattern, "(z)");
        assert_eq!(state.sort_run_count(), 3);
    }

    #[test]
    fn rule_sets_inherit_flat() {
        let state = eval(
            r#"(define-rule-set "base" :rules (("a" "b")))
               (define-rule-set "ext" :inherit-from ("base") :rules (("c" "d" :again)))
               (use-rule-set :rule-set ("ext") :run 1)"#,
        );
        assert_eq!(state.rule_sets["ext"].len(), 2);
        assert_eq!(state.sort_rules.len(), 2);
        assert_eq!(state.sort_rules[0].pattern, "a");
        assert_eq!(state.sort_rules[0].run, 1);
        assert!(state.sort_rules[1].again);
    }

    #[test]
    fn merge_rule_modes() {
        let state = eval(
            r#"(merge-rule "a+" "a")
               (merge-rule "." "" :string)
               (merge-rule "\(x\)" "$1" :bregexp)"#,
        );
        assert_eq!(state.keyword_merge_rules.len(), 3);
        assert_eq!(state.keyword_merge_rules[1].pattern, regex::escape("."));
        assert_eq!(state.keyword_merge_rules[2].pattern, "(x)");
        assert_eq!(state.merge_key("aaa."), "a");
    }

    #[test]
    fn merge_to_records_drop() {
        let state = eval(r#"(merge-to "imp" "def" :drop)"#);
        assert_eq!(
            state.merge_rules,
            vec![MergeTo {
                from: "imp".to_owned(),
                to: "def".to_owned(),
                drop: true,
            }]
        );
    }

    #[test]
    fn reader_conditionals_gate_forms() {
        let state = eval(
            "(mapc #'(lambda (x) (pushnew x *features*)) '(extra))
             #+extra (define-letter-groups (\"x\"))
             #+missing (define-letter-groups (\"y\"))
             (#+extra (define-crossref-class \"see\"))",
        );
        assert!(state.features.contains("extra"));
        assert_eq!(state.letter_groups, vec!["x"]);
        assert!(state.crossref_classes.contains_key("see"));
    }

    #[test]
    fn standalone_conditional_skips_exactly_one_form() {
        let state = eval(
            "#+missing (define-letter-groups (\"skipped\"))
             (define-letter-groups (\"kept\"))",
        );
        assert_eq!(state.letter_groups, vec!["kept"]);
    }

    #[test]
    fn markup_keys_are_specialised() {
        let state = eval(
            r#"(markup-index :open "<idx>~n" :close "</idx>~n")
               (markup-indexentry :open "  " :depth 1)
               (markup-locref :attr "def" :open "[" :close "]")
               (markup-locref-list :class "pages" :depth 1 :sep "; ")
               (markup-letter-group :open-head "-- " :close-head " --" :capitalize)"#,
        );
        assert_eq!(state.markup.index.open.as_deref(), Some("<idx>\n"));
        assert_eq!(
            state.markup.indexentry[&1].open.as_deref(),
            Some("  ")
        );
        assert_eq!(state.markup.locref["def"].open.as_deref(), Some("["));
        assert_eq!(
            state.markup.locref_list["pages"][&1].sep.as_deref(),
            Some("; ")
        );
        assert!(state.markup.letter_group.capitalize);
        assert!(state.markup.any_set);
    }

    #[test]
    fn enumeration_matcher_extraction() {
        let state = eval(
            r#"(define-enumeration "hex" (prefix-match-for-radix-numbers 16))
               (define-enumeration "chapter-roman-lowercase" roman-numbers-lowercase)"#,
        );
        let BaseType::Enumeration(hex) = &state.basetypes["hex"] else {
            panic!("hex should be an enumeration");
        };
        assert_eq!(hex.matcher, EnumMatcher::Radix(16));
        let BaseType::Enumeration(roman) = &state.basetypes["chapter-roman-lowercase"] else {
            panic!("roman should be an enumeration");
        };
        assert_eq!(roman.matcher, EnumMatcher::RomanLowercase);
    }

    #[test]
    fn progn_evaluates_sequentially() {
        let state = eval(
            r#"(progn
                 (define-letter-groups ("a"))
                 (define-crossref-class "see also" :unverified))"#,
        );
        assert_eq!(state.letter_groups, vec!["a"]);
        assert!(state.crossref_classes["see also"].unverified);
    }

    #[test]
    fn builtin_modules_load_and_are_idempotent() {
        let mut evaluator = StyleEvaluator::new();
        evaluator.load_module("default.xdy").unwrap();
        let classes = evaluator.state().location_classes.len();
        let files = evaluator.state().loaded_files.len();
        evaluator.load_module("default.xdy").unwrap();
        assert_eq!(evaluator.state().location_classes.len(), classes);
        assert_eq!(evaluator.state().loaded_files.len(), files);
        assert!(
            evaluator
                .state()
                .location_classes
                .contains_key("arabic-page-numbers")
        );
    }

    #[test]
    fn missing_module_is_fatal() {
        let mut evaluator = StyleEvaluator::new();
        let err = evaluator.load_module("does-not-exist.xdy").unwrap_err();
        assert!(matches!(err, XindexError::ModuleNotFound(_)));
    }
}
