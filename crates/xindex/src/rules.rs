//! Regex rewrite engine behind `sort-rule` and `merge-rule`.
//!
//! Rules are grouped by run index. For each run, the string is optionally
//! reversed (backward orientation), every rule of the run is applied in
//! declaration order (`:again` repeats a rule until it stops changing the
//! string), then the reversal is undone. Sort rules produce one output per
//! run, forming the multi-level sort key; keyword-merge rules collapse into
//! a single canonical string.

use std::str::FromStr;

use fancy_regex::{Captures, Regex};

use crate::error::StyleError;

/// Iteration cap for `:again` rules that never reach a fixed point.
const AGAIN_LIMIT: usize = 64;

/// Per-run string orientation for rule application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Orientation {
    Forward,
    Backward,
}

impl Orientation {
    /// Parses a style-file spelling, accepting any case.
    pub fn parse(name: &str) -> Result<Self, StyleError> {
        Self::from_str(&name.to_lowercase())
            .map_err(|_| StyleError::new(format!("unknown orientation {name:?}")))
    }
}

/// A compiled rewrite rule.
///
/// The pattern is compiled once at definition time; replacement templates
/// use `$0`/`$1`/`${name}` group references.
#[derive(Debug)]
pub struct RewriteRule {
    pub pattern: String,
    pub replacement: String,
    pub again: bool,
    pub run: usize,
    compiled: Regex,
}

impl RewriteRule {
    pub fn new(
        pattern: impl Into<String>,
        replacement: impl Into<String>,
        again: bool,
        run: usize,
    ) -> Result<Self, StyleError> {
        let pattern = pattern.into();
        let compiled = Regex::new(&pattern)
            .map_err(|err| StyleError::new(format!("invalid rule pattern {pattern:?}: {err}")))?;
        Ok(Self {
            pattern,
            replacement: replacement.into(),
            again,
            run,
            compiled,
        })
    }

    /// Applies the rule once over the whole string.
    fn apply_once(&self, text: &str) -> String {
        replace_all(&self.compiled, text, &self.replacement).unwrap_or_else(|err| {
            log::warn!("rule {:?} failed on {text:?}: {err}", self.pattern);
            text.to_owned()
        })
    }

    /// Applies the rule, repeating to a fixed point when `:again` is set.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        let mut current = self.apply_once(text);
        if !self.again {
            return current;
        }
        for _ in 0..AGAIN_LIMIT {
            let updated = self.apply_once(&current);
            if updated == current {
                return current;
            }
            current = updated;
        }
        log::warn!("rule {:?} did not converge, keeping {current:?}", self.pattern);
        current
    }
}

/// Replaces every match of `regex` in `text` using a `$`-template.
fn replace_all(regex: &Regex, text: &str, template: &str) -> Result<String, fancy_regex::Error> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in regex.captures_iter(text) {
        let caps = caps?;
        let whole = caps.get(0).expect("capture group 0 always exists");
        out.push_str(&text[last..whole.start()]);
        expand_template(template, &caps, &mut out);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Expands `$0`..`$99`, `${n}`, and `$$` in `template` against `caps`.
///
/// Unmatched or out-of-range groups expand to the empty string; a lone
/// trailing `$` is kept literally.
fn expand_template(template: &str, caps: &Captures<'_>, out: &mut String) {
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                for inner in chars.by_ref() {
                    if inner == '}' {
                        break;
                    }
                    name.push(inner);
                }
                push_group(caps, &name, out);
            }
            Some(c) if c.is_ascii_digit() => {
                let mut name = String::new();
                while let Some(&digit) = chars.peek() {
                    if !digit.is_ascii_digit() {
                        break;
                    }
                    name.push(digit);
                    chars.next();
                }
                push_group(caps, &name, out);
            }
            _ => out.push('$'),
        }
    }
}

fn push_group(caps: &Captures<'_>, name: &str, out: &mut String) {
    if let Ok(index) = name.parse::<usize>() {
        if let Some(group) = caps.get(index) {
            out.push_str(group.as_str());
        }
    } else if let Some(group) = caps.name(name) {
        out.push_str(group.as_str());
    }
}

/// Applies one run's rules to `text` under the given orientation.
#[must_use]
pub fn apply_run<'a>(
    text: &str,
    rules: impl Iterator<Item = &'a RewriteRule>,
    orientation: Orientation,
) -> String {
    let mut current = match orientation {
        Orientation::Forward => text.to_owned(),
        Orientation::Backward => text.chars().rev().collect(),
    };
    for rule in rules {
        current = rule.apply(&current);
    }
    match orientation {
        Orientation::Forward => current,
        Orientation::Backward => current.chars().rev().collect(),
    }
}

/// Applies all runs of `rules` to `text`, returning one output per run.
///
/// `run_count` is the number of runs to produce (at least 1 so that
/// rule-free styles still get a sort key); orientations beyond the
/// configured list default to forward.
#[must_use]
pub fn apply_runs(
    text: &str,
    rules: &[RewriteRule],
    orientations: &[Orientation],
    run_count: usize,
) -> Vec<String> {
    (0..run_count.max(1))
        .map(|run| {
            let orientation = orientations.get(run).copied().unwrap_or(Orientation::Forward);
            apply_run(text, rules.iter().filter(|r| r.run == run), orientation)
        })
        .collect()
}

/// Collapses `text` into one canonical string by running every rule run in
/// ascending order over the same string.
#[must_use]
pub fn apply_runs_collapsed(
    text: &str,
    rules: &[RewriteRule],
    orientations: &[Orientation],
    run_count: usize,
) -> String {
    let mut current = text.to_owned();
    for run in 0..run_count.max(1) {
        let orientation = orientations.get(run).copied().unwrap_or(Orientation::Forward);
        current = apply_run(&current, rules.iter().filter(|r| r.run == run), orientation);
    }
    current
}

/// Translates a POSIX basic-regex pattern to the extended syntax the rule
/// engine compiles: group parens lose their backslashes and literal braces
/// gain them.
#[must_use]
pub fn bre_to_ere(pattern: &str) -> String {
    pattern
        .replace("\\(", "(")
        .replace("\\)", ")")
        .replace('{', "\\{")
        .replace('}', "\\}")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn rule(pattern: &str, replacement: &str, again: bool, run: usize) -> RewriteRule {
        RewriteRule::new(pattern, replacement, again, run).unwrap()
    }

    #[test]
    fn simple_substitution() {
        let r = rule("\u{e4}", "a", false, 0);
        assert_eq!(r.apply("\u{e4}pple"), "apple");
    }

    #[test]
    fn again_repeats_to_fixed_point() {
        let r = rule("aa", "a", true, 0);
        assert_eq!(r.apply("aaaaa"), "a");
        let once = rule("aa", "a", false, 0);
        assert_eq!(once.apply("aaaa"), "aa");
    }

    #[test]
    fn dollar_zero_is_identity() {
        let r = rule(".*", "$0", true, 0);
        assert_eq!(r.apply("anything"), "anything");
        assert_eq!(r.apply(""), "");
    }

    #[test]
    fn group_references_expand() {
        let r = rule("(a)(b)", "${2}${1}", false, 0);
        assert_eq!(r.apply("ab-ab"), "ba-ba");
    }

    #[test]
    fn unmatched_group_expands_empty() {
        let r = rule("a(x)?", "<$1>", false, 0);
        assert_eq!(r.apply("a b ax"), "<> b <x>");
    }

    #[test]
    fn backward_orientation_reverses_for_the_run() {
        // strip a trailing "s" by matching it at the (reversed) front
        let rules = vec![rule("^s", "", false, 0)];
        let out = apply_run("pages", rules.iter(), Orientation::Backward);
        assert_eq!(out, "page");
    }

    #[test]
    fn runs_produce_multi_level_keys() {
        let rules = vec![rule("\u{e4}", "a", false, 0), rule("\u{e4}", "ae", false, 1)];
        let keys = apply_runs("\u{e4}", &rules, &[Orientation::Forward; 2], 2);
        assert_eq!(keys, vec!["a".to_owned(), "ae".to_owned()]);
    }

    #[test]
    fn empty_rule_set_is_noop() {
        assert_eq!(apply_runs("text", &[], &[], 1), vec!["text".to_owned()]);
        assert_eq!(apply_runs_collapsed("text", &[], &[], 1), "text");
    }

    #[test]
    fn bre_translation() {
        assert_eq!(bre_to_ere(r"\(ab\){2}"), r"(ab)\{2\}");
    }

    #[test]
    fn orientation_parses_case_insensitively() {
        assert_eq!(Orientation::parse("Forward").unwrap(), Orientation::Forward);
        assert_eq!(Orientation::parse("BACKWARD").unwrap(), Orientation::Backward);
        assert!(Orientation::parse("sideways").is_err());
    }
}
