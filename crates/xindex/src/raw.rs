//! Reader for raw index files: streams of `(indexentry …)` forms.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{SyntaxError, XindexError},
    sexpr::{self, Value},
};

/// One `(indexentry …)` record from the raw stream.
///
/// `key` holds the sort spelling of each hierarchy level; `display_key`
/// (from `:tkey`) overrides how the levels are printed. Flags and
/// non-core properties are kept verbatim in `extras`, with boolean flags
/// stored as the symbol `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    pub key: Vec<String>,
    pub display_key: Option<Vec<String>>,
    pub locref: Option<String>,
    pub attr: Option<String>,
    pub extras: IndexMap<String, Value>,
}

impl RawEntry {
    /// The `:xref` target layers, if present. A plain string target is a
    /// single layer.
    #[must_use]
    pub fn xref_target(&self) -> Option<Vec<String>> {
        match self.extras.get("xref")? {
            Value::Str(target) => Some(vec![target.clone()]),
            Value::List(items) => {
                let layers: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_owned))
                    .collect();
                if layers.is_empty() { None } else { Some(layers) }
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn open_range(&self) -> bool {
        self.extras.contains_key("open-range")
    }

    #[must_use]
    pub fn close_range(&self) -> bool {
        self.extras.contains_key("close-range")
    }
}

/// Parses the contents of a raw index file.
pub fn parse_raw_index(text: &str) -> Result<Vec<RawEntry>, XindexError> {
    let forms = sexpr::parse_many(text)?;
    forms.iter().map(entry_from_form).collect()
}

/// Reads and parses `path`, decoding UTF-8 with Latin-1 fallback.
pub fn read_raw_file(path: &Path) -> Result<Vec<RawEntry>, XindexError> {
    let bytes = std::fs::read(path)?;
    parse_raw_index(&sexpr::decode_text(&bytes))
}

fn entry_from_form(form: &Value) -> Result<RawEntry, XindexError> {
    let Some(items) = form.as_list() else {
        return Err(SyntaxError::new("indexentry must be a list").into());
    };
    let Some((head, rest)) = items.split_first() else {
        return Err(SyntaxError::new("indexentry must be a non-empty list").into());
    };
    if head.name() != Some("indexentry") {
        return Err(SyntaxError::new(format!(
            "unsupported raw form {head}; only indexentry is allowed"
        ))
        .into());
    }

    // property list: each keyword takes the next non-keyword value, or
    // stands alone as a boolean flag
    let mut properties: IndexMap<String, Value> = IndexMap::new();
    let mut idx = 0;
    while idx < rest.len() {
        let Some(name) = rest[idx].as_keyword() else {
            return Err(SyntaxError::new(format!(
                "indexentry properties must start with keywords, found {}",
                rest[idx]
            ))
            .into());
        };
        let value = match rest.get(idx + 1) {
            Some(value) if !value.is_keyword() => {
                idx += 2;
                value.clone()
            }
            _ => {
                idx += 1;
                Value::Symbol("t".to_owned())
            }
        };
        properties.insert(name.to_owned(), value);
    }

    let (key, display_key) = coerce_keys(properties.get("key"), properties.get("tkey"))?;
    let locref = coerce_optional_string(properties.get("locref"), "locref")?;
    let attr = coerce_optional_string(properties.get("attr"), "attr")?;
    let extras = properties
        .into_iter()
        .filter(|(name, _)| !matches!(name.as_str(), "key" | "tkey" | "locref" | "attr"))
        .collect();
    Ok(RawEntry {
        key,
        display_key,
        locref,
        attr,
        extras,
    })
}

/// Resolves `:key`/`:tkey` into sort and display spellings.
///
/// `:tkey` wins when present: each level is `(sort)` or `(sort display)`.
fn coerce_keys(
    key: Option<&Value>,
    tkey: Option<&Value>,
) -> Result<(Vec<String>, Option<Vec<String>>), XindexError> {
    if let Some(tkey) = tkey {
        let Some(levels) = tkey.as_list() else {
            return Err(SyntaxError::new(":tkey must be a list of levels").into());
        };
        if levels.is_empty() {
            return Err(SyntaxError::new(":tkey must not be empty").into());
        }
        let mut sorts = Vec::with_capacity(levels.len());
        let mut displays = Vec::with_capacity(levels.len());
        for level in levels {
            let (sort, display) = match level {
                Value::Str(sort) => (sort.clone(), sort.clone()),
                Value::List(parts) => {
                    let sort = parts
                        .first()
                        .and_then(Value::as_str)
                        .ok_or_else(|| SyntaxError::new(":tkey level missing sort string"))?;
                    let display = parts.get(1).and_then(Value::as_str).unwrap_or(sort);
                    (sort.to_owned(), display.to_owned())
                }
                _ => return Err(SyntaxError::new(":tkey levels must be strings or lists").into()),
            };
            sorts.push(sort);
            displays.push(display);
        }
        check_key_parts(&sorts)?;
        return Ok((sorts, Some(displays)));
    }

    let Some(key) = key else {
        return Err(SyntaxError::new("indexentry is missing :key").into());
    };
    let Some(parts) = key.as_list() else {
        return Err(SyntaxError::new(":key must be a list").into());
    };
    if parts.is_empty() {
        return Err(SyntaxError::new(":key must be a non-empty list").into());
    }
    let mut coerced = Vec::with_capacity(parts.len());
    for part in parts {
        let Some(text) = part.as_str() else {
            return Err(SyntaxError::new(":key entries must be strings").into());
        };
        coerced.push(text.to_owned());
    }
    check_key_parts(&coerced)?;
    Ok((coerced, None))
}

fn check_key_parts(parts: &[String]) -> Result<(), SyntaxError> {
    if parts.iter().any(String::is_empty) {
        return Err(SyntaxError::new("empty strings are not permitted in :key"));
    }
    Ok(())
}

fn coerce_optional_string(value: Option<&Value>, name: &str) -> Result<Option<String>, XindexError> {
    match value {
        None => Ok(None),
        Some(Value::Str(text)) => Ok(Some(text.clone())),
        Some(other) => {
            Err(SyntaxError::new(format!(":{name} must be a string, found {other}")).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_single(text: &str) -> RawEntry {
        let mut entries = parse_raw_index(text).unwrap();
        assert_eq!(entries.len(), 1);
        entries.remove(0)
    }

    #[test]
    fn minimal_entry() {
        let entry = parse_single(r#"(indexentry :key ("a") :locref "13" :attr "def")"#);
        assert_eq!(entry.key, vec!["a".to_owned()]);
        assert_eq!(entry.locref.as_deref(), Some("13"));
        assert_eq!(entry.attr.as_deref(), Some("def"));
        assert_eq!(entry.display_key, None);
        assert!(entry.extras.is_empty());
    }

    #[test]
    fn tkey_overrides_key() {
        let entry = parse_single(
            r#"(indexentry :tkey (("ouml" "\"o") ("sub")) :locref "2")"#,
        );
        assert_eq!(entry.key, vec!["ouml".to_owned(), "sub".to_owned()]);
        assert_eq!(
            entry.display_key,
            Some(vec!["\"o".to_owned(), "sub".to_owned()])
        );
    }

    #[test]
    fn boolean_flags_need_no_value() {
        let entry = parse_single(r#"(indexentry :key ("a") :locref "1" :open-range)"#);
        assert!(entry.open_range());
        assert!(!entry.close_range());
        let entry = parse_single(r#"(indexentry :key ("a") :open-range :locref "1")"#);
        assert!(entry.open_range());
        assert_eq!(entry.locref.as_deref(), Some("1"));
    }

    #[test]
    fn xref_accepts_string_or_list() {
        let entry = parse_single(r#"(indexentry :key ("a") :xref "target")"#);
        assert_eq!(entry.xref_target(), Some(vec!["target".to_owned()]));
        let entry = parse_single(r#"(indexentry :key ("a") :xref ("t1" "t2"))"#);
        assert_eq!(
            entry.xref_target(),
            Some(vec!["t1".to_owned(), "t2".to_owned()])
        );
    }

    #[test]
    fn empty_key_part_is_rejected() {
        assert!(parse_raw_index(r#"(indexentry :key ("") :locref "1")"#).is_err());
        assert!(parse_raw_index(r#"(indexentry :key () :locref "1")"#).is_err());
    }

    #[test]
    fn non_indexentry_form_is_rejected() {
        assert!(parse_raw_index(r#"(other :key ("a"))"#).is_err());
    }
}
