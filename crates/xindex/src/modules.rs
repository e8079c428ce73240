//! Bundled style modules, compiled into the binary.
//!
//! `require` falls back to this table once the filesystem search path is
//! exhausted, so the standard fragments are always available without an
//! installed module directory.

/// Name/source pairs of every bundled module.
const BUILTIN_MODULES: &[(&str, &str)] = &[
    ("default.xdy", include_str!("../modules/default.xdy")),
    ("loc/pages.xdy", include_str!("../modules/loc/pages.xdy")),
    (
        "lang/latin-lettergroups.xdy",
        include_str!("../modules/lang/latin-lettergroups.xdy"),
    ),
    (
        "rules/isolatin1-tolower.xdy",
        include_str!("../modules/rules/isolatin1-tolower.xdy"),
    ),
    (
        "rules/sort-ignore-special.xdy",
        include_str!("../modules/rules/sort-ignore-special.xdy"),
    ),
    ("tex/makeidx.xdy", include_str!("../modules/tex/makeidx.xdy")),
];

/// Looks up a bundled module by its relative name.
///
/// A leading `./` and a missing `.xdy` suffix are tolerated, matching how
/// styles spell `require` targets.
#[must_use]
pub fn builtin_module(name: &str) -> Option<&'static str> {
    let trimmed = name.strip_prefix("./").unwrap_or(name);
    BUILTIN_MODULES
        .iter()
        .find(|(key, _)| *key == trimmed || key.strip_suffix(".xdy") == Some(trimmed))
        .map(|(_, source)| *source)
}

/// Names of all bundled modules, for diagnostics.
#[must_use]
pub fn builtin_module_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_MODULES.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_tolerates_prefix_and_suffix() {
        assert!(builtin_module("default.xdy").is_some());
        assert!(builtin_module("./default.xdy").is_some());
        assert!(builtin_module("default").is_some());
        assert!(builtin_module("no-such-module.xdy").is_none());
    }

    #[test]
    fn all_bundled_modules_parse() {
        for name in builtin_module_names() {
            let source = builtin_module(name).unwrap();
            let preprocessed = crate::sexpr::preprocess(source);
            crate::sexpr::parse_many(&preprocessed)
                .unwrap_or_else(|err| panic!("bundled module {name} fails to parse: {err}"));
        }
    }
}
