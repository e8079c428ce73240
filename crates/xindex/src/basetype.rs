//! Base types used by location-class layers: alphabets and enumerations.
//!
//! An [`Alphabet`] matches by longest symbol prefix and yields the symbol's
//! position as ordinal. An [`Enumeration`] delegates to one of the built-in
//! numeric matchers (radix-N digits, roman numerals in either case) and
//! yields the parsed value.

use serde::{Deserialize, Serialize};

/// Outcome of matching a prefix of a location string.
///
/// `matched`/`rest` split the input; `ordnum` is the ordinal the layer
/// contributes to the location reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult<'a> {
    pub matched: &'a str,
    pub rest: &'a str,
    pub ordnum: i64,
}

/// A base type registered in the style state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BaseType {
    Alphabet(Alphabet),
    Enumeration(Enumeration),
}

impl BaseType {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Alphabet(alphabet) => &alphabet.name,
            Self::Enumeration(enumeration) => &enumeration.name,
        }
    }

    /// The sorted distinct characters this type can consume.
    #[must_use]
    pub fn base_alphabet(&self) -> &[char] {
        match self {
            Self::Alphabet(alphabet) => &alphabet.base_alphabet,
            Self::Enumeration(enumeration) => &enumeration.base_alphabet,
        }
    }

    /// True for roman-numeral enumerations; location classes containing one
    /// default to a larger minimum range length.
    #[must_use]
    pub fn is_roman(&self) -> bool {
        matches!(
            self,
            Self::Enumeration(Enumeration {
                matcher: EnumMatcher::RomanUppercase | EnumMatcher::RomanLowercase,
                ..
            })
        )
    }

    /// Matches the longest prefix of `text` this type accepts.
    #[must_use]
    pub fn prefix_match<'a>(&self, text: &'a str) -> Option<MatchResult<'a>> {
        match self {
            Self::Alphabet(alphabet) => alphabet.prefix_match(text),
            Self::Enumeration(enumeration) => enumeration.prefix_match(text),
        }
    }
}

/// An ordered list of symbols; the match ordinal is the symbol's index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alphabet {
    pub name: String,
    pub symbols: Vec<String>,
    base_alphabet: Vec<char>,
}

impl Alphabet {
    #[must_use]
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        let base_alphabet = calculate_base_alphabet(&symbols);
        Self {
            name: name.into(),
            symbols,
            base_alphabet,
        }
    }

    /// Finds the symbol sharing the longest common prefix with `text`.
    ///
    /// A symbol also matches when `text` runs out before the symbol does,
    /// which resolves ambiguous alphabets (`"10"` beats `"1"` for input
    /// `"10"`) in favour of the longest consumed prefix.
    #[must_use]
    pub fn prefix_match<'a>(&self, text: &'a str) -> Option<MatchResult<'a>> {
        let mut best: Option<MatchResult<'a>> = None;
        for (ordinal, symbol) in self.symbols.iter().enumerate() {
            let length = common_prefix_bytes(text, symbol);
            if length == 0 {
                continue;
            }
            if best.as_ref().is_none_or(|b| length > b.matched.len()) {
                best = Some(MatchResult {
                    matched: &text[..length],
                    rest: &text[length..],
                    ordnum: ordinal as i64,
                });
            }
        }
        best
    }
}

/// A numeric base type matching via [`EnumMatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enumeration {
    pub name: String,
    pub base_alphabet: Vec<char>,
    pub matcher: EnumMatcher,
}

impl Enumeration {
    #[must_use]
    pub fn new(name: impl Into<String>, base_alphabet: &str, matcher: EnumMatcher) -> Self {
        Self {
            name: name.into(),
            base_alphabet: {
                let mut chars: Vec<char> = base_alphabet.chars().collect();
                chars.sort_unstable();
                chars
            },
            matcher,
        }
    }

    #[must_use]
    pub fn prefix_match<'a>(&self, text: &'a str) -> Option<MatchResult<'a>> {
        self.matcher.prefix_match(text)
    }
}

/// The built-in numeric matchers.
///
/// Modelled as data rather than closures so enumerations stay comparable
/// and serializable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize, Deserialize)]
pub enum EnumMatcher {
    /// Digit string in the given radix (2..=36), value as ordinal.
    #[strum(serialize = "radix")]
    Radix(u32),
    /// Uppercase roman numerals (`XIV`).
    #[strum(serialize = "roman-uppercase")]
    RomanUppercase,
    /// Lowercase roman numerals (`xiv`).
    #[strum(serialize = "roman-lowercase")]
    RomanLowercase,
}

impl EnumMatcher {
    #[must_use]
    pub fn prefix_match(self, text: &str) -> Option<MatchResult<'_>> {
        match self {
            Self::Radix(radix) => prefix_match_radix(text, radix),
            Self::RomanUppercase => prefix_match_roman(text, false),
            Self::RomanLowercase => prefix_match_roman(text, true),
        }
    }
}

/// Computes the sorted list of distinct characters found in `symbols`.
#[must_use]
pub fn calculate_base_alphabet(symbols: &[String]) -> Vec<char> {
    let mut chars: Vec<char> = symbols.iter().flat_map(|s| s.chars()).collect();
    chars.sort_unstable();
    chars.dedup();
    chars
}

/// Length in bytes of the common prefix of `text` and `candidate`.
///
/// Compared char-wise so multi-byte symbols cannot split a code point.
fn common_prefix_bytes(text: &str, candidate: &str) -> usize {
    text.chars()
        .zip(candidate.chars())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum()
}

/// Matches a digit prefix in the given radix, returning its value.
fn prefix_match_radix(text: &str, radix: u32) -> Option<MatchResult<'_>> {
    let mut end = 0;
    let mut value: i64 = 0;
    for ch in text.chars() {
        let Some(digit) = ch.to_digit(radix) else {
            break;
        };
        value = value
            .checked_mul(i64::from(radix))?
            .checked_add(i64::from(digit))?;
        end += ch.len_utf8();
    }
    if end == 0 {
        return None;
    }
    Some(MatchResult {
        matched: &text[..end],
        rest: &text[end..],
        ordnum: value,
    })
}

const ROMAN_VALUES: [(char, i64); 7] = [
    ('I', 1),
    ('V', 5),
    ('X', 10),
    ('L', 50),
    ('C', 100),
    ('D', 500),
    ('M', 1000),
];

fn roman_digit(ch: char) -> Option<i64> {
    ROMAN_VALUES
        .iter()
        .find(|(digit, _)| *digit == ch)
        .map(|(_, value)| *value)
}

/// Renders `value` in canonical (subtractive) roman notation.
fn to_roman(mut value: i64) -> String {
    const STEPS: [(i64, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (step, digits) in STEPS {
        while value >= step {
            out.push_str(digits);
            value -= step;
        }
    }
    out
}

/// Value of a roman digit string using standard subtractive parsing.
fn roman_value(text: &str) -> i64 {
    let digits: Vec<i64> = text.chars().filter_map(roman_digit).collect();
    let mut total = 0;
    for (i, &value) in digits.iter().enumerate() {
        if digits[i + 1..].iter().any(|&next| next > value) {
            total -= value;
        } else {
            total += value;
        }
    }
    total
}

/// Greedily consumes roman digits and validates the result by
/// round-tripping through the canonical spelling, so `IC` fails while
/// `XCIX` matches.
fn prefix_match_roman(text: &str, lowercase: bool) -> Option<MatchResult<'_>> {
    let mut end = 0;
    for ch in text.chars() {
        let folded = if lowercase {
            ch.to_ascii_uppercase()
        } else {
            ch
        };
        if lowercase != ch.is_ascii_lowercase() || roman_digit(folded).is_none() {
            break;
        }
        end += ch.len_utf8();
    }
    if end == 0 {
        return None;
    }
    let matched = &text[..end];
    let value = roman_value(&matched.to_ascii_uppercase());
    let canonical = to_roman(value);
    let expected = if lowercase {
        canonical.to_ascii_lowercase()
    } else {
        canonical
    };
    if expected != matched {
        return None;
    }
    Some(MatchResult {
        matched,
        rest: &text[end..],
        ordnum: value,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn alphabet(symbols: &[&str]) -> Alphabet {
        Alphabet::new("test", symbols.iter().map(|s| (*s).to_owned()).collect())
    }

    #[test]
    fn alphabet_prefers_longest_symbol() {
        let alph = alphabet(&["1", "10", "101"]);
        let result = alph.prefix_match("101A").unwrap();
        assert_eq!(result.matched, "101");
        assert_eq!(result.rest, "A");
        assert_eq!(result.ordnum, 2);
    }

    #[test]
    fn alphabet_no_match_returns_none() {
        let alph = alphabet(&["a", "b"]);
        assert!(alph.prefix_match("x").is_none());
    }

    #[test]
    fn base_alphabet_is_sorted_and_distinct() {
        let alph = alphabet(&["ba", "ab"]);
        assert_eq!(
            BaseType::Alphabet(alph).base_alphabet(),
            &['a', 'b'][..]
        );
    }

    #[test]
    fn radix_matcher_returns_value_and_rest() {
        let result = prefix_match_radix("12-34", 10).unwrap();
        assert_eq!(result.matched, "12");
        assert_eq!(result.rest, "-34");
        assert_eq!(result.ordnum, 12);
    }

    #[test]
    fn radix_matcher_respects_radix() {
        let result = prefix_match_radix("1f", 16).unwrap();
        assert_eq!(result.matched, "1f");
        assert_eq!(result.ordnum, 31);
        let result = prefix_match_radix("19", 8).unwrap();
        assert_eq!(result.matched, "1");
        assert_eq!(result.ordnum, 1);
    }

    #[test]
    fn roman_round_trip_validation() {
        let result = prefix_match_roman("XIV", false).unwrap();
        assert_eq!(result.ordnum, 14);
        assert_eq!(result.rest, "");
        // greedy consumption without back-off: "IC" is not canonical
        assert!(prefix_match_roman("IC", false).is_none());
        let result = prefix_match_roman("xcix-", true).unwrap();
        assert_eq!(result.ordnum, 99);
        assert_eq!(result.rest, "-");
    }

    #[test]
    fn roman_flavours_do_not_cross_case() {
        assert!(prefix_match_roman("xiv", false).is_none());
        assert!(prefix_match_roman("XIV", true).is_none());
    }
}
