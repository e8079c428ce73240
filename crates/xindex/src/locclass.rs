//! Location classes: ordered layer/separator schemas for location strings.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{basetype::BaseType, error::LocationMatchError};

/// Ordinals matched by one location reference; classes rarely have more
/// than a few layers.
pub type OrdnumVec = SmallVec<[i64; 4]>;

/// One element of a location-class schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerElement {
    /// A typed layer producing an ordinal.
    Layer(BaseType),
    /// A literal separator; consumed, no ordinal.
    Separator(String),
}

/// Standard classes take part in range building; `var` classes never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum ClassVariant {
    Standard,
    Var,
}

/// A location class as declared by `define-location-class`.
///
/// `ordnum` is the unique id assigned at creation time by the style state;
/// it defines the total order used whenever references of different classes
/// must be compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationClass {
    pub name: String,
    pub ordnum: u32,
    pub layers: Vec<LayerElement>,
    /// How many leading layers form the display-hierarchy prefix.
    pub hierdepth: usize,
    /// Minimum number of consecutive references that coalesce into a range.
    pub min_range_length: usize,
    pub variant: ClassVariant,
}

impl LocationClass {
    /// Parses `locstring` against this class's layer schema.
    ///
    /// Consumes the string left to right; every `Layer` must match a
    /// non-empty prefix and every `Separator` its literal. Trailing
    /// unparsed input fails the class.
    pub fn perform_match(
        &self,
        locstring: &str,
    ) -> Result<(Vec<String>, OrdnumVec), LocationMatchError> {
        let mut layer_matches = Vec::new();
        let mut ordnums = OrdnumVec::new();
        let mut rest = locstring;
        for element in &self.layers {
            match element {
                LayerElement::Layer(basetype) => {
                    let Some(result) = basetype.prefix_match(rest) else {
                        return Err(LocationMatchError::new(format!(
                            "base type {:?} does not match {rest:?}",
                            basetype.name()
                        )));
                    };
                    layer_matches.push(result.matched.to_owned());
                    ordnums.push(result.ordnum);
                    rest = result.rest;
                }
                LayerElement::Separator(literal) => {
                    let Some(remainder) = rest.strip_prefix(literal.as_str()) else {
                        return Err(LocationMatchError::new(format!(
                            "separator {literal:?} does not match {rest:?}"
                        )));
                    };
                    rest = remainder;
                }
            }
        }
        if !rest.is_empty() {
            return Err(LocationMatchError::new(format!(
                "unparsed remainder {rest:?} for class {:?}",
                self.name
            )));
        }
        Ok((layer_matches, ordnums))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::basetype::{Alphabet, EnumMatcher, Enumeration};

    fn digits() -> BaseType {
        BaseType::Enumeration(Enumeration::new(
            "arabic-numbers",
            "0123456789",
            EnumMatcher::Radix(10),
        ))
    }

    fn class(layers: Vec<LayerElement>) -> LocationClass {
        LocationClass {
            name: "test".to_owned(),
            ordnum: 1,
            layers,
            hierdepth: 0,
            min_range_length: 2,
            variant: ClassVariant::Standard,
        }
    }

    #[test]
    fn match_with_separator() {
        let cls = class(vec![
            LayerElement::Layer(digits()),
            LayerElement::Separator("-".to_owned()),
            LayerElement::Layer(digits()),
        ]);
        let (layers, ordnums) = cls.perform_match("12-34").unwrap();
        assert_eq!(layers, vec!["12".to_owned(), "34".to_owned()]);
        assert_eq!(ordnums.as_slice(), &[12, 34]);
    }

    #[test]
    fn trailing_input_fails() {
        let cls = class(vec![LayerElement::Layer(digits())]);
        let err = cls.perform_match("12x").unwrap_err();
        assert!(err.message.contains("unparsed remainder"));
    }

    #[test]
    fn missing_separator_fails() {
        let cls = class(vec![
            LayerElement::Layer(digits()),
            LayerElement::Separator(".".to_owned()),
            LayerElement::Layer(digits()),
        ]);
        assert!(cls.perform_match("12-34").is_err());
    }

    #[test]
    fn alphabet_layer_yields_positional_ordinal() {
        let upper = BaseType::Alphabet(Alphabet::new(
            "ALPHA",
            ('A'..='Z').map(|c| c.to_string()).collect(),
        ));
        let cls = class(vec![
            LayerElement::Layer(upper),
            LayerElement::Separator("-".to_owned()),
            LayerElement::Layer(digits()),
        ]);
        let (layers, ordnums) = cls.perform_match("C-7").unwrap();
        assert_eq!(layers, vec!["C".to_owned(), "7".to_owned()]);
        assert_eq!(ordnums.as_slice(), &[2, 7]);
    }
}
