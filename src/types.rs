//! Type tags and socket compatibility rules.
//!
//! Every value socket carries a [`TypeSet`] describing what it accepts. The
//! checker is deliberately small: a fixed tag catalog, a handful of widening
//! rules, and no numeric coercions. [`compatible`] is consulted on every edge
//! creation attempt and by the parser when it re-derives a socket's required
//! type from inferred literal types.

use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The closed catalog of type tags a socket or output may carry.
///
/// `Variable` and `Type` are structural tags: they describe sockets that
/// accept a variable reference or a type reference rather than a runtime
/// value, and are deliberately excluded from `Any` matching.
#[derive(Debug, EnumSetType, Serialize, Deserialize)]
#[enumset(serialize_repr = "list")]
pub enum SlotType {
    Number,
    String,
    Boolean,
    Color,
    Array,
    Sprite,
    Iterable,
    Variable,
    Type,
    Any,
    Void,
}

impl SlotType {
    /// Parse a tag as it appears in structured comments (`/*type:Number*/`).
    pub fn parse_tag(tag: &str) -> Option<SlotType> {
        match tag {
            "Number" => Some(SlotType::Number),
            "String" => Some(SlotType::String),
            "Boolean" => Some(SlotType::Boolean),
            "Color" => Some(SlotType::Color),
            "Array" => Some(SlotType::Array),
            "Sprite" => Some(SlotType::Sprite),
            "Iterable" => Some(SlotType::Iterable),
            "Variable" => Some(SlotType::Variable),
            "Type" => Some(SlotType::Type),
            "Any" => Some(SlotType::Any),
            "Void" => Some(SlotType::Void),
            _ => None,
        }
    }

    /// The tag's spelling in structured comments and diagnostics.
    pub fn tag_name(&self) -> &'static str {
        match self {
            SlotType::Number => "Number",
            SlotType::String => "String",
            SlotType::Boolean => "Boolean",
            SlotType::Color => "Color",
            SlotType::Array => "Array",
            SlotType::Sprite => "Sprite",
            SlotType::Iterable => "Iterable",
            SlotType::Variable => "Variable",
            SlotType::Type => "Type",
            SlotType::Any => "Any",
            SlotType::Void => "Void",
        }
    }
}

impl Display for SlotType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag_name())
    }
}

/// The accepted type-set of a socket: either "accepts anything" or an
/// explicit set of tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TypeSet {
    /// No declared restriction. Compatible with every other set.
    #[default]
    Anything,
    /// Restricted to the given tags.
    Only(EnumSet<SlotType>),
}

impl TypeSet {
    /// A set holding a single tag.
    pub fn single(tag: SlotType) -> TypeSet {
        TypeSet::Only(EnumSet::only(tag))
    }

    /// A set holding the given tags.
    pub fn of(tags: &[SlotType]) -> TypeSet {
        let mut set = EnumSet::new();
        for tag in tags {
            set.insert(*tag);
        }
        TypeSet::Only(set)
    }

    pub fn is_anything(&self) -> bool {
        matches!(self, TypeSet::Anything)
    }

    /// The member tags, or `None` for an unrestricted set.
    pub fn tags(&self) -> Option<EnumSet<SlotType>> {
        match self {
            TypeSet::Anything => None,
            TypeSet::Only(set) => Some(*set),
        }
    }

    /// Whether a value carrying `other` may connect here. Delegates to
    /// [`compatible`].
    pub fn accepts(&self, other: &TypeSet) -> bool {
        compatible(self, other)
    }
}

impl Display for TypeSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeSet::Anything => write!(f, "*"),
            TypeSet::Only(set) => {
                let mut first = true;
                for tag in set.iter() {
                    if !first {
                        write!(f, "|")?;
                    }
                    write!(f, "{tag}")?;
                    first = false;
                }
                if first {
                    // An explicitly empty set accepts nothing; render it as such.
                    write!(f, "!")?;
                }
                Ok(())
            }
        }
    }
}

impl From<SlotType> for TypeSet {
    fn from(tag: SlotType) -> TypeSet {
        TypeSet::single(tag)
    }
}

/// Pairwise tag compatibility. Symmetric by construction.
///
/// Rules beyond equality: `Any` matches everything except the structural tags
/// `Variable` and `Type`; `Iterable` matches `Array` or `String`; `Color`
/// matches `String` in both directions. There are no numeric coercions.
pub fn tags_compatible(a: SlotType, b: SlotType) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (SlotType::Any, other) | (other, SlotType::Any) => {
            !matches!(other, SlotType::Variable | SlotType::Type)
        }
        (SlotType::Iterable, SlotType::Array | SlotType::String)
        | (SlotType::Array | SlotType::String, SlotType::Iterable) => true,
        (SlotType::Color, SlotType::String) | (SlotType::String, SlotType::Color) => true,
        _ => false,
    }
}

/// Whether two accepted type-sets may be linked.
///
/// If either side declares no restriction the answer is always true;
/// otherwise some pair of member tags must satisfy [`tags_compatible`].
pub fn compatible(a: &TypeSet, b: &TypeSet) -> bool {
    let (set_a, set_b) = match (a, b) {
        (TypeSet::Anything, _) | (_, TypeSet::Anything) => return true,
        (TypeSet::Only(a), TypeSet::Only(b)) => (a, b),
    };
    set_a
        .iter()
        .any(|tag_a| set_b.iter().any(|tag_b| tags_compatible(tag_a, tag_b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tags() -> EnumSet<SlotType> {
        EnumSet::all()
    }

    #[test]
    fn test_compatibility_is_symmetric() {
        for a in all_tags().iter() {
            for b in all_tags().iter() {
                assert_eq!(
                    tags_compatible(a, b),
                    tags_compatible(b, a),
                    "asymmetry between {a} and {b}"
                );
                let sa = TypeSet::single(a);
                let sb = TypeSet::single(b);
                assert_eq!(compatible(&sa, &sb), compatible(&sb, &sa));
            }
        }
    }

    #[test]
    fn test_equal_tags_match() {
        for tag in all_tags().iter() {
            assert!(tags_compatible(tag, tag));
        }
    }

    #[test]
    fn test_any_excludes_structural_tags() {
        assert!(!tags_compatible(SlotType::Any, SlotType::Variable));
        assert!(!tags_compatible(SlotType::Any, SlotType::Type));
        assert!(tags_compatible(SlotType::Any, SlotType::Number));
        assert!(tags_compatible(SlotType::Any, SlotType::Void));
        assert!(tags_compatible(SlotType::Any, SlotType::Sprite));
    }

    #[test]
    fn test_widening_rules() {
        assert!(tags_compatible(SlotType::Iterable, SlotType::Array));
        assert!(tags_compatible(SlotType::Iterable, SlotType::String));
        assert!(!tags_compatible(SlotType::Iterable, SlotType::Number));
        assert!(tags_compatible(SlotType::Color, SlotType::String));
        assert!(tags_compatible(SlotType::String, SlotType::Color));
        assert!(!tags_compatible(SlotType::Color, SlotType::Number));
    }

    #[test]
    fn test_no_numeric_coercions() {
        assert!(!tags_compatible(SlotType::Number, SlotType::String));
        assert!(!tags_compatible(SlotType::Number, SlotType::Boolean));
    }

    #[test]
    fn test_anything_matches_all_sets() {
        let anything = TypeSet::Anything;
        for tag in all_tags().iter() {
            assert!(compatible(&anything, &TypeSet::single(tag)));
        }
        assert!(compatible(&anything, &TypeSet::Anything));
        // Even an empty explicit set is accepted by an unrestricted side.
        assert!(compatible(&anything, &TypeSet::Only(EnumSet::new())));
    }

    #[test]
    fn test_set_level_matching_requires_one_pair() {
        let spread = TypeSet::of(&[SlotType::String, SlotType::Array, SlotType::Iterable]);
        assert!(compatible(&spread, &TypeSet::single(SlotType::Array)));
        assert!(compatible(&spread, &TypeSet::single(SlotType::Color)));
        assert!(!compatible(&spread, &TypeSet::single(SlotType::Boolean)));
        let empty = TypeSet::Only(EnumSet::new());
        assert!(!compatible(&empty, &TypeSet::single(SlotType::Number)));
    }

    #[test]
    fn test_tag_names_round_trip() {
        for tag in all_tags().iter() {
            assert_eq!(SlotType::parse_tag(tag.tag_name()), Some(tag));
        }
        assert_eq!(SlotType::parse_tag("number"), None);
        assert_eq!(SlotType::parse_tag(""), None);
    }

    #[test]
    fn test_type_set_serde_round_trip() {
        let set = TypeSet::of(&[SlotType::Number, SlotType::Color]);
        let json = serde_json::to_string(&set).unwrap();
        let back: TypeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }
}
