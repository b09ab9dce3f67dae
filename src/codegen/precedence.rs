//! Operator precedence ranks and the parenthesization rule.
//!
//! Every rendered expression carries the rank of its outermost operator.
//! A value slot declares the minimum rank it accepts; a child whose rank is
//! lower gets wrapped in parentheses. A small override table elides the
//! wrap for slot/child pairs where associativity makes it redundant.

/// Rank ladder, higher binds tighter. The gaps leave room for operators
/// the surface language does not currently expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Precedence {
    None = 0,
    Assignment = 2,
    LogicalOr = 4,
    LogicalAnd = 5,
    Equality = 6,
    Relational = 7,
    Additive = 9,
    Multiplicative = 10,
    Unary = 12,
    Call = 14,
    Member = 15,
    Atomic = 16,
}

impl Precedence {
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

/// A rendered expression fragment: its text, the rank of its outermost
/// operator, and that operator's canonical spelling for override matching.
#[derive(Debug, Clone)]
pub(crate) struct Rendered {
    pub text: String,
    pub rank: Precedence,
    pub op: Option<&'static str>,
}

impl Rendered {
    pub fn atom(text: impl Into<String>) -> Rendered {
        Rendered {
            text: text.into(),
            rank: Precedence::Atomic,
            op: None,
        }
    }

    pub fn call(text: impl Into<String>) -> Rendered {
        Rendered {
            text: text.into(),
            rank: Precedence::Call,
            op: Some("()"),
        }
    }
}

/// Slot/child operator pairs that never need the redundant wrap: repeated
/// associative operators, and member chains hanging off calls or other
/// member accesses.
const PAREN_ELIDE: &[(&str, &str)] = &[
    ("+", "+"),
    ("*", "*"),
    ("&&", "&&"),
    ("||", "||"),
    (".", "()"),
    (".", "."),
];

/// Wrap `child` in parentheses when its rank is below the slot minimum,
/// unless the slot/child operator pair is on the elision list.
pub(crate) fn wrap(child: &Rendered, min: Precedence, slot_op: Option<&'static str>) -> String {
    if child.rank >= min {
        return child.text.clone();
    }
    if let (Some(slot), Some(op)) = (slot_op, child.op) {
        if PAREN_ELIDE.contains(&(slot, op)) {
            return child.text.clone();
        }
    }
    format!("({})", child.text)
}

/// Rendering data for one binary operator spelling.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BinaryOp {
    pub symbol: &'static str,
    pub rank: Precedence,
    /// Minimum rank of the left operand slot.
    pub left_min: Precedence,
    /// Minimum rank of the right operand slot. One step tighter than the
    /// operator itself, which is what makes emitted text left-associative.
    pub right_min: Precedence,
}

pub(crate) fn binary_op(op: &str) -> Option<BinaryOp> {
    let entry = match op {
        "+" => BinaryOp {
            symbol: "+",
            rank: Precedence::Additive,
            left_min: Precedence::Additive,
            right_min: Precedence::Multiplicative,
        },
        "-" => BinaryOp {
            symbol: "-",
            rank: Precedence::Additive,
            left_min: Precedence::Additive,
            right_min: Precedence::Multiplicative,
        },
        "*" => BinaryOp {
            symbol: "*",
            rank: Precedence::Multiplicative,
            left_min: Precedence::Multiplicative,
            right_min: Precedence::Unary,
        },
        "/" => BinaryOp {
            symbol: "/",
            rank: Precedence::Multiplicative,
            left_min: Precedence::Multiplicative,
            right_min: Precedence::Unary,
        },
        "%" => BinaryOp {
            symbol: "%",
            rank: Precedence::Multiplicative,
            left_min: Precedence::Multiplicative,
            right_min: Precedence::Unary,
        },
        "==" => BinaryOp {
            symbol: "==",
            rank: Precedence::Equality,
            left_min: Precedence::Equality,
            right_min: Precedence::Relational,
        },
        "!=" => BinaryOp {
            symbol: "!=",
            rank: Precedence::Equality,
            left_min: Precedence::Equality,
            right_min: Precedence::Relational,
        },
        "<" => BinaryOp {
            symbol: "<",
            rank: Precedence::Relational,
            left_min: Precedence::Relational,
            right_min: Precedence::Additive,
        },
        "<=" => BinaryOp {
            symbol: "<=",
            rank: Precedence::Relational,
            left_min: Precedence::Relational,
            right_min: Precedence::Additive,
        },
        ">" => BinaryOp {
            symbol: ">",
            rank: Precedence::Relational,
            left_min: Precedence::Relational,
            right_min: Precedence::Additive,
        },
        ">=" => BinaryOp {
            symbol: ">=",
            rank: Precedence::Relational,
            left_min: Precedence::Relational,
            right_min: Precedence::Additive,
        },
        "&&" => BinaryOp {
            symbol: "&&",
            rank: Precedence::LogicalAnd,
            left_min: Precedence::LogicalAnd,
            right_min: Precedence::Equality,
        },
        "||" => BinaryOp {
            symbol: "||",
            rank: Precedence::LogicalOr,
            left_min: Precedence::LogicalOr,
            right_min: Precedence::LogicalAnd,
        },
        _ => return None,
    };
    Some(entry)
}
