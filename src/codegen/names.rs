//! Per-generation-pass identifier table.
//!
//! Raw names out of node fields are user input: they may collide with the
//! surface language's reserved words, contain characters the grammar cannot
//! lex, or collide with each other after sanitization. Each generation pass
//! builds one [`NameTable`] keyed by a stable internal key (the declaring
//! node's id, or the registry name for procedures) so every reference to the
//! same entity renders the same identifier.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// Reserved words of the surface language, plus the host-facing receivers
/// (`this`, `Math`) the generator spells out itself.
const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "let", "new", "null", "of", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "yield", "Math", "Number", "String",
    "rgb", "sprite",
];

static IDENT_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$]").expect("ident regex"));
static IDENT_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_$]").expect("ident strip regex"));

/// Stable-key to unique-identifier mapping for one generation pass.
#[derive(Debug, Default)]
pub struct NameTable {
    assigned: BTreeMap<String, String>,
    taken: BTreeSet<String>,
}

impl NameTable {
    pub fn new() -> NameTable {
        NameTable::default()
    }

    /// The identifier rendered for `key`, claiming one on first use.
    ///
    /// The requested spelling is sanitized to a legal identifier, steered
    /// off the reserved-word list, and uniquified with a numeric suffix if
    /// another key already took it. Repeated calls with the same key return
    /// the same identifier for the rest of the pass.
    pub fn claim(&mut self, key: &str, requested: &str) -> String {
        if let Some(existing) = self.assigned.get(key) {
            return existing.clone();
        }
        let base = sanitize(requested);
        let mut candidate = base.clone();
        let mut counter = 2usize;
        while self.taken.contains(&candidate) {
            candidate = format!("{base}{counter}");
            counter += 1;
        }
        self.taken.insert(candidate.clone());
        self.assigned.insert(key.to_string(), candidate.clone());
        candidate
    }

    /// Look up a previously claimed identifier without claiming a new one.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.assigned.get(key).map(String::as_str)
    }
}

fn sanitize(requested: &str) -> String {
    let stripped = IDENT_STRIP.replace_all(requested.trim(), "_");
    let mut name = stripped.into_owned();
    if name.is_empty() {
        name = "unnamed".to_string();
    }
    if !IDENT_HEAD.is_match(&name) {
        name = format!("_{name}");
    }
    if RESERVED.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_same_name() {
        let mut table = NameTable::new();
        let first = table.claim("node-1", "score");
        let again = table.claim("node-1", "score");
        assert_eq!(first, "score");
        assert_eq!(first, again);
    }

    #[test]
    fn test_collisions_get_suffixes() {
        let mut table = NameTable::new();
        assert_eq!(table.claim("a", "lives"), "lives");
        assert_eq!(table.claim("b", "lives"), "lives2");
        assert_eq!(table.claim("c", "lives"), "lives3");
    }

    #[test]
    fn test_reserved_words_are_avoided() {
        let mut table = NameTable::new();
        assert_eq!(table.claim("a", "while"), "while_");
        assert_eq!(table.claim("b", "this"), "this_");
        assert_eq!(table.claim("c", "Math"), "Math_");
    }

    #[test]
    fn test_illegal_spellings_are_sanitized() {
        let mut table = NameTable::new();
        assert_eq!(table.claim("a", "high score!"), "high_score_");
        assert_eq!(table.claim("b", "2nd"), "_2nd");
        assert_eq!(table.claim("c", ""), "unnamed");
        // Distinct keys still get distinct identifiers after sanitization.
        assert_eq!(table.claim("d", "  "), "unnamed2");
    }

    #[test]
    fn test_lookup_without_claim() {
        let mut table = NameTable::new();
        assert!(table.get("a").is_none());
        table.claim("a", "x");
        assert_eq!(table.get("a"), Some("x"));
    }
}
