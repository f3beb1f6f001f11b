//! Product name cleanup.
//!
//! Strips grade-count tokens (`2 гат`), reference numbers (`№123`) and
//! redundant whitespace before any attribute matching happens.

use regex::Regex;
use std::sync::LazyLock;

static RE_GRADE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b\d+\s*гат\b").unwrap());
static RE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"№\d+").unwrap());
static RE_WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Normalize a raw product name.
///
/// Idempotent: `normalize_name(&normalize_name(x)) == normalize_name(x)`.
pub fn normalize_name(raw: &str) -> String {
    let mut current = clean_once(raw);
    // Removing one token can expose another; run to a fixpoint.
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(name: &str) -> String {
    let without_grades = RE_GRADE_COUNT.replace_all(name, "");
    let without_refs = RE_REFERENCE.replace_all(&without_grades, "");
    RE_WHITESPACE_RUN
        .replace_all(&without_refs, " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_name_is_unchanged() {
        assert_eq!(normalize_name("Сир твердий 250г"), "Сир твердий 250г");
    }

    #[test]
    fn test_strips_reference_numbers() {
        assert_eq!(normalize_name("Печиво №12 вершкове"), "Печиво вершкове");
    }

    #[test]
    fn test_strips_grade_counts() {
        assert_eq!(normalize_name("Борошно 1 гат пшеничне"), "Борошно пшеничне");
        assert_eq!(normalize_name("Борошно 2ГАТ"), "Борошно");
    }

    #[test]
    fn test_grade_inside_word_is_kept() {
        assert_eq!(normalize_name("Крупа 5гатунок"), "Крупа 5гатунок");
    }

    #[test]
    fn test_collapses_whitespace_and_trims() {
        assert_eq!(normalize_name("  Молоко \t  2,5%   900г "), "Молоко 2,5% 900г");
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(normalize_name("   "), "");
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(name in "[ а-яіїєґА-Я0-9№гатшткг,.+\\t]{0,40}") {
            let once = normalize_name(&name);
            prop_assert_eq!(normalize_name(&once), once.clone());
        }

        #[test]
        fn prop_normalized_has_no_double_spaces(name in "\\PC{0,60}") {
            let once = normalize_name(&name);
            prop_assert!(!once.contains("  "));
            prop_assert_eq!(once.trim(), once.as_str());
        }
    }
}
