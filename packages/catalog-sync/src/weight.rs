//! Weight extraction from product names.
//!
//! Rules are tried in a fixed order and the first matching rule decides the
//! result. Multi-token patterns come before the bare-unit fallbacks so that a
//! lone unit word never shadows a fully specified quantity.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Suffix used when rendering a counted quantity.
pub const UNIT_SUFFIX: &str = "шт";

/// Weight assigned when no rule matches.
pub const DEFAULT_WEIGHT_GRAMS: u32 = 1000;

/// Normalized product weight: grams, or a count of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Weight {
    /// Positive mass in grams
    Grams(Decimal),
    /// Countable units (`"<n> шт"`)
    Units(u32),
}

impl Weight {
    /// Grams, with the scale normalized so `1500.0` and `1500` compare and hash alike.
    pub fn grams(value: impl Into<Decimal>) -> Self {
        Weight::Grams(value.into().normalize())
    }

    /// Substitute the default for an unmatched name.
    pub fn or_default(extracted: Option<Weight>) -> Weight {
        extracted.unwrap_or_else(|| Weight::grams(DEFAULT_WEIGHT_GRAMS))
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weight::Grams(grams) => write!(f, "{}", grams.normalize()),
            Weight::Units(count) => write!(f, "{count} {UNIT_SUFFIX}"),
        }
    }
}

/// A persisted weight string that is neither grams nor a unit count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid weight: {0:?}")]
pub struct InvalidWeight(pub String);

impl FromStr for Weight {
    type Err = InvalidWeight;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(count) = trimmed.strip_suffix(UNIT_SUFFIX) {
            return count
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|count| *count > 0)
                .map(Weight::Units)
                .ok_or_else(|| InvalidWeight(s.to_string()));
        }
        match Decimal::from_str(trimmed) {
            Ok(grams) if grams > Decimal::ZERO => Ok(Weight::grams(grams)),
            _ => Err(InvalidWeight(s.to_string())),
        }
    }
}

impl TryFrom<String> for Weight {
    type Error = InvalidWeight;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Weight> for String {
    fn from(weight: Weight) -> Self {
        weight.to_string()
    }
}

static RE_COMBINED_PACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(?:г\s*)?\+\s*(\d+)\s*г").unwrap());
static RE_LOT_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*гат").unwrap());
static RE_LOT_BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"гат").unwrap());
static RE_GRAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*г").unwrap());
static RE_KILOGRAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*кг").unwrap());
static RE_PIECES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*шт").unwrap());
static RE_PIECES_BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"шт").unwrap());
static RE_KILOGRAMS_BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"кг").unwrap());

struct WeightRule {
    name: &'static str,
    regex: &'static LazyLock<Regex>,
    convert: fn(&Captures<'_>) -> Option<Weight>,
}

/// Priority order. Do not reorder without updating the cascade tests.
static WEIGHT_RULES: &[WeightRule] = &[
    WeightRule {
        name: "combined_pack",
        regex: &RE_COMBINED_PACK,
        convert: combined_pack,
    },
    WeightRule {
        name: "lot_count",
        regex: &RE_LOT_COUNT,
        convert: counted_units,
    },
    WeightRule {
        name: "lot_bare",
        regex: &RE_LOT_BARE,
        convert: single_unit,
    },
    WeightRule {
        name: "grams",
        regex: &RE_GRAMS,
        convert: grams,
    },
    WeightRule {
        name: "kilograms",
        regex: &RE_KILOGRAMS,
        convert: kilograms,
    },
    WeightRule {
        name: "pieces",
        regex: &RE_PIECES,
        convert: counted_units,
    },
    WeightRule {
        name: "pieces_bare",
        regex: &RE_PIECES_BARE,
        convert: single_unit,
    },
    WeightRule {
        name: "kilograms_bare",
        regex: &RE_KILOGRAMS_BARE,
        convert: one_kilogram,
    },
];

/// Extract a weight from a (normalized) product name.
///
/// Returns `None` when no rule matches, or when the matching rule's number
/// cannot be represented. Callers substitute [`Weight::or_default`].
pub fn extract_weight(name: &str) -> Option<Weight> {
    for rule in WEIGHT_RULES {
        if let Some(caps) = rule.regex.captures(name) {
            let weight = (rule.convert)(&caps);
            trace!(rule = rule.name, ?weight, product = name, "weight rule matched");
            return weight;
        }
    }
    None
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(&text.replace(',', ".")).ok()
}

fn combined_pack(caps: &Captures<'_>) -> Option<Weight> {
    let first = Decimal::from_str(&caps[1]).ok()?;
    let second = Decimal::from_str(&caps[2]).ok()?;
    Some(Weight::grams(first.checked_add(second)?))
}

fn counted_units(caps: &Captures<'_>) -> Option<Weight> {
    caps[1]
        .parse::<u32>()
        .ok()
        .filter(|count| *count > 0)
        .map(Weight::Units)
}

fn single_unit(_: &Captures<'_>) -> Option<Weight> {
    Some(Weight::Units(1))
}

fn grams(caps: &Captures<'_>) -> Option<Weight> {
    parse_decimal(&caps[1])
        .filter(|g| *g > Decimal::ZERO)
        .map(Weight::grams)
}

fn kilograms(caps: &Captures<'_>) -> Option<Weight> {
    parse_decimal(&caps[1])
        .and_then(|kg| kg.checked_mul(Decimal::from(1000)))
        .filter(|g| *g > Decimal::ZERO)
        .map(Weight::grams)
}

fn one_kilogram(_: &Captures<'_>) -> Option<Weight> {
    Some(Weight::grams(1000))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grams_of(value: i64) -> Option<Weight> {
        Some(Weight::grams(value))
    }

    #[test]
    fn test_combined_pack_beats_single_gram_rule() {
        assert_eq!(extract_weight("250г+100г"), grams_of(350));
        assert_eq!(extract_weight("Кава 250 + 50 г"), grams_of(300));
    }

    #[test]
    fn test_kilograms() {
        assert_eq!(extract_weight("1кг"), grams_of(1000));
        assert_eq!(extract_weight("Цукор 1,5 кг"), grams_of(1500));
        assert_eq!(extract_weight("Борошно 0.5кг"), grams_of(500));
    }

    #[test]
    fn test_grams_with_decimal_comma() {
        assert_eq!(
            extract_weight("Дріжджі 11,5г"),
            Some(Weight::grams(Decimal::new(115, 1)))
        );
        assert_eq!(extract_weight("Сир твердий 250г"), grams_of(250));
    }

    #[test]
    fn test_counted_units() {
        assert_eq!(extract_weight("Яйця С1 10шт"), Some(Weight::Units(10)));
        assert_eq!(extract_weight("Борошно 2гатунку"), Some(Weight::Units(2)));
    }

    #[test]
    fn test_bare_unit_words() {
        assert_eq!(extract_weight("шт"), Some(Weight::Units(1)));
        assert_eq!(extract_weight("Диня гатунок вищий"), Some(Weight::Units(1)));
        assert_eq!(extract_weight("Яблука ваг кг"), grams_of(1000));
    }

    #[test]
    fn test_lot_marker_shadows_gram_rule() {
        // "3 гат" would also satisfy the gram pattern.
        assert_eq!(extract_weight("Крупа 3 гат."), Some(Weight::Units(3)));
    }

    #[test]
    fn test_gram_rule_precedes_kilogram_rule() {
        assert_eq!(extract_weight("Набір 1кг та 200г"), grams_of(200));
    }

    #[test]
    fn test_zero_quantities_fall_back_to_default() {
        assert_eq!(extract_weight("Яйця 0шт"), None);
        assert_eq!(extract_weight("Крупа 0 гат"), None);
        assert_eq!(extract_weight("Сир 0г"), None);
        assert!("0 шт".parse::<Weight>().is_err());
    }

    #[test]
    fn test_no_match() {
        assert_eq!(extract_weight("Вода мінеральна"), None);
        assert_eq!(Weight::or_default(None), grams_of(1000).unwrap());
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(Weight::grams(Decimal::new(15000, 1)).to_string(), "1500");
        assert_eq!(Weight::Units(3).to_string(), "3 шт");
        assert_eq!("3 шт".parse::<Weight>(), Ok(Weight::Units(3)));
        assert_eq!("11.50".parse::<Weight>(), Ok(Weight::grams(Decimal::new(115, 1))));
        assert!("0".parse::<Weight>().is_err());
        assert!("heavy".parse::<Weight>().is_err());
    }

    #[test]
    fn test_serde_uses_display_form() {
        let json = serde_json::to_string(&Weight::Units(6)).unwrap();
        assert_eq!(json, "\"6 шт\"");
        let back: Weight = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Weight::Units(6));
    }
}
