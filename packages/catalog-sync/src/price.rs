//! Store-specific price cleanup.
//!
//! Every source formats prices its own way (`"89,90 грн"`, `"45\n90. грн"`,
//! `"1 299 ₴"`). Each [`Store`] owns an ordered list of cleanup steps; the
//! cleaned text must then parse as a plain decimal.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ListingError;

/// Canonical price: a non-negative decimal with exactly two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Price(Decimal);

impl Price {
    /// Round half away from zero to two places.
    ///
    /// `None` when the amount is negative or too large to carry two
    /// fractional digits.
    pub fn new(amount: Decimal) -> Option<Self> {
        if amount < Decimal::ZERO {
            return None;
        }
        let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        (rounded.scale() == 2).then_some(Self(rounded))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted price string that is not a non-negative decimal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid price: {0:?}")]
pub struct InvalidPrice(pub String);

impl FromStr for Price {
    type Err = InvalidPrice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .ok()
            .and_then(Price::new)
            .ok_or_else(|| InvalidPrice(s.to_string()))
    }
}

impl TryFrom<String> for Price {
    type Error = InvalidPrice;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Price> for String {
    fn from(price: Price) -> Self {
        price.to_string()
    }
}

/// One text transformation applied before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cleanup {
    Replace(&'static str, &'static str),
    StripSuffix(&'static str),
    DecimalComma,
    StripWhitespace,
}

impl Cleanup {
    fn apply(self, text: String) -> String {
        match self {
            Cleanup::Replace(from, to) => text.replace(from, to),
            Cleanup::StripSuffix(suffix) => match text.trim_end().strip_suffix(suffix) {
                Some(stripped) => stripped.trim_end().to_string(),
                None => text,
            },
            Cleanup::DecimalComma => text.replace(',', "."),
            Cleanup::StripWhitespace => text.chars().filter(|c| !c.is_whitespace()).collect(),
        }
    }
}

const NBSP: &str = "\u{00A0}";

const ROST_CLEANUP: &[Cleanup] = &[
    Cleanup::Replace("\n", "."),
    Cleanup::StripSuffix(". грн"),
    Cleanup::StripSuffix("грн"),
    Cleanup::StripWhitespace,
];

const FOZZY_CLEANUP: &[Cleanup] = &[
    Cleanup::Replace(NBSP, " "),
    Cleanup::StripSuffix("грн"),
    Cleanup::DecimalComma,
    Cleanup::StripWhitespace,
];

const MAUDAU_CLEANUP: &[Cleanup] = &[
    Cleanup::Replace(NBSP, " "),
    Cleanup::StripSuffix("₴"),
    Cleanup::StripWhitespace,
];

const HRYVNIA_CLEANUP: &[Cleanup] = &[
    Cleanup::Replace(NBSP, " "),
    Cleanup::StripSuffix("грн."),
    Cleanup::StripSuffix("грн"),
    Cleanup::StripSuffix("₴"),
    Cleanup::DecimalComma,
    Cleanup::StripWhitespace,
];

/// Known listing sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Store {
    Fozzy,
    Rost,
    Maudau,
    Atb,
    Auchan,
    Cosmos,
    Ecomarket,
    Metro,
    Zaraz,
}

impl Store {
    pub const ALL: [Store; 9] = [
        Store::Fozzy,
        Store::Rost,
        Store::Maudau,
        Store::Atb,
        Store::Auchan,
        Store::Cosmos,
        Store::Ecomarket,
        Store::Metro,
        Store::Zaraz,
    ];

    /// Display name as the sources report it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Store::Fozzy => "FOZZY",
            Store::Rost => "РОСТ",
            Store::Maudau => "MAUDAU",
            Store::Atb => "АТБ",
            Store::Auchan => "АШАН",
            Store::Cosmos => "КОСМОС",
            Store::Ecomarket => "ЕКОМАРКЕТ",
            Store::Metro => "METRO",
            Store::Zaraz => "ZARAZ",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Store::Fozzy => &["fozzy", "фоззі"],
            Store::Rost => &["рост", "rost"],
            Store::Maudau => &["maudau", "маудау"],
            Store::Atb => &["атб", "atb"],
            Store::Auchan => &["ашан", "auchan"],
            Store::Cosmos => &["космос", "cosmos"],
            Store::Ecomarket => &["екомаркет", "ecomarket"],
            Store::Metro => &["metro", "метро"],
            Store::Zaraz => &["zaraz", "зараз"],
        }
    }

    fn cleanup(&self) -> &'static [Cleanup] {
        match self {
            Store::Rost => ROST_CLEANUP,
            Store::Fozzy => FOZZY_CLEANUP,
            Store::Maudau => MAUDAU_CLEANUP,
            Store::Atb
            | Store::Auchan
            | Store::Cosmos
            | Store::Ecomarket
            | Store::Metro
            | Store::Zaraz => HRYVNIA_CLEANUP,
        }
    }

    /// Clean and parse a price string reported by this store.
    pub fn parse_price(&self, raw: &str) -> Result<Price, ListingError> {
        let cleaned = self
            .cleanup()
            .iter()
            .fold(raw.trim().to_string(), |text, step| step.apply(text));

        Decimal::from_str(&cleaned)
            .ok()
            .and_then(Price::new)
            .ok_or_else(|| ListingError::UnparseablePrice {
                raw: raw.to_string(),
                store: self.as_str().to_string(),
            })
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Store {
    type Err = ListingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Store::ALL
            .into_iter()
            .find(|store| store.aliases().contains(&needle.as_str()))
            .ok_or_else(|| ListingError::UnknownStore(s.to_string()))
    }
}

/// Normalize a store-formatted price to a two-decimal [`Price`].
pub fn normalize_price(raw: &str, store_name: &str) -> Result<Price, ListingError> {
    store_name.parse::<Store>()?.parse_price(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fozzy_comma_and_currency() {
        let price = normalize_price("89,90 грн", "FOZZY").unwrap();
        assert_eq!(price.to_string(), "89.90");
    }

    #[test]
    fn test_fozzy_nbsp_thousands() {
        let price = normalize_price("1\u{00A0}234,5\u{00A0}грн", "FOZZY").unwrap();
        assert_eq!(price.to_string(), "1234.50");
    }

    #[test]
    fn test_rost_split_line_price() {
        let price = normalize_price("45\n90. грн", "РОСТ").unwrap();
        assert_eq!(price.to_string(), "45.90");
    }

    #[test]
    fn test_maudau_hryvnia_sign() {
        let price = normalize_price("1 299 ₴", "MAUDAU").unwrap();
        assert_eq!(price.to_string(), "1299.00");
    }

    #[test]
    fn test_generic_store_rules() {
        assert_eq!(normalize_price("52,40 грн", "АТБ").unwrap().to_string(), "52.40");
        assert_eq!(normalize_price("17.5", "metro").unwrap().to_string(), "17.50");
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        let price = normalize_price("10,005", "FOZZY").unwrap();
        assert_eq!(price.to_string(), "10.01");
        assert_eq!(price.amount().scale(), 2);
    }

    #[test]
    fn test_garbage_is_a_parse_error_not_zero() {
        let err = normalize_price("ціна за запитом", "FOZZY").unwrap_err();
        assert_eq!(
            err,
            ListingError::UnparseablePrice {
                raw: "ціна за запитом".to_string(),
                store: "FOZZY".to_string(),
            }
        );
        assert!(normalize_price("", "MAUDAU").is_err());
    }

    #[test]
    fn test_amount_without_room_for_cents_is_rejected() {
        let huge = "1000000000000000000000000000";
        assert_eq!(
            normalize_price(huge, "METRO"),
            Err(ListingError::UnparseablePrice {
                raw: huge.to_string(),
                store: "METRO".to_string(),
            })
        );
        assert!(huge.parse::<Price>().is_err());
        assert_eq!(Price::new(Decimal::new(1999, 1)).unwrap().to_string(), "199.90");
    }

    #[test]
    fn test_unknown_store() {
        assert_eq!(
            normalize_price("10", "Сільпо"),
            Err(ListingError::UnknownStore("Сільпо".to_string()))
        );
    }

    #[test]
    fn test_store_aliases_are_case_insensitive() {
        assert_eq!("fozzy".parse::<Store>(), Ok(Store::Fozzy));
        assert_eq!("Рост".parse::<Store>(), Ok(Store::Rost));
        assert_eq!(" ZARAZ ".parse::<Store>(), Ok(Store::Zaraz));
    }

    #[test]
    fn test_price_string_round_trip() {
        let price: Price = "7.1".parse().unwrap();
        assert_eq!(price.to_string(), "7.10");
        assert!("-1".parse::<Price>().is_err());
    }
}
