//! Listing types - raw acquisition output and its normalized form.

use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ListingError;
use crate::price::Price;
use crate::types::product::{IdentityKey, StoreObservation};
use crate::weight::Weight;

/// Category used when a listing arrives without a sub-category.
pub const DEFAULT_SUB_CATEGORY: &str = "Другое";

/// One scraped product entry from one store.
///
/// Field names follow the acquisition output; the category fields are not
/// part of each JSON record but come from the feed's nesting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListing {
    #[serde(default, deserialize_with = "lenient_text")]
    pub product_name: String,

    #[serde(default, deserialize_with = "lenient_text")]
    pub store_name: String,

    #[serde(default, alias = "productImg", deserialize_with = "lenient_text")]
    pub image_url: String,

    #[serde(default, alias = "productLink", deserialize_with = "lenient_text")]
    pub link: String,

    #[serde(default, alias = "productPrice", deserialize_with = "lenient_text")]
    pub price: String,

    #[serde(
        default,
        alias = "productDiscountPrice",
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub discount_price: Option<String>,

    #[serde(skip)]
    pub main_category: String,

    #[serde(skip)]
    pub sub_category: Option<String>,

    /// Decode error for a feed element that is not a listing object
    #[serde(skip)]
    pub undecodable: Option<String>,
}

/// Accepts a string, a bare number or null (read as blank).
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_optional_text(deserializer)?.unwrap_or_default())
}

fn lenient_optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(number) => Ok(Some(number.to_string())),
        other => Err(de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}

impl RawListing {
    /// Create a listing with the required text fields.
    pub fn new(
        product_name: impl Into<String>,
        store_name: impl Into<String>,
        price: impl Into<String>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            store_name: store_name.into(),
            price: price.into(),
            ..Default::default()
        }
    }

    pub fn with_discount_price(mut self, discount_price: impl Into<String>) -> Self {
        self.discount_price = Some(discount_price.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    /// Placeholder for a feed element that could not be decoded.
    pub fn undecodable(reason: impl Into<String>) -> Self {
        Self {
            undecodable: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Attach the feed position. A blank sub-category is treated as absent.
    pub fn in_category(mut self, main_category: &str, sub_category: &str) -> Self {
        self.main_category = main_category.to_string();
        self.sub_category = Some(sub_category.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self
    }

    /// The dictionary category, falling back to [`DEFAULT_SUB_CATEGORY`].
    pub fn category(&self) -> &str {
        self.sub_category.as_deref().unwrap_or(DEFAULT_SUB_CATEGORY)
    }

    /// Check that every required field is present.
    pub fn validate(&self) -> Result<(), ListingError> {
        if let Some(reason) = &self.undecodable {
            return Err(ListingError::Undecodable(reason.clone()));
        }
        let required = [
            ("productName", &self.product_name),
            ("storeName", &self.store_name),
            ("imageUrl", &self.image_url),
            ("link", &self.link),
            ("price", &self.price),
            ("mainCategory", &self.main_category),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(ListingError::MissingField { field: *field }),
            None => Ok(()),
        }
    }
}

/// One element of a sub-category array, decoded on its own so a bad element
/// never rejects its neighbours.
#[derive(Debug, Clone)]
enum FeedItem {
    Listing(RawListing),
    Undecodable(String),
}

impl<'de> Deserialize<'de> for FeedItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match serde_json::from_value(value) {
            Ok(listing) => FeedItem::Listing(listing),
            Err(e) => FeedItem::Undecodable(e.to_string()),
        })
    }
}

impl FeedItem {
    fn to_listing(&self) -> RawListing {
        match self {
            FeedItem::Listing(listing) => listing.clone(),
            FeedItem::Undecodable(reason) => RawListing::undecodable(reason.clone()),
        }
    }
}

/// Acquisition output: `mainCategory → subCategory → [listing]`.
///
/// [`ListingFeed::listings`] walks the nesting lazily and can be called any
/// number of times. Elements that are not listing objects are yielded as
/// listings that fail validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ListingFeed {
    sections: IndexMap<String, IndexMap<String, Vec<FeedItem>>>,
}

impl ListingFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Add a listing under a main and sub-category.
    pub fn push(&mut self, main_category: &str, sub_category: &str, listing: RawListing) {
        self.sections
            .entry(main_category.to_string())
            .or_default()
            .entry(sub_category.to_string())
            .or_default()
            .push(FeedItem::Listing(listing));
    }

    /// Builder form of [`ListingFeed::push`].
    pub fn with_listing(mut self, main_category: &str, sub_category: &str, listing: RawListing) -> Self {
        self.push(main_category, sub_category, listing);
        self
    }

    /// Total number of listings.
    pub fn len(&self) -> usize {
        self.sections
            .values()
            .flat_map(|subs| subs.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every listing, stamped with its categories, in feed order.
    pub fn listings(&self) -> impl Iterator<Item = RawListing> + '_ {
        self.sections.iter().flat_map(|(main, subs)| {
            subs.iter().flat_map(move |(sub, items)| {
                items
                    .iter()
                    .map(move |item| item.to_listing().in_category(main, sub))
            })
        })
    }
}

/// A listing after name cleanup, attribute extraction and price parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedListing {
    pub product_name: String,
    pub store_name: String,
    pub image_url: String,
    pub link: String,
    pub main_category: String,
    pub sub_category: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub firm: String,
    pub flavor: String,
    #[serde(rename = "sort")]
    pub variety: String,
    pub weight: Weight,
    pub price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<Price>,
}

impl NormalizedListing {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            product_type: self.product_type.clone(),
            weight: self.weight,
            firm: self.firm.clone(),
            flavor: self.flavor.clone(),
            variety: self.variety.clone(),
            category: self.sub_category.clone(),
        }
    }

    pub fn observation(&self) -> StoreObservation {
        StoreObservation {
            store_name: self.store_name.clone(),
            price: self.price,
            discount_price: self.discount_price,
            image_url: self.image_url.clone(),
            link: self.link.clone(),
        }
    }
}
