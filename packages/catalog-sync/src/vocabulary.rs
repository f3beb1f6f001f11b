//! Controlled vocabularies and dictionary-match attribute extraction.
//!
//! Each attribute kind (type, firm, flavor, variety) has its own vocabulary
//! file mapping a category to an ordered list of entries:
//!
//! ```json
//! {
//!   "Сир": [
//!     { "type": "Сир плавлений", "variants": ["плавлен"] },
//!     { "type": "Сир", "variants": ["сир"] }
//!   ]
//! }
//! ```
//!
//! Matching is a case-folded substring search and the **first** match wins,
//! across entries and across each entry's variants. Order in the file is
//! therefore a priority list: put specific variants before the shorter ones
//! that would shadow them.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

/// The four dictionary-matched attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Type,
    Firm,
    Flavor,
    Variety,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 4] = [
        AttributeKind::Type,
        AttributeKind::Firm,
        AttributeKind::Flavor,
        AttributeKind::Variety,
    ];

    /// Value used when nothing in the vocabulary matches.
    ///
    /// Fixed per kind and independent of category, so all unresolved
    /// listings of a kind fall into the same group.
    pub fn sentinel(&self) -> &'static str {
        match self {
            AttributeKind::Type => "Інше",
            AttributeKind::Firm => "Без фірми",
            AttributeKind::Flavor => "Без вкуса",
            AttributeKind::Variety => "Без сорта",
        }
    }

    /// Vocabulary file name inside the vocabulary directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            AttributeKind::Type => "type.json",
            AttributeKind::Firm => "firm.json",
            AttributeKind::Flavor => "flavor.json",
            AttributeKind::Variety => "variety.json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Type => "type",
            AttributeKind::Firm => "firm",
            AttributeKind::Flavor => "flavor",
            AttributeKind::Variety => "variety",
        }
    }
}

/// One attribute value and the spellings that identify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeEntry {
    #[serde(alias = "type", alias = "firm", alias = "flavor", alias = "sort", alias = "variety")]
    pub name: String,
    pub variants: Vec<String>,
}

impl AttributeEntry {
    pub fn new(
        name: impl Into<String>,
        variants: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }
}

/// Entries with their variants pre-folded for matching.
#[derive(Debug, Clone)]
struct FoldedEntry {
    name: String,
    variants: Vec<String>,
}

/// Ordered vocabulary for one attribute kind.
#[derive(Debug, Clone)]
pub struct AttributeDictionary {
    kind: AttributeKind,
    categories: IndexMap<String, Vec<FoldedEntry>>,
}

impl AttributeDictionary {
    /// Create an empty dictionary.
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            categories: IndexMap::new(),
        }
    }

    /// Build from raw entries, validating and merging repeated names.
    ///
    /// Entries sharing a name are merged into the first one's position with
    /// variants appended in order.
    pub fn from_entries(
        kind: AttributeKind,
        raw: IndexMap<String, Vec<AttributeEntry>>,
    ) -> Result<Self, ConfigError> {
        let mut dictionary = Self::new(kind);
        for (category, entries) in raw {
            for entry in entries {
                dictionary.push(&category, entry)?;
            }
        }
        Ok(dictionary)
    }

    /// Parse a vocabulary document.
    pub fn from_json_str(kind: AttributeKind, json: &str) -> Result<Self, ConfigError> {
        let raw: IndexMap<String, Vec<AttributeEntry>> =
            serde_json::from_str(json).map_err(|source| ConfigError::InvalidJson {
                path: kind.file_name().into(),
                source,
            })?;
        Self::from_entries(kind, raw)
    }

    /// Load a vocabulary file.
    pub fn load(kind: AttributeKind, path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: IndexMap<String, Vec<AttributeEntry>> =
            serde_json::from_str(&json).map_err(|source| ConfigError::InvalidJson {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_entries(kind, raw)
    }

    /// Append an entry to the end of a category's priority list.
    pub fn push(&mut self, category: &str, entry: AttributeEntry) -> Result<(), ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedEntry {
            kind: self.kind.as_str(),
            category: category.to_string(),
            reason: reason.to_string(),
        };

        let name = entry.name.trim();
        if name.is_empty() {
            return Err(malformed("entry has a blank name"));
        }
        if entry.variants.is_empty() {
            return Err(malformed(&format!("entry {name:?} has no variants")));
        }
        if entry.variants.iter().any(|v| v.trim().is_empty()) {
            return Err(malformed(&format!("entry {name:?} has a blank variant")));
        }

        let folded: Vec<String> = entry.variants.iter().map(|v| v.to_lowercase()).collect();
        let entries = self.categories.entry(category.to_string()).or_default();
        match entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.variants.extend(folded),
            None => entries.push(FoldedEntry {
                name: name.to_string(),
                variants: folded,
            }),
        }
        Ok(())
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    /// Whether the vocabulary has entries for a category.
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    /// Number of categories covered.
    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// Resolve the attribute for a product name, or the kind's sentinel.
    ///
    /// Never fails: a missing category or an unmatched name is a lookup gap,
    /// not an error.
    pub fn extract(&self, name: &str, category: &str) -> String {
        match self.find(name, category) {
            Some(value) => value.to_string(),
            None => {
                debug!(
                    kind = self.kind.as_str(),
                    category,
                    category_known = self.has_category(category),
                    product = name,
                    "no vocabulary match, using sentinel"
                );
                self.kind.sentinel().to_string()
            }
        }
    }

    fn find(&self, name: &str, category: &str) -> Option<&str> {
        let entries = self.categories.get(category)?;
        let folded = name.to_lowercase();
        entries
            .iter()
            .find(|entry| entry.variants.iter().any(|v| folded.contains(v.as_str())))
            .map(|entry| entry.name.as_str())
    }
}

/// Attributes resolved for one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub product_type: String,
    pub firm: String,
    pub flavor: String,
    pub variety: String,
}

/// The full dictionary index: one [`AttributeDictionary`] per kind.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    pub types: AttributeDictionary,
    pub firms: AttributeDictionary,
    pub flavors: AttributeDictionary,
    pub varieties: AttributeDictionary,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            types: AttributeDictionary::new(AttributeKind::Type),
            firms: AttributeDictionary::new(AttributeKind::Firm),
            flavors: AttributeDictionary::new(AttributeKind::Flavor),
            varieties: AttributeDictionary::new(AttributeKind::Variety),
        }
    }
}

impl Vocabulary {
    /// Load all four vocabulary files from a directory.
    ///
    /// Fails if any file is missing or malformed; there is no partial load.
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        let mut vocabulary = Self::default();
        for kind in AttributeKind::ALL {
            *vocabulary.dictionary_mut(kind) =
                AttributeDictionary::load(kind, &dir.join(kind.file_name()))?;
        }

        info!(
            dir = %dir.display(),
            types = vocabulary.types.category_count(),
            firms = vocabulary.firms.category_count(),
            flavors = vocabulary.flavors.category_count(),
            varieties = vocabulary.varieties.category_count(),
            "Vocabulary loaded"
        );
        Ok(vocabulary)
    }

    pub fn dictionary(&self, kind: AttributeKind) -> &AttributeDictionary {
        match kind {
            AttributeKind::Type => &self.types,
            AttributeKind::Firm => &self.firms,
            AttributeKind::Flavor => &self.flavors,
            AttributeKind::Variety => &self.varieties,
        }
    }

    pub fn dictionary_mut(&mut self, kind: AttributeKind) -> &mut AttributeDictionary {
        match kind {
            AttributeKind::Type => &mut self.types,
            AttributeKind::Firm => &mut self.firms,
            AttributeKind::Flavor => &mut self.flavors,
            AttributeKind::Variety => &mut self.varieties,
        }
    }

    /// Run the four lookups for one listing.
    pub fn extract_all(&self, name: &str, category: &str) -> Attributes {
        let lookup = |kind: AttributeKind| self.dictionary(kind).extract(name, category);
        Attributes {
            product_type: lookup(AttributeKind::Type),
            firm: lookup(AttributeKind::Firm),
            flavor: lookup(AttributeKind::Flavor),
            variety: lookup(AttributeKind::Variety),
        }
    }
}
