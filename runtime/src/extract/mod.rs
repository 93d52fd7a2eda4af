//! Field extraction: locating quote fields on a rendered page.
//!
//! Each field is resolved through an ordered cascade of sources, cheapest and
//! most specific first:
//!
//! 1. **Selectors**: per-item override, then the domain's configured
//!    locators, tried in priority order against the live page ([`cascade`]).
//! 2. **URL fragment**: a quote encoded in the deep-link `#…` suffix
//!    ([`fragment`]). Price and percentage change only.
//! 3. **Body scan**: the first matching token in the bounded page text
//!    ([`body_scan`]). Percentage change, then price.
//!
//! Whatever raw text survives is canonicalized by [`normalize`]. A field that
//! no source produced is not an error: it is reported with
//! [`SourceTier::None`] and an empty value.

pub mod body_scan;
pub mod cascade;
pub mod fragment;
pub mod normalize;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The structured fields captured for every resource, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Price,
    ChangeAbs,
    ChangePct,
    QuoteTime,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Name,
        Field::Price,
        Field::ChangeAbs,
        Field::ChangePct,
        Field::QuoteTime,
    ];

    /// Key used in rule files, manifests and output records.
    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::ChangeAbs => "change_abs",
            Self::ChangePct => "change_pct",
            Self::QuoteTime => "quote_time",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Canonicalize raw text for this field.
    pub fn normalize(self, raw: &str) -> String {
        match self {
            Self::Price | Self::ChangeAbs => normalize::clean_absolute(raw),
            Self::ChangePct => normalize::clean_percentage(raw),
            Self::Name | Self::QuoteTime => normalize::collapse_whitespace(raw),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Which strategy produced a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceTier {
    Selector,
    UrlFragment,
    BodyScan,
    None,
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selector => write!(f, "SELECTOR"),
            Self::UrlFragment => write!(f, "URL_FRAGMENT"),
            Self::BodyScan => write!(f, "BODY_SCAN"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// Outcome of extracting one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldExtractionResult {
    pub field: Field,
    pub raw_text: String,
    pub normalized_value: String,
    pub source_tier: SourceTier,
}

impl FieldExtractionResult {
    /// Build a result from raw text; empty raw text always means tier `None`.
    pub fn new(field: Field, raw_text: String, tier: SourceTier) -> Self {
        let source_tier = if raw_text.is_empty() {
            SourceTier::None
        } else {
            tier
        };
        let normalized_value = field.normalize(&raw_text);
        Self {
            field,
            raw_text,
            normalized_value,
            source_tier,
        }
    }

    pub fn missing(field: Field) -> Self {
        Self::new(field, String::new(), SourceTier::None)
    }
}
