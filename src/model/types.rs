//! Normalized catalog entity structs.

use serde::{Deserialize, Serialize};

/// Coarse assessment category, derived from the scraper's test-type letter
/// codes at build time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoryCode {
    /// Knowledge & skills tests (letter code `K`).
    Knowledge,
    /// Personality & behaviour assessments (letter codes `P` / `B`).
    PersonalityBehaviour,
    /// Development & 360 assessments (letter code `D`).
    Development,
    #[default]
    Unknown,
}

impl CategoryCode {
    /// Derive a category from raw test-type letter codes (e.g. `"K"`, `"P,B"`).
    ///
    /// The knowledge code wins when several codes are present, matching the
    /// source catalog's precedence: a combined `K,P` product behaves as a
    /// technical assessment in reranking.
    pub fn from_type_codes(codes: &str) -> Self {
        let upper = codes.to_ascii_uppercase();
        if upper.contains('K') {
            CategoryCode::Knowledge
        } else if upper.contains('P') || upper.contains('B') {
            CategoryCode::PersonalityBehaviour
        } else if upper.contains('D') {
            CategoryCode::Development
        } else {
            CategoryCode::Unknown
        }
    }
}

/// One assessment product. Immutable once the offline index is built.
///
/// Position `i` in the metadata table describes the same product as vector
/// `i` in the ASVI index; nothing may reorder either after build.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub category_code: CategoryCode,
    #[serde(default)]
    pub remote_support: bool,
    #[serde(default)]
    pub adaptive_support: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration_minutes: u32,
}

/// A retrieved catalog item with its similarity score. Per-query, ephemeral.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub item: CatalogItem,
    /// Inner product of unit vectors; in practice within `[-1, 1]`.
    pub score: f32,
}

/// Coarse query intent derived from keyword matching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Technical,
    Behavioral,
    Mixed,
    General,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_from_type_codes() {
        assert_eq!(CategoryCode::from_type_codes("K"), CategoryCode::Knowledge);
        assert_eq!(
            CategoryCode::from_type_codes("p"),
            CategoryCode::PersonalityBehaviour
        );
        assert_eq!(
            CategoryCode::from_type_codes("B,A"),
            CategoryCode::PersonalityBehaviour
        );
        assert_eq!(CategoryCode::from_type_codes("D"), CategoryCode::Development);
        assert_eq!(CategoryCode::from_type_codes(""), CategoryCode::Unknown);
        // Knowledge wins over behaviour for combined products.
        assert_eq!(CategoryCode::from_type_codes("P,K"), CategoryCode::Knowledge);
    }

    #[test]
    fn catalog_item_defaults_for_missing_fields() {
        let item: CatalogItem = serde_json::from_str(r#"{"name": "Java Test"}"#).unwrap();
        assert_eq!(item.name, "Java Test");
        assert_eq!(item.category_code, CategoryCode::Unknown);
        assert!(!item.remote_support);
        assert!(!item.adaptive_support);
        assert_eq!(item.duration_minutes, 0);
        assert!(item.url.is_empty());
    }

    #[test]
    fn category_code_serde_roundtrip() {
        let json = serde_json::to_string(&CategoryCode::PersonalityBehaviour).unwrap();
        assert_eq!(json, r#""personality_behaviour""#);
        let back: CategoryCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CategoryCode::PersonalityBehaviour);
    }
}
