//! Positional catalog metadata table.
//!
//! The metadata table is the companion artifact of the ASVI vector index:
//! position `i` here describes the same assessment as vector `i` there. The
//! table is loaded once at startup and is read-only afterwards; positions are
//! stable for the lifetime of the loaded index.
//!
//! This module also owns the tolerant parser for raw scraper output
//! (`assessment_name`, letter-coded `test_type`, `"Yes"`/`"No"` support
//! flags), normalizing it into strongly-typed [`CatalogItem`]s with explicit
//! defaults instead of permissive key lookups.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::model::types::{CatalogItem, CategoryCode};

/// Metadata table filename inside the data directory.
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// A lookup position fell outside the loaded table. Callers recover by
    /// skipping the candidate rather than propagating.
    #[error("catalog position {position} out of range (count {count})")]
    OutOfRange { position: usize, count: usize },
}

/// Ordered, positionally-indexed sequence of catalog items.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    items: Vec<CatalogItem>,
}

impl MetadataStore {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    /// Load the metadata table from `metadata.json`.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open metadata file {path:?}"))?;
        let items: Vec<CatalogItem> =
            serde_json::from_reader(BufReader::new(file)).context("parse metadata file")?;
        Ok(Self { items })
    }

    /// Save the metadata table atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let temp_path = path.with_extension("json.tmp");
        let file = File::create(&temp_path)
            .with_context(|| format!("create temp metadata file {temp_path:?}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.items).context("serialize metadata")?;
        writer.flush()?;
        writer.get_ref().sync_all().context("fsync metadata file")?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("rename temp metadata file {temp_path:?}"))?;
        Ok(())
    }

    /// O(1) positional lookup.
    pub fn get(&self, position: usize) -> std::result::Result<&CatalogItem, CatalogError> {
        self.items.get(position).ok_or(CatalogError::OutOfRange {
            position,
            count: self.items.len(),
        })
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CatalogItem> {
        self.items.iter()
    }
}

/// Raw test-type field: the scraper emits either a letter-code string
/// (`"K,P"`) or a list of codes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawTestType {
    Codes(String),
    List(Vec<String>),
}

impl Default for RawTestType {
    fn default() -> Self {
        RawTestType::Codes(String::new())
    }
}

impl RawTestType {
    fn joined(&self) -> String {
        match self {
            RawTestType::Codes(s) => s.clone(),
            RawTestType::List(list) => list.join(","),
        }
    }
}

/// Raw support flag: either a bool or the scraper's `"Yes"`/`"No"` strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Text(String),
}

impl Default for RawFlag {
    fn default() -> Self {
        RawFlag::Bool(false)
    }
}

impl RawFlag {
    fn as_bool(&self) -> bool {
        match self {
            RawFlag::Bool(b) => *b,
            RawFlag::Text(s) => s.trim().eq_ignore_ascii_case("yes"),
        }
    }
}

/// One record as produced by the catalog scraper.
#[derive(Debug, Deserialize)]
struct RawCatalogRecord {
    #[serde(alias = "assessment_name")]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    test_type: RawTestType,
    #[serde(default)]
    remote_support: RawFlag,
    #[serde(default)]
    adaptive_support: RawFlag,
    #[serde(default)]
    description: String,
    #[serde(default, alias = "duration")]
    duration_minutes: u32,
}

impl From<RawCatalogRecord> for CatalogItem {
    fn from(raw: RawCatalogRecord) -> Self {
        CatalogItem {
            category_code: CategoryCode::from_type_codes(&raw.test_type.joined()),
            name: raw.name,
            url: raw.url,
            remote_support: raw.remote_support.as_bool(),
            adaptive_support: raw.adaptive_support.as_bool(),
            description: raw.description,
            duration_minutes: raw.duration_minutes,
        }
    }
}

/// Load a raw scraper catalog (JSON array) and normalize it.
pub fn load_raw_catalog(path: &Path) -> Result<Vec<CatalogItem>> {
    let file = File::open(path).with_context(|| format!("open catalog file {path:?}"))?;
    let raw: Vec<RawCatalogRecord> =
        serde_json::from_reader(BufReader::new(file)).context("parse catalog file")?;
    Ok(raw.into_iter().map(CatalogItem::from).collect())
}

/// Build the text a catalog item is embedded under: the name plus the
/// structured attributes, joined with ` | `. The free-text description is
/// deliberately not embedded.
pub fn embedding_text(item: &CatalogItem) -> String {
    let category = match item.category_code {
        CategoryCode::Knowledge => "Knowledge",
        CategoryCode::PersonalityBehaviour => "Personality and Behaviour",
        CategoryCode::Development => "Development",
        CategoryCode::Unknown => "Unknown",
    };
    format!(
        "{} | Test Type: {} | Remote Support: {} | Adaptive Support: {}",
        item.name,
        category,
        if item.remote_support { "Yes" } else { "No" },
        if item.adaptive_support { "Yes" } else { "No" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn item(name: &str, code: CategoryCode) -> CatalogItem {
        CatalogItem {
            name: name.to_string(),
            url: format!("https://example.com/{name}"),
            category_code: code,
            remote_support: true,
            adaptive_support: false,
            description: String::new(),
            duration_minutes: 30,
        }
    }

    #[test]
    fn get_in_and_out_of_range() {
        let store = MetadataStore::new(vec![
            item("a", CategoryCode::Knowledge),
            item("b", CategoryCode::Unknown),
        ]);
        assert_eq!(store.count(), 2);
        assert_eq!(store.get(1).unwrap().name, "b");
        assert_eq!(
            store.get(2),
            Err(CatalogError::OutOfRange {
                position: 2,
                count: 2
            })
        );
    }

    #[test]
    fn save_load_roundtrip_preserves_order() -> Result<()> {
        let store = MetadataStore::new(vec![
            item("first", CategoryCode::Knowledge),
            item("second", CategoryCode::PersonalityBehaviour),
            item("third", CategoryCode::Development),
        ]);
        let dir = tempdir()?;
        let path = dir.path().join(METADATA_FILE);
        store.save(&path)?;

        let loaded = MetadataStore::load(&path)?;
        assert_eq!(loaded.count(), 3);
        for (a, b) in store.iter().zip(loaded.iter()) {
            assert_eq!(a, b);
        }
        Ok(())
    }

    #[test]
    fn raw_catalog_normalization() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[
                {"assessment_name": "Java 8", "url": "https://x/", "test_type": "K",
                 "remote_support": "Yes", "adaptive_support": "No", "duration": 45},
                {"name": "Teamwork Styles", "test_type": ["P", "B"],
                 "remote_support": true, "description": "behavioural styles"},
                {"name": "Mystery"}
            ]"#,
        )?;

        let items = load_raw_catalog(&path)?;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].category_code, CategoryCode::Knowledge);
        assert!(items[0].remote_support);
        assert!(!items[0].adaptive_support);
        assert_eq!(items[0].duration_minutes, 45);
        assert_eq!(items[1].category_code, CategoryCode::PersonalityBehaviour);
        assert!(items[1].remote_support);
        assert_eq!(items[2].category_code, CategoryCode::Unknown);
        assert_eq!(items[2].duration_minutes, 0);
        Ok(())
    }

    #[test]
    fn embedding_text_is_structured() {
        let text = embedding_text(&item("Java 8", CategoryCode::Knowledge));
        assert_eq!(
            text,
            "Java 8 | Test Type: Knowledge | Remote Support: Yes | Adaptive Support: No"
        );
    }
}
