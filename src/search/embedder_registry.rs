//! Embedder registry for model selection.
//!
//! Provides a registry of available embedding backends that allows:
//! - Listing available embedders with metadata
//! - Selecting an embedder by name from CLI/config
//! - Validating model availability before use
//! - Falling back to the hash embedder when no model files are present
//!
//! # Supported Embedders
//!
//! | Name | ID | Dimension | Type | Notes |
//! |------|-----|-----------|------|-------|
//! | minilm | minilm-384 | 384 | ML | Default semantic embedder |
//! | hash | fnv1a-384 | 384 | Hash | Always available fallback |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::embedder::{Embedder, EmbedderError, EmbedderResult};
use super::fastembed_embedder::FastEmbedder;
use super::hash_embedder::HashEmbedder;

/// Default embedder name when none specified.
pub const DEFAULT_EMBEDDER: &str = "minilm";

/// Hash embedder name (always available).
pub const HASH_EMBEDDER: &str = "hash";

/// Files required for any ONNX-based embedder.
pub const REQUIRED_ONNX_FILES: &[&str] = &[
    "model.onnx",
    "tokenizer.json",
    "config.json",
    "special_tokens_map.json",
    "tokenizer_config.json",
];

/// Information about a registered embedder.
#[derive(Debug, Clone)]
pub struct RegisteredEmbedder {
    /// Short name for CLI/config (e.g., "minilm", "hash").
    pub name: &'static str,
    /// Unique embedder ID (e.g., "minilm-384", "fnv1a-384").
    pub id: &'static str,
    /// Output dimension.
    pub dimension: usize,
    /// Whether this is a semantic (ML) embedder.
    pub is_semantic: bool,
    /// Human-readable description.
    pub description: &'static str,
    /// Whether the model files are required (false = always available).
    pub requires_model_files: bool,
}

impl RegisteredEmbedder {
    /// Check if this embedder is available in the given data directory.
    pub fn is_available(&self, data_dir: &Path) -> bool {
        if !self.requires_model_files {
            return true;
        }
        if let Some(model_dir) = self.model_dir(data_dir) {
            REQUIRED_ONNX_FILES
                .iter()
                .all(|f| model_dir.join(f).is_file())
        } else {
            false
        }
    }

    /// Get the model directory path for this embedder (if applicable).
    pub fn model_dir(&self, data_dir: &Path) -> Option<PathBuf> {
        if !self.requires_model_files {
            return None;
        }
        let dir_name = match self.name {
            "minilm" => "all-MiniLM-L6-v2",
            _ => return None,
        };
        Some(data_dir.join("models").join(dir_name))
    }

    /// Get missing model files for this embedder.
    pub fn missing_files(&self, data_dir: &Path) -> Vec<String> {
        if !self.requires_model_files {
            return Vec::new();
        }
        if let Some(model_dir) = self.model_dir(data_dir) {
            REQUIRED_ONNX_FILES
                .iter()
                .filter(|f| !model_dir.join(*f).is_file())
                .map(|f| (*f).to_string())
                .collect()
        } else {
            Vec::new()
        }
    }
}

/// Static registry of all supported embedders.
pub static EMBEDDERS: &[RegisteredEmbedder] = &[
    RegisteredEmbedder {
        name: "minilm",
        id: "minilm-384",
        dimension: 384,
        is_semantic: true,
        description: "MiniLM L6 v2 - the encoder the catalog index is built with",
        requires_model_files: true,
    },
    RegisteredEmbedder {
        name: "hash",
        id: "fnv1a-384",
        dimension: 384,
        is_semantic: false,
        description: "FNV-1a feature hashing - lexical fallback, always available",
        requires_model_files: false,
    },
];

/// Embedder registry with data directory context.
pub struct EmbedderRegistry {
    data_dir: PathBuf,
}

impl EmbedderRegistry {
    /// Create a new registry bound to the given data directory.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// Get all registered embedders.
    pub fn all(&self) -> &'static [RegisteredEmbedder] {
        EMBEDDERS
    }

    /// Get only available embedders (model files present).
    pub fn available(&self) -> Vec<&'static RegisteredEmbedder> {
        EMBEDDERS
            .iter()
            .filter(|e| e.is_available(&self.data_dir))
            .collect()
    }

    /// Get embedder info by name or id.
    pub fn get(&self, name: &str) -> Option<&'static RegisteredEmbedder> {
        let name_lower = name.to_ascii_lowercase();
        EMBEDDERS
            .iter()
            .find(|e| e.name == name_lower || e.id == name_lower)
    }

    /// Check if an embedder is available by name.
    pub fn is_available(&self, name: &str) -> bool {
        self.get(name)
            .map(|e| e.is_available(&self.data_dir))
            .unwrap_or(false)
    }

    /// Get the best available embedder (ML if available, hash fallback).
    pub fn best_available(&self) -> &'static RegisteredEmbedder {
        for e in EMBEDDERS.iter().filter(|e| e.is_semantic) {
            if e.is_available(&self.data_dir) {
                return e;
            }
        }
        self.get(HASH_EMBEDDER).expect("hash embedder must exist")
    }

    /// Validate that an embedder is ready to use.
    ///
    /// Returns the registry entry if available, or an error with details
    /// about what's missing.
    pub fn validate(&self, name: &str) -> EmbedderResult<&'static RegisteredEmbedder> {
        let embedder = self.get(name).ok_or_else(|| {
            EmbedderError::Unavailable(format!(
                "unknown embedder '{}'. Available: {}",
                name,
                EMBEDDERS
                    .iter()
                    .map(|e| e.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        if !embedder.is_available(&self.data_dir) {
            let missing = embedder.missing_files(&self.data_dir);
            let model_dir = embedder
                .model_dir(&self.data_dir)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(EmbedderError::Unavailable(format!(
                "embedder '{}' not available: missing files in {}: {}",
                name,
                model_dir,
                missing.join(", ")
            )));
        }

        Ok(embedder)
    }
}

/// Load an embedder by name (or the best available if None).
pub fn get_embedder(data_dir: &Path, name: Option<&str>) -> EmbedderResult<Arc<dyn Embedder>> {
    let registry = EmbedderRegistry::new(data_dir);
    let info = match name {
        Some(n) => registry.validate(n)?,
        None => registry.best_available(),
    };

    match info.name {
        "hash" => Ok(Arc::new(HashEmbedder::default())),
        "minilm" => Ok(Arc::new(FastEmbedder::load_by_name(data_dir, info.name)?)),
        other => Err(EmbedderError::Unavailable(format!(
            "embedder '{other}' not implemented"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn registry_get_by_name_and_id() {
        let tmp = tempdir().unwrap();
        let registry = EmbedderRegistry::new(tmp.path());

        let minilm = registry.get("minilm").unwrap();
        assert_eq!(minilm.dimension, 384);
        assert_eq!(registry.get("minilm-384").unwrap().name, "minilm");

        let hash = registry.get("fnv1a-384").unwrap();
        assert_eq!(hash.name, "hash");

        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn hash_always_available() {
        let tmp = tempdir().unwrap();
        let registry = EmbedderRegistry::new(tmp.path());
        assert!(registry.is_available("hash"));
        assert!(registry.available().iter().any(|e| e.name == "hash"));
    }

    #[test]
    fn minilm_unavailable_without_files() {
        let tmp = tempdir().unwrap();
        let registry = EmbedderRegistry::new(tmp.path());

        assert!(!registry.is_available("minilm"));
        let err = registry.validate("minilm").unwrap_err();
        assert!(matches!(err, EmbedderError::Unavailable(_)));
        assert!(err.to_string().contains("model.onnx"));
    }

    #[test]
    fn best_available_falls_back_to_hash() {
        let tmp = tempdir().unwrap();
        let registry = EmbedderRegistry::new(tmp.path());
        assert_eq!(registry.best_available().name, "hash");
    }

    #[test]
    fn get_embedder_hash() {
        let tmp = tempdir().unwrap();
        let embedder = get_embedder(tmp.path(), Some("hash")).unwrap();
        assert_eq!(embedder.id(), "fnv1a-384");
        assert!(!embedder.is_semantic());
    }

    #[test]
    fn get_embedder_default_without_models() {
        let tmp = tempdir().unwrap();
        let embedder = get_embedder(tmp.path(), None).unwrap();
        assert_eq!(embedder.id(), "fnv1a-384");
    }

    #[test]
    fn validate_unknown_embedder_lists_available() {
        let tmp = tempdir().unwrap();
        let registry = EmbedderRegistry::new(tmp.path());
        let err = registry.validate("nonexistent").unwrap_err();
        assert!(err.to_string().contains("unknown embedder"));
        assert!(err.to_string().contains("minilm"));
        assert!(err.to_string().contains("hash"));
    }
}
