//! Offline catalog indexing: parse the raw assessment catalog, embed each
//! item's descriptive text, and write the vector index and metadata table as
//! a consistent pair.
//!
//! The two artifacts are positional twins: vector `i` of the index describes
//! item `i` of the metadata table. Both are written atomically (temp file +
//! rename) so a crash mid-build never leaves a torn artifact behind, and the
//! metadata file is written only after the index save succeeds.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::catalog::{METADATA_FILE, MetadataStore, embedding_text, load_raw_catalog};
use crate::search::canonicalize::canonicalize_for_embedding;
use crate::search::embedder_registry::get_embedder;
use crate::search::vector_index::{Quantization, VectorIndex, vector_index_path};

/// Items per embedding batch. Large enough to amortize model overhead,
/// small enough to keep progress ticking.
const INDEX_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Raw catalog file (JSON array of assessment records).
    pub catalog_path: PathBuf,
    /// Directory receiving the vector index and metadata table.
    pub data_dir: PathBuf,
    /// Embedder name or id; `None` selects the best available.
    pub embedder: Option<String>,
    pub quantization: Quantization,
    /// Suppress the progress bar (scripted runs, tests).
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub items_indexed: usize,
    pub embedder_id: String,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Build both artifacts from a raw catalog file.
pub fn run_index(options: &IndexOptions) -> Result<IndexSummary> {
    let items = load_raw_catalog(&options.catalog_path)
        .with_context(|| format!("load catalog from {}", options.catalog_path.display()))?;
    if items.is_empty() {
        bail!(
            "catalog at {} contains no assessments",
            options.catalog_path.display()
        );
    }

    let embedder = get_embedder(&options.data_dir, options.embedder.as_deref())?;
    info!(
        embedder = embedder.id(),
        items = items.len(),
        "building vector index"
    );

    let progress = if options.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(items.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.set_message("Embedding catalog...");
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    };

    // Embed in catalog order; the resulting vector order IS the positional
    // contract with the metadata table.
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(items.len());
    for chunk in items.chunks(INDEX_BATCH_SIZE) {
        let texts: Vec<String> = chunk
            .iter()
            .map(|item| canonicalize_for_embedding(&embedding_text(item)))
            .collect();
        let batch = embedder.embed_batch(&texts)?;
        progress.inc(batch.len() as u64);
        vectors.extend(batch);
    }
    progress.finish_and_clear();

    let index = VectorIndex::build(
        embedder.id(),
        embedder.revision(),
        embedder.dimension(),
        options.quantization,
        vectors,
    )?;

    let index_path = vector_index_path(&options.data_dir, embedder.id());
    index.save(&index_path)?;

    let metadata_path = options.data_dir.join(METADATA_FILE);
    let store = MetadataStore::new(items);
    store.save(&metadata_path)?;

    info!(
        index = %index_path.display(),
        metadata = %metadata_path.display(),
        "index build complete"
    );

    Ok(IndexSummary {
        items_indexed: store.count(),
        embedder_id: embedder.id().to_string(),
        index_path,
        metadata_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::retriever::Recommender;
    use std::fs;

    fn sample_catalog_json() -> &'static str {
        r#"[
            {"name": "Java Programming Test", "url": "https://example.com/java",
             "test_type": ["K"], "remote_support": "Yes", "adaptive_support": "No",
             "description": "Core Java knowledge", "duration": 40},
            {"name": "Teamwork Styles Profile", "url": "https://example.com/teamwork",
             "test_type": ["P"], "remote_support": "Yes", "adaptive_support": "No",
             "description": "Collaboration preferences", "duration": 25},
            {"name": "Python Coding Simulation", "url": "https://example.com/python",
             "test_type": ["K", "S"], "remote_support": "No", "adaptive_support": "Yes",
             "description": "Hands-on Python tasks", "duration": 60}
        ]"#
    }

    #[test]
    fn run_index_writes_consistent_artifacts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog_path = dir.path().join("catalog.json");
        fs::write(&catalog_path, sample_catalog_json())?;

        let options = IndexOptions {
            catalog_path,
            data_dir: dir.path().to_path_buf(),
            embedder: Some("hash".to_string()),
            quantization: Quantization::F32,
            quiet: true,
        };
        let summary = run_index(&options)?;
        assert_eq!(summary.items_indexed, 3);
        assert_eq!(summary.embedder_id, "fnv1a-384");
        assert!(summary.index_path.exists());
        assert!(summary.metadata_path.exists());

        // The built pair must satisfy the loader's consistency checks.
        let recommender = Recommender::open(dir.path(), Some("hash"))?;
        assert_eq!(recommender.catalog_size(), 3);
        let results = recommender.recommend("java developer", 3)?;
        assert!(!results.is_empty());
        assert_eq!(results[0].name, "Java Programming Test");
        Ok(())
    }

    #[test]
    fn run_index_rejects_empty_catalog() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog_path = dir.path().join("catalog.json");
        fs::write(&catalog_path, "[]")?;

        let options = IndexOptions {
            catalog_path,
            data_dir: dir.path().to_path_buf(),
            embedder: Some("hash".to_string()),
            quantization: Quantization::F32,
            quiet: true,
        };
        assert!(run_index(&options).is_err());
        Ok(())
    }

    #[test]
    fn run_index_f16_survives_reload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog_path = dir.path().join("catalog.json");
        fs::write(&catalog_path, sample_catalog_json())?;

        let options = IndexOptions {
            catalog_path,
            data_dir: dir.path().to_path_buf(),
            embedder: Some("hash".to_string()),
            quantization: Quantization::F16,
            quiet: true,
        };
        run_index(&options)?;
        let recommender = Recommender::open(dir.path(), Some("hash"))?;
        let results = recommender.recommend("python coding", 2)?;
        assert_eq!(results[0].name, "Python Coding Simulation");
        Ok(())
    }
}
