//! The recommendation pipeline: embed a query, scan the vector index, look up
//! catalog metadata, classify intent, and rerank by category quotas.
//!
//! [`Recommender::open`] validates the artifact pair once at startup. Query
//! handling after that borrows the loaded state immutably, so a single
//! instance serves concurrent queries without locking around the index.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{METADATA_FILE, MetadataStore};
use crate::model::types::{CatalogItem, Intent, RankedCandidate};
use crate::search::canonicalize::canonicalize_for_embedding;
use crate::search::embedder::{Embedder, EmbedderError};
use crate::search::embedder_registry::get_embedder;
use crate::search::intent::classify;
use crate::search::rerank::rerank;
use crate::search::vector_index::{VectorIndex, vector_index_path};

/// Candidate pool size handed to the reranker. Wide enough that category
/// quotas can usually be met even when retrieval skews toward one family.
pub const DEFAULT_RETRIEVE_K: usize = 20;

/// Default length of the final recommendation list.
pub const DEFAULT_FINAL_K: usize = 10;

#[derive(Debug, Error)]
pub enum RecommendError {
    /// The query is empty or whitespace-only.
    #[error("query must not be empty")]
    InvalidQuery,

    /// The index/metadata artifact pair is missing, unreadable, or
    /// inconsistent. Fatal at startup rather than per-query.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    #[error(transparent)]
    Embedder(#[from] EmbedderError),

    #[error("search failed: {0}")]
    Search(String),
}

pub type RecommendResult<T> = Result<T, RecommendError>;

/// Loaded artifacts plus the embedder that produced them.
pub struct Recommender {
    embedder: Arc<dyn Embedder>,
    index: VectorIndex,
    catalog: MetadataStore,
}

impl Recommender {
    /// Load the embedder, vector index, and catalog metadata from `data_dir`
    /// and cross-check that they were built together.
    pub fn open(data_dir: &Path, embedder_name: Option<&str>) -> RecommendResult<Self> {
        let embedder = get_embedder(data_dir, embedder_name)?;

        let index_path = vector_index_path(data_dir, embedder.id());
        if !index_path.exists() {
            return Err(RecommendError::IndexUnavailable(format!(
                "vector index not found at {} (run `assay index` first)",
                index_path.display()
            )));
        }
        let index = VectorIndex::load(&index_path)
            .map_err(|e| RecommendError::IndexUnavailable(format!("{e:#}")))?;

        let metadata_path = data_dir.join(METADATA_FILE);
        let catalog = MetadataStore::load(&metadata_path)
            .map_err(|e| RecommendError::IndexUnavailable(format!("{e:#}")))?;

        // The index is positional: row i must be catalog item i. A count or
        // embedder mismatch means the artifacts are from different builds.
        if index.header().embedder_id != embedder.id() {
            return Err(RecommendError::IndexUnavailable(format!(
                "index was built with embedder '{}' but '{}' is active",
                index.header().embedder_id,
                embedder.id()
            )));
        }
        if index.count() != catalog.count() {
            return Err(RecommendError::IndexUnavailable(format!(
                "vector index holds {} vectors but the catalog has {} items; rebuild the index",
                index.count(),
                catalog.count()
            )));
        }
        if index.header().dimension as usize != embedder.dimension() {
            return Err(RecommendError::IndexUnavailable(format!(
                "index dimension {} does not match embedder dimension {}",
                index.header().dimension,
                embedder.dimension()
            )));
        }

        info!(
            embedder = embedder.id(),
            vectors = index.count(),
            "recommender ready"
        );

        Ok(Self {
            embedder,
            index,
            catalog,
        })
    }

    /// Build from already-loaded parts. Used by tests and the indexer's
    /// post-build verification; performs the same consistency checks as
    /// [`Recommender::open`].
    pub fn from_parts(
        embedder: Arc<dyn Embedder>,
        index: VectorIndex,
        catalog: MetadataStore,
    ) -> RecommendResult<Self> {
        if index.header().embedder_id != embedder.id() {
            return Err(RecommendError::IndexUnavailable(format!(
                "index was built with embedder '{}' but '{}' is active",
                index.header().embedder_id,
                embedder.id()
            )));
        }
        if index.count() != catalog.count() {
            return Err(RecommendError::IndexUnavailable(format!(
                "vector index holds {} vectors but the catalog has {} items",
                index.count(),
                catalog.count()
            )));
        }
        if index.header().dimension as usize != embedder.dimension() {
            return Err(RecommendError::IndexUnavailable(format!(
                "index dimension {} does not match embedder dimension {}",
                index.header().dimension,
                embedder.dimension()
            )));
        }
        Ok(Self {
            embedder,
            index,
            catalog,
        })
    }

    pub fn embedder_id(&self) -> &str {
        self.embedder.id()
    }

    pub fn catalog_size(&self) -> usize {
        self.catalog.count()
    }

    pub fn catalog(&self) -> &MetadataStore {
        &self.catalog
    }

    /// Embed the query and return the `top_k` nearest catalog items by inner
    /// product, highest score first.
    pub fn retrieve(&self, query: &str, top_k: usize) -> RecommendResult<Vec<RankedCandidate>> {
        if query.trim().is_empty() {
            return Err(RecommendError::InvalidQuery);
        }

        let canonical = canonicalize_for_embedding(query);
        let query_vec = self.embedder.embed(&canonical)?;
        let hits = self
            .index
            .search_top_k(&query_vec, top_k)
            .map_err(|e| RecommendError::Search(format!("{e:#}")))?;

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.catalog.get(hit.position) {
                Ok(item) => candidates.push(RankedCandidate {
                    item: item.clone(),
                    score: hit.score,
                }),
                Err(e) => {
                    // A stale row with no catalog entry is skipped, not fatal.
                    debug!(position = hit.position, error = %e, "skipping unmapped hit");
                }
            }
        }
        Ok(candidates)
    }

    /// Full pipeline: retrieve a candidate pool, classify the query's intent,
    /// and rerank into at most `final_k` recommendations.
    pub fn recommend(&self, query: &str, final_k: usize) -> RecommendResult<Vec<CatalogItem>> {
        self.recommend_with_pool(query, DEFAULT_RETRIEVE_K.max(final_k), final_k)
    }

    /// As [`Recommender::recommend`], with an explicit candidate pool size.
    pub fn recommend_with_pool(
        &self,
        query: &str,
        retrieve_k: usize,
        final_k: usize,
    ) -> RecommendResult<Vec<CatalogItem>> {
        let results = self.recommend_ranked(query, retrieve_k, final_k)?;
        Ok(results.into_iter().map(|c| c.item).collect())
    }

    /// Full pipeline keeping the similarity scores, for evaluation output.
    pub fn recommend_ranked(
        &self,
        query: &str,
        retrieve_k: usize,
        final_k: usize,
    ) -> RecommendResult<Vec<RankedCandidate>> {
        let candidates = self.retrieve(query, retrieve_k)?;
        let intent = self.classify_intent(query);
        debug!(?intent, pool = candidates.len(), "reranking candidates");

        if candidates.is_empty() {
            warn!("no candidates retrieved for query");
        }

        Ok(rerank(candidates, intent, final_k))
    }

    pub fn classify_intent(&self, query: &str) -> Intent {
        classify(query)
    }
}

impl std::fmt::Debug for Recommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("embedder", &self.embedder.id())
            .field("vectors", &self.index.count())
            .field("catalog_items", &self.catalog.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::embedding_text;
    use crate::model::types::CategoryCode;
    use crate::search::hash_embedder::HashEmbedder;
    use crate::search::vector_index::Quantization;

    fn item(name: &str, category: CategoryCode) -> CatalogItem {
        CatalogItem {
            name: name.to_string(),
            category_code: category,
            remote_support: true,
            ..Default::default()
        }
    }

    fn build_recommender(items: Vec<CatalogItem>) -> Recommender {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
        let vectors: Vec<Vec<f32>> = items
            .iter()
            .map(|i| embedder.embed(&embedding_text(i)).unwrap())
            .collect();
        let index = VectorIndex::build(
            embedder.id(),
            "test",
            embedder.dimension(),
            Quantization::F32,
            vectors,
        )
        .unwrap();
        let catalog = MetadataStore::new(items);
        Recommender::from_parts(embedder, index, catalog).unwrap()
    }

    #[test]
    fn empty_query_is_invalid() {
        let rec = build_recommender(vec![item("Java Test", CategoryCode::Knowledge)]);
        assert!(matches!(
            rec.retrieve("", 5),
            Err(RecommendError::InvalidQuery)
        ));
        assert!(matches!(
            rec.recommend("   \t\n ", 5),
            Err(RecommendError::InvalidQuery)
        ));
    }

    #[test]
    fn retrieve_returns_score_ordered_candidates() {
        let rec = build_recommender(vec![
            item("Java Programming Test", CategoryCode::Knowledge),
            item("Sales Aptitude", CategoryCode::Development),
            item("Java 8 Advanced", CategoryCode::Knowledge),
        ]);
        let candidates = rec.retrieve("java programming", 3).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].item.name, "Java Programming Test");
        for pair in candidates.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn retrieve_caps_at_catalog_size() {
        let rec = build_recommender(vec![
            item("Java Test", CategoryCode::Knowledge),
            item("Teamwork Survey", CategoryCode::PersonalityBehaviour),
        ]);
        let candidates = rec.retrieve("java", 50).unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn recommend_applies_intent_quotas() {
        let mut items = Vec::new();
        for i in 0..8 {
            items.push(item(&format!("Java Skill {i}"), CategoryCode::Knowledge));
        }
        for i in 0..8 {
            items.push(item(
                &format!("Teamwork Profile {i}"),
                CategoryCode::PersonalityBehaviour,
            ));
        }
        let rec = build_recommender(items);

        // Mixed intent: even 5/5 split.
        let results = rec.recommend("java developer with teamwork", 10).unwrap();
        assert_eq!(results.len(), 10);
        let knowledge = results
            .iter()
            .filter(|i| i.category_code == CategoryCode::Knowledge)
            .count();
        assert_eq!(knowledge, 5);
    }

    #[test]
    fn embedder_id_mismatch_is_rejected() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
        let vectors = vec![embedder.embed("one item").unwrap()];
        let index = VectorIndex::build(
            "minilm-384",
            "v2",
            embedder.dimension(),
            Quantization::F32,
            vectors,
        )
        .unwrap();
        let catalog = MetadataStore::new(vec![item("A", CategoryCode::Knowledge)]);
        assert!(matches!(
            Recommender::from_parts(embedder, index, catalog),
            Err(RecommendError::IndexUnavailable(_))
        ));
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
        let vectors = vec![embedder.embed("only one").unwrap()];
        let index = VectorIndex::build(
            embedder.id(),
            "test",
            embedder.dimension(),
            Quantization::F32,
            vectors,
        )
        .unwrap();
        let catalog = MetadataStore::new(vec![
            item("A", CategoryCode::Knowledge),
            item("B", CategoryCode::Knowledge),
        ]);
        assert!(matches!(
            Recommender::from_parts(embedder, index, catalog),
            Err(RecommendError::IndexUnavailable(_))
        ));
    }

    #[test]
    fn open_without_artifacts_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = Recommender::open(dir.path(), Some("hash")).unwrap_err();
        assert!(matches!(err, RecommendError::IndexUnavailable(_)));
    }
}
