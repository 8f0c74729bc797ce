//! Embedder trait for semantic retrieval.
//!
//! An embedder maps text to a fixed-dimension vector. All implementations
//! must be deterministic (same input, same output) and return unit-normalized
//! vectors so that inner product doubles as cosine similarity. The encoder
//! used at query time must be the one the catalog index was built with; index
//! artifacts are keyed by embedder id to enforce this at load time.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedderError {
    /// Model files missing or the embedder name is unknown.
    #[error("embedder unavailable: {0}")]
    Unavailable(String),
    /// Inference failed after the model was loaded.
    #[error("embedding failed: {0}")]
    Inference(String),
}

pub type EmbedderResult<T> = std::result::Result<T, EmbedderError>;

/// Metadata about an embedder, for display and index headers.
#[derive(Debug, Clone)]
pub struct EmbedderInfo {
    pub id: String,
    pub dimension: usize,
    pub is_semantic: bool,
}

/// Text-to-vector encoder. Implementations are stateless per call and safe to
/// share across request threads.
pub trait Embedder: Send + Sync {
    /// Unique id (e.g. `minilm-384`), stored in index headers.
    fn id(&self) -> &str;

    /// Output dimension.
    fn dimension(&self) -> usize;

    /// Whether this is an ML (semantic) embedder rather than a lexical hash.
    fn is_semantic(&self) -> bool;

    /// Model revision stored alongside the id in index headers. Lexical
    /// embedders have no upstream model and keep the default.
    fn revision(&self) -> &str {
        "unversioned"
    }

    /// Embed one text into a unit-normalized vector of [`Self::dimension`].
    fn embed(&self, text: &str) -> EmbedderResult<Vec<f32>>;

    /// Embed a batch of texts. The default maps [`Self::embed`]; ML backends
    /// override this with true batched inference.
    fn embed_batch(&self, texts: &[String]) -> EmbedderResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn info(&self) -> EmbedderInfo {
        EmbedderInfo {
            id: self.id().to_string(),
            dimension: self.dimension(),
            is_semantic: self.is_semantic(),
        }
    }
}

/// Normalize a vector to unit L2 length in place. Zero vectors are left
/// untouched (there is no direction to normalize to).
pub fn l2_normalize(vector: &mut [f32]) {
    let norm_sq: f32 = vector.iter().map(|v| v * v).sum();
    if norm_sq > 0.0 {
        let inv = norm_sq.sqrt().recip();
        for v in vector.iter_mut() {
            *v *= inv;
        }
    }
}
