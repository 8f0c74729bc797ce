//! Query-side machinery: embedders, the vector index, intent classification,
//! and the recommendation pipeline that ties them together.

pub mod canonicalize;
pub mod embedder;
pub mod embedder_registry;
pub mod fastembed_embedder;
pub mod hash_embedder;
pub mod intent;
pub mod rerank;
pub mod retriever;
pub mod vector_index;

pub use retriever::{RecommendError, RecommendResult, Recommender};
