//! FastEmbed-backed ML embedder (MiniLM).
//!
//! Loads an ONNX sentence-transformer from local model files under
//! `<data_dir>/models/<model_dir>/` and embeds text into the 384-dimension
//! MiniLM space the catalog index is built in. No network access: model files
//! are provisioned out of band and gated by the registry's availability
//! check.

use std::path::Path;

use fastembed::{
    InitOptionsUserDefined, Pooling, TextEmbedding, TokenizerFiles, UserDefinedEmbeddingModel,
};
use parking_lot::Mutex;

use super::embedder::{Embedder, EmbedderError, EmbedderResult, l2_normalize};
use super::embedder_registry::EmbedderRegistry;

/// Batch size for offline catalog encoding.
const EMBED_BATCH_SIZE: usize = 64;

/// ONNX embedder behind a mutex: the inference session is the only
/// non-`Sync` piece of the whole query path.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    id: String,
    dimension: usize,
}

impl FastEmbedder {
    /// Load a registered ML embedder from its model directory.
    pub fn load_by_name(data_dir: &Path, name: &str) -> EmbedderResult<Self> {
        let registry = EmbedderRegistry::new(data_dir);
        let info = registry.validate(name)?;
        let model_dir = info.model_dir(data_dir).ok_or_else(|| {
            EmbedderError::Unavailable(format!("embedder '{name}' has no model directory"))
        })?;

        let read = |file: &str| -> EmbedderResult<Vec<u8>> {
            std::fs::read(model_dir.join(file)).map_err(|e| {
                EmbedderError::Unavailable(format!(
                    "read model file {file} in {}: {e}",
                    model_dir.display()
                ))
            })
        };

        let onnx_file = read("model.onnx")?;
        let tokenizer_files = TokenizerFiles {
            tokenizer_file: read("tokenizer.json")?,
            config_file: read("config.json")?,
            special_tokens_map_file: read("special_tokens_map.json")?,
            tokenizer_config_file: read("tokenizer_config.json")?,
        };

        let user_model =
            UserDefinedEmbeddingModel::new(onnx_file, tokenizer_files).with_pooling(Pooling::Mean);
        let model =
            TextEmbedding::try_new_from_user_defined(user_model, InitOptionsUserDefined::default())
                .map_err(|e| {
                    EmbedderError::Unavailable(format!("load ONNX model for '{name}': {e}"))
                })?;

        tracing::info!(embedder = info.id, dimension = info.dimension, "Loaded ML embedder");

        Ok(Self {
            model: Mutex::new(model),
            id: info.id.to_string(),
            dimension: info.dimension,
        })
    }

    fn embed_texts(&self, texts: Vec<String>) -> EmbedderResult<Vec<Vec<f32>>> {
        let mut vectors = self
            .model
            .lock()
            .embed(texts, Some(EMBED_BATCH_SIZE))
            .map_err(|e| EmbedderError::Inference(e.to_string()))?;

        for vector in &mut vectors {
            if vector.len() != self.dimension {
                return Err(EmbedderError::Inference(format!(
                    "model returned dimension {}, expected {}",
                    vector.len(),
                    self.dimension
                )));
            }
            // Some ONNX exports ship without a normalization layer; the index
            // contract requires unit vectors either way.
            l2_normalize(vector);
        }
        Ok(vectors)
    }
}

impl Embedder for FastEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_semantic(&self) -> bool {
        true
    }

    fn revision(&self) -> &str {
        // Pinned upstream model snapshot; bumped when model files change.
        "v2"
    }

    fn embed(&self, text: &str) -> EmbedderResult<Vec<f32>> {
        let mut vectors = self.embed_texts(vec![text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| EmbedderError::Inference("model returned no embedding".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> EmbedderResult<Vec<Vec<f32>>> {
        self.embed_texts(texts.to_vec())
    }
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("id", &self.id)
            .field("dimension", &self.dimension)
            .finish()
    }
}
