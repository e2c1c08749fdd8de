use rust_bert::pipelines::sentence_embeddings::{
    SentenceEmbeddingsBuilder, SentenceEmbeddingsModel, SentenceEmbeddingsModelType,
};
use tracing::{debug, info};

use crate::config::Number;
use crate::errors::RagError;

/// Turns text into a dense vector.
pub trait Embedder {
    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<Number>, RagError>;
}

/// all-MiniLM-L6-v2 through rust-bert: 384 dimensions, small enough for local use.
///
/// Load once per process and pass by reference.
pub struct SentenceEmbedder {
    model: SentenceEmbeddingsModel,
    dimensions: usize,
}

impl SentenceEmbedder {
    #[tracing::instrument(name = "Loading embedding model")]
    pub fn load() -> Result<Self, RagError> {
        let model = SentenceEmbeddingsBuilder::remote(SentenceEmbeddingsModelType::AllMiniLmL6V2)
            .create_model()
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        // The model reports its width most reliably through an actual encode.
        let sample = model
            .encode(&["dimension check"])
            .map_err(|e| RagError::Embedding(e.to_string()))?;
        let dimensions = sample.first().map(Vec::len).unwrap_or_default();
        if dimensions == 0 {
            return Err(RagError::Embedding("model produced an empty embedding".into()));
        }

        info!(dimensions, "Embedding model loaded");
        Ok(Self { model, dimensions })
    }
}

impl Embedder for SentenceEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<Number>, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyInput);
        }

        let mut embeddings = self
            .model
            .encode(&[text])
            .map_err(|e| RagError::Embedding(e.to_string()))?;
        let vector = embeddings
            .pop()
            .ok_or_else(|| RagError::Embedding("model returned no embedding".into()))?;

        check_dimensions(self.dimensions, &vector)?;
        debug!(len = vector.len(), "Embedded text");
        Ok(vector)
    }
}

pub fn check_dimensions(expected: usize, vector: &[Number]) -> Result<(), RagError> {
    if vector.len() != expected {
        return Err(RagError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// The embedder must be as wide as the index its vectors go into.
pub fn check_embedder(embedder: &dyn Embedder, index_dimensions: usize) -> Result<(), RagError> {
    if embedder.dimensions() != index_dimensions {
        return Err(RagError::DimensionMismatch {
            expected: index_dimensions,
            actual: embedder.dimensions(),
        });
    }
    Ok(())
}
