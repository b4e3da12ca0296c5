//! Text-to-vector seam
//!
//! The engine and the index only ever see `Vec<f32>`; [`EmbeddingProvider`]
//! is the boundary behind which the model lives. The shipped backend is a
//! local FastEmbed model, and tests substitute a deterministic
//! implementation of the same trait.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Unsupported embedding model: {0} (supported: all-MiniLM-L6-v2, bge-small-en-v1.5)")]
    UnsupportedModel(String),

    #[error("Model initialization failed: {0}")]
    Init(String),

    #[error("Embedding generation failed: {0}")]
    Generation(String),

    #[error("Model returned {actual} embeddings for {expected} inputs")]
    BatchShape { expected: usize, actual: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Provider of text embeddings.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch. The output aligns one-to-one with `texts` in order;
    /// empty inputs embed a placeholder instead of being dropped, so callers
    /// can zip the result against their own batch.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Vector dimension produced by this provider.
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

impl std::fmt::Debug for dyn EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("model_name", &self.model_name())
            .field("dimension", &self.dimension())
            .finish()
    }
}

/// Embedded in place of a record that has no text at all. Keeps batch
/// alignment; such documents simply rank near nothing.
const EMPTY_TEXT_PLACEHOLDER: &str = "(empty page)";

fn model_spec(name: &str) -> Option<(EmbeddingModel, usize)> {
    match name {
        "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => Some((EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Some((EmbeddingModel::BGESmallENV15, 384)),
        _ => None,
    }
}

/// Replace empty or whitespace-only inputs with the placeholder, preserving
/// order and length.
fn sanitize_batch(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .map(|t| {
            if t.trim().is_empty() {
                EMPTY_TEXT_PLACEHOLDER.to_string()
            } else {
                t.clone()
            }
        })
        .collect()
}

/// Local FastEmbed backend.
///
/// The model weights land in the local HuggingFace cache on first use
/// (~90MB for the default); after that nothing leaves the machine.
pub struct FastEmbedProvider {
    model: TextEmbedding,
    model_name: String,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl FastEmbedProvider {
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (kind, dimension) = model_spec(model_name)
            .ok_or_else(|| EmbeddingError::UnsupportedModel(model_name.to_string()))?;

        tracing::info!("Loading embedding model {} ({}D)", model_name, dimension);

        let model =
            TextEmbedding::try_new(InitOptions::new(kind).with_show_download_progress(true))
                .map_err(|e| EmbeddingError::Init(e.to_string()))?;

        Ok(Self {
            model,
            model_name: model_name.to_string(),
            dimension,
        })
    }

    /// Run the model and enforce the output contract: one vector per input,
    /// each of the advertised dimension.
    fn run(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let expected = inputs.len();
        let embeddings = self
            .model
            .embed(inputs, None)
            .map_err(|e| EmbeddingError::Generation(e.to_string()))?;

        if embeddings.len() != expected {
            return Err(EmbeddingError::BatchShape {
                expected,
                actual: embeddings.len(),
            });
        }
        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }
        Ok(embeddings)
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut embeddings = self.run(sanitize_batch(&[text.to_string()]))?;
        embeddings.pop().ok_or(EmbeddingError::BatchShape {
            expected: 1,
            actual: 0,
        })
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(sanitize_batch(texts))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_is_rejected_without_download() {
        let err = FastEmbedProvider::new("definitely-not-a-model").unwrap_err();
        assert!(matches!(err, EmbeddingError::UnsupportedModel(_)));
    }

    #[test]
    fn test_sanitize_batch_preserves_alignment() {
        let texts = vec![
            String::new(),
            "hello".to_string(),
            "   ".to_string(),
            "world".to_string(),
        ];
        let sanitized = sanitize_batch(&texts);

        assert_eq!(sanitized.len(), texts.len());
        assert_eq!(sanitized[0], EMPTY_TEXT_PLACEHOLDER);
        assert_eq!(sanitized[1], "hello");
        assert_eq!(sanitized[2], EMPTY_TEXT_PLACEHOLDER);
        assert_eq!(sanitized[3], "world");
    }

    #[test]
    #[ignore] // Downloads the model (~90MB); run with: cargo test -- --ignored
    fn test_default_model_embeds_at_advertised_dimension() {
        let provider = FastEmbedProvider::new("all-MiniLM-L6-v2").unwrap();
        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.model_name(), "all-MiniLM-L6-v2");

        let embedding = provider.embed("GitHub is a code hosting platform.").unwrap();
        assert_eq!(embedding.len(), 384);
    }

    #[test]
    #[ignore] // Downloads the model (~90MB); run with: cargo test -- --ignored
    fn test_batch_with_empty_text_stays_aligned() {
        let provider = FastEmbedProvider::new("all-MiniLM-L6-v2").unwrap();
        let texts = vec!["first page".to_string(), String::new()];
        let embeddings = provider.embed_batch(&texts).unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[1].len(), 384);
    }
}
