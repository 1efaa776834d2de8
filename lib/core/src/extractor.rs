use crate::{Embedding, Result};

/// Turns raw image bytes into a face embedding.
///
/// Opaque external collaborator; implementations call out to a face model
/// service and return a fixed-length vector or
/// [`Error::Extraction`](crate::Error::Extraction).
pub trait EmbeddingExtractor: Send + Sync {
    fn extract(&self, image: &[u8]) -> Result<Embedding>;
}
