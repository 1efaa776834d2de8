pub mod rest;
pub mod extractor;

pub use rest::{ApiError, AppState, RestApi};
pub use extractor::HttpEmbeddingExtractor;
