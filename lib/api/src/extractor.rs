use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use vitalid_core::{Embedding, EmbeddingExtractor, Error, Result};

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Calls an external face model service: `POST {base}/face/embed` with the
/// raw image as `application/octet-stream`, expecting `{"embedding": [...]}`.
///
/// Uses a blocking client; call it from a blocking context (`web::block`).
pub struct HttpEmbeddingExtractor {
    client: Client,
    endpoint: String,
}

impl HttpEmbeddingExtractor {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("face service client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: Self::endpoint_for(base_url),
        })
    }

    fn endpoint_for(base_url: &str) -> String {
        format!("{}/face/embed", base_url.trim_end_matches('/'))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EmbeddingExtractor for HttpEmbeddingExtractor {
    fn extract(&self, image: &[u8]) -> Result<Embedding> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .map_err(|e| Error::Extraction(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Extraction(format!("face service returned {}", status)));
        }

        let body: EmbedResponse = response
            .json()
            .map_err(|e| Error::Extraction(format!("invalid face service response: {}", e)))?;

        Embedding::try_new(body.embedding).map_err(|e| Error::Extraction(e.to_string()))
    }
}
