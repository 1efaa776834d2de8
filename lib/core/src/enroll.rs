use crate::{Embedding, Error, FingerprintHash, Result, SubjectId, TemplateStore, TemplateUpdate};
use std::sync::Arc;
use tracing::info;

/// Raw enrollment input as received from a caller
#[derive(Debug, Clone, Default)]
pub struct EnrollmentRequest {
    pub embedding: Option<Vec<f32>>,
    pub fingerprint_hash: Option<String>,
}

/// Validates and normalizes biometric templates before they are stored.
///
/// Fingerprint hashes are canonicalized here so lookups can compare bytes.
pub struct Enroller {
    templates: Arc<dyn TemplateStore>,
}

impl Enroller {
    pub fn new(templates: Arc<dyn TemplateStore>) -> Self {
        Self { templates }
    }

    pub fn enroll(&self, subject: &SubjectId, request: EnrollmentRequest) -> Result<TemplateUpdate> {
        if subject.as_str().is_empty() {
            return Err(Error::InvalidInput("subject id is empty".to_string()));
        }

        let mut update = TemplateUpdate::default();
        if let Some(values) = request.embedding {
            update = update.with_embedding(Embedding::try_new(values)?);
        }
        if let Some(raw) = request.fingerprint_hash.as_deref() {
            update = update.with_fingerprint_hash(FingerprintHash::normalized(raw)?);
        }

        if update.is_empty() {
            return Err(Error::InvalidInput(
                "enrollment needs a face embedding or a fingerprint hash".to_string(),
            ));
        }

        self.templates.upsert(subject, update.clone())?;
        info!(
            subject = %subject,
            face = update.embedding.is_some(),
            fingerprint = update.fingerprint_hash.is_some(),
            "biometric template enrolled"
        );
        Ok(update)
    }
}
