use crate::{Embedding, Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable internal reference to a subject (account/profile)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        SubjectId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        SubjectId(s)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        SubjectId(s.to_string())
    }
}

/// Exact-match fingerprint feature hash.
///
/// Compared byte for byte; matchers never normalize. Enrollment and the
/// request boundary canonicalize with [`FingerprintHash::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintHash(String);

impl FingerprintHash {
    pub fn new(hash: impl Into<String>) -> Self {
        FingerprintHash(hash.into())
    }

    /// Canonical form: surrounding whitespace removed, lowercase, no control characters
    pub fn normalized(raw: &str) -> Result<Self> {
        let hash = raw.trim().to_lowercase();
        if hash.is_empty() {
            return Err(Error::InvalidInput("fingerprint hash is empty".to_string()));
        }
        if hash.chars().any(char::is_control) {
            return Err(Error::InvalidInput(
                "fingerprint hash contains control characters".to_string(),
            ));
        }
        Ok(FingerprintHash(hash))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for FingerprintHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque public identifier addressing a subject's emergency profile
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmergencyId(String);

impl EmergencyId {
    pub fn new(id: impl Into<String>) -> Self {
        EmergencyId(id.into())
    }

    /// Fresh random identifier (UUID v4, 122 random bits from the OS RNG)
    pub fn random() -> Self {
        EmergencyId(Uuid::new_v4().to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmergencyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored biometric data for one subject, at most one template per modality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricTemplate {
    pub subject_id: SubjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_hash: Option<FingerprintHash>,
}

impl BiometricTemplate {
    pub fn new(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            embedding: None,
            fingerprint_hash: None,
        }
    }

    #[inline]
    pub fn has_biometrics(&self) -> bool {
        self.embedding.is_some() || self.fingerprint_hash.is_some()
    }

    /// Overwrite the modalities present in `update`, keep the others
    pub fn apply(&mut self, update: TemplateUpdate) {
        if let Some(embedding) = update.embedding {
            self.embedding = Some(embedding);
        }
        if let Some(hash) = update.fingerprint_hash {
            self.fingerprint_hash = Some(hash);
        }
    }
}

/// An enrollment write: each present field replaces that modality
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateUpdate {
    pub embedding: Option<Embedding>,
    pub fingerprint_hash: Option<FingerprintHash>,
}

impl TemplateUpdate {
    #[must_use]
    pub fn with_embedding(mut self, embedding: Embedding) -> Self {
        self.embedding = Some(embedding);
        self
    }

    #[must_use]
    pub fn with_fingerprint_hash(mut self, hash: FingerprintHash) -> Self {
        self.fingerprint_hash = Some(hash);
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.embedding.is_none() && self.fingerprint_hash.is_none()
    }
}
