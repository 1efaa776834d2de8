//! Storage collaborator interfaces.
//!
//! The core never reaches a store through a global handle; every component
//! that needs one takes it as an explicit `Arc<dyn ...>`.

use crate::{BiometricTemplate, EmergencyId, Embedding, FingerprintHash, Result, SubjectId, TemplateUpdate};

/// Keyed persistence of biometric templates
pub trait TemplateStore: Send + Sync {
    /// Every stored face embedding, ordered by ascending subject id.
    ///
    /// Fetched fresh on each call so concurrent enrollments are visible.
    fn all_embeddings(&self) -> Result<Vec<(SubjectId, Embedding)>>;

    /// Owner of an exact fingerprint hash.
    ///
    /// More than one owner is reported as
    /// [`Error::StoreIntegrityViolation`](crate::Error::StoreIntegrityViolation).
    fn subject_by_hash(&self, hash: &FingerprintHash) -> Result<Option<SubjectId>>;

    /// Create or overwrite the modalities present in `update`
    fn upsert(&self, subject: &SubjectId, update: TemplateUpdate) -> Result<()>;

    fn template(&self, subject: &SubjectId) -> Result<Option<BiometricTemplate>>;
}

/// Result of an attempt to commit an emergency identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The identifier is now bound to the subject
    Committed,
    /// The candidate is owned by another subject, or the subject already has an identifier
    UniquenessViolation,
}

/// Subject records holding the emergency identifier namespace.
///
/// Implementations must make [`try_set_emergency_id`](SubjectStore::try_set_emergency_id)
/// atomic: the uniqueness check and the write happen as one step. An `Err`
/// return is a persistence failure and may be retried by the caller.
pub trait SubjectStore: Send + Sync {
    fn emergency_id(&self, subject: &SubjectId) -> Result<Option<EmergencyId>>;

    fn try_set_emergency_id(&self, subject: &SubjectId, candidate: &EmergencyId) -> Result<SetOutcome>;

    fn subject_by_emergency_id(&self, id: &EmergencyId) -> Result<Option<SubjectId>>;
}
