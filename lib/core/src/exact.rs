use crate::{FingerprintHash, Result, SubjectId, TemplateStore};
use std::sync::Arc;

/// Resolves a fingerprint hash to its owner by exact lookup.
///
/// Performs no normalization: any difference, including case, is a miss.
/// A hash with several owners surfaces the store's integrity error as-is.
pub struct ExactMatcher {
    templates: Arc<dyn TemplateStore>,
}

impl ExactMatcher {
    pub fn new(templates: Arc<dyn TemplateStore>) -> Self {
        Self { templates }
    }

    pub fn find_by_hash(&self, hash: &FingerprintHash) -> Result<Option<SubjectId>> {
        if hash.is_empty() {
            return Ok(None);
        }
        self.templates.subject_by_hash(hash).map_err(|e| {
            if let crate::Error::StoreIntegrityViolation { owners } = &e {
                tracing::error!(owners, "fingerprint hash has multiple owners, refusing to resolve");
            }
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, MemoryStore, TemplateUpdate};

    fn store_with(entries: &[(&str, &str)]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (subject, hash) in entries {
            store
                .upsert(
                    &SubjectId::from(*subject),
                    TemplateUpdate::default().with_fingerprint_hash(FingerprintHash::new(*hash)),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_exact_hit_and_miss() {
        let matcher = ExactMatcher::new(store_with(&[("s1", "deadbeef"), ("s2", "cafebabe")]));
        assert_eq!(
            matcher.find_by_hash(&FingerprintHash::new("cafebabe")).unwrap(),
            Some(SubjectId::from("s2"))
        );
        assert_eq!(matcher.find_by_hash(&FingerprintHash::new("0000")).unwrap(), None);
    }

    #[test]
    fn test_case_difference_is_a_miss() {
        let matcher = ExactMatcher::new(store_with(&[("s1", "deadbeef")]));
        assert_eq!(matcher.find_by_hash(&FingerprintHash::new("DEADBEEF")).unwrap(), None);
    }

    #[test]
    fn test_duplicate_owner_is_reported() {
        let matcher = ExactMatcher::new(store_with(&[("s1", "dup"), ("s2", "dup")]));
        let err = matcher.find_by_hash(&FingerprintHash::new("dup")).unwrap_err();
        assert!(matches!(err, Error::StoreIntegrityViolation { owners: 2 }));
    }
}
