use crate::{
    Embedding, EmbeddingExtractor, Error, ExactMatcher, FingerprintHash, MatchResult, Modality,
    Result, SimilarityMatcher, TemplateStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Default similarity threshold for declaring a face match
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.9;

/// Resolution policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minimum cosine similarity for a face match
    pub similarity_threshold: f32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        let t = self.similarity_threshold;
        if !t.is_finite() || !(-1.0..=1.0).contains(&t) {
            return Err(Error::InvalidConfig(format!(
                "similarity threshold must be within [-1, 1], got {}",
                t
            )));
        }
        Ok(())
    }
}

/// One biometric request. Fingerprint and face are independent evidence.
#[derive(Debug, Clone, Default)]
pub struct BiometricSample {
    pub fingerprint_hash: Option<FingerprintHash>,
    pub embedding: Option<Embedding>,
}

impl BiometricSample {
    pub fn fingerprint(hash: FingerprintHash) -> Self {
        Self {
            fingerprint_hash: Some(hash),
            embedding: None,
        }
    }

    pub fn face(embedding: Embedding) -> Self {
        Self {
            fingerprint_hash: None,
            embedding: Some(embedding),
        }
    }
}

/// Exact-first, similarity-second identity resolution.
///
/// A supplied fingerprint hash decides the request on its own: a miss is a
/// final "no match" and never falls through to the face scan.
pub struct IdentityResolver {
    templates: Arc<dyn TemplateStore>,
    exact: ExactMatcher,
    matcher: Arc<dyn SimilarityMatcher>,
    config: ResolverConfig,
}

impl IdentityResolver {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        matcher: Arc<dyn SimilarityMatcher>,
        config: ResolverConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            exact: ExactMatcher::new(templates.clone()),
            templates,
            matcher,
            config,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn resolve(&self, sample: &BiometricSample) -> Result<MatchResult> {
        match (&sample.fingerprint_hash, &sample.embedding) {
            (Some(hash), _) => self.resolve_by_fingerprint(hash),
            (None, Some(embedding)) => self.resolve_by_face(embedding),
            (None, None) => Err(Error::InvalidInput(
                "either a fingerprint hash or a face embedding is required".to_string(),
            )),
        }
    }

    pub fn resolve_by_fingerprint(&self, hash: &FingerprintHash) -> Result<MatchResult> {
        if hash.is_empty() {
            return Err(Error::InvalidInput("fingerprint hash is empty".to_string()));
        }

        let result = match self.exact.find_by_hash(hash)? {
            Some(subject_id) => MatchResult::exact(subject_id),
            None => MatchResult::no_match(Modality::Exact, None),
        };
        debug!(matched = result.is_match(), "fingerprint resolution finished");
        Ok(result)
    }

    pub fn resolve_by_face(&self, embedding: &Embedding) -> Result<MatchResult> {
        embedding.validate()?;

        let candidates = self.templates.all_embeddings()?;
        let result = self.matcher.find_best_match(
            embedding,
            &candidates,
            self.config.similarity_threshold,
        )?;

        debug!(
            matched = result.is_match(),
            similarity = result.similarity(),
            population = candidates.len(),
            "face resolution finished"
        );
        Ok(result)
    }

    /// Extract an embedding from raw image bytes, then run the face phase
    pub fn resolve_by_face_image(
        &self,
        extractor: &dyn EmbeddingExtractor,
        image: &[u8],
    ) -> Result<MatchResult> {
        if image.is_empty() {
            return Err(Error::InvalidInput("image is empty".to_string()));
        }
        let embedding = extractor.extract(image)?;
        self.resolve_by_face(&embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LinearScanMatcher, MemoryStore, SubjectId, TemplateUpdate};

    fn resolver(store: Arc<MemoryStore>) -> IdentityResolver {
        IdentityResolver::new(store, Arc::new(LinearScanMatcher), ResolverConfig::default()).unwrap()
    }

    fn enrolled_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert(
                &SubjectId::from("alice"),
                TemplateUpdate::default()
                    .with_embedding(Embedding::new(vec![1.0, 0.0, 0.0]))
                    .with_fingerprint_hash(FingerprintHash::new("a1a1")),
            )
            .unwrap();
        store
            .upsert(
                &SubjectId::from("bob"),
                TemplateUpdate::default().with_embedding(Embedding::new(vec![0.0, 1.0, 0.0])),
            )
            .unwrap();
        store
    }

    struct FixedExtractor(Embedding);

    impl EmbeddingExtractor for FixedExtractor {
        fn extract(&self, _image: &[u8]) -> Result<Embedding> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_fingerprint_hit() {
        let result = resolver(enrolled_store())
            .resolve_by_fingerprint(&FingerprintHash::new("a1a1"))
            .unwrap();
        assert!(result.is_match());
        assert_eq!(result.subject_id(), Some(&SubjectId::from("alice")));
        assert_eq!(result.modality(), Modality::Exact);
        assert_eq!(result.similarity(), None);
    }

    #[test]
    fn test_fingerprint_miss_never_falls_back_to_face() {
        let sample = BiometricSample {
            fingerprint_hash: Some(FingerprintHash::new("deadbeef")),
            embedding: Some(Embedding::new(vec![1.0, 0.0, 0.0])),
        };
        let result = resolver(enrolled_store()).resolve(&sample).unwrap();
        assert!(!result.is_match());
        assert_eq!(result.modality(), Modality::Exact);
    }

    #[test]
    fn test_face_match() {
        let result = resolver(enrolled_store())
            .resolve(&BiometricSample::face(Embedding::new(vec![0.05, 0.99, 0.0])))
            .unwrap();
        assert!(result.is_match());
        assert_eq!(result.subject_id(), Some(&SubjectId::from("bob")));
        assert_eq!(result.modality(), Modality::Similarity);
    }

    #[test]
    fn test_face_below_threshold() {
        let result = resolver(enrolled_store())
            .resolve_by_face(&Embedding::new(vec![1.0, 1.0, 0.0]))
            .unwrap();
        assert!(!result.is_match());
    }

    #[test]
    fn test_face_sees_fresh_enrollments() {
        let store = enrolled_store();
        let resolver = resolver(store.clone());
        let probe = Embedding::new(vec![0.0, 0.0, 1.0]);
        assert!(!resolver.resolve_by_face(&probe).unwrap().is_match());

        store
            .upsert(&SubjectId::from("carol"), TemplateUpdate::default().with_embedding(probe.clone()))
            .unwrap();
        let result = resolver.resolve_by_face(&probe).unwrap();
        assert_eq!(result.subject_id(), Some(&SubjectId::from("carol")));
    }

    #[test]
    fn test_empty_sample_is_invalid() {
        let err = resolver(enrolled_store())
            .resolve(&BiometricSample::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_non_finite_face_embedding_is_invalid() {
        let resolver = resolver(enrolled_store());
        let err = resolver
            .resolve_by_face(&Embedding::new(vec![f32::NAN, 1.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = resolver
            .resolve(&BiometricSample::face(Embedding::new(vec![f32::INFINITY, 0.0, 0.0])))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_custom_threshold() {
        let config = ResolverConfig { similarity_threshold: 0.5 };
        let resolver =
            IdentityResolver::new(enrolled_store(), Arc::new(LinearScanMatcher), config).unwrap();
        let result = resolver.resolve_by_face(&Embedding::new(vec![1.0, 1.0, 0.0])).unwrap();
        assert!(result.is_match());
        assert_eq!(result.subject_id(), Some(&SubjectId::from("alice")));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let config = ResolverConfig { similarity_threshold: 1.5 };
        let err = IdentityResolver::new(enrolled_store(), Arc::new(LinearScanMatcher), config)
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_resolve_from_image() {
        let extractor = FixedExtractor(Embedding::new(vec![1.0, 0.0, 0.0]));
        let result = resolver(enrolled_store())
            .resolve_by_face_image(&extractor, b"jpeg bytes")
            .unwrap();
        assert_eq!(result.subject_id(), Some(&SubjectId::from("alice")));
    }
}
