use crate::{Embedding, Error, Result, SubjectId};
use serde::{Deserialize, Serialize};

/// Which evidence produced a [`MatchResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Exact,
    Similarity,
}

/// Outcome of a resolution. Immutable once built.
///
/// Carries everything a trusted caller needs; untrusted callers redact
/// before disclosure. On a similarity miss `similarity` still holds the
/// best score seen (if any candidate was comparable) but no subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject_id: Option<SubjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    similarity: Option<f32>,
    modality: Modality,
}

impl MatchResult {
    pub fn exact(subject_id: SubjectId) -> Self {
        Self {
            matched: true,
            subject_id: Some(subject_id),
            similarity: None,
            modality: Modality::Exact,
        }
    }

    pub fn similar(subject_id: SubjectId, similarity: f32) -> Self {
        Self {
            matched: true,
            subject_id: Some(subject_id),
            similarity: Some(similarity),
            modality: Modality::Similarity,
        }
    }

    pub fn no_match(modality: Modality, best_similarity: Option<f32>) -> Self {
        Self {
            matched: false,
            subject_id: None,
            similarity: best_similarity,
            modality,
        }
    }

    #[inline]
    pub fn is_match(&self) -> bool {
        self.matched
    }

    #[inline]
    pub fn subject_id(&self) -> Option<&SubjectId> {
        self.subject_id.as_ref()
    }

    #[inline]
    pub fn similarity(&self) -> Option<f32> {
        self.similarity
    }

    #[inline]
    pub fn modality(&self) -> Modality {
        self.modality
    }
}

/// Picks the best-matching subject for a query embedding.
///
/// Implementations must be deterministic for a given candidate order: on
/// equal scores the earlier candidate wins.
pub trait SimilarityMatcher: Send + Sync {
    fn find_best_match(
        &self,
        query: &Embedding,
        candidates: &[(SubjectId, Embedding)],
        threshold: f32,
    ) -> Result<MatchResult>;
}

/// Exhaustive cosine scan, O(N·D) per query.
///
/// Fine below roughly ten thousand templates. Larger populations need an
/// ANN index behind the same trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScanMatcher;

impl LinearScanMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl SimilarityMatcher for LinearScanMatcher {
    fn find_best_match(
        &self,
        query: &Embedding,
        candidates: &[(SubjectId, Embedding)],
        threshold: f32,
    ) -> Result<MatchResult> {
        if query.is_empty() {
            return Err(Error::InvalidInput("query embedding is empty".to_string()));
        }

        let mut best: Option<(&SubjectId, f32)> = None;
        let mut skipped = 0usize;
        let mut unscorable = 0usize;

        for (subject_id, embedding) in candidates {
            if embedding.dim() != query.dim() {
                skipped += 1;
                continue;
            }

            let score = query.cosine_similarity(embedding);
            if score.is_nan() {
                unscorable += 1;
                continue;
            }
            // strict > keeps the first-encountered candidate on ties
            let replace = match best {
                None => true,
                Some((_, best_score)) => score > best_score,
            };
            if replace {
                best = Some((subject_id, score));
            }
        }

        if skipped > 0 {
            tracing::debug!(
                skipped,
                query_dim = query.dim(),
                "excluded candidates with mismatched embedding dimension"
            );
        }
        if unscorable > 0 {
            tracing::warn!(unscorable, "excluded candidates with non-finite similarity");
        }

        Ok(match best {
            Some((subject_id, score)) if score >= threshold => {
                MatchResult::similar(subject_id.clone(), score)
            }
            Some((_, score)) => MatchResult::no_match(Modality::Similarity, Some(score)),
            None => MatchResult::no_match(Modality::Similarity, None),
        })
    }
}
