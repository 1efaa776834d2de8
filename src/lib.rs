//! # VitalID
//!
//! Identify a person from a face embedding or a fingerprint hash without a
//! prior login, and resolve them to an emergency medical profile through a
//! stable public emergency identifier.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! vitalid --data-dir ./data --http-port 6380 --face-service-url http://127.0.0.1:8000
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vitalid::prelude::*;
//!
//! let store = Arc::new(LmdbStore::open("./data/lmdb").unwrap());
//! let resolver = IdentityResolver::new(
//!     store.clone(),
//!     Arc::new(LinearScanMatcher),
//!     ResolverConfig::default(),
//! )
//! .unwrap();
//!
//! let result = resolver
//!     .resolve_by_fingerprint(&FingerprintHash::new("9f86d081884c7d65"))
//!     .unwrap();
//!
//! if let Some(subject) = result.subject_id() {
//!     let allocator = IdentifierAllocator::new(store, RetryPolicy::default()).unwrap();
//!     let emergency_id = allocator.ensure_identifier(subject).unwrap();
//!     println!("emergency profile: {}", emergency_id);
//! }
//! ```
//!
//! ## Crate Structure
//!
//! - `vitalid-core` - Data model, similarity matching, resolution, identifier allocation
//! - `vitalid-storage` - LMDB persistence
//! - `vitalid-api` - REST API and the HTTP face embedding client

// Re-export core types
pub use vitalid_core::{
    BiometricSample, BiometricTemplate, Embedding, EmergencyId, FingerprintHash, SubjectId,
    TemplateUpdate,
    ExactMatcher, LinearScanMatcher, MatchResult, Modality, SimilarityMatcher,
    IdentityResolver, ResolverConfig,
    IdentifierAllocator, RetryPolicy, Sleeper, IdGenerator,
    Enroller, EnrollmentRequest, EmbeddingExtractor,
    MemoryStore, SetOutcome, SubjectStore, TemplateStore,
    Error, Result,
};

// Re-export storage
pub use vitalid_storage::LmdbStore;

// Re-export API
pub use vitalid_api::{AppState, HttpEmbeddingExtractor, RestApi};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BiometricSample, Embedding, EmergencyId, FingerprintHash, SubjectId, TemplateUpdate,
        LinearScanMatcher, MatchResult, Modality,
        IdentityResolver, ResolverConfig,
        IdentifierAllocator, RetryPolicy,
        Enroller, EnrollmentRequest,
        MemoryStore, SubjectStore, TemplateStore,
        Error, Result,
        LmdbStore,
    };
}
