//! # VitalID Core
//!
//! Core library for VitalID: identifying a person from a face embedding or
//! a fingerprint hash, and allocating the public emergency identifier that
//! links them to their emergency profile.
//!
//! - [`Embedding`] - Face embedding with cosine similarity
//! - [`LinearScanMatcher`] - Best-candidate selection under a threshold
//! - [`ExactMatcher`] - Fingerprint hash lookup
//! - [`IdentityResolver`] - Fingerprint-first, face-second resolution
//! - [`IdentifierAllocator`] - Unique emergency identifiers with bounded retries
//! - [`MemoryStore`] - In-memory [`TemplateStore`] and [`SubjectStore`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vitalid_core::{
//!     BiometricSample, Embedding, IdentifierAllocator, IdentityResolver, LinearScanMatcher,
//!     MemoryStore, ResolverConfig, RetryPolicy, SubjectId, TemplateStore, TemplateUpdate,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! let subject = SubjectId::from("user-1");
//! store
//!     .upsert(&subject, TemplateUpdate::default().with_embedding(Embedding::new(vec![1.0, 0.0, 0.0])))
//!     .unwrap();
//!
//! let resolver = IdentityResolver::new(store.clone(), Arc::new(LinearScanMatcher), ResolverConfig::default()).unwrap();
//! let result = resolver
//!     .resolve(&BiometricSample::face(Embedding::new(vec![0.98, 0.05, 0.0])))
//!     .unwrap();
//! assert_eq!(result.subject_id(), Some(&subject));
//!
//! let allocator = IdentifierAllocator::new(store, RetryPolicy::default()).unwrap();
//! let emergency_id = allocator.ensure_identifier(&subject).unwrap();
//! assert_eq!(allocator.ensure_identifier(&subject).unwrap(), emergency_id);
//! ```

pub mod error;
pub mod vector;
pub mod template;
pub mod store;
pub mod memory;
pub mod matcher;
pub mod exact;
pub mod extractor;
pub mod resolver;
pub mod enroll;
pub mod allocator;

pub use error::{Error, Result};
pub use vector::Embedding;
pub use template::{BiometricTemplate, EmergencyId, FingerprintHash, SubjectId, TemplateUpdate};
pub use store::{SetOutcome, SubjectStore, TemplateStore};
pub use memory::MemoryStore;
pub use matcher::{LinearScanMatcher, MatchResult, Modality, SimilarityMatcher};
pub use exact::ExactMatcher;
pub use extractor::EmbeddingExtractor;
pub use resolver::{BiometricSample, IdentityResolver, ResolverConfig, DEFAULT_SIMILARITY_THRESHOLD};
pub use enroll::{Enroller, EnrollmentRequest};
pub use allocator::{
    IdGenerator, IdentifierAllocator, RetryPolicy, Sleeper, ThreadSleeper, UuidGenerator,
    DEFAULT_BACKOFF_UNIT, DEFAULT_MAX_ALLOCATION_ATTEMPTS, DEFAULT_MAX_SAVE_ATTEMPTS,
};
