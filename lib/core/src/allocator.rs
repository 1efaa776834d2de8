use crate::{EmergencyId, Error, Result, SetOutcome, SubjectId, SubjectStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_ALLOCATION_ATTEMPTS: u32 = 10;
pub const DEFAULT_MAX_SAVE_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_millis(100);

/// Bounded retry budgets for identifier allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Fresh candidates drawn before giving up on collisions
    pub max_allocation_attempts: u32,
    /// Saves of one candidate before giving up on persistence
    pub max_save_attempts: u32,
    /// Delay before save retry `n` is `n * backoff_unit`
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_allocation_attempts: DEFAULT_MAX_ALLOCATION_ATTEMPTS,
            max_save_attempts: DEFAULT_MAX_SAVE_ATTEMPTS,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_allocation_attempts == 0 {
            return Err(Error::InvalidConfig(
                "max_allocation_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_save_attempts == 0 {
            return Err(Error::InvalidConfig(
                "max_save_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

/// Blocking delay between save retries; swapped out in tests
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Source of candidate emergency identifiers
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> EmergencyId;
}

/// Random UUID v4 candidates
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> EmergencyId {
        EmergencyId::random()
    }
}

/// Lazily assigns each subject one globally unique emergency identifier.
///
/// Holds no state between calls. Correctness under concurrent calls rests
/// entirely on the store's atomic `try_set_emergency_id`.
pub struct IdentifierAllocator {
    subjects: Arc<dyn SubjectStore>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    generator: Arc<dyn IdGenerator>,
}

impl IdentifierAllocator {
    pub fn new(subjects: Arc<dyn SubjectStore>, policy: RetryPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            subjects,
            policy,
            sleeper: Arc::new(ThreadSleeper),
            generator: Arc::new(UuidGenerator),
        })
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Return the subject's emergency identifier, allocating one if needed
    pub fn ensure_identifier(&self, subject: &SubjectId) -> Result<EmergencyId> {
        if let Some(existing) = self
            .subjects
            .emergency_id(subject)
            .map_err(|e| e.with_context(subject, None))?
        {
            return Ok(existing);
        }

        for attempt in 1..=self.policy.max_allocation_attempts {
            let candidate = self.generator.generate();

            let taken = self
                .subjects
                .subject_by_emergency_id(&candidate)
                .map_err(|e| e.with_context(subject, Some(attempt)))?;
            if taken.is_some() {
                warn!(subject = %subject, attempt, "emergency id candidate already taken, regenerating");
                continue;
            }

            let (outcome, saves) = self.save_with_retry(subject, &candidate)?;
            match outcome {
                SetOutcome::Committed => {
                    self.verify_read_back(subject, &candidate, saves)?;
                    info!(subject = %subject, attempt, "emergency id allocated");
                    return Ok(candidate);
                }
                SetOutcome::UniquenessViolation => {
                    // a concurrent caller may have committed for this subject
                    let existing = self
                        .subjects
                        .emergency_id(subject)
                        .map_err(|e| e.with_context(subject, Some(attempt)))?;
                    if let Some(existing) = existing {
                        debug!(subject = %subject, "concurrent allocation already committed");
                        return Ok(existing);
                    }
                    warn!(subject = %subject, attempt, "uniqueness violation on save, regenerating");
                }
            }
        }

        error!(
            subject = %subject,
            attempts = self.policy.max_allocation_attempts,
            "emergency id allocation exhausted"
        );
        Err(Error::AllocationExhausted {
            subject_id: subject.to_string(),
            attempts: self.policy.max_allocation_attempts,
        })
    }

    /// Subject owning a public emergency identifier
    pub fn lookup(&self, id: &EmergencyId) -> Result<Option<SubjectId>> {
        self.subjects.subject_by_emergency_id(id)
    }

    fn save_with_retry(&self, subject: &SubjectId, candidate: &EmergencyId) -> Result<(SetOutcome, u32)> {
        let mut last_error = None;

        for attempt in 1..=self.policy.max_save_attempts {
            match self.subjects.try_set_emergency_id(subject, candidate) {
                Ok(outcome) => return Ok((outcome, attempt)),
                Err(e) => {
                    let e = e.with_context(subject, Some(attempt));
                    warn!(subject = %subject, attempt, error = %e, "saving emergency id failed");
                    last_error = Some(e);
                    if attempt < self.policy.max_save_attempts {
                        self.sleeper.sleep(self.policy.backoff(attempt));
                    }
                }
            }
        }

        error!(
            subject = %subject,
            attempts = self.policy.max_save_attempts,
            "emergency id save retries exhausted"
        );
        Err(Error::PersistenceExhausted {
            subject_id: subject.to_string(),
            attempts: self.policy.max_save_attempts,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no save attempted".to_string()),
        })
    }

    fn verify_read_back(&self, subject: &SubjectId, candidate: &EmergencyId, saves: u32) -> Result<()> {
        let owner = self
            .subjects
            .subject_by_emergency_id(candidate)
            .map_err(|e| e.with_context(subject, Some(saves)))?;
        match owner {
            Some(owner) if &owner == subject => Ok(()),
            _ => {
                error!(subject = %subject, "emergency id missing on read-back after save");
                Err(Error::PersistenceExhausted {
                    subject_id: subject.to_string(),
                    attempts: saves,
                    reason: "saved identifier was not retrievable on read-back".to_string(),
                })
            }
        }
    }
}
