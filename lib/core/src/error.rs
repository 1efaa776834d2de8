use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store integrity violation: fingerprint hash is owned by {owners} subjects")]
    StoreIntegrityViolation { owners: usize },

    #[error("Emergency identifier allocation exhausted for subject {subject_id} after {attempts} attempts")]
    AllocationExhausted { subject_id: String, attempts: u32 },

    #[error("Persisting emergency identifier for subject {subject_id} failed after {attempts} attempts: {reason}")]
    PersistenceExhausted {
        subject_id: String,
        attempts: u32,
        reason: String,
    },

    #[error("Storage error during {operation}{}: {message}", storage_context(.subject, .attempt))]
    Storage {
        operation: &'static str,
        subject: Option<String>,
        attempt: Option<u32>,
        message: String,
    },

    #[error("Embedding extraction failed: {0}")]
    Extraction(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn storage(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Storage {
            operation,
            subject: None,
            attempt: None,
            message: err.to_string(),
        }
    }

    /// Attach the subject and attempt number to a storage failure.
    /// Other variants pass through unchanged.
    #[must_use]
    pub fn with_context(self, subject: impl std::fmt::Display, attempt: Option<u32>) -> Self {
        match self {
            Error::Storage {
                operation,
                subject: existing,
                attempt: prior,
                message,
            } => Error::Storage {
                operation,
                subject: existing.or_else(|| Some(subject.to_string())),
                attempt: prior.or(attempt),
                message,
            },
            other => other,
        }
    }

    /// Whether the caller may retry the same request at a later time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::AllocationExhausted { .. }
                | Error::PersistenceExhausted { .. }
                | Error::Storage { .. }
                | Error::Extraction(_)
        )
    }
}

fn storage_context(subject: &Option<String>, attempt: &Option<u32>) -> String {
    match (subject, attempt) {
        (Some(s), Some(a)) => format!(" for subject {} (attempt {})", s, a),
        (Some(s), None) => format!(" for subject {}", s),
        (None, Some(a)) => format!(" (attempt {})", a),
        (None, None) => String::new(),
    }
}
