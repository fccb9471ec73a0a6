//! Error types for grapnel.
//!
//! Nothing in the dispatch engine swallows or converts a failure: hook
//! errors, validation failures, and commit failures all surface verbatim to
//! the caller of the save operation. Retries are the caller's business.

/// Top-level error type for a save cycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Commit error: {0}")]
    Commit(#[from] CommitError),

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),
}

/// A per-entity validation failure reported by the backing store.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{entity} failed validation: {reason}")]
pub struct ValidationError {
    /// Type name of the offending entity.
    pub entity: &'static str,
    /// What the check objected to.
    pub reason: String,
}

impl ValidationError {
    /// Build a failure for an entity of type `E`.
    pub fn new<E>(reason: impl Into<String>) -> Self {
        Self {
            entity: std::any::type_name::<E>(),
            reason: reason.into(),
        }
    }
}

/// Failures raised by the backing store's commit.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("backing store error: {0}")]
    Store(String),
}

/// Failures raised inside a hook's own logic.
///
/// The first hook error aborts the running phase and the whole save cycle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HookError {
    #[error("hook execution failed: {reason}")]
    Failed { reason: String },
}

impl HookError {
    /// Shorthand for [`HookError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        HookError::Failed {
            reason: reason.into(),
        }
    }
}

/// Result type alias for save cycles.
pub type Result<T> = std::result::Result<T, Error>;
