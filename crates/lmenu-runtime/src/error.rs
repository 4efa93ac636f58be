#![forbid(unsafe_code)]

//! Error types for the semaphore and the command history.

/// Errors raised by [`Semaphore`](crate::Semaphore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemaphoreError {
    /// The semaphore was constructed without permits.
    #[error("semaphore capacity must be between 1 and the supported maximum, got {capacity}")]
    InvalidCapacity { capacity: usize },

    /// The ambient `release()` was used on a semaphore with several permits.
    #[error("ambient release requires capacity 1, semaphore has {capacity}; use the handle returned by acquire")]
    AmbiguousRelease { capacity: usize },

    /// The semaphore was closed while waiting.
    #[error("semaphore closed")]
    Closed,
}

impl SemaphoreError {
    /// Whether this error stems from misconfiguration rather than runtime
    /// conditions.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidCapacity { .. } | Self::AmbiguousRelease { .. }
        )
    }
}

/// Result alias for semaphore operations.
pub type SemaphoreResult<T> = Result<T, SemaphoreError>;

/// Errors raised while executing or reverting commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The command is in a state that does not allow the operation, e.g.
    /// executing while its revert is still in flight.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The serializing semaphore failed.
    #[error(transparent)]
    Semaphore(#[from] SemaphoreError),

    /// Failure reported by a command effect.
    #[error("{0}")]
    Other(String),
}

impl CommandError {
    /// Failure reported by a command effect.
    pub fn other(message: impl std::fmt::Display) -> Self {
        Self::Other(message.to_string())
    }
}

/// Result alias for command operations.
pub type CommandResult<T = ()> = Result<T, CommandError>;
