#![forbid(unsafe_code)]

//! Unified error model.
//!
//! Each crate keeps its own typed error so callers can match on what
//! matters. [`Error`] wraps all of them for applications that just want to
//! propagate with `?`, and classifies them along the lines below.
//!
//! | class         | examples                                               |
//! |---------------|--------------------------------------------------------|
//! | configuration | cyclic action graph, zero-capacity semaphore, ambient release on a multi-permit semaphore, invalid config file |
//! | usage         | foreign actions or bindings, payload type mismatch      |
//! | handler       | failures raised by an action core or a command effect  |

use lmenu_actions::ActionError;
use lmenu_runtime::{CommandError, SemaphoreError};

use crate::config::ConfigError;

/// Top-level error type for LaunchMenu applications.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Semaphore(#[from] SemaphoreError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Error type label for metrics and tracing.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Action(_) => "action",
            Self::Semaphore(_) => "semaphore",
            Self::Command(_) => "command",
            Self::Config(_) => "config",
        }
    }

    /// Whether the error stems from misconfiguration rather than from a
    /// handler failing at runtime.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Action(err) => err.is_configuration(),
            Self::Semaphore(err) => err.is_configuration(),
            Self::Command(CommandError::Semaphore(err)) => err.is_configuration(),
            Self::Command(_) => false,
            Self::Config(_) => true,
        }
    }
}

/// Standard result type for lmenu APIs.
pub type Result<T> = std::result::Result<T, Error>;
