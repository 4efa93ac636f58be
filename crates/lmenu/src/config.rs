#![forbid(unsafe_code)]

//! Policy-as-data configuration for the engine runtime.
//!
//! Captures the tunables of the undo history and command execution as one
//! [`EngineConfig`] that can be loaded from TOML or JSON at startup.
//!
//! # Loading
//!
//! ```toml
//! # lmenu.toml
//! [history]
//! max_depth = 250
//! batch_window_ms = 800
//!
//! [execution]
//! max_concurrency = 4
//! ```
//!
//! ```rust,ignore
//! let config = EngineConfig::from_toml_file("lmenu.toml")?;
//! let history = config.build_facility()?;
//! ```
//!
//! Missing sections and keys fall back to their defaults, so partial files
//! only override what they name.

#[cfg(feature = "config")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use lmenu_runtime::{BatchDecision, Command, HistoryConfig, Semaphore, UndoRedoFacility};

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    /// Undo history limits and batching.
    pub history: HistoryPolicyConfig,

    /// Command execution limits.
    pub execution: ExecutionPolicyConfig,
}

/// Undo history parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct HistoryPolicyConfig {
    /// Maximum number of undo steps kept.
    pub max_depth: usize,
    /// Commands sharing a batch id within this many milliseconds merge into
    /// one undo step.
    pub batch_window_ms: u64,
}

impl Default for HistoryPolicyConfig {
    fn default() -> Self {
        Self {
            max_depth: HistoryConfig::default().max_depth,
            batch_window_ms: 500,
        }
    }
}

/// Command execution parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ExecutionPolicyConfig {
    /// Number of commands allowed to run at once outside the undo history.
    pub max_concurrency: usize,
}

impl Default for ExecutionPolicyConfig {
    fn default() -> Self {
        Self { max_concurrency: 1 }
    }
}

impl EngineConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Serialize as pretty TOML.
    #[cfg(feature = "config")]
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::TomlSerialize)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.history.max_depth == 0 {
            errors.push("history.max_depth must be > 0".into());
        }

        if self.execution.max_concurrency == 0 {
            errors.push("execution.max_concurrency must be > 0".into());
        }

        errors
    }

    /// Fail with every validation error at once.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    #[must_use]
    pub fn to_history_config(&self) -> HistoryConfig {
        HistoryConfig::new(self.history.max_depth)
    }

    #[must_use]
    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.history.batch_window_ms)
    }

    /// Time-window batch policy for
    /// [`UndoRedoFacility::execute_batched`].
    pub fn batch_policy(&self) -> impl Fn(&Command, &Command) -> BatchDecision + Clone {
        lmenu_runtime::time_window_batch(self.batch_window())
    }

    /// Semaphore bounding concurrent command execution.
    pub fn build_semaphore(&self) -> Result<Semaphore, ConfigError> {
        Semaphore::new(self.execution.max_concurrency)
            .map_err(|err| ConfigError::Validation(vec![err.to_string()]))
    }

    /// Undo history configured by this policy.
    pub fn build_facility(&self) -> Result<UndoRedoFacility, ConfigError> {
        let config = self.clone().validated()?;
        tracing::debug!(
            max_depth = config.history.max_depth,
            batch_window_ms = config.history.batch_window_ms,
            "building undo history"
        );
        Ok(UndoRedoFacility::new(config.to_history_config()))
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading an engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "config")]
    #[error("TOML parse error: {0}")]
    Toml(toml::de::Error),

    #[cfg(feature = "config")]
    #[error("TOML serialize error: {0}")]
    TomlSerialize(toml::ser::Error),

    #[cfg(feature = "config")]
    #[error("JSON parse error: {0}")]
    Json(serde_json::Error),

    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}
