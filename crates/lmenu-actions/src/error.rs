#![forbid(unsafe_code)]

//! Error model for action definition and resolution.
//!
//! Configuration errors (`Cycle`, `AlreadyDefined`, `ForeignGraph`) surface
//! when the graph is built. Resolution errors surface from `Action::get` and
//! friends. `EmptyInvocation` signals an engine bug rather than misuse.
//! Handler errors are returned by action cores and propagate unchanged, with
//! the failing action's name filled in.

/// Errors raised while defining or resolving actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// Defining the action would close a loop in the parent graph.
    #[error("action `{action}` would become its own ancestor through parent `{via}`")]
    Cycle { action: String, via: String },

    /// `define` was called twice for the same declaration.
    #[error("action `{0}` is already defined")]
    AlreadyDefined(String),

    /// The action was declared but never given a definition.
    #[error("action `{0}` was declared but never defined")]
    Undefined(String),

    /// A core produced a child binding for an action that is not one of its
    /// ancestors.
    #[error("action `{action}` produced a child binding for `{target}`, which is not an ancestor")]
    InvalidChild { action: String, target: String },

    /// A child binding was attributed to an input index that does not exist.
    #[error("action `{action}` attributed a child to input {index}, but received {inputs} inputs")]
    ChildIndexOutOfRange {
        action: String,
        index: usize,
        inputs: usize,
    },

    /// A binding payload (or core result) is not of the expected type.
    #[error("action `{action}` expected a `{expected}` value")]
    PayloadType {
        action: String,
        expected: &'static str,
    },

    /// An action or binding from another graph was mixed into this one.
    #[error("action `{0}` refers to an action from a different graph")]
    ForeignGraph(String),

    /// An intermediate action was about to run without any bindings.
    #[error("intermediate action `{0}` was invoked without bindings")]
    EmptyInvocation(String),

    /// An action core reported a failure.
    #[error("action `{action}` failed: {message}")]
    Handler { action: String, message: String },
}

impl ActionError {
    /// Failure raised from inside an action core.
    ///
    /// The action name is filled in by the engine when the error propagates.
    pub fn handler(message: impl std::fmt::Display) -> Self {
        Self::Handler {
            action: String::new(),
            message: message.to_string(),
        }
    }

    /// Attach `name` to errors that were raised without an action context.
    #[must_use]
    pub(crate) fn in_action(self, name: &str) -> Self {
        match self {
            Self::Handler { action, message } if action.is_empty() => Self::Handler {
                action: name.to_string(),
                message,
            },
            Self::PayloadType { action, expected } if action.is_empty() => Self::PayloadType {
                action: name.to_string(),
                expected,
            },
            other => other,
        }
    }

    /// Whether this error stems from building the action graph.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Cycle { .. } | Self::AlreadyDefined(_) | Self::ForeignGraph(_)
        )
    }
}

/// Result alias for action operations.
pub type ActionResult<T> = Result<T, ActionError>;
