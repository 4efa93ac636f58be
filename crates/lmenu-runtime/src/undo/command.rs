#![forbid(unsafe_code)]

//! Reversible commands.
//!
//! A [`Command`] pairs a [`CommandEffect`] (what to do, and how to take it
//! back) with [`CommandMetadata`] and a reactive [`CommandState`]. Effects
//! may be asynchronous, e.g. to wait for a user confirmation.
//!
//! # Invariants
//!
//! - `execute()` followed by `revert()` restores the prior state exactly.
//! - `execute()` on an executed command and `revert()` on a ready command
//!   are no-ops, so execute/revert cycles can repeat indefinitely.
//! - A failing effect leaves the command in the state it started in.
//!
//! # Failure Modes
//!
//! - **Overlapping calls**: executing a command whose revert is still in
//!   flight (or vice versa) fails with [`CommandError::InvalidState`].
//!   The undo history serializes its own calls, so this only happens when
//!   commands are driven by hand.
//! - **Dropped futures**: cancelling an in-flight `execute()`/`revert()`
//!   restores the state it started in; the effect itself may have been
//!   partially applied.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use lmenu_reactive::{Field, Hook};
use tracing::warn;
use web_time::Instant;

use super::compound::CompoundCommand;
use crate::error::{CommandError, CommandResult};

/// Source of a command: who or what triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandSource {
    /// Direct user action (keyboard, mouse).
    #[default]
    User,
    /// Triggered programmatically by application code.
    Programmatic,
    /// Replayed from a recorded macro.
    Macro,
    /// Triggered by an external system.
    External,
}

/// Metadata attached to every command for tracing and display.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    /// Human-readable name, e.g. "Rename file".
    pub name: String,
    /// When the command was created.
    pub timestamp: Instant,
    pub source: CommandSource,
    /// Commands sharing a batch id may be merged into one history entry.
    pub batch_id: Option<u64>,
}

impl CommandMetadata {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: Instant::now(),
            source: CommandSource::User,
            batch_id: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: CommandSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_batch(mut self, batch_id: u64) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    /// Override the creation time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Instant) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl Default for CommandMetadata {
    fn default() -> Self {
        Self::new("Unknown")
    }
}

/// Lifecycle state of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandState {
    /// Not applied; `execute()` applies it.
    #[default]
    Ready,
    Executing,
    /// Applied; `revert()` takes it back.
    Executed,
    Reverting,
}

/// The reversible effect behind a [`Command`].
#[async_trait(?Send)]
pub trait CommandEffect {
    /// Apply the effect.
    async fn on_execute(&self) -> CommandResult;

    /// Take the effect back.
    async fn on_revert(&self) -> CommandResult;

    /// Downcast hook used when merging history entries.
    fn as_compound(&self) -> Option<&CompoundCommand> {
        None
    }

    fn debug_name(&self) -> &'static str {
        "CommandEffect"
    }
}

struct CommandInner {
    metadata: CommandMetadata,
    effect: Box<dyn CommandEffect>,
    state: Field<CommandState>,
}

/// Shared handle to a reversible command.
///
/// Clones refer to the same command; equality is identity.
#[derive(Clone)]
pub struct Command {
    inner: Rc<CommandInner>,
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Command {}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.inner.effect.debug_name())
            .field("name", &self.inner.metadata.name)
            .field("state", &self.state(None))
            .finish()
    }
}

/// Restores a command's state unless disarmed.
struct StateGuard<'a> {
    state: &'a Field<CommandState>,
    restore: CommandState,
    armed: bool,
}

impl StateGuard<'_> {
    fn finish(mut self, state: CommandState) {
        self.armed = false;
        self.state.set(state);
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.set(self.restore);
        }
    }
}

impl Command {
    /// A new, not yet executed command.
    pub fn new(metadata: CommandMetadata, effect: impl CommandEffect + 'static) -> Self {
        Self::with_state(metadata, Box::new(effect), CommandState::Ready)
    }

    /// A command whose effect has already been applied.
    pub(crate) fn executed(metadata: CommandMetadata, effect: impl CommandEffect + 'static) -> Self {
        Self::with_state(metadata, Box::new(effect), CommandState::Executed)
    }

    fn with_state(
        metadata: CommandMetadata,
        effect: Box<dyn CommandEffect>,
        state: CommandState,
    ) -> Self {
        Self {
            inner: Rc::new(CommandInner {
                metadata,
                effect,
                state: Field::new(state),
            }),
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &CommandMetadata {
        &self.inner.metadata
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.metadata.name
    }

    /// Current lifecycle state, subscribing `hook` to changes.
    #[must_use]
    pub fn state(&self, hook: Option<&Hook>) -> CommandState {
        self.inner.state.get(hook)
    }

    #[must_use]
    pub fn is_executed(&self, hook: Option<&Hook>) -> bool {
        self.state(hook) == CommandState::Executed
    }

    /// The compound effect, if this command groups others.
    #[must_use]
    pub fn as_compound(&self) -> Option<&CompoundCommand> {
        self.inner.effect.as_compound()
    }

    /// Apply the command. A no-op if it is already executed.
    ///
    /// # Errors
    ///
    /// Propagates the effect's error, or [`CommandError::InvalidState`] when
    /// a revert is in flight.
    pub async fn execute(&self) -> CommandResult {
        let guard = match self.enter(CommandState::Executed, CommandState::Executing)? {
            Some(guard) => guard,
            None => return Ok(()),
        };
        match self.inner.effect.on_execute().await {
            Ok(()) => {
                guard.finish(CommandState::Executed);
                Ok(())
            }
            Err(err) => {
                warn!(command = %self.name(), error = %err, "command execute failed");
                Err(err)
            }
        }
    }

    /// Take the command back. A no-op if it is not executed.
    ///
    /// # Errors
    ///
    /// Propagates the effect's error, or [`CommandError::InvalidState`] when
    /// an execute is in flight.
    pub async fn revert(&self) -> CommandResult {
        let guard = match self.enter(CommandState::Ready, CommandState::Reverting)? {
            Some(guard) => guard,
            None => return Ok(()),
        };
        match self.inner.effect.on_revert().await {
            Ok(()) => {
                guard.finish(CommandState::Ready);
                Ok(())
            }
            Err(err) => {
                warn!(command = %self.name(), error = %err, "command revert failed");
                Err(err)
            }
        }
    }

    /// Move into `transient` unless the command already is in `target`.
    fn enter(
        &self,
        target: CommandState,
        transient: CommandState,
    ) -> CommandResult<Option<StateGuard<'_>>> {
        let current = self.state(None);
        if current == target {
            return Ok(None);
        }
        if matches!(current, CommandState::Executing | CommandState::Reverting) {
            return Err(CommandError::InvalidState(format!(
                "command `{}` is {current:?}",
                self.name()
            )));
        }
        self.inner.state.set(transient);
        Ok(Some(StateGuard {
            state: &self.inner.state,
            restore: current,
            armed: true,
        }))
    }
}

type Callback = Box<dyn Fn() -> CommandResult>;

/// Effect built from a pair of synchronous closures.
pub struct CallbackCommand {
    execute: Callback,
    revert: Callback,
}

impl CallbackCommand {
    pub fn new(
        execute: impl Fn() -> CommandResult + 'static,
        revert: impl Fn() -> CommandResult + 'static,
    ) -> Self {
        Self {
            execute: Box::new(execute),
            revert: Box::new(revert),
        }
    }

    /// Wrap into a [`Command`] named `name`.
    pub fn into_command(self, name: impl Into<String>) -> Command {
        Command::new(CommandMetadata::new(name), self)
    }
}

impl fmt::Debug for CallbackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackCommand").finish_non_exhaustive()
    }
}

#[async_trait(?Send)]
impl CommandEffect for CallbackCommand {
    async fn on_execute(&self) -> CommandResult {
        (self.execute)()
    }

    async fn on_revert(&self) -> CommandResult {
        (self.revert)()
    }

    fn debug_name(&self) -> &'static str {
        "CallbackCommand"
    }
}

/// Effect that writes a value into a [`Field`] and restores the previous
/// value on revert.
pub struct SetFieldCommand<T> {
    field: Field<T>,
    value: T,
    previous: RefCell<Option<T>>,
}

impl<T: Clone + PartialEq + 'static> SetFieldCommand<T> {
    pub fn new(field: &Field<T>, value: T) -> Self {
        Self {
            field: field.clone(),
            value,
            previous: RefCell::new(None),
        }
    }

    /// Wrap into a [`Command`] named `name`.
    pub fn into_command(self, name: impl Into<String>) -> Command {
        Command::new(CommandMetadata::new(name), self)
    }
}

impl<T: fmt::Debug> fmt::Debug for SetFieldCommand<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetFieldCommand")
            .field("value", &self.value)
            .field("previous", &self.previous.borrow())
            .finish()
    }
}

#[async_trait(?Send)]
impl<T: Clone + PartialEq + 'static> CommandEffect for SetFieldCommand<T> {
    async fn on_execute(&self) -> CommandResult {
        *self.previous.borrow_mut() = Some(self.field.get(None));
        self.field.set(self.value.clone());
        Ok(())
    }

    async fn on_revert(&self) -> CommandResult {
        let previous = self.previous.borrow_mut().take().ok_or_else(|| {
            CommandError::InvalidState("no previous value to restore".to_string())
        })?;
        self.field.set(previous);
        Ok(())
    }

    fn debug_name(&self) -> &'static str {
        "SetFieldCommand"
    }
}
