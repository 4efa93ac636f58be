#![forbid(unsafe_code)]

//! Linear undo/redo history.
//!
//! [`UndoRedoFacility`] keeps two stacks of executed commands:
//!
//! - **past**: commands that `undo()` can revert (newest at the back)
//! - **future**: commands that `redo()` can re-execute (next redo at the back)
//!
//! ```text
//! execute(c4)
//! ┌──────────────────────────────────┐
//! │ past:   [c1, c2, c3, c4]         │
//! │ future: []                       │
//! └──────────────────────────────────┘
//!
//! undo() x2
//! ┌──────────────────────────────────┐
//! │ past:   [c1, c2]                 │
//! │ future: [c4, c3]                 │
//! └──────────────────────────────────┘
//!
//! execute(c5)  <-- new branch, clears future
//! ┌──────────────────────────────────┐
//! │ past:   [c1, c2, c5]             │
//! │ future: []                       │
//! └──────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. `past.len() <= config.max_depth` after every operation.
//! 2. The future stack is cleared whenever a new command is recorded.
//! 3. At most one execute/undo/redo runs at a time; later calls queue in
//!    FIFO order behind a capacity-1 [`Semaphore`].
//! 4. A command whose effect fails is not moved between stacks.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use lmenu_reactive::{Field, Hook};
use tracing::{Instrument, debug, info_span};

use super::command::{Command, CommandMetadata};
use super::compound::CompoundCommand;
use crate::error::CommandResult;
use crate::semaphore::Semaphore;

/// Configuration for the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of entries kept for undo. Oldest entries are evicted.
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}

impl HistoryConfig {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// No depth limit.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_depth: usize::MAX,
        }
    }
}

/// How a freshly executed command is recorded relative to the previous
/// history entry.
#[derive(Debug, Clone)]
pub enum BatchDecision {
    /// Record as its own undo step.
    Separate,
    /// Merge into the previous entry. A previous entry that is not yet a
    /// compound is wrapped together with the new command, keeping the
    /// previous entry's metadata.
    Merge,
    /// Like [`Merge`](Self::Merge), but a newly created wrapper is
    /// described by the given metadata.
    MergeWith(CommandMetadata),
}

/// Batch policy merging commands that share a batch id and follow each
/// other within `window`.
///
/// For a compound previous entry the comparison uses its last child.
pub fn time_window_batch(window: Duration) -> impl Fn(&Command, &Command) -> BatchDecision + Clone {
    move |previous, next| {
        let last = previous
            .as_compound()
            .and_then(|compound| compound.children().last())
            .unwrap_or(previous)
            .metadata();
        let next = next.metadata();
        match (last.batch_id, next.batch_id) {
            (Some(a), Some(b))
                if a == b && next.timestamp.saturating_duration_since(last.timestamp) <= window =>
            {
                BatchDecision::Merge
            }
            _ => BatchDecision::Separate,
        }
    }
}

/// Point-in-time view of both stacks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistorySnapshot {
    /// Undoable entries, oldest first.
    pub past: Vec<Command>,
    /// Redoable entries, next redo first.
    pub future: Vec<Command>,
}

struct FacilityInner {
    lock: Semaphore,
    past: Field<VecDeque<Command>>,
    future: Field<VecDeque<Command>>,
    config: HistoryConfig,
}

/// Serialized undo/redo history over [`Command`]s.
///
/// Cloning yields another handle to the same history.
#[derive(Clone)]
pub struct UndoRedoFacility {
    inner: Rc<FacilityInner>,
}

impl fmt::Debug for UndoRedoFacility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoRedoFacility")
            .field("undo_depth", &self.inner.past.with(None, VecDeque::len))
            .field("redo_depth", &self.inner.future.with(None, VecDeque::len))
            .field("busy", &self.is_busy(None))
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Default for UndoRedoFacility {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl UndoRedoFacility {
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            inner: Rc::new(FacilityInner {
                lock: Semaphore::mutex(),
                past: Field::default(),
                future: Field::default(),
                config,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.inner.config
    }

    // ====================================================================
    // Operations
    // ====================================================================

    /// Execute `command` and record it as a new undo step.
    ///
    /// # Errors
    ///
    /// Propagates the command's failure; the history is left unchanged.
    pub async fn execute(&self, command: Command) -> CommandResult {
        self.execute_batched(command, |_, _| BatchDecision::Separate)
            .await
    }

    /// Execute `command`, consulting `batch` to decide whether it joins the
    /// previous undo step.
    ///
    /// `batch` receives the previous entry and the new command, and is only
    /// called when there is a previous entry and execution succeeded.
    ///
    /// # Errors
    ///
    /// Propagates the command's failure; the history is left unchanged.
    pub async fn execute_batched(
        &self,
        command: Command,
        batch: impl FnOnce(&Command, &Command) -> BatchDecision,
    ) -> CommandResult {
        let (_, permit) = self.inner.lock.acquire().await?;
        let span = info_span!("undo.execute", command = %command.name());
        command.execute().instrument(span.clone()).await?;

        let _entered = span.enter();
        let previous = self.inner.past.with(None, |past| past.back().cloned());
        let entry = match previous {
            Some(previous) => match batch(&previous, &command) {
                BatchDecision::Separate => None,
                BatchDecision::Merge => {
                    let metadata = previous.metadata().clone();
                    Some((previous, metadata))
                }
                BatchDecision::MergeWith(metadata) => Some((previous, metadata)),
            },
            None => None,
        };

        let max_depth = self.inner.config.max_depth;
        self.inner.past.update(|past| {
            match entry {
                Some((previous, metadata)) => {
                    let augmented = previous
                        .as_compound()
                        .map(|compound| compound.augment(command.clone()));
                    let merged = match augmented {
                        Some(compound) => {
                            Command::executed(previous.metadata().clone(), compound)
                        }
                        None => Command::executed(
                            metadata,
                            CompoundCommand::new(vec![previous, command]),
                        ),
                    };
                    debug!(entry = %merged.name(), "merged into previous undo step");
                    past.pop_back();
                    past.push_back(merged);
                }
                None => past.push_back(command),
            }
            while past.len() > max_depth {
                if let Some(evicted) = past.pop_front() {
                    debug!(command = %evicted.name(), "evicted from undo history");
                }
            }
        });
        self.inner.future.update(VecDeque::clear);
        permit.release();
        Ok(())
    }

    /// Revert the most recent undo step.
    ///
    /// Returns `None` when there is nothing to undo, otherwise the name of
    /// the reverted entry or the failure. A failed entry stays undoable.
    pub async fn undo(&self) -> Option<CommandResult<String>> {
        let (_, permit) = match self.inner.lock.acquire().await {
            Ok(grant) => grant,
            Err(err) => return Some(Err(err.into())),
        };
        let command = self.inner.past.with(None, |past| past.back().cloned())?;
        let span = info_span!("undo.undo", command = %command.name());
        if let Err(err) = command.revert().instrument(span).await {
            return Some(Err(err));
        }

        if remove(&self.inner.past, &command) {
            self.inner.future.update(|future| future.push_back(command.clone()));
        }
        permit.release();
        Some(Ok(command.name().to_string()))
    }

    /// Re-execute the most recently undone step.
    ///
    /// Returns `None` when there is nothing to redo, otherwise the name of
    /// the re-executed entry or the failure. A failed entry stays redoable.
    pub async fn redo(&self) -> Option<CommandResult<String>> {
        let (_, permit) = match self.inner.lock.acquire().await {
            Ok(grant) => grant,
            Err(err) => return Some(Err(err.into())),
        };
        let command = self.inner.future.with(None, |future| future.back().cloned())?;
        let span = info_span!("undo.redo", command = %command.name());
        if let Err(err) = command.execute().instrument(span).await {
            return Some(Err(err));
        }

        if remove(&self.inner.future, &command) {
            self.inner.past.update(|past| past.push_back(command.clone()));
        }
        permit.release();
        Some(Ok(command.name().to_string()))
    }

    /// Drop both stacks.
    ///
    /// Does not wait for an operation in flight. An execute still running
    /// records its command on the emptied history; an undo or redo still
    /// running leaves both stacks untouched.
    pub fn clear(&self) {
        self.inner.past.update(VecDeque::clear);
        self.inner.future.update(VecDeque::clear);
    }

    // ====================================================================
    // Queries
    // ====================================================================

    #[must_use]
    pub fn can_undo(&self, hook: Option<&Hook>) -> bool {
        self.inner.past.with(hook, |past| !past.is_empty())
    }

    #[must_use]
    pub fn can_redo(&self, hook: Option<&Hook>) -> bool {
        self.inner.future.with(hook, |future| !future.is_empty())
    }

    /// Whether an execute, undo or redo is in flight.
    #[must_use]
    pub fn is_busy(&self, hook: Option<&Hook>) -> bool {
        self.inner.lock.is_locked(hook)
    }

    #[must_use]
    pub fn commands(&self, hook: Option<&Hook>) -> HistorySnapshot {
        HistorySnapshot {
            past: self.inner.past.with(hook, |past| past.iter().cloned().collect()),
            future: self
                .inner
                .future
                .with(hook, |future| future.iter().rev().cloned().collect()),
        }
    }

    /// Names of undoable entries, most recent first.
    #[must_use]
    pub fn undo_descriptions(&self, limit: usize) -> Vec<String> {
        descriptions(&self.inner.past, limit)
    }

    /// Names of redoable entries, next redo first.
    #[must_use]
    pub fn redo_descriptions(&self, limit: usize) -> Vec<String> {
        descriptions(&self.inner.future, limit)
    }

    #[must_use]
    pub fn next_undo_description(&self) -> Option<String> {
        self.undo_descriptions(1).pop()
    }

    #[must_use]
    pub fn next_redo_description(&self) -> Option<String> {
        self.redo_descriptions(1).pop()
    }
}

/// Remove `command` from `stack` by identity.
fn remove(stack: &Field<VecDeque<Command>>, command: &Command) -> bool {
    let mut found = false;
    stack.update(|stack| {
        if let Some(pos) = stack.iter().rposition(|entry| entry == command) {
            stack.remove(pos);
            found = true;
        }
    });
    found
}

fn descriptions(stack: &Field<VecDeque<Command>>, limit: usize) -> Vec<String> {
    stack.with(None, |stack| {
        stack
            .iter()
            .rev()
            .take(limit)
            .map(|cmd| cmd.name().to_string())
            .collect()
    })
}
