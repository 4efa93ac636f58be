#![forbid(unsafe_code)]

//! Commands grouped into a single undo step.

use std::fmt;

use async_trait::async_trait;
use tracing::warn;

use super::command::{Command, CommandEffect, CommandMetadata};
use crate::error::CommandResult;

/// A batch of commands executed and reverted as one unit.
///
/// Children execute in order and revert in reverse order. If a child fails
/// midway, the children already applied by the same call are taken back
/// (in reverse) before the error is returned, leaving the batch as it was.
#[derive(Clone, Default)]
pub struct CompoundCommand {
    children: Vec<Command>,
}

impl CompoundCommand {
    #[must_use]
    pub fn new(children: Vec<Command>) -> Self {
        Self { children }
    }

    #[must_use]
    pub fn children(&self) -> &[Command] {
        &self.children
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// A new compound with `command` appended to this one's children.
    #[must_use]
    pub fn augment(&self, command: Command) -> Self {
        let mut children = self.children.clone();
        children.push(command);
        Self { children }
    }

    /// Wrap into a [`Command`] described by `metadata`.
    pub fn into_command(self, metadata: CommandMetadata) -> Command {
        Command::new(metadata, self)
    }
}

fn rollback(command: &Command, outcome: CommandResult) {
    if let Err(err) = outcome {
        warn!(command = %command.name(), error = %err, "rollback failed");
    }
}

impl fmt::Debug for CompoundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.children.iter().map(Command::name))
            .finish()
    }
}

#[async_trait(?Send)]
impl CommandEffect for CompoundCommand {
    async fn on_execute(&self) -> CommandResult {
        let mut applied: Vec<&Command> = Vec::with_capacity(self.children.len());
        for child in &self.children {
            let was_executed = child.is_executed(None);
            if let Err(err) = child.execute().await {
                for &done in applied.iter().rev() {
                    rollback(done, done.revert().await);
                }
                return Err(err);
            }
            if !was_executed {
                applied.push(child);
            }
        }
        Ok(())
    }

    async fn on_revert(&self) -> CommandResult {
        let mut reverted: Vec<&Command> = Vec::with_capacity(self.children.len());
        for child in self.children.iter().rev() {
            let was_executed = child.is_executed(None);
            if let Err(err) = child.revert().await {
                for &done in reverted.iter().rev() {
                    rollback(done, done.execute().await);
                }
                return Err(err);
            }
            if was_executed {
                reverted.push(child);
            }
        }
        Ok(())
    }

    fn as_compound(&self) -> Option<&CompoundCommand> {
        Some(self)
    }

    fn debug_name(&self) -> &'static str {
        "CompoundCommand"
    }
}
