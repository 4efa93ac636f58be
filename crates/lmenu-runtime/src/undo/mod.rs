#![forbid(unsafe_code)]

//! Undo/redo command history.
//!
//! Reversible operations are modelled as [`Command`]s: a shared handle around
//! a [`CommandEffect`] that knows how to apply and take back one change.
//! Effects are async so that they can wait on the user or on I/O.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    UndoRedoFacility                      │
//! │  ┌──────────────┐   undo()   ┌──────────────┐            │
//! │  │    past      │ ─────────► │    future    │            │
//! │  │  [.., cN]    │ ◄───────── │  [.., c1]    │            │
//! │  └──────────────┘   redo()   └──────────────┘            │
//! │         ▲ execute()/execute_batched()                    │
//! │         │ serialized by a capacity-1 Semaphore           │
//! └─────────┴────────────────────────────────────────────────┘
//! ```
//!
//! Consecutive commands can be merged into one undo step by a batch policy
//! (see [`BatchDecision`] and [`time_window_batch`]); merged steps are
//! [`CompoundCommand`]s.
//!
//! # Module Structure
//!
//! - [`command`]: `Command`, its metadata and state, built-in effects
//! - [`compound`]: `CompoundCommand`
//! - [`history`]: `UndoRedoFacility` and batching

pub mod command;
pub mod compound;
pub mod history;

pub use command::{
    CallbackCommand, Command, CommandEffect, CommandMetadata, CommandSource, CommandState,
    SetFieldCommand,
};
pub use compound::CompoundCommand;
pub use history::{
    BatchDecision, HistoryConfig, HistorySnapshot, UndoRedoFacility, time_window_batch,
};
