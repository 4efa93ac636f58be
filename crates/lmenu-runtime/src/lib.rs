#![forbid(unsafe_code)]

//! Async runtime pieces for LaunchMenu.
//!
//! - [`Semaphore`]: FIFO counting semaphore with reactive occupancy.
//! - [`undo`]: reversible [`Command`]s and the serialized
//!   [`UndoRedoFacility`] history.
//!
//! Everything here is `!Send` and meant to run on a single-threaded
//! executor, e.g. a Tokio current-thread runtime with a `LocalSet`.
//!
//! # Example
//!
//! ```
//! use lmenu_reactive::Field;
//! use lmenu_runtime::{SetFieldCommand, UndoRedoFacility};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let title = Field::new("draft".to_string());
//! let history = UndoRedoFacility::default();
//!
//! let rename = SetFieldCommand::new(&title, "final".to_string()).into_command("Rename");
//! history.execute(rename).await.unwrap();
//! assert_eq!(title.get(None), "final");
//!
//! history.undo().await;
//! assert_eq!(title.get(None), "draft");
//! # });
//! ```

pub mod error;
pub mod semaphore;
pub mod undo;

pub use error::{CommandError, CommandResult, SemaphoreError, SemaphoreResult};
pub use semaphore::{Release, Semaphore};
pub use undo::{
    BatchDecision, CallbackCommand, Command, CommandEffect, CommandMetadata, CommandSource,
    CommandState, CompoundCommand, HistoryConfig, HistorySnapshot, SetFieldCommand,
    UndoRedoFacility, time_window_batch,
};
