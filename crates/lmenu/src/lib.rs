#![forbid(unsafe_code)]

//! LaunchMenu action engine public facade.
//!
//! This crate provides the stable surface area for applets. It re-exports
//! the reactive primitives, the action engine and the command runtime, and
//! adds a unified [`Error`], policy-as-data [`EngineConfig`] and logging
//! setup.
//!
//! # Example
//!
//! ```
//! use lmenu::prelude::*;
//!
//! let graph = ActionGraph::new();
//! let list = graph
//!     .create(
//!         "list",
//!         ActionDef::<String, _>::new(|input| Ok(CoreOutput::result(input.data.join("\n")))),
//!     )
//!     .unwrap();
//! let to_list = list.clone();
//! let dash = graph
//!     .create(
//!         "listDashHandler",
//!         ActionDef::<String, ()>::new(move |input| {
//!             Ok(input.data.iter().enumerate().fold(CoreOutput::new(), |out, (i, name)| {
//!                 out.with_child_from(i, to_list.create_binding(format!("- {name}")))
//!             }))
//!         })
//!         .parent(&list),
//!     )
//!     .unwrap();
//!
//! let items = vec![
//!     StaticItem::new(vec![dash.create_binding("item1".into())]),
//!     StaticItem::new(vec![dash.create_binding("item2".into())]),
//! ];
//! assert_eq!(list.get(&items, None).unwrap().as_deref(), Some("- item1\n- item2"));
//! ```

pub mod config;
pub mod error;
#[cfg(feature = "logging")]
pub mod logging;

// --- Reactive re-exports ----------------------------------------------------

pub use lmenu_reactive::{DataCache, Field, Hook, Subscription};

// --- Action re-exports ------------------------------------------------------

pub use lmenu_actions::{
    Action, ActionDef, ActionError, ActionGraph, ActionId, ActionResult, Binding, ChildBinding,
    CoreInput, CoreOutput, FieldItem, Item, StaticItem,
};

// --- Runtime re-exports -----------------------------------------------------

pub use lmenu_runtime::{
    BatchDecision, CallbackCommand, Command, CommandEffect, CommandError, CommandMetadata,
    CommandResult, CommandSource, CommandState, CompoundCommand, HistoryConfig, HistorySnapshot,
    Release, Semaphore, SemaphoreError, SemaphoreResult, SetFieldCommand, UndoRedoFacility,
    time_window_batch,
};

// --- Facade ------------------------------------------------------------------

pub use config::{ConfigError, EngineConfig, ExecutionPolicyConfig, HistoryPolicyConfig};
pub use error::{Error, Result};

// --- Prelude -----------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Action, ActionDef, ActionGraph, Binding, Command, CommandMetadata, CompoundCommand,
        CoreInput, CoreOutput, EngineConfig, Error, Field, FieldItem, Hook, Item, Result,
        Semaphore, StaticItem, UndoRedoFacility,
    };

    pub use crate::{actions, reactive, runtime};
}

pub use lmenu_actions as actions;
pub use lmenu_reactive as reactive;
pub use lmenu_runtime as runtime;
