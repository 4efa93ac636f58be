#![forbid(unsafe_code)]

//! Action/binding resolution engine.
//!
//! Items carry [`Binding`]s; each binding targets an [`Action`] and holds a
//! payload of that action's input type. Querying an action over a list of
//! items gathers every binding that can reach it, reduces them bottom-up
//! through the action DAG, and returns the queried action's result.
//!
//! ```text
//!   item1 ──binding──▶ listDash ──child──▶ list ──▶ "- item1\n- item2"
//!   item2 ──binding──▶ listDash ──child──┘
//! ```
//!
//! # Modules
//!
//! - [`graph`]: the [`ActionGraph`] arena and cycle detection.
//! - [`action`]: typed handles, definitions and the core calling convention.
//! - [`binding`]: bindings and their payloads.
//! - [`item`]: the [`Item`] trait and stock implementations.
//! - `index`: relevance filtering and override suppression.
//! - `resolve`: the reduction itself.
//!
//! # Example
//!
//! ```
//! use lmenu_actions::{ActionDef, ActionGraph, CoreOutput, StaticItem};
//!
//! let graph = ActionGraph::new();
//! let names = graph
//!     .create("names", ActionDef::<String, _>::new(|input| Ok(CoreOutput::result(input.data))))
//!     .unwrap();
//!
//! let items = vec![
//!     StaticItem::new(vec![names.create_binding("John".into())]),
//!     StaticItem::empty(),
//!     StaticItem::new(vec![names.create_binding("Bob".into())]),
//! ];
//! assert_eq!(
//!     names.get(&items, None).unwrap(),
//!     Some(vec!["John".to_string(), "Bob".to_string()])
//! );
//! ```

pub mod action;
pub mod binding;
pub mod error;
pub mod graph;
pub(crate) mod index;
pub mod item;
pub(crate) mod resolve;

pub use action::{Action, ActionDef, ChildBinding, CoreInput, CoreOutput};
pub use binding::Binding;
pub use error::{ActionError, ActionResult};
pub use graph::{ActionGraph, ActionId};
pub use item::{FieldItem, Item, StaticItem};
