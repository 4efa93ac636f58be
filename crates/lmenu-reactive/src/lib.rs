#![forbid(unsafe_code)]

//! Reactive data primitives for LaunchMenu.
//!
//! This crate provides the subscribe-on-read / invalidate-on-write contract
//! that the action engine and the undo runtime are built on:
//!
//! - [`Field`]: a shared, version-tracked value. Reading it through a
//!   [`Hook`] subscribes the hook; writing it notifies subscribers.
//! - [`Hook`]: a dependency tracker handed to reads. It is marked dirty, and
//!   its callback fired once, when any source it read changes.
//! - [`DataCache`]: a memoized derivation that recomputes only after one of
//!   the sources read by its previous run changed.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//!
//! # Architecture
//!
//! Everything is single-threaded: shared state lives in `Rc<RefCell<..>>`
//! and subscribers are held weakly, pruned lazily during notification. All
//! notifications are delivered synchronously before the triggering write
//! returns, so a read later in the same tick sees a consistent state.
//!
//! # Example
//!
//! ```
//! use lmenu_reactive::{DataCache, Field, Hook};
//!
//! let name = Field::new("world".to_string());
//! let n = name.clone();
//! let greeting = DataCache::new(move |h| format!("hello {}", n.get(Some(h))));
//!
//! let hook = Hook::detached();
//! assert_eq!(greeting.get(Some(&hook)), "hello world");
//!
//! name.set("there".to_string());
//! assert!(hook.is_dirty());
//! assert_eq!(greeting.get(None), "hello there");
//! ```

pub mod cache;
pub mod field;
pub mod hook;

pub use cache::DataCache;
pub use field::{Field, Subscription};
pub use hook::{Hook, Invalidator};
