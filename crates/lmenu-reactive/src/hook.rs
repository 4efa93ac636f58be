#![forbid(unsafe_code)]

//! Dependency hooks: the subscribe-on-read half of the reactive contract.
//!
//! A [`Hook`] is handed to every read that should establish a dependency
//! (`Field::get(Some(&hook))`, `DataCache::get(Some(&hook))`, …). The read
//! registers a subscription on the hook; the next write to any tracked source
//! marks the hook dirty and fires its `on_change` callback once.
//!
//! # Invariants
//!
//! 1. A source is tracked at most once per hook, however often it is read.
//! 2. `on_change` fires at most once between two calls to [`Hook::reset`].
//! 3. Dropping the last handle to a hook drops all of its subscriptions.
//!
//! # Failure Modes
//!
//! - **Callback re-entrancy**: `on_change` runs synchronously inside the
//!   writer's `set()`. It may read other fields, but must not write the field
//!   that triggered it while that write is being notified.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::field::Subscription;

struct HookInner {
    on_change: Option<Box<dyn Fn()>>,
    dirty: Cell<bool>,
    /// Tracked sources by address. The weak handle keeps the allocation, so
    /// an address cannot be reused by another source while it is tracked.
    sources: RefCell<AHashMap<usize, Weak<dyn Any>>>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl HookInner {
    fn fire(&self) {
        if self.dirty.replace(true) {
            return;
        }
        if let Some(on_change) = &self.on_change {
            on_change();
        }
    }
}

/// Tracks the reactive sources read through it and reports their changes.
///
/// Cloning a `Hook` yields another handle to the same tracker.
#[derive(Clone)]
pub struct Hook {
    inner: Rc<HookInner>,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("dirty", &self.inner.dirty.get())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}

impl Hook {
    /// Create a hook that calls `on_change` when a tracked source changes.
    pub fn new(on_change: impl Fn() + 'static) -> Self {
        Self::with_callback(Some(Box::new(on_change)))
    }

    /// Create a hook without a callback. Useful for dirty-checking.
    #[must_use]
    pub fn detached() -> Self {
        Self::with_callback(None)
    }

    fn with_callback(on_change: Option<Box<dyn Fn()>>) -> Self {
        Self {
            inner: Rc::new(HookInner {
                on_change,
                dirty: Cell::new(false),
                sources: RefCell::new(AHashMap::new()),
                subscriptions: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Whether a tracked source changed since the last [`reset`](Self::reset).
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Number of distinct sources currently tracked.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.borrow().len()
    }

    /// Drop every subscription and clear the dirty flag.
    ///
    /// Call this before re-running a computation so that dependencies the new
    /// run no longer reads stop invalidating the hook.
    pub fn reset(&self) {
        let dropped = std::mem::take(&mut *self.inner.subscriptions.borrow_mut());
        self.inner.sources.borrow_mut().clear();
        self.inner.dirty.set(false);
        drop(dropped);
    }

    /// Mark the hook dirty as if a tracked source had changed.
    pub fn invalidate(&self) {
        self.inner.fire();
    }

    /// A weak handle that invalidates this hook while it is alive.
    #[must_use]
    pub fn invalidator(&self) -> Invalidator {
        Invalidator {
            target: Rc::downgrade(&self.inner),
        }
    }

    /// Track `source`, identified by its allocation.
    ///
    /// `subscribe` is only called when the source is not tracked yet; the
    /// returned subscription lives as long as the hook (or until `reset`).
    pub fn track<S: Any>(
        &self,
        source: &Rc<S>,
        subscribe: impl FnOnce(Invalidator) -> Subscription,
    ) {
        let key = Rc::as_ptr(source) as *const () as usize;
        {
            let mut sources = self.inner.sources.borrow_mut();
            if sources.contains_key(&key) {
                return;
            }
            let weak: Weak<dyn Any> = Rc::downgrade(source) as Weak<S>;
            sources.insert(key, weak);
        }
        let subscription = subscribe(self.invalidator());
        self.inner.subscriptions.borrow_mut().push(subscription);
    }
}

/// Weak invalidation handle created by [`Hook::invalidator`].
#[derive(Clone)]
pub struct Invalidator {
    target: Weak<HookInner>,
}

impl Invalidator {
    /// Invalidate the hook, if it still exists.
    pub fn invalidate(&self) {
        if let Some(inner) = self.target.upgrade() {
            inner.fire();
        }
    }
}

impl fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidator")
            .field("alive", &(self.target.strong_count() > 0))
            .finish()
    }
}
