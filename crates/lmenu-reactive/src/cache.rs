#![forbid(unsafe_code)]

//! Memoized derived values keyed to the reactive epoch.
//!
//! A [`DataCache<T>`] runs its compute function through an internal [`Hook`],
//! so every reactive source read during the computation becomes a dependency.
//! The cached value is reused until one of those dependencies changes; the
//! next `get()` then recomputes. Readers that pass their own hook to `get()`
//! are invalidated whenever the cache goes stale.
//!
//! # Invariants
//!
//! 1. `get()` never returns a value computed before the latest invalidation.
//! 2. The compute function runs at most once per epoch.
//! 3. Outer hooks are notified once per epoch, synchronously with the write
//!    that made the cache stale.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::field::Field;
use crate::hook::Hook;

struct CacheInner<T> {
    compute: Box<dyn Fn(&Hook) -> T>,
    value: RefCell<Option<T>>,
    /// Tracks the dependencies of the latest computation.
    deps: Hook,
    /// Bumped whenever `deps` fires; outer readers subscribe to it.
    generation: Field<u64>,
    epoch: Cell<u64>,
}

/// A lazily evaluated, memoized derivation over reactive sources.
pub struct DataCache<T> {
    inner: Rc<CacheInner<T>>,
}

impl<T> Clone for DataCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for DataCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataCache")
            .field("epoch", &self.inner.epoch.get())
            .field("stale", &self.inner.deps.is_dirty())
            .field("computed", &self.inner.value.borrow().is_some())
            .finish()
    }
}

impl<T: Clone + 'static> DataCache<T> {
    /// Create a cache around `compute`. Nothing runs until the first `get()`.
    pub fn new(compute: impl Fn(&Hook) -> T + 'static) -> Self {
        let generation = Field::new(0_u64);
        let bump = generation.clone();
        let deps = Hook::new(move || bump.update(|g| *g = g.wrapping_add(1)));
        Self {
            inner: Rc::new(CacheInner {
                compute: Box::new(compute),
                value: RefCell::new(None),
                deps,
                generation,
                epoch: Cell::new(0),
            }),
        }
    }

    /// Current value, recomputed if a dependency changed since the last run.
    ///
    /// When `hook` is given it is invalidated as soon as the cache goes stale.
    pub fn get(&self, hook: Option<&Hook>) -> T {
        self.inner.generation.with(hook, |_| ());

        if !self.inner.deps.is_dirty() {
            if let Some(value) = self.inner.value.borrow().as_ref() {
                return value.clone();
            }
        }

        self.inner.deps.reset();
        let value = (self.inner.compute)(&self.inner.deps);
        *self.inner.value.borrow_mut() = Some(value.clone());
        self.inner.epoch.set(self.inner.epoch.get() + 1);
        value
    }

    /// Force the next `get()` to recompute.
    pub fn invalidate(&self) {
        self.inner.deps.invalidate();
    }

    /// Number of computations performed so far.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.get()
    }

    /// Whether the next `get()` will recompute.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.inner.deps.is_dirty() || self.inner.value.borrow().is_none()
    }
}
