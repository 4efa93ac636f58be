#![forbid(unsafe_code)]

//! `Field<T>`: the mutable leaf of the reactive graph.
//!
//! Everything observable in the engine (an item's binding list, a command's
//! lifecycle state, semaphore occupancy) bottoms out in a field. Reading with
//! `Some(&hook)` records the field as a dependency of that hook; reading with
//! `None` is a plain snapshot. Writes compare against the stored value and
//! stay silent when nothing changed.
//!
//! Callbacks run synchronously inside `set`/`update`, oldest subscription
//! first. A callback may itself write the field; that nested write notifies
//! straight away, so callbacks still pending in the outer pass are handed the
//! value the outer write stored.
//!
//! Subscribers are held weakly. A dropped [`Subscription`] leaves a dead
//! entry behind that the next notification sweeps out.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace_span;

use crate::hook::Hook;

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct FieldInner<T> {
    value: T,
    version: u64,
    subscribers: Vec<CallbackWeak<T>>,
}

/// Shared reactive value with a change counter.
///
/// Handles are cheap: `clone` copies a pointer, and every handle reads and
/// writes one value. `version` counts effective writes only, so two reads
/// that see the same version saw the same value.
pub struct Field<T> {
    inner: Rc<RefCell<FieldInner<T>>>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Field")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Field<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Field<T> {
    /// A field holding `value`. Starts at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(FieldInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Read a clone of the current value, subscribing `hook` if given.
    #[must_use]
    pub fn get(&self, hook: Option<&Hook>) -> T {
        self.track(hook);
        self.inner.borrow().value.clone()
    }

    /// Read the current value by reference, subscribing `hook` if given.
    pub fn with<R>(&self, hook: Option<&Hook>, f: impl FnOnce(&T) -> R) -> R {
        self.track(hook);
        f(&self.inner.borrow().value)
    }

    /// Store `value` and notify, unless it equals what is already stored.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    /// Edit the value in place. Notifies only when the edit changed it.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value != old {
                inner.version += 1;
                true
            } else {
                false
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Run `callback` after every effective write, for as long as the
    /// returned guard is alive.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        let weak = Rc::downgrade(&strong);
        self.inner.borrow_mut().subscribers.push(weak);
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Number of effective writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Registered callbacks, counting dropped ones not swept yet.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Identity key shared by all clones of this field.
    #[must_use]
    pub fn key(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    fn track(&self, hook: Option<&Hook>) {
        if let Some(hook) = hook {
            hook.track(&self.inner, |invalidator| {
                self.subscribe(move |_| invalidator.invalidate())
            });
        }
    }

    fn notify(&self) {
        // No borrow may be held while callbacks run.
        let callbacks: Vec<CallbackRc<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            inner
                .subscribers
                .iter()
                .filter_map(|w| w.upgrade())
                .collect()
        };
        if callbacks.is_empty() {
            return;
        }

        let value = self.inner.borrow().value.clone();
        let _span = trace_span!("field.notify", subscribers = callbacks.len()).entered();
        for cb in &callbacks {
            cb(&value);
        }
    }
}

/// Keeps a callback registered. Drop it to unsubscribe.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
