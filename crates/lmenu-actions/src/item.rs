#![forbid(unsafe_code)]

//! Items: domain objects that carry bindings.
//!
//! The engine knows nothing about items beyond their ordered binding list.
//! [`StaticItem`] holds a fixed list; [`FieldItem`] keeps its list in a
//! reactive [`Field`], so hooked queries over it are invalidated when the
//! list changes.

use std::rc::Rc;

use lmenu_reactive::{Field, Hook};

use crate::binding::Binding;

/// Anything exposing an ordered list of bindings.
///
/// Implementations reading reactive state must read it through `hook` so
/// that hooked queries are invalidated by later changes.
pub trait Item {
    fn bindings(&self, hook: Option<&Hook>) -> Vec<Binding>;
}

impl<T: Item + ?Sized> Item for &T {
    fn bindings(&self, hook: Option<&Hook>) -> Vec<Binding> {
        (**self).bindings(hook)
    }
}

impl<T: Item + ?Sized> Item for Rc<T> {
    fn bindings(&self, hook: Option<&Hook>) -> Vec<Binding> {
        (**self).bindings(hook)
    }
}

impl<T: Item + ?Sized> Item for Box<T> {
    fn bindings(&self, hook: Option<&Hook>) -> Vec<Binding> {
        (**self).bindings(hook)
    }
}

/// An item with a fixed binding list.
#[derive(Debug, Clone, Default)]
pub struct StaticItem {
    bindings: Vec<Binding>,
}

impl StaticItem {
    #[must_use]
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self { bindings }
    }

    /// An item without bindings.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl FromIterator<Binding> for StaticItem {
    fn from_iter<It: IntoIterator<Item = Binding>>(iter: It) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Item for StaticItem {
    fn bindings(&self, _hook: Option<&Hook>) -> Vec<Binding> {
        self.bindings.clone()
    }
}

/// An item whose binding list lives in a reactive field.
///
/// Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct FieldItem {
    bindings: Field<Vec<Binding>>,
}

impl FieldItem {
    #[must_use]
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self {
            bindings: Field::new(bindings),
        }
    }

    /// Replace the binding list, notifying hooked readers.
    pub fn set_bindings(&self, bindings: Vec<Binding>) {
        self.bindings.set(bindings);
    }

    /// Append one binding, notifying hooked readers.
    pub fn push_binding(&self, binding: Binding) {
        self.bindings.update(|list| list.push(binding));
    }

    /// Remove every occurrence of `binding`. Returns whether any was found.
    pub fn remove_binding(&self, binding: &Binding) -> bool {
        let before = self.bindings.with(None, Vec::len);
        self.bindings.update(|list| list.retain(|b| b != binding));
        self.bindings.with(None, Vec::len) != before
    }

    /// The underlying field.
    #[must_use]
    pub fn field(&self) -> &Field<Vec<Binding>> {
        &self.bindings
    }
}

impl Item for FieldItem {
    fn bindings(&self, hook: Option<&Hook>) -> Vec<Binding> {
        self.bindings.get(hook)
    }
}
