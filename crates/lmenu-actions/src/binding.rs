#![forbid(unsafe_code)]

//! Bindings: an item's declaration that an action applies to it.
//!
//! A [`Binding`] names its target action and carries a payload of that
//! action's input type. Payloads are either fixed values or subscribable
//! functions of a [`Hook`], re-evaluated on every resolution so that changes
//! to the reactive data they read invalidate the caller.
//!
//! Bindings are immutable and shared by reference: cloning a binding clones
//! a handle, and two bindings compare equal only when they are the same
//! handle. Create them through `Action::create_binding`.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use lmenu_reactive::Hook;
use uuid::Uuid;

use crate::graph::ActionId;

type DynamicPayload = Rc<dyn Fn(Option<&Hook>) -> Rc<dyn Any>>;

#[derive(Clone)]
pub(crate) enum Payload {
    Value(Rc<dyn Any>),
    Dynamic(DynamicPayload),
}

struct BindingInner {
    target: ActionId,
    graph: usize,
    payload: Payload,
    id: Option<Uuid>,
}

/// Association of an item with one action, plus the action's input payload.
#[derive(Clone)]
pub struct Binding {
    inner: Rc<BindingInner>,
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Binding {}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("target", &self.inner.target)
            .field("dynamic", &matches!(self.inner.payload, Payload::Dynamic(_)))
            .field("id", &self.inner.id)
            .finish()
    }
}

impl Binding {
    pub(crate) fn new(target: ActionId, graph: usize, payload: Payload) -> Self {
        Self {
            inner: Rc::new(BindingInner {
                target,
                graph,
                payload,
                id: None,
            }),
        }
    }

    /// The action this binding targets.
    #[must_use]
    pub fn target(&self) -> ActionId {
        self.inner.target
    }

    /// Identity of the binding, if one was assigned.
    #[must_use]
    pub fn id(&self) -> Option<Uuid> {
        self.inner.id
    }

    /// A new binding with the same target and payload, carrying `id`.
    #[must_use]
    pub fn with_id(self, id: Uuid) -> Self {
        Self {
            inner: Rc::new(BindingInner {
                target: self.inner.target,
                graph: self.inner.graph,
                payload: self.inner.payload.clone(),
                id: Some(id),
            }),
        }
    }

    /// A new binding carrying a freshly generated identity.
    #[must_use]
    pub fn with_new_id(self) -> Self {
        self.with_id(Uuid::new_v4())
    }

    /// Whether the payload is a subscribable function.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self.inner.payload, Payload::Dynamic(_))
    }

    /// Read the payload as `I`, subscribing `hook` to dynamic payloads.
    ///
    /// Returns `None` when the payload has a different type.
    #[must_use]
    pub fn payload<I: Clone + 'static>(&self, hook: Option<&Hook>) -> Option<I> {
        let value = self.erased_payload(hook);
        value.downcast_ref::<I>().cloned()
    }

    pub(crate) fn erased_payload(&self, hook: Option<&Hook>) -> Rc<dyn Any> {
        match &self.inner.payload {
            Payload::Value(value) => Rc::clone(value),
            Payload::Dynamic(read) => read(hook),
        }
    }

    pub(crate) fn graph_key(&self) -> usize {
        self.inner.graph
    }
}
