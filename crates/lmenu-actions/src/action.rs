#![forbid(unsafe_code)]

//! Typed action handles, definitions and the core calling convention.
//!
//! An [`Action<I, O>`] is a handle to a node of an [`ActionGraph`]. `I` is
//! the payload type carried by bindings that target the action, `O` the type
//! of the result its core produces. The arena stores cores type-erased;
//! handles restore the types at the boundary.
//!
//! A core receives every relevant payload of one resolution at once, as a
//! [`CoreInput`], and returns a [`CoreOutput`]: an optional result and a
//! list of child bindings for the action's ancestors.

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use lmenu_reactive::{DataCache, Hook};
use uuid::Uuid;

use crate::binding::{Binding, Payload};
use crate::error::{ActionError, ActionResult};
use crate::graph::{ActionGraph, ActionId};
use crate::index::{QueryContext, relevant_bindings};
use crate::item::Item;
use crate::resolve;

/// Everything a core gets to see for one invocation.
///
/// `data`, `indices` and `keys` are parallel: entry `n` holds the payload of
/// the `n`-th relevant binding, the index of the item it came from, and the
/// binding's identity.
pub struct CoreInput<'a, I> {
    pub data: Vec<I>,
    pub indices: Vec<usize>,
    pub keys: Vec<Option<Uuid>>,
    pub hook: Option<&'a Hook>,
    pub items: &'a [&'a dyn Item],
}

impl<I> CoreInput<'_, I> {
    /// Number of payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<I: fmt::Debug> fmt::Debug for CoreInput<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreInput")
            .field("data", &self.data)
            .field("indices", &self.indices)
            .field("keys", &self.keys)
            .field("hooked", &self.hook.is_some())
            .field("items", &self.items.len())
            .finish()
    }
}

/// A binding synthesized by a core for one of its ancestors.
#[derive(Debug, Clone)]
pub struct ChildBinding {
    pub binding: Binding,
    /// Input position the child was derived from, if attributed.
    pub source: Option<usize>,
}

/// Result of one core invocation.
#[derive(Debug)]
pub struct CoreOutput<O> {
    pub result: Option<O>,
    pub children: Vec<ChildBinding>,
}

impl<O> Default for CoreOutput<O> {
    fn default() -> Self {
        Self {
            result: None,
            children: Vec::new(),
        }
    }
}

impl<O> CoreOutput<O> {
    /// No result, no children.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Output carrying only `value`.
    #[must_use]
    pub fn result(value: O) -> Self {
        Self::new().with_result(value)
    }

    #[must_use]
    pub fn with_result(mut self, value: O) -> Self {
        self.result = Some(value);
        self
    }

    /// Add a child without naming its input.
    ///
    /// When a core returns exactly one unattributed child per input, the
    /// n-th such child is ordered at input n. Otherwise unattributed children
    /// are ordered at the group's first input.
    #[must_use]
    pub fn with_child(mut self, binding: Binding) -> Self {
        self.children.push(ChildBinding {
            binding,
            source: None,
        });
        self
    }

    /// Add a child ordered at the position of input `index`.
    #[must_use]
    pub fn with_child_from(mut self, index: usize, binding: Binding) -> Self {
        self.children.push(ChildBinding {
            binding,
            source: Some(index),
        });
        self
    }

    /// Add unattributed children, see [`CoreOutput::with_child`].
    #[must_use]
    pub fn with_children(mut self, bindings: impl IntoIterator<Item = Binding>) -> Self {
        self.children
            .extend(bindings.into_iter().map(|binding| ChildBinding {
                binding,
                source: None,
            }));
        self
    }
}

pub(crate) struct ErasedCall<'a> {
    pub(crate) payloads: Vec<Rc<dyn Any>>,
    pub(crate) indices: Vec<usize>,
    pub(crate) keys: Vec<Option<Uuid>>,
    pub(crate) hook: Option<&'a Hook>,
    pub(crate) items: &'a [&'a dyn Item],
}

pub(crate) struct ErasedOutput {
    pub(crate) result: Option<Box<dyn Any>>,
    pub(crate) children: Vec<ChildBinding>,
}

/// Type-erased core as stored in the arena.
pub(crate) trait ErasedCore {
    fn invoke(&self, call: ErasedCall<'_>) -> ActionResult<ErasedOutput>;
}

type CoreFn<I, O> = dyn Fn(CoreInput<'_, I>) -> ActionResult<CoreOutput<O>>;

struct TypedCore<I, O> {
    core: Box<CoreFn<I, O>>,
}

impl<I: Clone + 'static, O: 'static> ErasedCore for TypedCore<I, O> {
    fn invoke(&self, call: ErasedCall<'_>) -> ActionResult<ErasedOutput> {
        let data = call
            .payloads
            .iter()
            .map(|p| {
                p.downcast_ref::<I>()
                    .cloned()
                    .ok_or(ActionError::PayloadType {
                        action: String::new(),
                        expected: type_name::<I>(),
                    })
            })
            .collect::<ActionResult<Vec<I>>>()?;

        let output = (self.core)(CoreInput {
            data,
            indices: call.indices,
            keys: call.keys,
            hook: call.hook,
            items: call.items,
        })?;

        Ok(ErasedOutput {
            result: output.result.map(|r| Box::new(r) as Box<dyn Any>),
            children: output.children,
        })
    }
}

/// Reference to a node captured by a definition under construction.
pub(crate) struct NodeRef {
    pub(crate) graph: usize,
    pub(crate) id: ActionId,
    pub(crate) name: Rc<str>,
}

impl NodeRef {
    fn of<I, O>(action: &Action<I, O>) -> Self {
        Self {
            graph: action.graph.key(),
            id: action.id,
            name: action.name(),
        }
    }
}

/// Definition of an action: its core, parents and override target.
pub struct ActionDef<I, O> {
    pub(crate) parents: Vec<NodeRef>,
    pub(crate) overrides: Option<NodeRef>,
    pub(crate) core: Rc<dyn ErasedCore>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I: Clone + 'static, O: 'static> ActionDef<I, O> {
    /// Definition with the given core and no parents.
    pub fn new(
        core: impl Fn(CoreInput<'_, I>) -> ActionResult<CoreOutput<O>> + 'static,
    ) -> Self {
        Self {
            parents: Vec::new(),
            overrides: None,
            core: Rc::new(TypedCore::<I, O> {
                core: Box::new(core),
            }),
            _types: PhantomData,
        }
    }

    /// Append a parent. Parent order is kept.
    #[must_use]
    pub fn parent<PI, PO>(mut self, parent: &Action<PI, PO>) -> Self {
        self.parents.push(NodeRef::of(parent));
        self
    }

    /// Make the action supersede `base`'s direct bindings on items that
    /// carry bindings for both.
    #[must_use]
    pub fn overrides<BI, BO>(mut self, base: &Action<BI, BO>) -> Self {
        self.overrides = Some(NodeRef::of(base));
        self
    }
}

impl<I, O> fmt::Debug for ActionDef<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDef")
            .field(
                "parents",
                &self.parents.iter().map(|p| &*p.name).collect::<Vec<_>>(),
            )
            .field("overrides", &self.overrides.as_ref().map(|o| &*o.name))
            .finish_non_exhaustive()
    }
}

/// Typed handle to an action node.
pub struct Action<I, O> {
    graph: ActionGraph,
    id: ActionId,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> Clone for Action<I, O> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            id: self.id,
            _types: PhantomData,
        }
    }
}

impl<I, O> fmt::Debug for Action<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name())
            .field("id", &self.id)
            .finish()
    }
}

impl<I, O> Action<I, O> {
    pub(crate) fn from_parts(graph: ActionGraph, id: ActionId) -> Self {
        Self {
            graph,
            id,
            _types: PhantomData,
        }
    }

    #[must_use]
    pub fn id(&self) -> ActionId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> Rc<str> {
        self.graph.name_of(self.id)
    }

    /// The graph this action lives in.
    #[must_use]
    pub fn graph(&self) -> &ActionGraph {
        &self.graph
    }

    /// Strict ancestors of this action, in ascending id order.
    #[must_use]
    pub fn ancestors(&self) -> Vec<ActionId> {
        self.graph.ancestors(self.id)
    }

    /// Whether this action is a strict ancestor of `other`.
    #[must_use]
    pub fn is_ancestor_of<PI, PO>(&self, other: &Action<PI, PO>) -> bool {
        other.graph.key() == self.graph.key() && other.ancestors().contains(&self.id)
    }
}

impl<I: Clone + 'static, O: 'static> Action<I, O> {
    /// Bind a fixed payload to this action.
    pub fn create_binding(&self, payload: I) -> Binding {
        Binding::new(self.id, self.graph.key(), Payload::Value(Rc::new(payload)))
    }

    /// Bind a payload computed on every resolution.
    ///
    /// Reactive sources read through the hook handed to `read` invalidate
    /// hooked queries that consumed the binding.
    pub fn create_dynamic_binding(&self, read: impl Fn(Option<&Hook>) -> I + 'static) -> Binding {
        let read = move |hook: Option<&Hook>| Rc::new(read(hook)) as Rc<dyn Any>;
        Binding::new(self.id, self.graph.key(), Payload::Dynamic(Rc::new(read)))
    }

    /// Resolve this action over `items`.
    ///
    /// Returns whatever the action's core produces for the bindings the
    /// items route to it; the core is invoked even when there are none.
    /// When `hook` is given, it is invalidated by any later change to the
    /// binding lists or dynamic payloads that were read.
    ///
    /// # Errors
    ///
    /// Propagates errors raised by cores and reports malformed graphs or
    /// bindings (see [`ActionError`]).
    pub fn get<T: Item>(&self, items: &[T], hook: Option<&Hook>) -> ActionResult<Option<O>> {
        let refs: Vec<&dyn Item> = items.iter().map(|item| item as &dyn Item).collect();
        let Some(result) = resolve::resolve(&self.graph, self.id, &refs, hook)? else {
            return Ok(None);
        };
        result
            .downcast::<O>()
            .map(|value| Some(*value))
            .map_err(|_| ActionError::PayloadType {
                action: self.name().to_string(),
                expected: type_name::<O>(),
            })
    }

    /// Whether at least one item routes a binding to this action.
    ///
    /// # Errors
    ///
    /// Same as [`bindings_of`](Self::bindings_of).
    pub fn can_apply_to<T: Item>(&self, items: &[T], hook: Option<&Hook>) -> ActionResult<bool> {
        Ok(!self.bindings_of(items, hook)?.is_empty())
    }

    /// The bindings routed to this action, as `(item index, binding)` pairs
    /// in item order, then binding order.
    ///
    /// # Errors
    ///
    /// [`ActionError::Undefined`] if this action, or an action on a
    /// relevant binding's chain, is not defined. Bindings on undefined
    /// actions and bindings from other graphs are skipped.
    pub fn bindings_of<T: Item>(
        &self,
        items: &[T],
        hook: Option<&Hook>,
    ) -> ActionResult<Vec<(usize, Binding)>> {
        let refs: Vec<&dyn Item> = items.iter().map(|item| item as &dyn Item).collect();
        let mut ctx = QueryContext::new(&self.graph);
        let relevant = relevant_bindings(&mut ctx, self.id, &refs, hook)?;
        Ok(relevant.into_iter().map(|r| (r.item, r.binding)).collect())
    }
}

impl<I: Clone + 'static, O: Clone + 'static> Action<I, O> {
    /// A memoized view of `get(items)` that recomputes only after a binding
    /// list or payload it read has changed.
    pub fn watch<T: Item + 'static>(&self, items: Vec<T>) -> DataCache<ActionResult<Option<O>>> {
        let action = self.clone();
        DataCache::new(move |hook| action.get(&items, Some(hook)))
    }
}
