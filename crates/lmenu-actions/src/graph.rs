#![forbid(unsafe_code)]

//! Arena of action nodes.
//!
//! An [`ActionGraph`] owns every action declared in it. Nodes are addressed
//! by [`ActionId`] and connected to their parents by id, so the graph holds
//! no reference cycles between nodes. Handles ([`Action`]) keep the graph
//! alive; graphs are typically built once at startup and shared.
//!
//! Construction is two-phase. [`ActionGraph::declare`] reserves a node so
//! that handles can be referenced before their definition exists, and
//! [`ActionGraph::define`] installs the parents, the override target and the
//! core. `define` rejects definitions that would make an action its own
//! ancestor, so the parent relation is a DAG at all times.
//!
//! # Invariants
//!
//! 1. A node is defined at most once.
//! 2. Following parent edges from any node never returns to that node.
//! 3. A failed `define` leaves the graph unchanged.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashSet;
use tracing::debug;

use crate::action::{Action, ActionDef, ErasedCore, NodeRef};
use crate::error::{ActionError, ActionResult};

/// Stable identifier of an action within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId(u32);

impl ActionId {
    /// Construct an id from its raw index.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw index of the node in its graph.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct NodeDef {
    pub(crate) parents: Vec<ActionId>,
    pub(crate) overrides: Option<ActionId>,
    pub(crate) core: Rc<dyn ErasedCore>,
}

struct ActionNode {
    name: Rc<str>,
    def: Option<NodeDef>,
}

/// Snapshot of a defined node, detached from the arena borrow.
#[derive(Clone)]
pub(crate) struct NodeView {
    pub(crate) name: Rc<str>,
    pub(crate) parents: Vec<ActionId>,
    pub(crate) overrides: Option<ActionId>,
    pub(crate) core: Rc<dyn ErasedCore>,
}

#[derive(Default)]
struct GraphInner {
    nodes: RefCell<Vec<ActionNode>>,
}

/// Arena holding a DAG of actions.
///
/// Cloning yields another handle to the same arena.
#[derive(Clone, Default)]
pub struct ActionGraph {
    inner: Rc<GraphInner>,
}

impl fmt::Debug for ActionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes = self.inner.nodes.borrow();
        f.debug_struct("ActionGraph")
            .field("len", &nodes.len())
            .field(
                "defined",
                &nodes.iter().filter(|n| n.def.is_some()).count(),
            )
            .finish()
    }
}

impl ActionGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity key shared by all clones of this graph.
    #[must_use]
    pub fn key(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Number of declared actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.nodes.borrow().len()
    }

    /// Whether no action has been declared yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserve a node for an action taking `I` payloads and producing `O`.
    pub fn declare<I: Clone + 'static, O: 'static>(&self, name: impl Into<String>) -> Action<I, O> {
        let name: Rc<str> = Rc::from(name.into());
        let id = {
            let mut nodes = self.inner.nodes.borrow_mut();
            let id = ActionId(u32::try_from(nodes.len()).unwrap_or(u32::MAX));
            nodes.push(ActionNode { name, def: None });
            id
        };
        Action::from_parts(self.clone(), id)
    }

    /// Install the definition of a declared action.
    ///
    /// # Errors
    ///
    /// - [`ActionError::ForeignGraph`] if the action, a parent or the override
    ///   target belongs to another graph.
    /// - [`ActionError::AlreadyDefined`] if the action already has a definition.
    /// - [`ActionError::Cycle`] if a parent is the action itself or has it as
    ///   an ancestor.
    pub fn define<I: Clone + 'static, O: 'static>(
        &self,
        action: &Action<I, O>,
        def: ActionDef<I, O>,
    ) -> ActionResult<()> {
        let id = action.id();
        if action.graph().key() != self.key() {
            return Err(ActionError::ForeignGraph(action.name().to_string()));
        }
        self.check_local(&def.parents, def.overrides.as_ref())?;

        let name = self.name_of(id);
        if self.is_defined(id) {
            return Err(ActionError::AlreadyDefined(name.to_string()));
        }

        let parents: Vec<ActionId> = def.parents.iter().map(|p| p.id).collect();
        for &parent in &parents {
            if parent == id || self.ancestors(parent).contains(&id) {
                return Err(ActionError::Cycle {
                    action: name.to_string(),
                    via: self.name_of(parent).to_string(),
                });
            }
        }

        let node_def = NodeDef {
            parents,
            overrides: def.overrides.map(|o| o.id),
            core: def.core,
        };
        debug!(
            action = %name,
            parents = node_def.parents.len(),
            overrides = node_def.overrides.is_some(),
            "action defined"
        );
        if let Some(node) = self.inner.nodes.borrow_mut().get_mut(id.index()) {
            node.def = Some(node_def);
        }
        Ok(())
    }

    /// Declare and define an action in one step.
    ///
    /// # Errors
    ///
    /// [`ActionError::ForeignGraph`] if a parent or the override target
    /// belongs to another graph; nothing is declared in that case.
    pub fn create<I: Clone + 'static, O: 'static>(
        &self,
        name: impl Into<String>,
        def: ActionDef<I, O>,
    ) -> ActionResult<Action<I, O>> {
        self.check_local(&def.parents, def.overrides.as_ref())?;
        let action = self.declare(name);
        self.define(&action, def)?;
        Ok(action)
    }

    /// Whether `id` has a definition.
    #[must_use]
    pub fn is_defined(&self, id: ActionId) -> bool {
        self.inner
            .nodes
            .borrow()
            .get(id.index())
            .is_some_and(|n| n.def.is_some())
    }

    /// Name of the action, or `"?"` for ids outside this graph.
    #[must_use]
    pub fn name_of(&self, id: ActionId) -> Rc<str> {
        self.inner
            .nodes
            .borrow()
            .get(id.index())
            .map_or_else(|| Rc::from("?"), |n| Rc::clone(&n.name))
    }

    /// Direct parents of a defined action; empty when undefined.
    #[must_use]
    pub fn parents_of(&self, id: ActionId) -> Vec<ActionId> {
        self.inner
            .nodes
            .borrow()
            .get(id.index())
            .and_then(|n| n.def.as_ref())
            .map(|d| d.parents.clone())
            .unwrap_or_default()
    }

    /// Every strict ancestor of `id`, in ascending id order.
    ///
    /// The walk follows defined nodes only; an undefined node contributes
    /// no parents.
    #[must_use]
    pub fn ancestors(&self, id: ActionId) -> Vec<ActionId> {
        let mut seen = AHashSet::new();
        let mut stack = self.parents_of(id);
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.parents_of(next));
            }
        }
        let mut out: Vec<ActionId> = seen.into_iter().collect();
        out.sort_unstable();
        out
    }

    /// Snapshot of a defined node.
    pub(crate) fn view(&self, id: ActionId) -> ActionResult<NodeView> {
        let nodes = self.inner.nodes.borrow();
        let node = nodes
            .get(id.index())
            .ok_or_else(|| ActionError::ForeignGraph(id.to_string()))?;
        let def = node
            .def
            .as_ref()
            .ok_or_else(|| ActionError::Undefined(node.name.to_string()))?;
        Ok(NodeView {
            name: Rc::clone(&node.name),
            parents: def.parents.clone(),
            overrides: def.overrides,
            core: Rc::clone(&def.core),
        })
    }

    fn check_local(&self, parents: &[NodeRef], overrides: Option<&NodeRef>) -> ActionResult<()> {
        let key = self.key();
        match parents.iter().chain(overrides).find(|r| r.graph != key) {
            Some(foreign) => Err(ActionError::ForeignGraph(foreign.name.to_string())),
            None => Ok(()),
        }
    }
}
