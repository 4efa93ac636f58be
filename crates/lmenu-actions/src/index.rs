#![forbid(unsafe_code)]

//! Binding index: which of an item's bindings matter for a query.
//!
//! A binding on action `A` is relevant to a query for `T` when `A == T` or
//! `T` is an ancestor of `A`: the reduction chain starting at `A` can then
//! surface a binding on `T`. Relevant bindings are returned in item order,
//! then in the order they appear on the item.
//!
//! Override handling happens here as well. When an item carries a binding
//! for an action `B` that overrides `A`, the item's own bindings for `A` are
//! dropped. Other items' `A` bindings are unaffected, and `B`'s core may
//! still synthesize children for `A`.
//!
//! Bindings on declared-but-undefined actions and bindings from other
//! graphs are skipped: nothing is known about where they lead. An
//! undefined node met further up a relevant chain still fails the query
//! when resolution reaches it.
//!
//! Ancestor sets are memoized per [`QueryContext`], which lives for the
//! duration of a single query and never outlives a reactive epoch.

use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use lmenu_reactive::Hook;
use tracing::trace;

use crate::binding::Binding;
use crate::error::{ActionError, ActionResult};
use crate::graph::{ActionGraph, ActionId, NodeView};
use crate::item::Item;

/// Per-query memo of node snapshots and ancestor sets.
pub(crate) struct QueryContext<'g> {
    graph: &'g ActionGraph,
    views: AHashMap<ActionId, Rc<NodeView>>,
    ancestors: AHashMap<ActionId, Rc<AHashSet<ActionId>>>,
}

impl<'g> QueryContext<'g> {
    pub(crate) fn new(graph: &'g ActionGraph) -> Self {
        Self {
            graph,
            views: AHashMap::new(),
            ancestors: AHashMap::new(),
        }
    }

    /// Snapshot of a defined node; fails for undefined ones.
    pub(crate) fn view(&mut self, id: ActionId) -> ActionResult<Rc<NodeView>> {
        if let Some(view) = self.views.get(&id) {
            return Ok(Rc::clone(view));
        }
        let view = Rc::new(self.graph.view(id)?);
        self.views.insert(id, Rc::clone(&view));
        Ok(view)
    }

    /// Strict ancestors of `id`. An undefined node contributes no parents.
    pub(crate) fn ancestors(&mut self, id: ActionId) -> ActionResult<Rc<AHashSet<ActionId>>> {
        if let Some(set) = self.ancestors.get(&id) {
            return Ok(Rc::clone(set));
        }
        let mut set = AHashSet::new();
        if self.graph.is_defined(id) {
            let view = self.view(id)?;
            for &parent in &view.parents {
                set.insert(parent);
                set.extend(self.ancestors(parent)?.iter().copied());
            }
        }
        let set = Rc::new(set);
        self.ancestors.insert(id, Rc::clone(&set));
        Ok(set)
    }

    /// Whether bindings on `id` can reach `root`.
    pub(crate) fn leads_to(&mut self, id: ActionId, root: ActionId) -> ActionResult<bool> {
        Ok(id == root || self.ancestors(id)?.contains(&root))
    }

    fn is_local(&self, binding: &Binding) -> bool {
        binding.graph_key() == self.graph.key()
    }

    /// Reject bindings created by another graph.
    pub(crate) fn check_binding(&self, binding: &Binding, root: ActionId) -> ActionResult<()> {
        if self.is_local(binding) {
            Ok(())
        } else {
            Err(ActionError::ForeignGraph(self.graph.name_of(root).to_string()))
        }
    }
}

/// A binding relevant to a query, with its position.
#[derive(Debug, Clone)]
pub(crate) struct Relevant {
    pub(crate) item: usize,
    pub(crate) position: usize,
    pub(crate) binding: Binding,
}

/// Collect the bindings of `items` relevant to `root`, in order.
pub(crate) fn relevant_bindings(
    ctx: &mut QueryContext<'_>,
    root: ActionId,
    items: &[&dyn Item],
    hook: Option<&Hook>,
) -> ActionResult<Vec<Relevant>> {
    let mut out = Vec::new();
    for (item, source) in items.iter().enumerate() {
        let mut bindings = Vec::new();
        for (position, binding) in source.bindings(hook).into_iter().enumerate() {
            if !ctx.is_local(&binding) {
                trace!(item, position, "binding from another graph skipped");
            } else if !ctx.graph.is_defined(binding.target()) {
                trace!(
                    item,
                    position,
                    target = %ctx.graph.name_of(binding.target()),
                    "binding on undefined action skipped"
                );
            } else {
                bindings.push((position, binding));
            }
        }

        let mut overridden = AHashSet::new();
        for (_, binding) in &bindings {
            if let Some(base) = ctx.view(binding.target())?.overrides {
                overridden.insert(base);
            }
        }

        for (position, binding) in bindings {
            let target = binding.target();
            if overridden.contains(&target) || !ctx.leads_to(target, root)? {
                continue;
            }
            out.push(Relevant {
                item,
                position,
                binding,
            });
        }
    }
    Ok(out)
}
