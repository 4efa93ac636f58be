#![forbid(unsafe_code)]

//! Bottom-up resolution of an action over a list of items.
//!
//! # Algorithm
//!
//! 1. Collect the relevant bindings (see [`crate::index`]) and group them by
//!    target action. A direct binding is keyed by `[item, position]`.
//! 2. Take the set `S` of actions reachable upward from those targets that
//!    still lead to the queried action, plus the queried action itself.
//! 3. Visit `S` children-first (Kahn's algorithm, ties broken by id). For
//!    every non-empty group: sort it by key, invoke the core, and file each
//!    child binding under its target. A child's key is its source's key
//!    extended by the child's position in the output, so children sort right
//!    after what produced them. Unattributed children are matched to inputs
//!    one to one when there are exactly as many of them as inputs; otherwise
//!    they take the group's first key.
//! 4. Invoke the queried action last, with whatever reached it, even when
//!    nothing did.
//!
//! Every intermediate core runs at most once per query and never with an
//! empty group.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use lmenu_reactive::Hook;
use smallvec::{SmallVec, smallvec};
use tracing::{debug_span, trace};

use crate::action::{ErasedCall, ErasedOutput};
use crate::binding::Binding;
use crate::error::{ActionError, ActionResult};
use crate::graph::{ActionGraph, ActionId, NodeView};
use crate::index::{QueryContext, relevant_bindings};
use crate::item::Item;

type OrderKey = SmallVec<[usize; 4]>;

struct Pending {
    key: OrderKey,
    item: usize,
    binding: Binding,
}

/// Resolve `root` over `items`, returning the root core's erased result.
pub(crate) fn resolve(
    graph: &ActionGraph,
    root: ActionId,
    items: &[&dyn Item],
    hook: Option<&Hook>,
) -> ActionResult<Option<Box<dyn Any>>> {
    let mut ctx = QueryContext::new(graph);
    let root_view = ctx.view(root)?;
    let _span = debug_span!("action.resolve", action = %root_view.name, items = items.len()).entered();

    let mut groups: AHashMap<ActionId, Vec<Pending>> = AHashMap::new();
    for relevant in relevant_bindings(&mut ctx, root, items, hook)? {
        groups
            .entry(relevant.binding.target())
            .or_default()
            .push(Pending {
                key: smallvec![relevant.item, relevant.position],
                item: relevant.item,
                binding: relevant.binding,
            });
    }

    let order = visit_order(&mut ctx, root, groups.keys().copied())?;
    trace!(actions = order.len(), "resolution order");

    for id in order {
        if id == root {
            break;
        }
        let Some(mut group) = groups.remove(&id) else {
            continue;
        };
        if group.is_empty() {
            continue;
        }
        group.sort_by(|a, b| a.key.cmp(&b.key));

        let view = ctx.view(id)?;
        let output = invoke(&view, &group, items, hook, false)?;
        let ancestors = ctx.ancestors(id)?;
        let positional = output
            .children
            .iter()
            .filter(|child| child.source.is_none())
            .count()
            == group.len();
        let mut unattributed = 0;

        for (seq, child) in output.children.into_iter().enumerate() {
            ctx.check_binding(&child.binding, root)?;
            let target = child.binding.target();
            if !ancestors.contains(&target) {
                return Err(ActionError::InvalidChild {
                    action: view.name.to_string(),
                    target: graph.name_of(target).to_string(),
                });
            }

            let source = match child.source {
                Some(index) => {
                    group
                        .get(index)
                        .ok_or_else(|| ActionError::ChildIndexOutOfRange {
                            action: view.name.to_string(),
                            index,
                            inputs: group.len(),
                        })?
                }
                None if positional => {
                    unattributed += 1;
                    &group[unattributed - 1]
                }
                None => &group[0],
            };

            if !ctx.leads_to(target, root)? {
                trace!(
                    action = %view.name,
                    target = %graph.name_of(target),
                    "child does not reach the queried action; dropped"
                );
                continue;
            }

            let mut key = source.key.clone();
            key.push(seq);
            groups.entry(target).or_default().push(Pending {
                key,
                item: source.item,
                binding: child.binding,
            });
        }
    }

    let mut group = groups.remove(&root).unwrap_or_default();
    group.sort_by(|a, b| a.key.cmp(&b.key));
    let output = invoke(&root_view, &group, items, hook, true)?;
    if !output.children.is_empty() {
        trace!(
            action = %root_view.name,
            children = output.children.len(),
            "children of the queried action are ignored"
        );
    }
    Ok(output.result)
}

/// Actions between the direct targets and `root`, children before parents.
fn visit_order(
    ctx: &mut QueryContext<'_>,
    root: ActionId,
    targets: impl Iterator<Item = ActionId>,
) -> ActionResult<Vec<ActionId>> {
    let mut members: BTreeSet<ActionId> = BTreeSet::new();
    members.insert(root);
    let mut stack: Vec<ActionId> = targets.collect();
    while let Some(id) = stack.pop() {
        if !members.insert(id) {
            continue;
        }
        for &parent in &ctx.view(id)?.parents {
            if !members.contains(&parent) && ctx.leads_to(parent, root)? {
                stack.push(parent);
            }
        }
    }

    // Number of unvisited children per member.
    let mut waiting: BTreeMap<ActionId, usize> = members.iter().map(|&id| (id, 0)).collect();
    for &id in &members {
        for parent in &ctx.view(id)?.parents {
            if let Some(count) = waiting.get_mut(parent) {
                *count += 1;
            }
        }
    }

    let mut ready: BTreeSet<ActionId> = waiting
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut order = Vec::with_capacity(members.len());
    while let Some(id) = ready.pop_first() {
        order.push(id);
        for parent in &ctx.view(id)?.parents {
            if let Some(count) = waiting.get_mut(parent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*parent);
                }
            }
        }
    }
    Ok(order)
}

fn invoke(
    view: &NodeView,
    group: &[Pending],
    items: &[&dyn Item],
    hook: Option<&Hook>,
    allow_empty: bool,
) -> ActionResult<ErasedOutput> {
    if group.is_empty() && !allow_empty {
        return Err(ActionError::EmptyInvocation(view.name.to_string()));
    }
    trace!(action = %view.name, inputs = group.len(), "invoking core");

    let call = ErasedCall {
        payloads: group.iter().map(|p| p.binding.erased_payload(hook)).collect(),
        indices: group.iter().map(|p| p.item).collect(),
        keys: group.iter().map(|p| p.binding.id()).collect(),
        hook,
        items,
    };
    view.core.invoke(call).map_err(|err| err.in_action(&view.name))
}
