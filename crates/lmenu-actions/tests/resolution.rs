#![forbid(unsafe_code)]

//! End-to-end resolution tests for the action engine.
//!
//! 1. Plain aggregation and handler chains
//! 2. Multi-parent fan-in
//! 3. Override suppression
//! 4. Reactivity through hooks and watched caches
//! 5. Error propagation

use std::cell::RefCell;
use std::rc::Rc;

use lmenu_actions::{
    Action, ActionDef, ActionError, ActionGraph, CoreOutput, FieldItem, Item, StaticItem,
};
use lmenu_reactive::{Field, Hook};

fn names_action(graph: &ActionGraph) -> Action<String, Vec<String>> {
    graph
        .create(
            "names",
            ActionDef::<String, _>::new(|input| Ok(CoreOutput::result(input.data))),
        )
        .unwrap()
}

/// `list` joins its payloads with newlines; `listDashHandler` turns each name
/// into a `- name` binding on `list`.
fn list_actions(graph: &ActionGraph) -> (Action<String, String>, Action<String, ()>) {
    let list = graph
        .create(
            "list",
            ActionDef::<String, _>::new(|input| Ok(CoreOutput::result(input.data.join("\n")))),
        )
        .unwrap();
    let target = list.clone();
    let dash = graph
        .create(
            "listDashHandler",
            ActionDef::<String, ()>::new(move |input| {
                Ok(input
                    .data
                    .iter()
                    .enumerate()
                    .fold(CoreOutput::new(), |out, (i, name)| {
                        out.with_child_from(i, target.create_binding(format!("- {name}")))
                    }))
            })
            .parent(&list),
        )
        .unwrap();
    (list, dash)
}

// ── Aggregation ───────────────────────────────────────────────────────────

#[test]
fn direct_bindings_keep_item_order() {
    let graph = ActionGraph::new();
    let names = names_action(&graph);

    let items = vec![
        StaticItem::new(vec![
            names.create_binding("John".into()),
            names.create_binding("Johny".into()),
        ]),
        StaticItem::empty(),
        StaticItem::new(vec![names.create_binding("Bob".into())]),
    ];

    assert_eq!(
        names.get(&items, None).unwrap(),
        Some(vec!["John".to_string(), "Johny".into(), "Bob".into()])
    );
}

#[test]
fn handler_children_reach_the_root() {
    let graph = ActionGraph::new();
    let (list, dash) = list_actions(&graph);

    let items = vec![
        StaticItem::new(vec![dash.create_binding("item1".into())]),
        StaticItem::new(vec![dash.create_binding("item2".into())]),
    ];

    assert_eq!(
        list.get(&items, None).unwrap().as_deref(),
        Some("- item1\n- item2")
    );
}

#[test]
fn children_interleave_with_direct_bindings() {
    let graph = ActionGraph::new();
    let (list, dash) = list_actions(&graph);

    let items = vec![
        StaticItem::new(vec![list.create_binding("A".into())]),
        StaticItem::new(vec![dash.create_binding("b".into())]),
        StaticItem::new(vec![
            list.create_binding("C".into()),
            dash.create_binding("d".into()),
        ]),
    ];

    assert_eq!(
        list.get(&items, None).unwrap().as_deref(),
        Some("A\n- b\nC\n- d")
    );
}

#[test]
fn one_child_per_input_keeps_item_order() {
    let graph = ActionGraph::new();
    let list = graph
        .create(
            "list",
            ActionDef::<String, _>::new(|input| Ok(CoreOutput::result(input.data.join("\n")))),
        )
        .unwrap();
    let target = list.clone();
    let dash = graph
        .create(
            "dash",
            ActionDef::<String, ()>::new(move |input| {
                Ok(CoreOutput::new().with_children(
                    input.data.iter().map(|d| target.create_binding(format!("- {d}"))),
                ))
            })
            .parent(&list),
        )
        .unwrap();

    let items = vec![
        StaticItem::new(vec![dash.create_binding("a".into())]),
        StaticItem::new(vec![list.create_binding("- b".into())]),
        StaticItem::new(vec![dash.create_binding("c".into())]),
    ];

    assert_eq!(
        list.get(&items, None).unwrap().as_deref(),
        Some("- a\n- b\n- c")
    );
}

#[test]
fn combined_child_sorts_at_first_input() {
    let graph = ActionGraph::new();
    let list = graph
        .create(
            "list",
            ActionDef::<String, _>::new(|input| Ok(CoreOutput::result(input.data.join(",")))),
        )
        .unwrap();
    let target = list.clone();
    let summary = graph
        .create(
            "summary",
            ActionDef::<String, ()>::new(move |input| {
                Ok(CoreOutput::new().with_child(target.create_binding(input.data.concat())))
            })
            .parent(&list),
        )
        .unwrap();

    let items = vec![
        StaticItem::new(vec![list.create_binding("first".into())]),
        StaticItem::new(vec![summary.create_binding("x".into())]),
        StaticItem::new(vec![list.create_binding("last".into())]),
        StaticItem::new(vec![summary.create_binding("y".into())]),
    ];

    assert_eq!(
        list.get(&items, None).unwrap().as_deref(),
        Some("first,xy,last")
    );
}

#[test]
fn root_with_no_items_still_runs() {
    let graph = ActionGraph::new();
    let names = names_action(&graph);
    let items: Vec<StaticItem> = Vec::new();
    assert_eq!(names.get(&items, None).unwrap(), Some(Vec::new()));
    assert!(!names.can_apply_to(&items, None).unwrap());
}

#[test]
fn handlers_without_bindings_are_not_invoked() {
    let graph = ActionGraph::new();
    let names = names_action(&graph);
    let calls = Rc::new(RefCell::new(0_u32));
    let counter = Rc::clone(&calls);
    let _idle = graph
        .create(
            "idle",
            ActionDef::<String, ()>::new(move |_| {
                *counter.borrow_mut() += 1;
                Ok(CoreOutput::new())
            })
            .parent(&names),
        )
        .unwrap();

    let items = vec![StaticItem::new(vec![names.create_binding("only".into())])];
    assert_eq!(names.get(&items, None).unwrap(), Some(vec!["only".into()]));
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn bindings_of_reports_routed_bindings() {
    let graph = ActionGraph::new();
    let (list, dash) = list_actions(&graph);
    let names = names_action(&graph);

    let items = vec![
        StaticItem::new(vec![names.create_binding("n".into())]),
        StaticItem::new(vec![
            names.create_binding("m".into()),
            dash.create_binding("d".into()),
        ]),
    ];

    let routed = list.bindings_of(&items, None).unwrap();
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].0, 1);
    assert_eq!(routed[0].1.target(), dash.id());
    assert!(list.can_apply_to(&items, None).unwrap());
    assert!(!list.can_apply_to(&items[..1], None).unwrap());
}

// ── Fan-in ────────────────────────────────────────────────────────────────

type Log = Rc<RefCell<Vec<(String, Vec<String>)>>>;

fn forwarding(
    name: &'static str,
    to: &Action<String, Vec<String>>,
    log: &Log,
) -> ActionDef<String, ()> {
    let target = to.clone();
    let log = Rc::clone(log);
    ActionDef::<String, ()>::new(move |input| {
        log.borrow_mut().push((name.to_string(), input.data.clone()));
        Ok(input
            .data
            .iter()
            .enumerate()
            .fold(CoreOutput::new(), |out, (i, d)| {
                out.with_child_from(i, target.create_binding(format!("{name}:{d}")))
            }))
    })
    .parent(to)
}

#[test]
fn two_parents_both_receive_children() {
    let graph = ActionGraph::new();
    let log: Log = Rc::default();
    let root = names_action(&graph);
    let left = graph.create("left", forwarding("left", &root, &log)).unwrap();
    let right = graph.create("right", forwarding("right", &root, &log)).unwrap();

    let (l, r) = (left.clone(), right.clone());
    let leaf = graph
        .create(
            "leaf",
            ActionDef::<String, ()>::new(move |input| {
                let mut out = CoreOutput::new();
                for (i, d) in input.data.iter().enumerate() {
                    out = out
                        .with_child_from(i, l.create_binding(format!("{d}>l")))
                        .with_child_from(i, r.create_binding(format!("{d}>r")));
                }
                Ok(out)
            })
            .parent(&left)
            .parent(&right),
        )
        .unwrap();

    let items = vec![
        StaticItem::new(vec![left.create_binding("L0".into())]),
        StaticItem::new(vec![leaf.create_binding("x".into())]),
        StaticItem::new(vec![right.create_binding("R2".into())]),
    ];

    let result = root.get(&items, None).unwrap().unwrap();
    assert_eq!(
        result,
        vec!["left:L0", "left:x>l", "right:x>r", "right:R2"]
    );

    let mut calls = log.borrow().clone();
    calls.sort();
    assert_eq!(
        calls,
        vec![
            ("left".to_string(), vec!["L0".to_string(), "x>l".into()]),
            ("right".to_string(), vec!["x>r".to_string(), "R2".into()]),
        ]
    );
}

#[test]
fn children_for_unqueried_branches_are_dropped() {
    let graph = ActionGraph::new();
    let log: Log = Rc::default();
    let root = names_action(&graph);
    let left = graph.create("left", forwarding("left", &root, &log)).unwrap();
    let other = names_action(&graph);
    let (l, o) = (left.clone(), other.clone());
    let leaf = graph
        .create(
            "leaf",
            ActionDef::<String, ()>::new(move |input| {
                Ok(CoreOutput::new()
                    .with_child(l.create_binding(input.data.concat()))
                    .with_child(o.create_binding("elsewhere".into())))
            })
            .parent(&left)
            .parent(&other),
        )
        .unwrap();

    let items = vec![StaticItem::new(vec![leaf.create_binding("v".into())])];
    assert_eq!(
        root.get(&items, None).unwrap(),
        Some(vec!["left:v".to_string()])
    );
    assert_eq!(
        other.get(&items, None).unwrap(),
        Some(vec!["elsewhere".to_string()])
    );
}

// ── Overrides ─────────────────────────────────────────────────────────────

#[test]
fn override_replaces_base_binding_on_same_item() {
    let graph = ActionGraph::new();
    let seen: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let open = graph
        .create(
            "open",
            ActionDef::<String, _>::new(move |input| {
                sink.borrow_mut().extend(input.data.iter().cloned());
                Ok(CoreOutput::result(input.data))
            }),
        )
        .unwrap();
    let target = open.clone();
    let open_with = graph
        .create(
            "openWith",
            ActionDef::<String, ()>::new(move |input| {
                Ok(CoreOutput::new().with_children(
                    input
                        .data
                        .iter()
                        .map(|d| target.create_binding(format!("special {d}"))),
                ))
            })
            .parent(&open)
            .overrides(&open),
        )
        .unwrap();

    let items = vec![
        StaticItem::new(vec![
            open.create_binding("a".into()),
            open_with.create_binding("b".into()),
        ]),
        StaticItem::new(vec![open.create_binding("c".into())]),
    ];

    let result = open.get(&items, None).unwrap().unwrap();
    assert_eq!(result, vec!["special b".to_string(), "c".into()]);
    assert!(!seen.borrow().contains(&"a".to_string()));
}

// ── Reactivity ────────────────────────────────────────────────────────────

#[test]
fn binding_list_change_invalidates_hooked_reader() {
    let graph = ActionGraph::new();
    let names = names_action(&graph);
    let item = FieldItem::new(vec![names.create_binding("a".into())]);
    let items = vec![item.clone()];

    let hook = Hook::detached();
    assert_eq!(
        names.get(&items, Some(&hook)).unwrap(),
        Some(vec!["a".to_string()])
    );
    assert!(!hook.is_dirty());

    item.push_binding(names.create_binding("b".into()));
    assert!(hook.is_dirty());
    assert_eq!(
        names.get(&items, None).unwrap(),
        Some(vec!["a".to_string(), "b".into()])
    );
}

#[test]
fn dynamic_payload_change_invalidates_hooked_reader() {
    let graph = ActionGraph::new();
    let names = names_action(&graph);
    let source = Field::new("before".to_string());
    let src = source.clone();
    let items = vec![StaticItem::new(vec![
        names.create_dynamic_binding(move |h| src.get(h)),
    ])];

    let hook = Hook::detached();
    assert_eq!(
        names.get(&items, Some(&hook)).unwrap(),
        Some(vec!["before".to_string()])
    );
    source.set("after".into());
    assert!(hook.is_dirty());
    assert_eq!(
        names.get(&items, None).unwrap(),
        Some(vec!["after".to_string()])
    );
}

#[test]
fn watched_query_recomputes_only_after_change() {
    let graph = ActionGraph::new();
    let (list, dash) = list_actions(&graph);
    let item = FieldItem::new(vec![dash.create_binding("x".into())]);
    let watched = list.watch(vec![item.clone()]);

    assert_eq!(watched.get(None).unwrap().as_deref(), Some("- x"));
    assert_eq!(watched.get(None).unwrap().as_deref(), Some("- x"));
    assert_eq!(watched.epoch(), 1);

    let outer = Hook::detached();
    let _ = watched.get(Some(&outer));
    item.set_bindings(vec![
        dash.create_binding("x".into()),
        list.create_binding("y".into()),
    ]);
    assert!(outer.is_dirty());
    assert!(watched.is_stale());
    assert_eq!(watched.get(None).unwrap().as_deref(), Some("- x\ny"));
    assert_eq!(watched.epoch(), 2);
}

#[test]
fn boxed_items_mix_kinds() {
    let graph = ActionGraph::new();
    let names = names_action(&graph);
    let items: Vec<Box<dyn Item>> = vec![
        Box::new(StaticItem::new(vec![names.create_binding("s".into())])),
        Box::new(FieldItem::new(vec![names.create_binding("f".into())])),
    ];
    assert_eq!(
        names.get(&items, None).unwrap(),
        Some(vec!["s".to_string(), "f".into()])
    );
}

// ── Errors ────────────────────────────────────────────────────────────────

#[test]
fn handler_error_propagates_with_action_name() {
    let graph = ActionGraph::new();
    let names = names_action(&graph);
    let failing = graph
        .create(
            "failing",
            ActionDef::<String, ()>::new(|_| Err(ActionError::handler("disk full")))
                .parent(&names),
        )
        .unwrap();

    let items = vec![StaticItem::new(vec![failing.create_binding("x".into())])];
    assert_eq!(
        names.get(&items, None).unwrap_err(),
        ActionError::Handler {
            action: "failing".into(),
            message: "disk full".into()
        }
    );
}

#[test]
fn child_for_non_ancestor_is_rejected() {
    let graph = ActionGraph::new();
    let names = names_action(&graph);
    let unrelated = names_action(&graph);
    let stray = unrelated.clone();
    let rogue = graph
        .create(
            "rogue",
            ActionDef::<String, ()>::new(move |_| {
                Ok(CoreOutput::new().with_child(stray.create_binding("x".into())))
            })
            .parent(&names),
        )
        .unwrap();

    let items = vec![StaticItem::new(vec![rogue.create_binding("x".into())])];
    assert!(matches!(
        names.get(&items, None).unwrap_err(),
        ActionError::InvalidChild { action, .. } if action == "rogue"
    ));
}

#[test]
fn out_of_range_attribution_is_rejected() {
    let graph = ActionGraph::new();
    let names = names_action(&graph);
    let target = names.clone();
    let sloppy = graph
        .create(
            "sloppy",
            ActionDef::<String, ()>::new(move |_| {
                Ok(CoreOutput::new().with_child_from(5, target.create_binding("x".into())))
            })
            .parent(&names),
        )
        .unwrap();

    let items = vec![StaticItem::new(vec![sloppy.create_binding("x".into())])];
    assert_eq!(
        names.get(&items, None).unwrap_err(),
        ActionError::ChildIndexOutOfRange {
            action: "sloppy".into(),
            index: 5,
            inputs: 1
        }
    );
}

#[test]
fn unrelated_pending_binding_is_ignored() {
    let graph = ActionGraph::new();
    let names = names_action(&graph);
    let pending = graph.declare::<String, ()>("pending");

    let items = vec![
        StaticItem::new(vec![names.create_binding("John".into())]),
        StaticItem::new(vec![pending.create_binding("later".into())]),
    ];
    assert_eq!(
        names.get(&items, None).unwrap(),
        Some(vec!["John".to_string()])
    );
}

#[test]
fn undefined_query_is_rejected() {
    let graph = ActionGraph::new();
    let pending = graph.declare::<String, Vec<String>>("pending");
    let items: Vec<StaticItem> = Vec::new();
    assert_eq!(
        pending.get(&items, None).unwrap_err(),
        ActionError::Undefined("pending".into())
    );
}

#[test]
fn forward_declaration_resolves_once_defined() {
    let graph = ActionGraph::new();
    let root = graph.declare::<String, Vec<String>>("root");
    let target = root.clone();
    let handler = graph
        .create(
            "handler",
            ActionDef::<String, ()>::new(move |input| {
                Ok(CoreOutput::new().with_children(
                    input.data.iter().map(|d| target.create_binding(d.to_uppercase())),
                ))
            })
            .parent(&root),
        )
        .unwrap();
    graph
        .define(
            &root,
            ActionDef::<String, _>::new(|input| Ok(CoreOutput::result(input.data))),
        )
        .unwrap();

    let items = vec![StaticItem::new(vec![handler.create_binding("up".into())])];
    assert_eq!(root.get(&items, None).unwrap(), Some(vec!["UP".to_string()]));
}
