//! View state machine transitions: join, update, error, disconnect,
//! reconnect, nested views and teardown.

use crate::hooks::{Hook, HookContext};
use crate::protocol::{ClientMessage, ServerMessage, ViewId};
use crate::test_support::{
    drain, inner_markup, joined_runtime, main_view, paragraph_payload, test_runtime,
};
use crate::view::ViewState;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_mount_sends_join_without_fingerprint() {
    let (mut runtime, sent, container) = test_runtime();
    runtime.mount(main_view(), container).unwrap();

    assert_eq!(runtime.view(&main_view()).unwrap().state, ViewState::Joining);
    assert_eq!(
        drain(&sent),
        vec![ClientMessage::Join {
            view: main_view(),
            fingerprint: None,
        }]
    );
}

#[test]
fn test_join_ok_renders_and_marks_joined() {
    let (runtime, _sent, container) = joined_runtime(paragraph_payload("hello"));

    let view = runtime.view(&main_view()).unwrap();
    assert_eq!(view.state, ViewState::Joined);
    assert_eq!(view.join_count, 1);
    assert_eq!(inner_markup(&runtime, container), "<p id=\"msg\">hello</p>");
}

#[test]
fn test_diff_updates_existing_tree() {
    let (mut runtime, _sent, container) = joined_runtime(paragraph_payload("first"));

    runtime
        .handle_message(
            ServerMessage::Diff {
                view: main_view(),
                diff: json!({ "0": "second" }),
            },
            10,
        )
        .unwrap();
    assert_eq!(inner_markup(&runtime, container), "<p id=\"msg\">second</p>");
}

#[test]
fn test_join_rejects_component_links() {
    let (mut runtime, _sent, container) = test_runtime();
    runtime.mount(main_view(), container).unwrap();

    let result = runtime.handle_message(
        ServerMessage::JoinOk {
            view: main_view(),
            rendered: json!({
                "s": ["", ""],
                "0": 1,
                "c": { "1": { "s": -1 } },
            }),
        },
        0,
    );
    assert!(result.is_err());
    assert_eq!(runtime.view(&main_view()).unwrap().state, ViewState::Errored);
}

#[test]
fn test_malformed_diff_errors_the_view() {
    let (mut runtime, _sent, container) = joined_runtime(paragraph_payload("ok"));

    let result = runtime.handle_message(
        ServerMessage::Diff {
            view: main_view(),
            diff: json!({ "0": { "1": "partial tree over leaf" } }),
        },
        10,
    );
    assert!(result.is_err());

    let view = runtime.view(&main_view()).unwrap();
    assert_eq!(view.state, ViewState::Errored);
    assert!(runtime.document().has_class(container, "vn-error"));
    // The previous DOM state is left as-is.
    assert_eq!(inner_markup(&runtime, container), "<p id=\"msg\">ok</p>");
}

#[test]
fn test_errored_view_suspends_event_dispatch() {
    let (mut runtime, sent, container) = joined_runtime(paragraph_payload("ok"));
    runtime
        .handle_message(
            ServerMessage::Error {
                view: main_view(),
                reason: "boom".into(),
            },
            10,
        )
        .unwrap();

    let p = runtime.document().children(container)[0];
    runtime
        .dispatch_event(p, veneer_scheduler::EventKind::Click, "save", json!({}), None, 20)
        .unwrap();
    assert!(drain(&sent).is_empty());
}

#[test]
fn test_close_applies_disconnected_state() {
    let (mut runtime, _sent, container) = joined_runtime(paragraph_payload("ok"));
    runtime
        .handle_message(ServerMessage::Close { view: main_view() }, 10)
        .unwrap();

    let view = runtime.view(&main_view()).unwrap();
    assert_eq!(view.state, ViewState::Disconnected);
    assert!(runtime.document().has_class(container, "vn-disconnected"));
}

#[test]
fn test_reconnect_sends_fingerprint_and_clears_classes() {
    let (mut runtime, sent, container) = joined_runtime(paragraph_payload("ok"));
    let fingerprint = runtime.view(&main_view()).unwrap().rendered.fingerprint();

    runtime
        .handle_message(ServerMessage::Close { view: main_view() }, 10)
        .unwrap();
    runtime.reconnect(&main_view()).unwrap();

    assert_eq!(
        drain(&sent),
        vec![ClientMessage::Join {
            view: main_view(),
            fingerprint: Some(fingerprint),
        }]
    );

    runtime
        .handle_message(
            ServerMessage::JoinOk {
                view: main_view(),
                rendered: paragraph_payload("back"),
            },
            20,
        )
        .unwrap();

    let view = runtime.view(&main_view()).unwrap();
    assert_eq!(view.state, ViewState::Joined);
    assert_eq!(view.join_count, 2);
    assert!(!runtime.document().has_class(container, "vn-disconnected"));
    assert_eq!(inner_markup(&runtime, container), "<p id=\"msg\">back</p>");
}

#[test]
fn test_focus_restored_after_reconnect() {
    let (mut runtime, _sent, container) = joined_runtime(json!({
        "s": ["<input id=\"q\" value=\"", "\">"],
        "0": "typed",
    }));
    let input = runtime.document().children(container)[0];
    runtime.document_mut().set_focus(Some(input));
    runtime.document_mut().set_selection(Some((1, 4)));

    runtime
        .handle_message(ServerMessage::Close { view: main_view() }, 10)
        .unwrap();
    // Focus bookkeeping is dropped while disconnected.
    assert_eq!(runtime.document().focused(), None);

    runtime.reconnect(&main_view()).unwrap();
    runtime
        .handle_message(
            ServerMessage::JoinOk {
                view: main_view(),
                rendered: json!({
                    "s": ["<input id=\"q\" value=\"", "\">"],
                    "0": "typed",
                }),
            },
            20,
        )
        .unwrap();

    assert_eq!(runtime.document().focused(), Some(input));
    assert_eq!(runtime.document().selection(), Some((1, 4)));
}

// A hook that records each lifecycle entry point it observes.
struct Recorder {
    log: Rc<RefCell<Vec<String>>>,
}

impl Hook for Recorder {
    fn mounted(&mut self, ctx: &mut HookContext<'_>) {
        ctx.subscribe("ping");
        self.log.borrow_mut().push("mounted".into());
    }
    fn before_update(&mut self, _ctx: &mut HookContext<'_>) {
        self.log.borrow_mut().push("before_update".into());
    }
    fn updated(&mut self, _ctx: &mut HookContext<'_>) {
        self.log.borrow_mut().push("updated".into());
    }
    fn disconnected(&mut self, _ctx: &mut HookContext<'_>) {
        self.log.borrow_mut().push("disconnected".into());
    }
    fn reconnected(&mut self, _ctx: &mut HookContext<'_>) {
        self.log.borrow_mut().push("reconnected".into());
    }
    fn destroyed(&mut self, _ctx: &mut HookContext<'_>) {
        self.log.borrow_mut().push("destroyed".into());
    }
    fn handle_event(&mut self, name: &str, payload: &Value, ctx: &mut HookContext<'_>) {
        // Patch-then-notify: by dispatch time the DOM already shows the
        // update that carried this event.
        assert_eq!(ctx.attr("data-n"), Some("2"));
        self.log
            .borrow_mut()
            .push(format!("event:{}:{}", name, payload));
    }
}

fn hooked_runtime(log: &Rc<RefCell<Vec<String>>>) -> (crate::Runtime, crate::test_support::Outbox) {
    let (mut runtime, sent, container) = test_runtime();
    let log = log.clone();
    runtime
        .hooks_mut()
        .register("Recorder", move || Recorder { log: log.clone() });
    runtime.mount(main_view(), container).unwrap();
    runtime
        .handle_message(
            ServerMessage::JoinOk {
                view: main_view(),
                rendered: json!({
                    "s": ["<div id=\"h\" data-hook=\"Recorder\" data-n=\"", "\"></div>"],
                    "0": "1",
                }),
            },
            0,
        )
        .unwrap();
    sent.borrow_mut().clear();
    (runtime, sent)
}

#[test]
fn test_hook_lifecycle_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let (mut runtime, _sent) = hooked_runtime(&log);
    assert_eq!(*log.borrow(), vec!["mounted"]);

    // An update that changes the element, carrying an event for the hook.
    runtime
        .handle_message(
            ServerMessage::Diff {
                view: main_view(),
                diff: json!({ "0": "2", "e": [["ping", {"n": 1}]] }),
            },
            10,
        )
        .unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["mounted", "before_update", "updated", "event:ping:{\"n\":1}"]
    );

    // Removal: destroyed fires, and no further lifecycle events follow.
    runtime
        .handle_message(
            ServerMessage::Diff {
                view: main_view(),
                diff: json!({ "s": ["<p>empty</p>"] }),
            },
            20,
        )
        .unwrap();
    assert_eq!(log.borrow().last().map(String::as_str), Some("destroyed"));
}

#[test]
fn test_disconnected_reconnected_symmetry() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let (mut runtime, _sent) = hooked_runtime(&log);

    runtime
        .handle_message(ServerMessage::Close { view: main_view() }, 10)
        .unwrap();
    assert_eq!(log.borrow().last().map(String::as_str), Some("disconnected"));

    runtime.reconnect(&main_view()).unwrap();
    runtime
        .handle_message(
            ServerMessage::JoinOk {
                view: main_view(),
                rendered: json!({
                    "s": ["<div id=\"h\" data-hook=\"Recorder\" data-n=\"", "\"></div>"],
                    "0": "1",
                }),
            },
            20,
        )
        .unwrap();

    let entries = log.borrow();
    assert_eq!(
        entries.iter().filter(|entry| *entry == "reconnected").count(),
        1
    );

    // A first join must never produce an orphan reconnect notification.
    let fresh_log = Rc::new(RefCell::new(Vec::new()));
    let (_runtime, _sent) = hooked_runtime(&fresh_log);
    assert!(!fresh_log.borrow().iter().any(|entry| entry == "reconnected"));
}

#[test]
fn test_child_view_mounts_and_cascades_destroy() {
    let (mut runtime, sent, container) = test_runtime();
    runtime.mount(main_view(), container).unwrap();
    drain(&sent);
    runtime
        .handle_message(
            ServerMessage::JoinOk {
                view: main_view(),
                rendered: json!({
                    "s": ["<section>", "</section>"],
                    "0": "<div data-view=\"child\" id=\"c\"></div>",
                }),
            },
            0,
        )
        .unwrap();

    // The boundary element triggered an asynchronous child join.
    assert_eq!(
        drain(&sent),
        vec![ClientMessage::Join {
            view: ViewId::new("child"),
            fingerprint: None,
        }]
    );
    let child_id = ViewId::new("child");
    assert_eq!(
        runtime.view(&child_id).unwrap().parent,
        Some(main_view())
    );
    assert!(runtime
        .view(&main_view())
        .unwrap()
        .children
        .contains(&child_id));

    // The child joins and renders inside its boundary without the parent
    // patching into it.
    runtime
        .handle_message(
            ServerMessage::JoinOk {
                view: child_id.clone(),
                rendered: json!({ "s": ["<em>child content</em>"] }),
            },
            10,
        )
        .unwrap();
    assert!(inner_markup(&runtime, container).contains("<em>child content</em>"));

    // Destroying the parent cascades: the child leaves first.
    runtime.destroy_view(&main_view()).unwrap();
    let leaves: Vec<ClientMessage> = drain(&sent);
    assert_eq!(
        leaves,
        vec![
            ClientMessage::Leave { view: child_id.clone() },
            ClientMessage::Leave { view: main_view() },
        ]
    );
    assert!(runtime.view(&child_id).is_none());
    assert!(runtime.view(&main_view()).is_none());
}

#[test]
fn test_discarded_boundary_tears_child_down() {
    let (mut runtime, sent, container) = test_runtime();
    runtime.mount(main_view(), container).unwrap();
    runtime
        .handle_message(
            ServerMessage::JoinOk {
                view: main_view(),
                rendered: json!({
                    "s": ["<section>", "</section>"],
                    "0": "<div data-view=\"child\" id=\"c\"></div>",
                }),
            },
            0,
        )
        .unwrap();
    drain(&sent);

    runtime
        .handle_message(
            ServerMessage::Diff {
                view: main_view(),
                diff: json!({ "0": "<p>replaced</p>" }),
            },
            10,
        )
        .unwrap();

    assert!(runtime.view(&ViewId::new("child")).is_none());
    assert_eq!(
        drain(&sent),
        vec![ClientMessage::Leave {
            view: ViewId::new("child"),
        }]
    );
}

#[test]
fn test_diff_for_non_joined_view_is_dropped() {
    let (mut runtime, _sent, container) = joined_runtime(paragraph_payload("ok"));
    runtime
        .handle_message(ServerMessage::Close { view: main_view() }, 10)
        .unwrap();

    runtime
        .handle_message(
            ServerMessage::Diff {
                view: main_view(),
                diff: json!({ "0": "late" }),
            },
            20,
        )
        .unwrap();
    assert_eq!(inner_markup(&runtime, container), "<p id=\"msg\">ok</p>");
}

#[test]
fn test_form_recovery_once_per_reconnect() {
    let form_payload = json!({
        "s": [
            "<form id=\"f\" data-auto-recover=\"restore\"><input name=\"q\" value=\"",
            "\"></form>"
        ],
        "0": "draft",
    });
    let (mut runtime, sent, _container) = joined_runtime(form_payload.clone());

    // First join: nothing to recover.
    assert!(drain(&sent).is_empty());

    runtime
        .handle_message(ServerMessage::Close { view: main_view() }, 10)
        .unwrap();
    runtime.reconnect(&main_view()).unwrap();
    runtime
        .handle_message(
            ServerMessage::JoinOk {
                view: main_view(),
                rendered: form_payload.clone(),
            },
            20,
        )
        .unwrap();

    let recovery: Vec<ClientMessage> = drain(&sent)
        .into_iter()
        .filter(|message| matches!(message, ClientMessage::Event { .. }))
        .collect();
    assert_eq!(recovery.len(), 1);
    match &recovery[0] {
        ClientMessage::Event { kind, event, value, .. } => {
            assert_eq!(kind, "form");
            assert_eq!(event, "restore");
            assert_eq!(value, &json!({"q": "draft"}));
        }
        other => panic!("expected recovery event, got {:?}", other),
    }

    // Re-renders after the reconnect must not trigger recovery again.
    runtime
        .handle_message(
            ServerMessage::Diff {
                view: main_view(),
                diff: json!({ "0": "draft2" }),
            },
            30,
        )
        .unwrap();
    assert!(drain(&sent)
        .iter()
        .all(|message| !matches!(message, ClientMessage::Event { kind, .. } if kind == "form")));
}

#[test]
fn test_runtimes_are_independent() {
    let (mut a, sent_a, container_a) = test_runtime();
    let (mut b, sent_b, container_b) = test_runtime();

    a.mount(main_view(), container_a).unwrap();
    b.mount(main_view(), container_b).unwrap();
    a.handle_message(
        ServerMessage::JoinOk {
            view: main_view(),
            rendered: paragraph_payload("a"),
        },
        0,
    )
    .unwrap();

    assert_eq!(a.view(&main_view()).unwrap().state, ViewState::Joined);
    assert_eq!(b.view(&main_view()).unwrap().state, ViewState::Joining);
    assert_eq!(sent_a.borrow().len(), 1);
    assert_eq!(sent_b.borrow().len(), 1);
}
