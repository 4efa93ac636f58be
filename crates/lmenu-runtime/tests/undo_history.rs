#![forbid(unsafe_code)]

//! Serialization, batching and tracing of [`UndoRedoFacility`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lmenu_reactive::{Field, Hook};
use lmenu_runtime::{
    BatchDecision, CallbackCommand, Command, CommandEffect, CommandError, CommandMetadata,
    CommandResult, SetFieldCommand, UndoRedoFacility, time_window_batch,
};
use tokio::sync::Notify;
use tokio::task::{self, LocalSet};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

type Log = Rc<RefCell<Vec<String>>>;

async fn settle() {
    for _ in 0..4 {
        task::yield_now().await;
    }
}

/// Effect that waits for a notification in the middle of executing.
struct Gated {
    name: &'static str,
    gate: Option<Rc<Notify>>,
    log: Log,
}

#[async_trait(?Send)]
impl CommandEffect for Gated {
    async fn on_execute(&self) -> CommandResult {
        self.log.borrow_mut().push(format!("start {}", self.name));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.log.borrow_mut().push(format!("end {}", self.name));
        Ok(())
    }

    async fn on_revert(&self) -> CommandResult {
        self.log.borrow_mut().push(format!("revert {}", self.name));
        Ok(())
    }
}

fn gated(name: &'static str, gate: Option<&Rc<Notify>>, log: &Log) -> Command {
    Command::new(
        CommandMetadata::new(name),
        Gated {
            name,
            gate: gate.cloned(),
            log: Rc::clone(log),
        },
    )
}

// ═════════════════════════════════════════════════════════════════════════
// Serialization
// ═════════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "current_thread")]
async fn operations_never_overlap() {
    LocalSet::new()
        .run_until(async {
            let history = UndoRedoFacility::default();
            let log = Log::default();
            let gate = Rc::new(Notify::new());
            let busy = Hook::detached();
            assert!(!history.is_busy(Some(&busy)));

            let first = {
                let (history, cmd) = (history.clone(), gated("a", Some(&gate), &log));
                task::spawn_local(async move { history.execute(cmd).await })
            };
            settle().await;
            assert!(history.is_busy(None));
            assert!(busy.is_dirty());

            let second = {
                let (history, cmd) = (history.clone(), gated("b", None, &log));
                task::spawn_local(async move { history.execute(cmd).await })
            };
            let undo = {
                let history = history.clone();
                task::spawn_local(async move { history.undo().await })
            };
            settle().await;
            assert_eq!(*log.borrow(), ["start a"]);

            gate.notify_one();
            first.await.unwrap().unwrap();
            second.await.unwrap().unwrap();
            assert_eq!(undo.await.unwrap(), Some(Ok("b".to_string())));

            assert_eq!(*log.borrow(), ["start a", "end a", "start b", "end b", "revert b"]);
            assert_eq!(history.undo_descriptions(10), ["a"]);
            assert_eq!(history.redo_descriptions(10), ["b"]);
            assert!(!history.is_busy(None));
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn clear_during_execute_discards_it() {
    LocalSet::new()
        .run_until(async {
            let history = UndoRedoFacility::default();
            let log = Log::default();
            let gate = Rc::new(Notify::new());
            history.execute(gated("old", None, &log)).await.unwrap();

            let pending = {
                let (history, cmd) = (history.clone(), gated("new", Some(&gate), &log));
                task::spawn_local(async move { history.execute(cmd).await })
            };
            settle().await;
            history.clear();
            gate.notify_one();
            pending.await.unwrap().unwrap();

            // Recorded after the clear, on a fresh history.
            assert_eq!(history.undo_descriptions(10), ["new"]);
        })
        .await;
}

// ═════════════════════════════════════════════════════════════════════════
// Batching
// ═════════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "current_thread")]
async fn typing_burst_is_one_undo_step() {
    let text = Field::new(String::new());
    let history = UndoRedoFacility::default();
    let policy = time_window_batch(Duration::from_secs(60));

    for (i, typed) in ["h", "he", "hel"].into_iter().enumerate() {
        let cmd = Command::new(
            CommandMetadata::new(format!("type {i}")).with_batch(1),
            SetFieldCommand::new(&text, typed.to_string()),
        );
        history.execute_batched(cmd, policy.clone()).await.unwrap();
    }
    let unrelated = Command::new(
        CommandMetadata::new("paste").with_batch(2),
        SetFieldCommand::new(&text, "hello".to_string()),
    );
    history
        .execute_batched(unrelated, policy.clone())
        .await
        .unwrap();

    let snapshot = history.commands(None);
    assert_eq!(snapshot.past.len(), 2);
    assert_eq!(snapshot.past[0].name(), "type 0");
    assert_eq!(snapshot.past[0].as_compound().map(|c| c.len()), Some(3));

    history.undo().await.unwrap().unwrap();
    assert_eq!(text.get(None), "hel");
    history.undo().await.unwrap().unwrap();
    assert_eq!(text.get(None), "");
    assert!(!history.can_undo(None));
}

#[tokio::test(flavor = "current_thread")]
async fn batch_fn_sees_previous_and_new() {
    let history = UndoRedoFacility::default();
    let noop = || CallbackCommand::new(|| Ok(()), || Ok(()));
    history
        .execute(noop().into_command("first"))
        .await
        .unwrap();

    let seen = RefCell::new(None);
    history
        .execute_batched(noop().into_command("second"), |previous, next| {
            *seen.borrow_mut() = Some((previous.name().to_string(), next.name().to_string()));
            BatchDecision::Separate
        })
        .await
        .unwrap();
    assert_eq!(
        seen.into_inner(),
        Some(("first".to_string(), "second".to_string()))
    );
}

// ═════════════════════════════════════════════════════════════════════════
// Tracing
// ═════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct CapturedSpan {
    name: String,
    fields: HashMap<String, String>,
}

#[derive(Default, Clone)]
struct SpanCapture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    warnings: Arc<Mutex<Vec<String>>>,
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for SpanCapture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        self.spans.lock().unwrap().push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            let mut visitor = FieldVisitor(Vec::new());
            event.record(&mut visitor);
            let message = visitor
                .0
                .into_iter()
                .find(|(name, _)| name == "message")
                .map(|(_, value)| value)
                .unwrap_or_default();
            self.warnings.lock().unwrap().push(message);
        }
    }
}

#[tokio::test(flavor = "current_thread")]
async fn history_operations_emit_spans() {
    let capture = SpanCapture::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));

    let field = Field::new(0);
    let history = UndoRedoFacility::default();
    history
        .execute(SetFieldCommand::new(&field, 1).into_command("set one"))
        .await
        .unwrap();
    history.undo().await.unwrap().unwrap();
    history.redo().await.unwrap().unwrap();

    let spans = capture.spans.lock().unwrap().clone();
    let names: Vec<&str> = spans
        .iter()
        .map(|s| s.name.as_str())
        .filter(|name| name.starts_with("undo."))
        .collect();
    assert_eq!(names, ["undo.execute", "undo.undo", "undo.redo"]);
    assert!(
        spans
            .iter()
            .filter(|s| s.name.starts_with("undo."))
            .all(|s| s.fields.get("command").map(String::as_str) == Some("set one"))
    );
}

#[tokio::test(flavor = "current_thread")]
async fn failed_effect_logs_warning() {
    let capture = SpanCapture::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));

    let history = UndoRedoFacility::default();
    let cmd = CallbackCommand::new(|| Err(CommandError::other("disk full")), || Ok(()))
        .into_command("save");
    assert_eq!(
        history.execute(cmd).await,
        Err(CommandError::Other("disk full".into()))
    );
    assert_eq!(
        *capture.warnings.lock().unwrap(),
        ["command execute failed".to_string()]
    );
}
