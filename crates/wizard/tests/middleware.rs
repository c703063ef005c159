//! Middleware hooks and observers across every way a run can end.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::{Arc, Mutex};

use {
    async_trait::async_trait,
    common::{ScriptedChannel, USER, ctx, drain},
    parley_common::{
        ResponseMap, Validation, WizardContext,
        hooks::{WizardEvent, WizardNotification, WizardObserver},
    },
    parley_wizard::{
        CancelReason, Error, RunOutcome, StepContext, StepDefinition, Wizard, WizardMiddleware,
        WizardOptions,
    },
    serde_json::{Value, json},
};

/// Records every hook call as a short line.
#[derive(Default)]
struct HookLog {
    calls: Mutex<Vec<String>>,
    completed: Mutex<Option<(ResponseMap, WizardContext)>>,
    fail_after: Option<&'static str>,
}

impl HookLog {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl WizardMiddleware for HookLog {
    async fn after_step(
        &self,
        step: &StepDefinition,
        response: &Value,
        _ctx: &StepContext,
    ) -> anyhow::Result<()> {
        self.push(format!("after:{}={response}", step.id));
        if self.fail_after == Some(step.id.as_str()) {
            anyhow::bail!("audit log unavailable");
        }
        Ok(())
    }

    async fn on_error(&self, _error: &Error, step: Option<&StepDefinition>, _ctx: &StepContext) {
        self.push(format!("error:{}", step.map_or("-", |s| s.id.as_str())));
    }

    async fn on_complete(
        &self,
        responses: &ResponseMap,
        ctx: &WizardContext,
    ) -> anyhow::Result<()> {
        self.push("complete".into());
        *self.completed.lock().unwrap() = Some((responses.clone(), ctx.clone()));
        Ok(())
    }

    async fn on_cancel(&self, ctx: &StepContext) -> anyhow::Result<()> {
        self.push(format!("cancel:{}", ctx.step_id));
        Ok(())
    }
}

fn two_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::text("name", "Name?"),
        StepDefinition::number("age", "Age?"),
    ]
}

fn build(
    channel: &Arc<ScriptedChannel>,
    steps: Vec<StepDefinition>,
    options: WizardOptions,
    log: &Arc<HookLog>,
) -> Arc<Wizard<ScriptedChannel>> {
    Arc::new(
        Wizard::builder(Arc::clone(channel), steps)
            .options(options)
            .middleware(log.clone())
            .build()
            .unwrap(),
    )
}

#[tokio::test(start_paused = true)]
async fn on_complete_receives_the_final_responses() {
    let channel = ScriptedChannel::new();
    let log = Arc::new(HookLog::default());
    let wizard = build(&channel, two_steps(), WizardOptions::default(), &log);
    channel.replies(&["Ada", "36"]);

    assert!(wizard.start(ctx()).await.unwrap().is_completed());

    assert_eq!(log.calls(), [
        "after:name=\"Ada\"",
        "after:age=36",
        "complete"
    ]);
    let (responses, context) = log.completed.lock().unwrap().clone().unwrap();
    assert_eq!(responses["name"], json!("Ada"));
    assert_eq!(responses["age"], json!(36));
    assert_eq!(context.user_id, USER);
    assert_eq!(log.count("cancel"), 0);
}

#[tokio::test(start_paused = true)]
async fn after_step_failure_stops_before_the_step_is_committed() {
    let channel = ScriptedChannel::new();
    let log = Arc::new(HookLog {
        fail_after: Some("name"),
        ..Default::default()
    });
    let wizard = build(
        &channel,
        two_steps(),
        WizardOptions {
            persist: true,
            session_id: Some("audit".into()),
            ..Default::default()
        },
        &log,
    );
    let mut events = wizard.subscribe();
    channel.reply("Ada");

    let outcome = wizard.start(ctx()).await.unwrap();

    let RunOutcome::Errored { step_id, error } = outcome else {
        panic!("expected an error outcome");
    };
    assert_eq!(step_id.as_deref(), Some("name"));
    assert!(error.contains("audit log unavailable"), "{error}");
    assert_eq!(log.calls(), ["after:name=\"Ada\"", "error:name"]);
    assert!(!channel.texts().iter().any(|t| t.contains("Age?")));

    let notifications = drain(&mut events);
    let saved: Vec<_> = notifications
        .iter()
        .filter_map(|n| match n {
            WizardNotification::SessionSaved { step_index, .. } => Some(*step_index),
            _ => None,
        })
        .collect();
    // only the initial snapshot; the failed step never advanced the pointer
    assert_eq!(saved, [0]);
    assert_eq!(
        notifications
            .iter()
            .filter(|n| n.event() == WizardEvent::RunErrored)
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn on_cancel_runs_once_for_the_cancel_word() {
    let channel = ScriptedChannel::new();
    let log = Arc::new(HookLog::default());
    let wizard = build(
        &channel,
        two_steps(),
        WizardOptions {
            allow_cancel: true,
            ..Default::default()
        },
        &log,
    );
    channel.replies(&["Ada", "cancel"]);

    let outcome = wizard.start(ctx()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled {
        step_id: Some("age".into()),
        reason: CancelReason::Requested,
    });
    assert_eq!(log.calls(), ["after:name=\"Ada\"", "cancel:age"]);
}

#[tokio::test(start_paused = true)]
async fn on_cancel_runs_once_when_retries_run_out() {
    let channel = ScriptedChannel::new();
    let log = Arc::new(HookLog::default());
    let wizard = build(
        &channel,
        vec![
            StepDefinition::text("code", "Code?")
                .with_retry(2)
                .with_validate(|_, _| Ok(Validation::reject("Wrong code"))),
        ],
        WizardOptions::default(),
        &log,
    );
    channel.replies(&["a", "b"]);

    let outcome = wizard.start(ctx()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled {
        step_id: Some("code".into()),
        reason: CancelReason::MaxRetries,
    });
    assert_eq!(log.calls(), ["cancel:code"]);
}

#[tokio::test(start_paused = true)]
async fn on_cancel_runs_once_for_an_external_cancel() {
    let channel = ScriptedChannel::new();
    let log = Arc::new(HookLog::default());
    let wizard = build(&channel, two_steps(), WizardOptions::default(), &log);
    let run = tokio::spawn({
        let wizard = Arc::clone(&wizard);
        async move { wizard.start(ctx()).await }
    });
    channel.wait_for_sent(1).await;

    assert!(wizard.cancel().await);
    assert!(!wizard.cancel().await);

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome, RunOutcome::Cancelled {
        step_id: Some("name".into()),
        reason: CancelReason::Requested,
    });
    assert_eq!(log.calls(), ["cancel:name"]);
}

/// Fails on every step notification, records everything it sees.
struct FlakyObserver {
    seen: Mutex<Vec<WizardEvent>>,
}

#[async_trait]
impl WizardObserver for FlakyObserver {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn notify(&self, notification: &WizardNotification) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(notification.event());
        if notification.event() == WizardEvent::StepEntered {
            anyhow::bail!("step notifications fail");
        }
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn failing_observer_still_sees_the_run_complete() {
    let channel = ScriptedChannel::new();
    let observer = Arc::new(FlakyObserver {
        seen: Mutex::new(Vec::new()),
    });
    let wizard = Wizard::builder(Arc::clone(&channel), vec![
        StepDefinition::text("name", "Name?"),
        StepDefinition::text("city", "City?"),
        StepDefinition::text("pet", "Pet?"),
    ])
    .observer(observer.clone())
    .build()
    .unwrap();
    channel.replies(&["Ada", "Paris", "Cat"]);

    assert!(wizard.start(ctx()).await.unwrap().is_completed());

    assert_eq!(*observer.seen.lock().unwrap(), [
        WizardEvent::RunStarted,
        WizardEvent::StepEntered,
        WizardEvent::StepEntered,
        WizardEvent::StepEntered,
        WizardEvent::RunCompleted,
    ]);
}
