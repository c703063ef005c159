//! The flow controller and step executor.
//!
//! One task at a time drives the run loop (the caller of `start`, `resume`, or
//! a navigation call made while nothing was driving). Every other entry point
//! only mutates [`RunState`] under the lock and bumps its epoch; the watch
//! channel wakes the driver so it abandons whatever it was awaiting and
//! re-reads the pointer.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock},
    time::Duration,
};

use {
    parley_channels::{
        AwaitChoiceOptions, AwaitReplyOptions, ChannelIo, ChoiceKind, InputFilter,
        OutboundMessage,
    },
    parley_common::{
        ResponseMap, WizardContext,
        hooks::{ObserverRegistry, WizardNotification, WizardObserver},
        types::DEFAULT_REJECTION,
    },
    parley_sessions::{
        SessionCache, SessionRepository, SessionSnapshot, SessionStore, generate_session_id,
        now_ms,
    },
    serde_json::Value,
    tokio::sync::{mpsc, watch},
    tracing::{debug, info, warn},
};

use crate::{
    context::StepContext,
    error::{Context as _, Error, HookStage, Result},
    extract::{self, Extracted},
    middleware::WizardMiddleware,
    options::WizardOptions,
    prompt::{self, NavWord},
    state::{CancelReason, RunOutcome, RunState, RunStatus},
    step::{StepDefinition, StepKind, check_steps},
    timer::WarningTimer,
};

pub(crate) const CANCELLED_MESSAGE: &str = "❌ Wizard cancelled.";
pub(crate) const TIMEOUT_MESSAGE: &str = "⏱️ You took too long to respond. The wizard has ended.";

fn failure_message(error: &Error) -> String {
    if error.is_timeout() {
        TIMEOUT_MESSAGE.to_string()
    } else {
        format!("❌ An error occurred: {error}. The wizard has ended.")
    }
}

fn max_retries_message(limit: u32) -> String {
    format!("Maximum retry attempts ({limit}) reached. Please start over or contact support.")
}

/// What one await on the channel produced.
enum Input {
    Answer(Value),
    /// The reply could not be read as this step's kind; re-await.
    Invalid(String),
    Nav(NavWord),
    Failed(Error),
    /// Navigation or termination happened while waiting.
    Superseded,
}

impl From<Extracted> for Input {
    fn from(extracted: Extracted) -> Self {
        match extracted {
            Extracted::Answer(value) => Self::Answer(value),
            Extracted::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Pointer and epoch a piece of work was started under.
type Position = (usize, u64);

/// The run a driver works on: its generation and where its outcome lands.
type RunTicket = (u64, Arc<OnceLock<RunOutcome>>);

/// Releases the driver slot when the driving future ends or is dropped.
struct DriverGuard<'a, C: ChannelIo> {
    wizard: &'a Wizard<C>,
    token: u64,
}

impl<C: ChannelIo> Drop for DriverGuard<'_, C> {
    fn drop(&mut self) {
        self.wizard.lock().release_driver(self.token);
    }
}

/// Resolves once the published epoch differs from `epoch`.
async fn superseded(mut nav: watch::Receiver<u64>, epoch: u64) {
    loop {
        if *nav.borrow_and_update() != epoch {
            return;
        }
        if nav.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// A multi-step conversational form bound to one channel.
pub struct Wizard<C: ChannelIo> {
    channel: Arc<C>,
    steps: Vec<StepDefinition>,
    options: WizardOptions,
    sessions: SessionRepository,
    middleware: Option<Arc<dyn WizardMiddleware>>,
    observers: RwLock<ObserverRegistry>,
    state: Mutex<RunState>,
    nav: watch::Sender<u64>,
}

pub struct WizardBuilder<C: ChannelIo> {
    channel: Arc<C>,
    steps: Vec<StepDefinition>,
    options: WizardOptions,
    cache: SessionCache,
    store: Option<Arc<dyn SessionStore>>,
    middleware: Option<Arc<dyn WizardMiddleware>>,
    observers: ObserverRegistry,
}

impl<C: ChannelIo> WizardBuilder<C> {
    #[must_use]
    pub fn options(mut self, options: WizardOptions) -> Self {
        self.options = options;
        self
    }

    /// Durable tier behind the session cache.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share a session cache between wizards.
    #[must_use]
    pub fn cache(mut self, cache: SessionCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn WizardMiddleware>) -> Self {
        self.middleware = Some(middleware);
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn WizardObserver>) -> Self {
        self.observers.register(observer);
        self
    }

    pub fn build(self) -> Result<Wizard<C>> {
        check_steps(&self.steps)?;
        let session_id = self
            .options
            .session_id
            .clone()
            .unwrap_or_else(generate_session_id);
        let (nav, _) = watch::channel(0);
        Ok(Wizard {
            channel: self.channel,
            steps: self.steps,
            options: self.options,
            sessions: SessionRepository::new(self.cache, self.store),
            middleware: self.middleware,
            observers: RwLock::new(self.observers),
            state: Mutex::new(RunState::new(session_id)),
            nav,
        })
    }
}

impl<C: ChannelIo> Wizard<C> {
    pub fn builder(channel: Arc<C>, steps: Vec<StepDefinition>) -> WizardBuilder<C> {
        WizardBuilder {
            channel,
            steps,
            options: WizardOptions::default(),
            cache: SessionCache::new(),
            store: None,
            middleware: None,
            observers: ObserverRegistry::new(),
        }
    }

    pub fn new(
        channel: Arc<C>,
        steps: Vec<StepDefinition>,
        options: WizardOptions,
    ) -> Result<Self> {
        Self::builder(channel, steps).options(options).build()
    }

    // ── Observers ───────────────────────────────────────────────────────────

    pub fn register_observer(&self, observer: Arc<dyn WizardObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .register(observer);
    }

    /// Receive every lifecycle notification from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<WizardNotification> {
        self.observers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .subscribe()
    }

    async fn emit(&self, notification: WizardNotification) {
        let registry = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        registry.dispatch(&notification).await;
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish the current epoch to a waiting driver.
    fn publish(&self, state: &RunState) {
        self.nav.send_replace(state.epoch);
    }

    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn options(&self) -> &WizardOptions {
        &self.options
    }

    pub fn sessions(&self) -> &SessionRepository {
        &self.sessions
    }

    /// Responses collected so far in the current run.
    pub fn responses(&self) -> ResponseMap {
        self.lock().responses.clone()
    }

    /// Index of the step the run is on (or will run next).
    pub fn current_step_index(&self) -> usize {
        self.lock().pointer
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_running()
    }

    pub fn status(&self) -> RunStatus {
        self.lock().status
    }

    pub fn session_id(&self) -> String {
        self.lock().session_id.clone()
    }

    /// How the most recent run ended.
    pub fn last_outcome(&self) -> Option<RunOutcome> {
        self.lock().outcome.clone()
    }

    // ── Flow control ────────────────────────────────────────────────────────

    /// Run the flow from its first step until it completes, is cancelled, or
    /// errors.
    pub async fn start(&self, context: WizardContext) -> Result<RunOutcome> {
        let (token, run, epoch, session_id, snapshot) = {
            let mut state = self.lock();
            if state.is_running() {
                return Err(Error::AlreadyRunning);
            }
            state.begin(context.clone(), now_ms());
            self.publish(&state);
            let snapshot = self.options.persist.then(|| state.snapshot(now_ms()));
            (
                state.take_driver(),
                (state.generation, state.ending()),
                state.epoch,
                state.session_id.clone(),
                snapshot,
            )
        };
        let guard = DriverGuard {
            wizard: self,
            token,
        };
        info!(
            session_id = %session_id,
            user_id = %context.user_id,
            channel_id = %context.channel_id,
            steps = self.steps.len(),
            "wizard run started"
        );

        if let Some(snapshot) = snapshot
            && let Err(e) = self.persist(&snapshot).await
        {
            self.fail((0, epoch), None, e).await;
        } else {
            let channel_id = context.channel_id.clone();
            self.emit(WizardNotification::RunStarted {
                session_id,
                context,
            })
            .await;
            if let Some(title) = &self.options.title
                && let Err(e) = self.say(&channel_id, title.clone()).await
            {
                self.fail((0, epoch), None, e).await;
            }
        }
        Ok(self.drive(guard, run).await)
    }

    /// Continue a persisted run. `Ok(None)` when no snapshot exists.
    pub async fn resume(&self, session_id: &str) -> Result<Option<RunOutcome>> {
        if self.is_active() {
            return Err(Error::AlreadyRunning);
        }
        let Some(snapshot) = self.sessions.load(session_id).await? else {
            debug!(session_id, "no session to resume");
            return Ok(None);
        };
        let step_index = snapshot.current_step_index;
        let (token, run) = {
            let mut state = self.lock();
            if state.is_running() {
                return Err(Error::AlreadyRunning);
            }
            state.restore(snapshot);
            self.publish(&state);
            (state.take_driver(), (state.generation, state.ending()))
        };
        let guard = DriverGuard {
            wizard: self,
            token,
        };
        info!(session_id, step_index, "wizard run resumed");
        self.emit(WizardNotification::RunResumed {
            session_id: session_id.to_string(),
            step_index,
        })
        .await;
        Ok(Some(self.drive(guard, run).await))
    }

    /// Cancel the active run. Returns false when nothing was running.
    pub async fn cancel(&self) -> bool {
        self.cancel_run(None, CancelReason::Requested).await
    }

    /// Re-enter the most recently accepted step, forgetting its response.
    pub async fn go_back(&self) -> bool {
        if !self.back_to_previous(None) {
            return false;
        }
        self.drive_if_idle().await;
        true
    }

    /// Leave the current step unanswered and move to the next one.
    pub async fn skip(&self) -> bool {
        if !self.skip_current(None).await {
            return false;
        }
        self.drive_if_idle().await;
        true
    }

    /// Move to the step with `step_id`. Responses are kept.
    pub async fn jump_to_step(&self, step_id: &str) -> bool {
        let Some(target) = self.steps.iter().position(|s| s.id == step_id) else {
            debug!(step_id, "jump target not found");
            return false;
        };
        {
            let mut state = self.lock();
            if !state.is_running() {
                return false;
            }
            state.jump(target);
            self.publish(&state);
        }
        debug!(step_id, step_index = target, "jumped to step");
        self.drive_if_idle().await;
        true
    }

    fn back_to_previous(&self, expected: Option<Position>) -> bool {
        if !self.options.allow_back {
            return false;
        }
        let mut state = self.lock();
        if !state.is_running() {
            return false;
        }
        if let Some((index, epoch)) = expected
            && !state.is_current(index, epoch)
        {
            return false;
        }
        let steps = &self.steps;
        match state.back(|i| steps.get(i).map(|s| s.id.clone())) {
            Some(index) => {
                self.publish(&state);
                debug!(step_index = index, "went back");
                true
            },
            None => false,
        }
    }

    async fn skip_current(&self, expected: Option<Position>) -> bool {
        if !self.options.allow_skip {
            return false;
        }
        let (step, index, epoch, ctx, session_id) = {
            let state = self.lock();
            if !state.is_running() {
                return false;
            }
            if let Some((index, epoch)) = expected
                && !state.is_current(index, epoch)
            {
                return false;
            }
            let index = state.pointer;
            let Some(step) = self.steps.get(index) else {
                return false;
            };
            (
                step,
                index,
                state.epoch,
                state.step_context(index, &step.id),
                state.session_id.clone(),
            )
        };
        if let Some(hook) = &step.on_skip
            && let Err(e) = hook(&ctx)
        {
            self.fail(
                (index, epoch),
                Some(step),
                Error::hook(&step.id, HookStage::Skip, e),
            )
            .await;
            return false;
        }
        self.emit(WizardNotification::StepSkipped {
            session_id,
            step_id: step.id.clone(),
            step_index: index,
        })
        .await;

        let mut state = self.lock();
        if !state.is_current(index, epoch) {
            return false;
        }
        state.skip();
        self.publish(&state);
        debug!(step_id = %step.id, "step skipped");
        true
    }

    /// Drive the run if it is active and no other task is driving it.
    async fn drive_if_idle(&self) {
        let claim = {
            let mut state = self.lock();
            if state.is_running() {
                state
                    .claim_driver()
                    .map(|token| (token, (state.generation, state.ending())))
            } else {
                None
            }
        };
        if let Some((token, run)) = claim {
            let guard = DriverGuard {
                wizard: self,
                token,
            };
            self.drive(guard, run).await;
        }
    }

    // ── Run loop ────────────────────────────────────────────────────────────

    /// Tick until the run finishes. A run only stops running through
    /// `finish`, which fills its ending, so `tick` returning early always
    /// leaves an outcome to read.
    async fn drive(
        &self,
        _guard: DriverGuard<'_, C>,
        (generation, ending): RunTicket,
    ) -> RunOutcome {
        loop {
            if let Some(outcome) = ending.get() {
                return outcome.clone();
            }
            self.tick(generation).await;
        }
    }

    /// Execute whatever the pointer says: one step, a passed-over step, or
    /// completion.
    async fn tick(&self, generation: u64) {
        let (index, epoch, has_history) = {
            let state = self.lock();
            if state.generation != generation || !state.is_running() {
                return;
            }
            (state.pointer, state.epoch, !state.history.is_empty())
        };
        let Some(step) = self.steps.get(index) else {
            self.complete((index, epoch)).await;
            return;
        };

        if let Some(condition) = &step.condition {
            let (responses, context) = {
                let state = self.lock();
                (state.responses.clone(), state.context.clone())
            };
            if !condition(&responses, &context) {
                debug!(step_id = %step.id, "condition not met, passing over step");
                let mut state = self.lock();
                if state.is_current(index, epoch) {
                    state.pass_over(index);
                }
                return;
            }
        }

        self.run_step(step, (index, epoch), has_history).await;
    }

    async fn run_step(&self, step: &StepDefinition, at: Position, has_history: bool) {
        let (index, _) = at;
        let (ctx, session_id) = {
            let state = self.lock();
            (state.step_context(index, &step.id), state.session_id.clone())
        };
        let channel_id = ctx.wizard.channel_id.clone();
        debug!(step_id = %step.id, step_index = index, "entering step");
        self.emit(WizardNotification::StepEntered {
            session_id,
            step_id: step.id.clone(),
            step_index: index,
        })
        .await;

        if let Some(middleware) = &self.middleware
            && let Err(e) = middleware.before_step(step, &ctx).await
        {
            self.fail(
                at,
                Some(step),
                Error::hook(&step.id, HookStage::BeforeStep, e),
            )
            .await;
            return;
        }
        if !self.is_current(at) {
            return;
        }

        if let Err(e) = self
            .send_prompt(step, index, has_history, &channel_id)
            .await
        {
            self.fail(at, Some(step), e).await;
            return;
        }

        let raw = loop {
            if !self.is_current(at) {
                return;
            }
            match self.await_input(step, at, &ctx.wizard).await {
                Input::Answer(value) => break value,
                Input::Invalid(message) => {
                    debug!(step_id = %step.id, reason = %message, "unreadable response");
                    if let Err(e) = self.say(&channel_id, message).await {
                        self.fail(at, Some(step), e).await;
                        return;
                    }
                },
                Input::Nav(word) => {
                    self.navigate(word, at).await;
                    return;
                },
                Input::Failed(error) => {
                    self.fail(at, Some(step), error).await;
                    return;
                },
                Input::Superseded => return,
            }
        };

        let value = match &step.transform {
            Some(transform) => match transform(raw, &ctx) {
                Ok(value) => value,
                Err(e) => {
                    self.fail(at, Some(step), Error::hook(&step.id, HookStage::Transform, e))
                        .await;
                    return;
                },
            },
            None => raw,
        };

        if let Some(validate) = &step.validate {
            match validate(&value, &ctx) {
                Ok(verdict) => {
                    if let Some(message) = verdict.rejection_message() {
                        self.reject(step, at, message.to_string(), &channel_id)
                            .await;
                        return;
                    }
                },
                Err(e) => {
                    self.fail(at, Some(step), Error::hook(&step.id, HookStage::Validate, e))
                        .await;
                    return;
                },
            }
        }

        self.accept(step, at, value, &ctx).await;
    }

    fn is_current(&self, (index, epoch): Position) -> bool {
        self.lock().is_current(index, epoch)
    }

    async fn say(&self, channel_id: &str, text: impl Into<String>) -> Result<()> {
        self.channel
            .send_message(channel_id, OutboundMessage::text(text))
            .await?;
        Ok(())
    }

    async fn send_prompt(
        &self,
        step: &StepDefinition,
        index: usize,
        has_history: bool,
        channel_id: &str,
    ) -> Result<()> {
        let text = prompt::render(
            &step.prompt,
            &self.options,
            index,
            self.steps.len(),
            has_history,
        );
        let message = match step.kind {
            StepKind::Select | StepKind::MultiSelect => {
                let max = if step.kind == StepKind::MultiSelect {
                    step.options.len()
                } else {
                    1
                };
                let set = self.channel.render_choice_set(
                    &format!("wizard_select_{}", step.id),
                    &step.options,
                    &step.prompt,
                    1,
                    max,
                );
                OutboundMessage::with_components(text, vec![set])
            },
            StepKind::Confirmation => OutboundMessage::with_components(
                text,
                self.channel
                    .render_confirmation_controls(&format!("wizard_confirm_{}", step.id)),
            ),
            StepKind::Text | StepKind::Number | StepKind::Attachment => {
                OutboundMessage::text(text)
            },
        };
        self.channel.send_message(channel_id, message).await?;
        Ok(())
    }

    // ── Awaiting input ──────────────────────────────────────────────────────

    /// Race `fut` against the step timeout and against navigation.
    async fn race<T>(
        &self,
        step: &StepDefinition,
        epoch: u64,
        timeout: Duration,
        fut: impl Future<Output = parley_channels::Result<T>>,
    ) -> std::result::Result<T, Input> {
        tokio::select! {
            biased;
            () = superseded(self.nav.subscribe(), epoch) => Err(Input::Superseded),
            settled = tokio::time::timeout(timeout, fut) => match settled {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) if e.is_timeout() => {
                    Err(Input::Failed(Error::timeout(&step.id, timeout)))
                },
                Ok(Err(e)) => Err(Input::Failed(e.into())),
                Err(_) => Err(Input::Failed(Error::timeout(&step.id, timeout))),
            },
        }
    }

    async fn await_input(
        &self,
        step: &StepDefinition,
        (_, epoch): Position,
        wizard: &WizardContext,
    ) -> Input {
        let timeout = self.options.timeout_for(step.timeout);
        let _warning = self.options.timeout_warning.as_ref().and_then(|warning| {
            WarningTimer::schedule(
                Arc::clone(&self.channel),
                wizard.channel_id.clone(),
                timeout,
                warning,
            )
        });

        if step.kind.is_choice() {
            let channel = Arc::clone(&self.channel);
            let user_id = wizard.user_id.clone();
            let filter: InputFilter<C::Interaction> =
                Arc::new(move |i| channel.interaction_author_id(i) == user_id);
            let kind = if step.kind == StepKind::Confirmation {
                ChoiceKind::Confirmation
            } else {
                ChoiceKind::Selection
            };
            let awaited = self.channel.await_choice(&wizard.channel_id, AwaitChoiceOptions {
                filter,
                timeout,
                kind,
            });
            return match self.race(step, epoch, timeout, awaited).await {
                Ok(interaction) => {
                    extract::choice(step, self.channel.chosen_values(&interaction)).into()
                },
                Err(input) => input,
            };
        }

        let channel = Arc::clone(&self.channel);
        let user_id = wizard.user_id.clone();
        let filter: InputFilter<C::Message> =
            Arc::new(move |m| channel.author_id(m) == user_id);
        let awaited = self.channel.await_reply(&wizard.channel_id, AwaitReplyOptions {
            filter,
            max: 1,
            timeout,
        });
        let message = match self.race(step, epoch, timeout, awaited).await {
            Ok(messages) => match messages.into_iter().next().context("channel returned no reply")
            {
                Ok(message) => message,
                Err(e) => return Input::Failed(e),
            },
            Err(input) => return input,
        };

        let content = self.channel.content(&message);
        let has_history = !self.lock().history.is_empty();
        if let Some(word) = NavWord::classify(&content, &self.options, has_history) {
            return Input::Nav(word);
        }
        match step.kind {
            StepKind::Attachment => match extract::attachment(self.channel.attachments(&message))
            {
                Ok(extracted) => extracted.into(),
                Err(e) => Input::Failed(Error::Channel(e.into())),
            },
            StepKind::Number => extract::number(step, &content).into(),
            _ => extract::text(step, content).into(),
        }
    }

    async fn navigate(&self, word: NavWord, at: Position) {
        debug!(?word, "navigation requested");
        match word {
            NavWord::Cancel => {
                self.cancel_run(Some(at), CancelReason::Requested).await;
            },
            NavWord::Back => {
                self.back_to_previous(Some(at));
            },
            NavWord::Skip => {
                self.skip_current(Some(at)).await;
            },
        }
    }

    // ── Outcomes of a step ──────────────────────────────────────────────────

    async fn reject(&self, step: &StepDefinition, at: Position, message: String, channel_id: &str) {
        let message = if message.is_empty() {
            DEFAULT_REJECTION.to_string()
        } else {
            message
        };
        if let Err(e) = self.say(channel_id, message).await {
            self.fail(at, Some(step), e).await;
            return;
        }
        let (attempts, session_id) = {
            let mut state = self.lock();
            if !state.is_current(at.0, at.1) {
                return;
            }
            (state.reject(), state.session_id.clone())
        };
        let limit = step.retry_limit();
        debug!(step_id = %step.id, attempts, limit, "response rejected");
        if attempts < limit {
            return;
        }

        warn!(session_id = %session_id, step_id = %step.id, attempts, "retry limit reached");
        self.emit(WizardNotification::MaxRetriesReached {
            session_id,
            step_id: step.id.clone(),
            step_index: at.0,
            attempts,
        })
        .await;
        if let Err(e) = self.say(channel_id, max_retries_message(limit)).await {
            warn!(error = %e, "failed to send retry limit message");
        }
        self.cancel_run(Some(at), CancelReason::MaxRetries).await;
    }

    async fn accept(&self, step: &StepDefinition, at: Position, value: Value, ctx: &StepContext) {
        let (index, epoch) = at;
        {
            let mut state = self.lock();
            if !state.is_current(index, epoch) {
                return;
            }
            state.record(&step.id, value.clone());
        }

        if let Some(middleware) = &self.middleware
            && let Err(e) = middleware.after_step(step, &value, ctx).await
        {
            self.fail(at, Some(step), Error::hook(&step.id, HookStage::AfterStep, e))
                .await;
            return;
        }

        let snapshot = {
            let mut state = self.lock();
            if !state.is_current(index, epoch) {
                return;
            }
            state.commit(index);
            self.options.persist.then(|| state.snapshot(now_ms()))
        };
        debug!(step_id = %step.id, step_index = index, "step accepted");

        if let Some(snapshot) = snapshot
            && let Err(e) = self.persist(&snapshot).await
        {
            // the pointer has moved on; fail under the new position
            self.fail((index + 1, epoch), Some(step), e).await;
        }
    }

    async fn persist(&self, snapshot: &SessionSnapshot) -> Result<()> {
        self.sessions.save(snapshot).await?;
        self.emit(WizardNotification::SessionSaved {
            session_id: snapshot.session_id.clone(),
            step_index: snapshot.current_step_index,
        })
        .await;
        Ok(())
    }

    async fn forget_session(&self, session_id: &str) {
        if !self.options.persist {
            return;
        }
        if let Err(e) = self.sessions.delete(session_id).await {
            warn!(session_id, error = %e, "failed to delete session snapshot");
        }
    }

    // ── Terminal protocols ──────────────────────────────────────────────────

    async fn complete(&self, (index, epoch): Position) {
        let (responses, context, session_id) = {
            let mut state = self.lock();
            if !state.is_current(index, epoch) {
                return;
            }
            let responses = state.responses.clone();
            let context = state.context.clone();
            state.finish(RunOutcome::Completed {
                responses: responses.clone(),
            });
            self.publish(&state);
            (responses, context, state.session_id.clone())
        };
        info!(session_id = %session_id, responses = responses.len(), "wizard run completed");

        if let Some(middleware) = &self.middleware
            && let Err(e) = middleware.on_complete(&responses, &context).await
        {
            warn!(session_id = %session_id, error = %e, "on_complete hook failed");
        }
        self.emit(WizardNotification::RunCompleted {
            session_id: session_id.clone(),
            responses,
        })
        .await;
        self.forget_session(&session_id).await;
    }

    /// End the run as cancelled. With `expected`, only if the run is still at
    /// that position.
    async fn cancel_run(&self, expected: Option<Position>, reason: CancelReason) -> bool {
        let (ctx, step_id, session_id) = {
            let mut state = self.lock();
            if !state.is_running() {
                return false;
            }
            if let Some((index, epoch)) = expected
                && !state.is_current(index, epoch)
            {
                return false;
            }
            let index = state.pointer;
            let step_id = self.steps.get(index).map(|s| s.id.clone());
            let ctx = state.step_context(index, step_id.as_deref().unwrap_or_default());
            state.finish(RunOutcome::Cancelled {
                step_id: step_id.clone(),
                reason,
            });
            self.publish(&state);
            (ctx, step_id, state.session_id.clone())
        };
        info!(session_id = %session_id, ?reason, step_index = ctx.step_index, "wizard run cancelled");

        if let Some(middleware) = &self.middleware
            && let Err(e) = middleware.on_cancel(&ctx).await
        {
            warn!(session_id = %session_id, error = %e, "on_cancel hook failed");
        }
        self.emit(WizardNotification::RunCancelled {
            session_id: session_id.clone(),
            step_id,
            step_index: ctx.step_index,
        })
        .await;
        if let Err(e) = self.say(&ctx.wizard.channel_id, CANCELLED_MESSAGE).await {
            warn!(session_id = %session_id, error = %e, "failed to send cancellation message");
        }
        self.forget_session(&session_id).await;
        true
    }

    /// End the run as errored. A failure reported after the run moved on is
    /// dropped.
    async fn fail(&self, (index, epoch): Position, step: Option<&StepDefinition>, error: Error) {
        let (ctx, session_id) = {
            let mut state = self.lock();
            if !state.is_current(index, epoch) {
                debug!(error = %error, "ignoring failure of a superseded step");
                return;
            }
            let ctx = state.step_context(index, step.map_or("", |s| s.id.as_str()));
            state.finish(RunOutcome::Errored {
                step_id: step.map(|s| s.id.clone()),
                error: error.to_string(),
            });
            self.publish(&state);
            (ctx, state.session_id.clone())
        };
        warn!(
            session_id = %session_id,
            step_id = step.map(|s| s.id.as_str()),
            error = %error,
            "wizard run failed"
        );

        if let Some(middleware) = &self.middleware {
            middleware.on_error(&error, step, &ctx).await;
        }
        self.emit(WizardNotification::RunErrored {
            session_id: session_id.clone(),
            step_id: step.map(|s| s.id.clone()),
            error: error.to_string(),
        })
        .await;
        if let Err(e) = self.say(&ctx.wizard.channel_id, failure_message(&error)).await {
            warn!(session_id = %session_id, error = %e, "failed to send failure message");
        }
        self.forget_session(&session_id).await;
    }
}
