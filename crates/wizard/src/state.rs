//! Run state of a wizard. Pure bookkeeping, no I/O.
//!
//! Every navigation bumps `epoch`. The executor remembers the epoch it saw
//! before awaiting anything and only applies its result while
//! [`RunState::is_current`] still holds.

use std::sync::{Arc, OnceLock};

use {
    parley_common::{ResponseMap, WizardContext},
    parley_sessions::SessionSnapshot,
    serde::Serialize,
    serde_json::Value,
};

use crate::context::StepContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// `cancel()` was called or the user typed `cancel`.
    Requested,
    /// The step's retry limit was reached.
    MaxRetries,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        responses: ResponseMap,
    },
    Cancelled {
        step_id: Option<String>,
        reason: CancelReason,
    },
    Errored {
        step_id: Option<String>,
        error: String,
    },
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            Self::Completed { .. } => RunStatus::Completed,
            Self::Cancelled { .. } => RunStatus::Cancelled,
            Self::Errored { .. } => RunStatus::Errored,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// The collected responses of a completed run.
    pub fn responses(&self) -> Option<&ResponseMap> {
        match self {
            Self::Completed { responses } => Some(responses),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct RunState {
    pub status: RunStatus,
    pub pointer: usize,
    pub responses: ResponseMap,
    /// Indices of accepted steps, most recent last.
    pub history: Vec<usize>,
    pub retries: u32,
    pub context: WizardContext,
    pub session_id: String,
    pub started_at: u64,
    pub epoch: u64,
    /// Incremented by every `begin` and `restore`.
    pub generation: u64,
    /// Set once by `finish`. Each run gets a fresh cell, so a driver of an
    /// older run still reads its own outcome after a new run has begun.
    ending: Arc<OnceLock<RunOutcome>>,
    /// Token of the task currently driving the run loop.
    pub driver: Option<u64>,
    next_driver: u64,
    /// Outcome of the most recently finished run.
    pub outcome: Option<RunOutcome>,
}

impl RunState {
    pub fn new(session_id: String) -> Self {
        Self {
            status: RunStatus::Idle,
            pointer: 0,
            responses: ResponseMap::new(),
            history: Vec::new(),
            retries: 0,
            context: WizardContext::default(),
            session_id,
            started_at: 0,
            epoch: 0,
            generation: 0,
            ending: Arc::new(OnceLock::new()),
            driver: None,
            next_driver: 0,
            outcome: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// True while the run is live, still on `index`, and nothing navigated
    /// since `epoch` was read.
    pub fn is_current(&self, index: usize, epoch: u64) -> bool {
        self.is_running() && self.pointer == index && self.epoch == epoch
    }

    pub fn bump(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    pub fn begin(&mut self, context: WizardContext, now: u64) {
        self.status = RunStatus::Running;
        self.pointer = 0;
        self.responses.clear();
        self.history.clear();
        self.retries = 0;
        self.context = context;
        self.started_at = now;
        self.generation += 1;
        self.ending = Arc::new(OnceLock::new());
        self.bump();
    }

    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        self.context = snapshot.context();
        self.status = RunStatus::Running;
        self.pointer = snapshot.current_step_index;
        self.responses = snapshot.responses;
        self.history = snapshot.history;
        self.retries = 0;
        self.session_id = snapshot.session_id;
        self.started_at = snapshot.started_at;
        self.generation += 1;
        self.ending = Arc::new(OnceLock::new());
        self.bump();
    }

    /// Claim the run loop. `None` if another task already drives it.
    pub fn claim_driver(&mut self) -> Option<u64> {
        if self.driver.is_some() {
            return None;
        }
        Some(self.take_driver())
    }

    /// Claim the run loop unconditionally. A previous driver notices the new
    /// generation and stops.
    pub fn take_driver(&mut self) -> u64 {
        self.next_driver += 1;
        self.driver = Some(self.next_driver);
        self.next_driver
    }

    pub fn release_driver(&mut self, token: u64) {
        if self.driver == Some(token) {
            self.driver = None;
        }
    }

    pub fn step_context(&self, index: usize, step_id: &str) -> StepContext {
        StepContext {
            step_index: index,
            step_id: step_id.to_string(),
            responses: self.responses.clone(),
            wizard: self.context.clone(),
            retry_count: self.retries,
        }
    }

    /// Store an accepted response. A re-answered step moves to the end.
    pub fn record(&mut self, step_id: &str, value: Value) {
        self.retries = 0;
        self.responses.shift_remove(step_id);
        self.responses.insert(step_id.to_string(), value);
    }

    /// Finish an accepted step and point at the next one. A step answered
    /// again (after a jump) keeps a single history entry, now the latest.
    pub fn commit(&mut self, index: usize) {
        self.history.retain(|&i| i != index);
        self.history.push(index);
        self.pointer = index + 1;
    }

    /// Count a rejection. Returns the consecutive rejections of this step.
    pub fn reject(&mut self) -> u32 {
        self.retries += 1;
        self.retries
    }

    /// Move past a step whose condition does not hold.
    pub fn pass_over(&mut self, index: usize) {
        self.retries = 0;
        self.pointer = index + 1;
    }

    /// Re-enter the most recently accepted step, forgetting its response.
    /// Returns the re-entered index.
    pub fn back(&mut self, step_id_at: impl Fn(usize) -> Option<String>) -> Option<usize> {
        let previous = self.history.pop()?;
        if let Some(id) = step_id_at(previous) {
            self.responses.shift_remove(&id);
        }
        self.pointer = previous;
        self.retries = 0;
        self.bump();
        Some(previous)
    }

    pub fn skip(&mut self) {
        self.pointer += 1;
        self.retries = 0;
        self.bump();
    }

    pub fn jump(&mut self, index: usize) {
        self.pointer = index;
        self.retries = 0;
        self.bump();
    }

    /// End the run. Responses, history and retries are cleared; the outcome
    /// keeps what callers need.
    pub fn finish(&mut self, outcome: RunOutcome) {
        self.status = outcome.status();
        self.responses.clear();
        self.history.clear();
        self.retries = 0;
        let _ = self.ending.set(outcome.clone());
        self.outcome = Some(outcome);
        self.bump();
    }

    /// Where the current run's outcome lands when it finishes.
    pub fn ending(&self) -> Arc<OnceLock<RunOutcome>> {
        Arc::clone(&self.ending)
    }

    pub fn snapshot(&self, now: u64) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            user_id: self.context.user_id.clone(),
            channel_id: self.context.channel_id.clone(),
            guild_id: self.context.guild_id.clone(),
            current_step_index: self.pointer,
            responses: self.responses.clone(),
            history: self.history.clone(),
            started_at: self.started_at,
            last_activity_at: now,
            metadata: self.context.metadata.clone(),
        }
    }
}
