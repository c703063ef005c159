//! Lifecycle notifications emitted by a wizard run.
//!
//! Observers subscribe to [`WizardEvent`]s and receive a typed
//! [`WizardNotification`]. Notifications are informational: an observer cannot
//! alter the run, and a failing observer never aborts it nor stops receiving
//! later notifications.

use std::{collections::HashMap, fmt, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use crate::types::{ResponseMap, WizardContext};

// ── WizardEvent ─────────────────────────────────────────────────────────────

/// Lifecycle milestones observers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WizardEvent {
    RunStarted,
    RunResumed,
    StepEntered,
    StepSkipped,
    MaxRetriesReached,
    SessionSaved,
    RunCompleted,
    RunCancelled,
    RunErrored,
}

impl fmt::Display for WizardEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl WizardEvent {
    /// All variants, for iteration.
    pub const ALL: &'static [WizardEvent] = &[
        Self::RunStarted,
        Self::RunResumed,
        Self::StepEntered,
        Self::StepSkipped,
        Self::MaxRetriesReached,
        Self::SessionSaved,
        Self::RunCompleted,
        Self::RunCancelled,
        Self::RunErrored,
    ];
}

// ── WizardNotification ──────────────────────────────────────────────────────

/// Typed payload carried with each lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum WizardNotification {
    RunStarted {
        session_id: String,
        context: WizardContext,
    },
    RunResumed {
        session_id: String,
        step_index: usize,
    },
    StepEntered {
        session_id: String,
        step_id: String,
        step_index: usize,
    },
    StepSkipped {
        session_id: String,
        step_id: String,
        step_index: usize,
    },
    MaxRetriesReached {
        session_id: String,
        step_id: String,
        step_index: usize,
        attempts: u32,
    },
    SessionSaved {
        session_id: String,
        step_index: usize,
    },
    RunCompleted {
        session_id: String,
        responses: ResponseMap,
    },
    RunCancelled {
        session_id: String,
        step_id: Option<String>,
        step_index: usize,
    },
    RunErrored {
        session_id: String,
        step_id: Option<String>,
        error: String,
    },
}

impl WizardNotification {
    /// Returns the [`WizardEvent`] variant that matches this notification.
    pub fn event(&self) -> WizardEvent {
        match self {
            Self::RunStarted { .. } => WizardEvent::RunStarted,
            Self::RunResumed { .. } => WizardEvent::RunResumed,
            Self::StepEntered { .. } => WizardEvent::StepEntered,
            Self::StepSkipped { .. } => WizardEvent::StepSkipped,
            Self::MaxRetriesReached { .. } => WizardEvent::MaxRetriesReached,
            Self::SessionSaved { .. } => WizardEvent::SessionSaved,
            Self::RunCompleted { .. } => WizardEvent::RunCompleted,
            Self::RunCancelled { .. } => WizardEvent::RunCancelled,
            Self::RunErrored { .. } => WizardEvent::RunErrored,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::RunStarted { session_id, .. }
            | Self::RunResumed { session_id, .. }
            | Self::StepEntered { session_id, .. }
            | Self::StepSkipped { session_id, .. }
            | Self::MaxRetriesReached { session_id, .. }
            | Self::SessionSaved { session_id, .. }
            | Self::RunCompleted { session_id, .. }
            | Self::RunCancelled { session_id, .. }
            | Self::RunErrored { session_id, .. } => session_id,
        }
    }
}

// ── WizardObserver trait ────────────────────────────────────────────────────

/// Receives lifecycle notifications from a wizard run.
#[async_trait]
pub trait WizardObserver: Send + Sync {
    /// A human-readable name for this observer.
    fn name(&self) -> &str;

    /// Which events this observer subscribes to. Defaults to all of them.
    fn events(&self) -> &[WizardEvent] {
        WizardEvent::ALL
    }

    /// Priority for ordering. Higher values run first. Default is 0.
    fn priority(&self) -> i32 {
        0
    }

    async fn notify(&self, notification: &WizardNotification) -> Result<()>;
}

/// Forwards every notification into an unbounded channel.
pub struct ChannelObserver {
    name: String,
    tx: mpsc::UnboundedSender<WizardNotification>,
}

impl ChannelObserver {
    pub fn new(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<WizardNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                name: name.into(),
                tx,
            },
            rx,
        )
    }
}

#[async_trait]
impl WizardObserver for ChannelObserver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, notification: &WizardNotification) -> Result<()> {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(notification.clone());
        Ok(())
    }
}

// ── ObserverRegistry ────────────────────────────────────────────────────────

/// Registered observers, dispatched in priority order.
///
/// Cloning is cheap and shares the observers, so a caller can snapshot the
/// registry out of a lock before awaiting a dispatch.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: HashMap<WizardEvent, Vec<Arc<dyn WizardObserver>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for all events it subscribes to.
    /// Observers are sorted by priority (descending) within each event.
    pub fn register(&mut self, observer: Arc<dyn WizardObserver>) {
        for &event in observer.events() {
            let observers = self.observers.entry(event).or_default();
            observers.push(Arc::clone(&observer));
            observers.sort_by_key(|o| std::cmp::Reverse(o.priority()));
        }
        info!(observer = observer.name(), "wizard observer registered");
    }

    /// Register a [`ChannelObserver`] and return its receiving end.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<WizardNotification> {
        let (observer, rx) = ChannelObserver::new("subscriber");
        self.register(Arc::new(observer));
        rx
    }

    /// Deliver a notification to every observer subscribed to its event.
    ///
    /// Observers run one after another in priority order, so they see
    /// notifications in the order the run produced them. A failure is logged
    /// and the remaining observers still run.
    pub async fn dispatch(&self, notification: &WizardNotification) {
        let event = notification.event();
        let observers = match self.observers.get(&event) {
            Some(o) if !o.is_empty() => o,
            _ => return,
        };

        debug!(event = %event, count = observers.len(), "dispatching wizard notification");

        for observer in observers {
            if let Err(e) = observer.notify(notification).await {
                warn!(observer = observer.name(), event = %event, error = %e, "wizard observer failed");
            }
        }
    }
}
