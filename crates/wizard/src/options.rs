use std::time::Duration;

/// Response timeout used when neither the step nor the flow sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_PROGRESS_FORMAT: &str = "📊 Step {current}/{total}";

pub const DEFAULT_WARNING_LEAD: Duration = Duration::from_secs(15);

pub const DEFAULT_WARNING_MESSAGE: &str =
    "⚠️ Warning: Your response time is running out. Please respond soon!";

/// Flow-wide behaviour of a wizard.
#[derive(Debug, Clone, Default)]
pub struct WizardOptions {
    /// Sent once before the first prompt of a fresh run.
    pub title: Option<String>,
    /// Default per-step response timeout.
    pub timeout: Option<Duration>,
    pub allow_back: bool,
    pub allow_skip: bool,
    pub allow_cancel: bool,
    /// Prepend a progress banner to every prompt.
    pub progress: Option<ProgressOptions>,
    /// Warn the user shortly before a response times out.
    pub timeout_warning: Option<TimeoutWarning>,
    /// Save a snapshot after every accepted step.
    pub persist: bool,
    /// Fixed session id instead of a generated one.
    pub session_id: Option<String>,
}

impl WizardOptions {
    /// Timeout for a step with the given override.
    pub fn timeout_for(&self, step_timeout: Option<Duration>) -> Duration {
        step_timeout.or(self.timeout).unwrap_or(DEFAULT_TIMEOUT)
    }
}

#[derive(Debug, Clone)]
pub struct ProgressOptions {
    /// `{current}`, `{total}` and `{percent}` are substituted.
    pub format: String,
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self {
            format: DEFAULT_PROGRESS_FORMAT.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutWarning {
    /// How long before the timeout the warning goes out.
    pub lead: Duration,
    pub message: String,
}

impl Default for TimeoutWarning {
    fn default() -> Self {
        Self {
            lead: DEFAULT_WARNING_LEAD,
            message: DEFAULT_WARNING_MESSAGE.into(),
        }
    }
}

impl TimeoutWarning {
    /// Delay after which the warning fires, or `None` if the lead swallows the
    /// whole timeout.
    pub fn delay(&self, timeout: Duration) -> Option<Duration> {
        timeout.checked_sub(self.lead).filter(|d| !d.is_zero())
    }
}
