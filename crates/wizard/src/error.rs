use std::{fmt, time::Duration};

/// Where a caller-supplied function failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    BeforeStep,
    AfterStep,
    Transform,
    Validate,
    Skip,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BeforeStep => "before_step",
            Self::AfterStep => "after_step",
            Self::Transform => "transform",
            Self::Validate => "validate",
            Self::Skip => "skip hook",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("wizard is already running")]
    AlreadyRunning,

    #[error("no response to step {step_id} within {}s", .after.as_secs())]
    ResponseTimeout { step_id: String, after: Duration },

    #[error(transparent)]
    Channel(#[from] parley_channels::Error),

    #[error(transparent)]
    Session(#[from] parley_sessions::Error),
    #[error(transparent)]
    Flow(#[from] parley_config::Error),

    #[error("{stage} failed for step {step_id}: {source}")]
    Hook {
        step_id: String,
        stage: HookStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid flow: {message}")]
    InvalidFlow { message: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn timeout(step_id: impl Into<String>, after: Duration) -> Self {
        Self::ResponseTimeout {
            step_id: step_id.into(),
            after,
        }
    }

    #[must_use]
    pub fn hook(step_id: impl Into<String>, stage: HookStage, source: anyhow::Error) -> Self {
        Self::Hook {
            step_id: step_id.into(),
            stage,
            source,
        }
    }

    #[must_use]
    pub fn invalid_flow(message: impl Into<String>) -> Self {
        Self::InvalidFlow {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ResponseTimeout { .. })
    }
}

impl parley_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

parley_common::impl_context!();
