//! Multi-step conversational forms.
//!
//! A [`Wizard`] walks a user through an ordered list of [`StepDefinition`]s
//! over a [`parley_channels::ChannelIo`] transport: it prompts, waits for a
//! reply or interaction, extracts, transforms and validates the response,
//! and moves on. Users can navigate with `back`, `skip` and `cancel`; runs can
//! be persisted after every step and resumed later.

pub mod context;
pub mod error;
mod extract;
pub mod flow;
pub mod middleware;
pub mod options;
pub mod prompt;
pub mod state;
pub mod step;
mod timer;
pub mod wizard;

pub use {
    context::StepContext,
    error::{Error, HookStage, Result},
    flow::steps_from_flow,
    middleware::WizardMiddleware,
    options::{ProgressOptions, TimeoutWarning, WizardOptions},
    prompt::NavWord,
    state::{CancelReason, RunOutcome, RunStatus},
    step::{DEFAULT_RETRY_LIMIT, StepDefinition, StepKind},
    wizard::{Wizard, WizardBuilder},
};
