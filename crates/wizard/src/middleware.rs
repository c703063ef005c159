use {
    async_trait::async_trait,
    parley_common::{ResponseMap, WizardContext},
    serde_json::Value,
};

use crate::{context::StepContext, error::Error, step::StepDefinition};

/// Hooks around the steps of a run. Every method has a no-op default.
///
/// `before_step` and `after_step` failures end the run through the error
/// protocol. `on_complete` and `on_cancel` failures are logged; the run has
/// already ended by then.
#[async_trait]
pub trait WizardMiddleware: Send + Sync {
    async fn before_step(&self, _step: &StepDefinition, _ctx: &StepContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_step(
        &self,
        _step: &StepDefinition,
        _response: &Value,
        _ctx: &StepContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once when a run errors. `step` is `None` for failures outside a
    /// step, such as sending the title.
    async fn on_error(&self, _error: &Error, _step: Option<&StepDefinition>, _ctx: &StepContext) {}

    async fn on_complete(
        &self,
        _responses: &ResponseMap,
        _ctx: &WizardContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_cancel(&self, _ctx: &StepContext) -> anyhow::Result<()> {
        Ok(())
    }
}
