use parley_common::{ResponseMap, WizardContext};

/// What hooks, transforms and validators see of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct StepContext {
    pub step_index: usize,
    pub step_id: String,
    /// Responses accepted so far. A copy: changing it does not touch the run.
    pub responses: ResponseMap,
    pub wizard: WizardContext,
    /// Rejections of the current step so far.
    pub retry_count: u32,
}
