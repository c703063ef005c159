//! Step definitions.

use std::{fmt, sync::Arc, time::Duration};

use {
    parley_channels::ChoiceOption,
    parley_common::{ResponseMap, Validation, WizardContext},
    parley_validators::Validator,
    serde_json::Value,
};

use crate::context::StepContext;

/// Rejections allowed before a run is cancelled.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

/// Decides whether a step runs, given the responses so far.
pub type Condition = Arc<dyn Fn(&ResponseMap, &WizardContext) -> bool + Send + Sync>;

/// Rewrites an extracted response before validation.
pub type Transform = Arc<dyn Fn(Value, &StepContext) -> anyhow::Result<Value> + Send + Sync>;

/// Accepts or rejects a (transformed) response.
pub type Validate = Arc<dyn Fn(&Value, &StepContext) -> anyhow::Result<Validation> + Send + Sync>;

/// Runs when the user skips the step.
pub type SkipHook = Arc<dyn Fn(&StepContext) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Text,
    Number,
    Select,
    MultiSelect,
    Confirmation,
    Attachment,
}

impl StepKind {
    /// Answered through an interactive control rather than a text reply.
    pub fn is_choice(self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect | Self::Confirmation)
    }

    pub fn is_select(self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect)
    }
}

/// One prompt of a flow. Built with [`StepDefinition::text`] and friends, then
/// refined with the `with_*` methods.
#[derive(Clone)]
pub struct StepDefinition {
    pub id: String,
    pub prompt: String,
    pub kind: StepKind,
    pub options: Vec<ChoiceOption>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub timeout: Option<Duration>,
    pub retry: Option<u32>,
    pub condition: Option<Condition>,
    pub transform: Option<Transform>,
    pub validate: Option<Validate>,
    pub on_skip: Option<SkipHook>,
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("options", &self.options.len())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("condition", &self.condition.is_some())
            .field("transform", &self.transform.is_some())
            .field("validate", &self.validate.is_some())
            .finish_non_exhaustive()
    }
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            kind,
            options: Vec::new(),
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            timeout: None,
            retry: None,
            condition: None,
            transform: None,
            validate: None,
            on_skip: None,
        }
    }

    pub fn text(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(id, prompt, StepKind::Text)
    }

    pub fn number(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(id, prompt, StepKind::Number)
    }

    pub fn select(
        id: impl Into<String>,
        prompt: impl Into<String>,
        options: Vec<ChoiceOption>,
    ) -> Self {
        Self::new(id, prompt, StepKind::Select).with_options(options)
    }

    pub fn multi_select(
        id: impl Into<String>,
        prompt: impl Into<String>,
        options: Vec<ChoiceOption>,
    ) -> Self {
        Self::new(id, prompt, StepKind::MultiSelect).with_options(options)
    }

    pub fn confirmation(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(id, prompt, StepKind::Confirmation)
    }

    pub fn attachment(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(id, prompt, StepKind::Attachment)
    }

    #[must_use]
    pub fn with_options(mut self, options: Vec<ChoiceOption>) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    #[must_use]
    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ResponseMap, &WizardContext) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value, &StepContext) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    #[must_use]
    pub fn with_validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value, &StepContext) -> anyhow::Result<Validation> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Validate with one of the built-in validators.
    #[must_use]
    pub fn with_validator(self, validator: Validator) -> Self {
        self.with_validate(move |value, _| Ok(validator(value)))
    }

    #[must_use]
    pub fn with_on_skip<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StepContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_skip = Some(Arc::new(hook));
        self
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry.unwrap_or(DEFAULT_RETRY_LIMIT)
    }
}

/// Reject flows the executor cannot run: duplicate ids, select steps with
/// nothing to choose.
pub(crate) fn check_steps(steps: &[StepDefinition]) -> crate::Result<()> {
    let mut seen = std::collections::HashSet::new();
    for step in steps {
        if step.id.is_empty() {
            return Err(crate::Error::invalid_flow("step with an empty id"));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(crate::Error::invalid_flow(format!(
                "duplicate step id \"{}\"",
                step.id
            )));
        }
        if step.kind.is_select() && step.options.is_empty() {
            return Err(crate::Error::invalid_flow(format!(
                "select step \"{}\" has no options",
                step.id
            )));
        }
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, parley_validators::LengthOptions, serde_json::json};

    fn ctx() -> StepContext {
        StepContext {
            step_index: 0,
            step_id: "name".into(),
            responses: ResponseMap::new(),
            wizard: WizardContext::new("u", "c"),
            retry_count: 0,
        }
    }

    #[test]
    fn builder_sets_fields() {
        let step = StepDefinition::number("age", "Age?")
            .with_range(Some(13.0), Some(120.0))
            .with_retry(5)
            .with_timeout(Duration::from_secs(10));
        assert_eq!(step.kind, StepKind::Number);
        assert_eq!(step.min, Some(13.0));
        assert_eq!(step.retry_limit(), 5);
        assert_eq!(StepDefinition::text("a", "b").retry_limit(), DEFAULT_RETRY_LIMIT);
    }

    #[test]
    fn built_in_validator_adapts() {
        let step = StepDefinition::text("name", "Name?").with_validator(parley_validators::length(
            LengthOptions {
                min: Some(2),
                ..Default::default()
            },
        ));
        let validate = step.validate.unwrap();
        assert!(validate(&json!("Ada"), &ctx()).unwrap().is_accepted());
        assert!(!validate(&json!("A"), &ctx()).unwrap().is_accepted());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let steps = vec![StepDefinition::text("a", "1"), StepDefinition::text("a", "2")];
        let err = check_steps(&steps).unwrap_err();
        assert!(err.to_string().contains("duplicate step id"), "{err}");
    }

    #[test]
    fn select_needs_options() {
        let steps = vec![StepDefinition::select("color", "Pick", Vec::new())];
        assert!(matches!(
            check_steps(&steps),
            Err(crate::Error::InvalidFlow { .. })
        ));
        let steps = vec![StepDefinition::select(
            "color",
            "Pick",
            vec![ChoiceOption::new("Red", "red")],
        )];
        assert!(check_steps(&steps).is_ok());
    }
}
