//! Building wizards from flow files.

use std::{path::Path, sync::Arc, time::Duration};

use {
    parley_channels::ChannelIo,
    parley_config::{
        FlowConfig, StepConfig, StepKindConfig, TransformConfig, ValidatorConfig, load_flow,
    },
    parley_validators::{self as validators, RegexOptions, Validator},
};

use crate::{
    error::{Error, Result},
    options::{
        DEFAULT_PROGRESS_FORMAT, DEFAULT_WARNING_MESSAGE, ProgressOptions, TimeoutWarning,
        WizardOptions,
    },
    step::{StepDefinition, StepKind},
    wizard::{Wizard, WizardBuilder},
};

impl From<StepKindConfig> for StepKind {
    fn from(kind: StepKindConfig) -> Self {
        match kind {
            StepKindConfig::Text => Self::Text,
            StepKindConfig::Number => Self::Number,
            StepKindConfig::Select => Self::Select,
            StepKindConfig::MultiSelect => Self::MultiSelect,
            StepKindConfig::Confirmation => Self::Confirmation,
            StepKindConfig::Attachment => Self::Attachment,
        }
    }
}

impl WizardOptions {
    pub fn from_flow(flow: &FlowConfig) -> Self {
        Self {
            title: flow.title.clone(),
            timeout: flow.timeout_secs.map(Duration::from_secs),
            allow_back: flow.allow_back,
            allow_skip: flow.allow_skip,
            allow_cancel: flow.allow_cancel,
            progress: flow.progress.enabled.then(|| ProgressOptions {
                format: flow
                    .progress
                    .format
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PROGRESS_FORMAT.into()),
            }),
            timeout_warning: flow.timeout_warning.enabled.then(|| TimeoutWarning {
                lead: Duration::from_secs(flow.timeout_warning.lead_secs),
                message: flow
                    .timeout_warning
                    .message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_WARNING_MESSAGE.into()),
            }),
            persist: flow.persist,
            session_id: flow.session_id.clone(),
        }
    }
}

fn build_validator(step_id: &str, config: &ValidatorConfig) -> Result<Validator> {
    Ok(match config {
        ValidatorConfig::Email(opts) => validators::email(opts.clone()),
        ValidatorConfig::Url(opts) => validators::url(opts.clone()),
        ValidatorConfig::Phone(opts) => validators::phone(opts.clone()),
        ValidatorConfig::Regex {
            pattern,
            message,
            flags,
        } => validators::regex(pattern, RegexOptions {
            message: message.clone(),
            flags: flags.clone(),
        })
        .map_err(|e| Error::invalid_flow(format!("step \"{step_id}\": bad pattern: {e}")))?,
        ValidatorConfig::Length(opts) => validators::length(opts.clone()),
        ValidatorConfig::Range(opts) => validators::range(opts.clone()),
        ValidatorConfig::OneOf { values, message } => {
            validators::one_of(values.clone(), message.clone())
        },
    })
}

fn build_step(config: &StepConfig) -> Result<StepDefinition> {
    let mut step = StepDefinition::new(&config.id, &config.prompt, config.kind.into())
        .with_options(config.options.clone())
        .with_length(config.min_length, config.max_length)
        .with_range(config.min, config.max);
    if let Some(secs) = config.timeout_secs {
        step = step.with_timeout(Duration::from_secs(secs));
    }
    if let Some(retry) = config.retry {
        step = step.with_retry(retry);
    }
    if let Some(condition) = config.condition.clone() {
        step = step.with_condition(move |responses, _| condition.holds(responses));
    }
    if !config.transform.is_empty() {
        let chain: Vec<TransformConfig> = config.transform.clone();
        step = step.with_transform(move |value, _| {
            Ok(chain.iter().fold(value, |value, t| t.apply(value)))
        });
    }
    match config.validate.len() {
        0 => {},
        1 => step = step.with_validator(build_validator(&config.id, &config.validate[0])?),
        _ => {
            let all = config
                .validate
                .iter()
                .map(|v| build_validator(&config.id, v))
                .collect::<Result<Vec<_>>>()?;
            step = step.with_validator(validators::combine(all));
        },
    }
    Ok(step)
}

/// Step definitions described by a flow file.
pub fn steps_from_flow(flow: &FlowConfig) -> Result<Vec<StepDefinition>> {
    flow.steps.iter().map(build_step).collect()
}

impl<C: ChannelIo> Wizard<C> {
    /// A builder preloaded with the steps and options of `flow`.
    pub fn from_flow(channel: Arc<C>, flow: &FlowConfig) -> Result<WizardBuilder<C>> {
        let steps = steps_from_flow(flow)?;
        Ok(Self::builder(channel, steps).options(WizardOptions::from_flow(flow)))
    }

    pub fn from_flow_file(channel: Arc<C>, path: &Path) -> Result<WizardBuilder<C>> {
        let flow = load_flow(path)?;
        Self::from_flow(channel, &flow)
    }
}
