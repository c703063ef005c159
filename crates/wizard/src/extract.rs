//! Turning raw replies into response values, per step kind.
//!
//! An [`Extracted::Invalid`] is not a validation failure: the user is told
//! what was wrong and the same await starts over without consuming a retry.

use {
    parley_channels::{Attachment, CONFIRM_VALUE},
    serde_json::{Number, Value},
};

use crate::step::{StepDefinition, StepKind};

pub(crate) const NOT_A_NUMBER: &str = "Please enter a valid number.";
pub(crate) const UPLOAD_REQUIRED: &str = "Please upload a file.";
pub(crate) const CHOOSE_ONE: &str = "Please choose an option.";
pub(crate) const CHOOSE_AT_LEAST_ONE: &str = "Please choose at least one option.";
pub(crate) const UNKNOWN_CHOICE: &str = "Please choose one of the listed options.";

/// Largest integer an f64 holds exactly.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Extracted {
    Answer(Value),
    Invalid(String),
}

pub(crate) fn text(step: &StepDefinition, content: String) -> Extracted {
    let len = content.chars().count();
    if let Some(min) = step.min_length
        && len < min
    {
        return Extracted::Invalid(format!("Response must be at least {min} characters."));
    }
    if let Some(max) = step.max_length
        && len > max
    {
        return Extracted::Invalid(format!("Response must be at most {max} characters."));
    }
    Extracted::Answer(Value::String(content))
}

pub(crate) fn number(step: &StepDefinition, content: &str) -> Extracted {
    let Some(num) = content
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
    else {
        return Extracted::Invalid(NOT_A_NUMBER.into());
    };
    if let Some(min) = step.min
        && num < min
    {
        return Extracted::Invalid(format!("Number must be at least {min}."));
    }
    if let Some(max) = step.max
        && num > max
    {
        return Extracted::Invalid(format!("Number must be at most {max}."));
    }
    Extracted::Answer(number_value(num))
}

/// Whole numbers become JSON integers.
fn number_value(num: f64) -> Value {
    if num.fract() == 0.0 && num.abs() < MAX_EXACT_INT {
        Value::from(num as i64)
    } else {
        Number::from_f64(num).map_or(Value::Null, Value::Number)
    }
}

pub(crate) fn attachment(attachments: Vec<Attachment>) -> Result<Extracted, serde_json::Error> {
    match attachments.into_iter().next() {
        Some(first) => Ok(Extracted::Answer(serde_json::to_value(first)?)),
        None => Ok(Extracted::Invalid(UPLOAD_REQUIRED.into())),
    }
}

/// Values chosen through a select menu or confirmation controls.
pub(crate) fn choice(step: &StepDefinition, values: Vec<String>) -> Extracted {
    if step.kind == StepKind::Confirmation {
        let confirmed = values.first().is_some_and(|v| v == CONFIRM_VALUE);
        return Extracted::Answer(Value::Bool(confirmed));
    }
    if values
        .iter()
        .any(|v| !step.options.iter().any(|o| &o.value == v))
    {
        return Extracted::Invalid(UNKNOWN_CHOICE.into());
    }
    match step.kind {
        StepKind::MultiSelect if values.is_empty() => {
            Extracted::Invalid(CHOOSE_AT_LEAST_ONE.into())
        },
        StepKind::MultiSelect => {
            Extracted::Answer(Value::Array(values.into_iter().map(Value::String).collect()))
        },
        _ => match values.into_iter().next() {
            Some(value) => Extracted::Answer(Value::String(value)),
            None => Extracted::Invalid(CHOOSE_ONE.into()),
        },
    }
}
