//! Flow definition schema.
//!
//! A flow file describes the steps of a wizard and the options around them.
//! Everything a flow can carry as a closure at runtime (conditions,
//! transforms, validators) has a small declarative form here.
use {
    parley_channels::ChoiceOption,
    parley_common::ResponseMap,
    parley_validators::{
        EmailOptions, LengthOptions, PhoneOptions, RangeOptions, UrlOptions,
    },
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

/// Root of a flow file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Sent once before the first prompt of a fresh run.
    pub title: Option<String>,
    /// Default per-step response timeout in seconds (60 when unset).
    pub timeout_secs: Option<u64>,
    pub allow_back: bool,
    pub allow_skip: bool,
    pub allow_cancel: bool,
    pub progress: ProgressConfig,
    pub timeout_warning: TimeoutWarningConfig,
    /// Save a snapshot after every accepted step.
    pub persist: bool,
    /// Fixed session id. A fresh `wizard_<millis>_<random>` id otherwise.
    pub session_id: Option<String>,
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub enabled: bool,
    /// Banner template with `{current}`, `{total}` and `{percent}`.
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutWarningConfig {
    pub enabled: bool,
    /// Seconds before the timeout at which the warning is sent.
    pub lead_secs: u64,
    pub message: Option<String>,
}

impl Default for TimeoutWarningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lead_secs: 15,
            message: None,
        }
    }
}

/// What a step asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKindConfig {
    #[default]
    Text,
    Number,
    Select,
    MultiSelect,
    Confirmation,
    Attachment,
}

impl StepKindConfig {
    pub fn is_select(self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub id: String,
    pub prompt: String,
    pub kind: StepKindConfig,
    /// Choices for select steps.
    pub options: Vec<ChoiceOption>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub timeout_secs: Option<u64>,
    /// Rejections allowed before the run is cancelled (3 when unset).
    pub retry: Option<u32>,
    pub condition: Option<ConditionConfig>,
    /// Applied in order before validation.
    pub transform: Vec<TransformConfig>,
    /// All must accept; the first rejection is shown.
    pub validate: Vec<ValidatorConfig>,
}

/// Run the step only when an earlier response matches.
///
/// With `equals`, the response stored under `step` must equal it. Otherwise
/// the response must be present (or absent with `present = false`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionConfig {
    pub step: String,
    pub equals: Option<Value>,
    pub present: Option<bool>,
}

impl ConditionConfig {
    pub fn holds(&self, responses: &ResponseMap) -> bool {
        let current = responses.get(&self.step);
        match (&self.equals, self.present) {
            (Some(expected), _) => current == Some(expected),
            (None, Some(present)) => current.is_some() == present,
            (None, None) => current.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformConfig {
    Trim,
    Lowercase,
    Uppercase,
}

impl TransformConfig {
    /// Rewrite strings, and strings inside arrays. Other values pass through.
    pub fn apply(self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.apply_str(&s)),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.apply(v)).collect()),
            other => other,
        }
    }

    fn apply_str(self, s: &str) -> String {
        match self {
            Self::Trim => s.trim().to_string(),
            Self::Lowercase => s.to_lowercase(),
            Self::Uppercase => s.to_uppercase(),
        }
    }
}

/// Declarative form of the built-in validators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidatorConfig {
    Email(EmailOptions),
    Url(UrlOptions),
    Phone(PhoneOptions),
    Regex {
        pattern: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        flags: Option<String>,
    },
    Length(LengthOptions),
    Range(RangeOptions),
    OneOf {
        values: Vec<Value>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl ValidatorConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Email(_) => "email",
            Self::Url(_) => "url",
            Self::Phone(_) => "phone",
            Self::Regex { .. } => "regex",
            Self::Length(_) => "length",
            Self::Range(_) => "range",
            Self::OneOf { .. } => "one_of",
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn minimal_step_uses_defaults() {
        let flow: FlowConfig = toml::from_str(
            r#"
[[steps]]
id = "name"
prompt = "Name?"
"#,
        )
        .unwrap();
        assert_eq!(flow.steps.len(), 1);
        assert_eq!(flow.steps[0].kind, StepKindConfig::Text);
        assert!(flow.steps[0].retry.is_none());
        assert!(!flow.allow_cancel);
        assert_eq!(flow.timeout_warning.lead_secs, 15);
    }

    #[test]
    fn validators_are_tagged_by_type() {
        let step: StepConfig = serde_json::from_value(json!({
            "id": "email",
            "prompt": "Email?",
            "validate": [
                {"type": "email"},
                {"type": "length", "max": 64},
                {"type": "regex", "pattern": "^a", "flags": "i"},
                {"type": "one_of", "values": ["a@x.io"]}
            ]
        }))
        .unwrap();
        let names: Vec<_> = step.validate.iter().map(ValidatorConfig::name).collect();
        assert_eq!(names, ["email", "length", "regex", "one_of"]);
        let ValidatorConfig::Email(opts) = &step.validate[0] else {
            panic!("expected email");
        };
        assert!(opts.allow_plus_addressing);
    }

    #[test]
    fn condition_forms() {
        let mut responses = ResponseMap::new();
        responses.insert("plan".into(), json!("pro"));

        let equals = ConditionConfig {
            step: "plan".into(),
            equals: Some(json!("pro")),
            present: None,
        };
        assert!(equals.holds(&responses));

        let absent = ConditionConfig {
            step: "coupon".into(),
            equals: None,
            present: Some(false),
        };
        assert!(absent.holds(&responses));

        let present = ConditionConfig {
            step: "coupon".into(),
            ..Default::default()
        };
        assert!(!present.holds(&responses));
    }

    #[test]
    fn transforms_touch_strings_only() {
        assert_eq!(TransformConfig::Trim.apply(json!("  hi ")), json!("hi"));
        assert_eq!(
            TransformConfig::Uppercase.apply(json!(["a", "b"])),
            json!(["A", "B"])
        );
        assert_eq!(TransformConfig::Lowercase.apply(json!(3)), json!(3));
    }

    #[test]
    fn kind_names_are_snake_case() {
        let step: StepConfig =
            serde_json::from_value(json!({"id": "x", "kind": "multi_select"})).unwrap();
        assert!(step.kind.is_select());
    }
}
