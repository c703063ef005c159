//! Structural checks for flow definitions.
//!
//! Catches mistakes that would otherwise only show up mid-conversation:
//! duplicate step ids, select steps with nothing to select, inverted bounds,
//! patterns that do not compile, conditions pointing at steps that do not
//! exist.

use std::{collections::HashSet, fmt, path::Path};

use crate::{
    loader::load_flow,
    schema::{FlowConfig, StepConfig, ValidatorConfig},
};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "duplicate-id", "missing-id", "options", "bounds",
    /// "pattern", "condition", "retry", "timeout", "progress"
    pub category: &'static str,
    /// Location, e.g. `steps[2].options`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} [{}]: {}", self.severity, self.category, self.message)
        } else {
            write!(
                f,
                "{} [{}] {}: {}",
                self.severity, self.category, self.path, self.message
            )
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FlowReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl FlowReport {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        });
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest step id within edit distance 2.
fn suggest<'a>(needle: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= 2)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

/// Load a flow file and check it. Read and parse failures become a single
/// `syntax` error.
#[must_use]
pub fn check_flow_file(path: &Path) -> FlowReport {
    match load_flow(path) {
        Ok(flow) => check_flow(&flow),
        Err(e) => {
            let mut report = FlowReport::default();
            report.push(Severity::Error, "syntax", "", e.to_string());
            report
        },
    }
}

#[must_use]
pub fn check_flow(flow: &FlowConfig) -> FlowReport {
    let mut report = FlowReport::default();

    if flow.steps.is_empty() {
        report.push(
            Severity::Warning,
            "steps",
            "steps",
            "flow has no steps and completes immediately",
        );
    }

    check_flow_options(flow, &mut report);

    let ids: Vec<&str> = flow.steps.iter().map(|s| s.id.as_str()).collect();
    let mut seen = HashSet::new();
    for (index, step) in flow.steps.iter().enumerate() {
        let path = format!("steps[{index}]");
        if step.id.is_empty() {
            report.push(Severity::Error, "missing-id", &path, "step has no id");
        } else if !seen.insert(step.id.as_str()) {
            report.push(
                Severity::Error,
                "duplicate-id",
                format!("{path}.id"),
                format!("step id \"{}\" is used more than once", step.id),
            );
        }
        check_step(step, index, &ids, &path, &mut report);
    }

    report
}

fn check_flow_options(flow: &FlowConfig, report: &mut FlowReport) {
    if flow.timeout_secs == Some(0) {
        report.push(
            Severity::Error,
            "timeout",
            "timeout_secs",
            "timeout must be at least one second",
        );
    }

    let timeout = flow.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if flow.timeout_warning.enabled && flow.timeout_warning.lead_secs >= timeout {
        report.push(
            Severity::Warning,
            "timeout",
            "timeout_warning.lead_secs",
            format!(
                "warning lead of {}s is not shorter than the {timeout}s timeout, so no warning is sent",
                flow.timeout_warning.lead_secs
            ),
        );
    }

    if let Some(format) = &flow.progress.format
        && !["{current}", "{total}", "{percent}"]
            .iter()
            .any(|p| format.contains(p))
    {
        report.push(
            Severity::Info,
            "progress",
            "progress.format",
            "progress format has no {current}, {total} or {percent} placeholder",
        );
    }
}

fn check_step(
    step: &StepConfig,
    index: usize,
    ids: &[&str],
    path: &str,
    report: &mut FlowReport,
) {
    if step.prompt.trim().is_empty() {
        report.push(
            Severity::Warning,
            "prompt",
            format!("{path}.prompt"),
            "step has an empty prompt",
        );
    }

    if step.kind.is_select() {
        if step.options.is_empty() {
            report.push(
                Severity::Error,
                "options",
                format!("{path}.options"),
                "select step has no options",
            );
        }
        let mut values = HashSet::new();
        for option in &step.options {
            if !values.insert(option.value.as_str()) {
                report.push(
                    Severity::Warning,
                    "options",
                    format!("{path}.options"),
                    format!("option value \"{}\" appears more than once", option.value),
                );
            }
        }
    } else if !step.options.is_empty() {
        report.push(
            Severity::Warning,
            "options",
            format!("{path}.options"),
            "options are ignored on non-select steps",
        );
    }

    if let (Some(min), Some(max)) = (step.min, step.max)
        && min > max
    {
        report.push(
            Severity::Error,
            "bounds",
            path,
            format!("min ({min}) is greater than max ({max})"),
        );
    }
    if let (Some(min), Some(max)) = (step.min_length, step.max_length)
        && min > max
    {
        report.push(
            Severity::Error,
            "bounds",
            path,
            format!("min_length ({min}) is greater than max_length ({max})"),
        );
    }

    if step.retry == Some(0) {
        report.push(
            Severity::Error,
            "retry",
            format!("{path}.retry"),
            "retry limit must be at least 1",
        );
    }
    if step.timeout_secs == Some(0) {
        report.push(
            Severity::Error,
            "timeout",
            format!("{path}.timeout_secs"),
            "timeout must be at least one second",
        );
    }

    for (v, validator) in step.validate.iter().enumerate() {
        check_validator(validator, &format!("{path}.validate[{v}]"), report);
    }

    if let Some(condition) = &step.condition {
        let cond_path = format!("{path}.condition.step");
        match ids.iter().position(|id| *id == condition.step) {
            None => {
                let message = match suggest(&condition.step, ids) {
                    Some(s) => format!(
                        "condition refers to unknown step \"{}\" (did you mean \"{s}\"?)",
                        condition.step
                    ),
                    None => format!("condition refers to unknown step \"{}\"", condition.step),
                };
                report.push(Severity::Error, "condition", cond_path, message);
            },
            Some(target) if target >= index => {
                report.push(
                    Severity::Warning,
                    "condition",
                    cond_path,
                    format!(
                        "condition reads \"{}\", which has not run yet when this step is reached",
                        condition.step
                    ),
                );
            },
            Some(_) => {},
        }
    }
}

fn check_validator(validator: &ValidatorConfig, path: &str, report: &mut FlowReport) {
    match validator {
        ValidatorConfig::Regex { pattern, flags, .. } => {
            let options = parley_validators::RegexOptions {
                message: None,
                flags: flags.clone(),
            };
            if let Err(e) = parley_validators::regex(pattern, options) {
                report.push(
                    Severity::Error,
                    "pattern",
                    path,
                    format!("pattern does not compile: {e}"),
                );
            }
        },
        ValidatorConfig::Length(opts) => {
            if let (Some(min), Some(max)) = (opts.min, opts.max)
                && min > max
            {
                report.push(
                    Severity::Error,
                    "bounds",
                    path,
                    format!("min ({min}) is greater than max ({max})"),
                );
            }
        },
        ValidatorConfig::Range(opts) => {
            if let (Some(min), Some(max)) = (opts.min, opts.max)
                && min > max
            {
                report.push(
                    Severity::Error,
                    "bounds",
                    path,
                    format!("min ({min}) is greater than max ({max})"),
                );
            }
        },
        ValidatorConfig::OneOf { values, .. } if values.is_empty() => {
            report.push(
                Severity::Warning,
                "bounds",
                path,
                "one_of with no values rejects everything",
            );
        },
        _ => {},
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{FlowFormat, parse_flow},
        std::io::Write,
    };

    fn check(toml: &str) -> FlowReport {
        check_flow(&parse_flow(toml, FlowFormat::Toml).unwrap())
    }

    fn find<'a>(report: &'a FlowReport, category: &str) -> Option<&'a Diagnostic> {
        report.diagnostics.iter().find(|d| d.category == category)
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein("plan", "plan"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("plna", "plan"), 2);
        assert_eq!(levenshtein("emial", "email"), 2);
    }

    #[test]
    fn valid_flow_is_clean() {
        let report = check(
            r#"
allow_cancel = true

[[steps]]
id = "name"
prompt = "Name?"

[[steps]]
id = "plan"
prompt = "Plan?"
kind = "select"
options = [{ label = "Free", value = "free" }, { label = "Pro", value = "pro" }]

[[steps]]
id = "card"
prompt = "Card number?"
condition = { step = "plan", equals = "pro" }
validate = [{ type = "regex", pattern = "^[0-9 ]+$" }]
"#,
        );
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    }

    #[test]
    fn duplicate_ids_are_errors() {
        let report = check(
            r#"
[[steps]]
id = "name"
prompt = "a"
[[steps]]
id = "name"
prompt = "b"
"#,
        );
        let d = find(&report, "duplicate-id").unwrap();
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.path, "steps[1].id");
    }

    #[test]
    fn select_without_options() {
        let report = check(
            r#"
[[steps]]
id = "color"
prompt = "Pick"
kind = "multi_select"
"#,
        );
        assert!(report.has_errors());
        assert_eq!(find(&report, "options").unwrap().path, "steps[0].options");
    }

    #[test]
    fn inverted_bounds() {
        let report = check(
            r#"
[[steps]]
id = "age"
prompt = "Age?"
kind = "number"
min = 120
max = 13
validate = [{ type = "length", min = 10, max = 2 }]
"#,
        );
        assert_eq!(report.count(Severity::Error), 2);
    }

    #[test]
    fn bad_pattern_reported() {
        let report = check(
            r#"
[[steps]]
id = "user"
prompt = "User?"
validate = [{ type = "regex", pattern = "(unclosed" }]
"#,
        );
        let d = find(&report, "pattern").unwrap();
        assert_eq!(d.path, "steps[0].validate[0]");
    }

    #[test]
    fn unknown_condition_target_suggests() {
        let report = check(
            r#"
[[steps]]
id = "plan"
prompt = "Plan?"
[[steps]]
id = "card"
prompt = "Card?"
condition = { step = "plna" }
"#,
        );
        let d = find(&report, "condition").unwrap();
        assert_eq!(d.severity, Severity::Error);
        assert!(d.message.contains("did you mean \"plan\""), "{}", d.message);
    }

    #[test]
    fn forward_condition_is_a_warning() {
        let report = check(
            r#"
[[steps]]
id = "a"
prompt = "A?"
condition = { step = "b" }
[[steps]]
id = "b"
prompt = "B?"
"#,
        );
        let d = find(&report, "condition").unwrap();
        assert_eq!(d.severity, Severity::Warning);
    }

    #[test]
    fn zero_retry_and_timeout() {
        let report = check(
            r#"
timeout_secs = 0
[[steps]]
id = "a"
prompt = "A?"
retry = 0
"#,
        );
        assert!(find(&report, "retry").is_some());
        assert!(find(&report, "timeout").is_some());
    }

    #[test]
    fn warning_lead_longer_than_timeout() {
        let report = check(
            r#"
timeout_secs = 10
timeout_warning = { enabled = true }
[[steps]]
id = "a"
prompt = "A?"
"#,
        );
        let d = find(&report, "timeout").unwrap();
        assert_eq!(d.severity, Severity::Warning);
        assert!(!report.has_errors());
    }

    #[test]
    fn empty_flow_warns() {
        let report = check_flow(&FlowConfig::default());
        assert_eq!(report.count(Severity::Warning), 1);
    }

    #[test]
    fn unreadable_file_is_syntax_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"steps = [[[").unwrap();
        let report = check_flow_file(file.path());
        assert!(report.has_errors());
        assert!(find(&report, "syntax").is_some());
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic {
            severity: Severity::Error,
            category: "retry",
            path: "steps[0].retry".into(),
            message: "retry limit must be at least 1".into(),
        };
        assert_eq!(
            d.to_string(),
            "error [retry] steps[0].retry: retry limit must be at least 1"
        );
    }
}
