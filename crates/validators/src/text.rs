//! Validators for free-text responses.

use {
    parley_common::Validation,
    regex::{Regex, RegexBuilder},
    serde::{Deserialize, Serialize},
    tracing::warn,
};

use crate::{Validator, validator};

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9.!#$%&'*/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";
const EMAIL_PATTERN_PLUS: &str = r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";
const E164_PATTERN: &str = r"^\+[1-9]\d{1,14}$";
const DIGITS_PATTERN: &str = r"^\d{10,15}$";
const PHONE_SEPARATORS: &[char] = &[' ', '\t', '-', '(', ')', '.'];

/// Compile one of the fixed patterns above.
fn builtin(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "built-in validator pattern failed to compile");
            None
        },
    }
}

fn matches(re: &Option<Regex>, text: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(text))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailOptions {
    pub message: Option<String>,
    /// Accept `user+tag@example.com`. Defaults to true.
    pub allow_plus_addressing: bool,
}

impl Default for EmailOptions {
    fn default() -> Self {
        Self {
            message: None,
            allow_plus_addressing: true,
        }
    }
}

pub fn email(options: EmailOptions) -> Validator {
    let message = options
        .message
        .unwrap_or_else(|| "Please enter a valid email address".into());
    let re = builtin(if options.allow_plus_addressing {
        EMAIL_PATTERN_PLUS
    } else {
        EMAIL_PATTERN
    });

    validator(move |value| {
        let Some(text) = value.as_str() else {
            return Validation::reject(&message);
        };
        let text = text.trim().to_lowercase();
        if !matches(&re, &text) {
            return Validation::reject(&message);
        }
        if text.split('@').nth(1).is_some_and(|d| d.starts_with('.')) {
            return Validation::reject(&message);
        }
        Validation::Accepted
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlOptions {
    pub message: Option<String>,
    /// Allowed schemes. Defaults to `http` and `https`.
    pub protocols: Vec<String>,
    /// When false, a missing scheme is read as `https://`.
    pub require_protocol: bool,
}

impl Default for UrlOptions {
    fn default() -> Self {
        Self {
            message: None,
            protocols: vec!["http".into(), "https".into()],
            require_protocol: true,
        }
    }
}

pub fn url(options: UrlOptions) -> Validator {
    let message = options
        .message
        .unwrap_or_else(|| "Please enter a valid URL".into());
    let protocols = options.protocols;
    let require_protocol = options.require_protocol;
    let scheme = builtin(r"^[a-zA-Z][a-zA-Z0-9+.-]*:");

    validator(move |value| {
        let Some(text) = value.as_str() else {
            return Validation::reject(&message);
        };
        let mut candidate = text.trim().to_string();
        if !require_protocol && !matches(&scheme, &candidate) {
            candidate = format!("https://{candidate}");
        }
        let Ok(parsed) = ::url::Url::parse(&candidate) else {
            return Validation::reject(&message);
        };
        if !protocols.iter().any(|p| p == parsed.scheme()) {
            return Validation::reject(&message);
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Validation::reject(&message);
        }
        Validation::Accepted
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneOptions {
    pub message: Option<String>,
}

/// E.164 (`+` and up to 15 digits) or 10–15 bare digits. Spaces, dashes,
/// dots and parentheses are ignored.
pub fn phone(options: PhoneOptions) -> Validator {
    let message = options
        .message
        .unwrap_or_else(|| "Please enter a valid phone number (e.g., +1234567890)".into());
    let e164 = builtin(E164_PATTERN);
    let digits = builtin(DIGITS_PATTERN);

    validator(move |value| {
        let Some(text) = value.as_str() else {
            return Validation::reject(&message);
        };
        let cleaned: String = text.chars().filter(|c| !PHONE_SEPARATORS.contains(c)).collect();
        if matches(&e164, &cleaned) || matches(&digits, &cleaned) {
            Validation::Accepted
        } else {
            Validation::reject(&message)
        }
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegexOptions {
    pub message: Option<String>,
    /// Any of `i` (case-insensitive), `m` (multi-line), `s` (dot matches
    /// newline), `x` (ignore whitespace).
    pub flags: Option<String>,
}

/// Accept strings matching `pattern`. Fails if the pattern does not compile.
pub fn regex(pattern: &str, options: RegexOptions) -> Result<Validator, regex::Error> {
    let flags = options.flags.unwrap_or_default();
    let re = RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()?;
    let message = options
        .message
        .unwrap_or_else(|| "Input does not match the required format".into());

    Ok(validator(move |value| match value.as_str() {
        Some(text) if re.is_match(text) => Validation::Accepted,
        _ => Validation::reject(&message),
    }))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthOptions {
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub message: Option<String>,
}

/// Bounds on the number of characters.
pub fn length(options: LengthOptions) -> Validator {
    let LengthOptions { min, max, message } = options;

    validator(move |value| {
        let Some(text) = value.as_str() else {
            return Validation::reject(message.as_deref().unwrap_or("Value must be a string"));
        };
        let len = text.chars().count();
        if let Some(min) = min
            && len < min
        {
            return Validation::reject(
                message
                    .clone()
                    .unwrap_or_else(|| format!("Must be at least {min} characters")),
            );
        }
        if let Some(max) = max
            && len > max
        {
            return Validation::reject(
                message
                    .clone()
                    .unwrap_or_else(|| format!("Must be at most {max} characters")),
            );
        }
        Validation::Accepted
    })
}
