use {parley_common::Validation, serde_json::Value};

use crate::{Validator, validator};

/// All validators must accept. The first rejection is returned.
pub fn combine(validators: Vec<Validator>) -> Validator {
    validator(move |value| {
        validators
            .iter()
            .map(|v| v(value))
            .find(|result| !result.is_accepted())
            .unwrap_or(Validation::Accepted)
    })
}

/// Accept only values equal to one of `allowed`.
pub fn one_of(allowed: Vec<Value>, message: Option<String>) -> Validator {
    let message = message.unwrap_or_else(|| {
        let listed: Vec<String> = allowed
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        format!("Value must be one of: {}", listed.join(", "))
    });

    validator(move |value| {
        if allowed.contains(value) {
            Validation::Accepted
        } else {
            Validation::reject(&message)
        }
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{LengthOptions, RegexOptions, length, regex},
        serde_json::json,
    };

    fn password() -> Validator {
        combine(vec![
            length(LengthOptions {
                min: Some(8),
                ..Default::default()
            }),
            regex(
                "[A-Z]",
                RegexOptions {
                    message: Some("Must contain an uppercase letter".into()),
                    ..Default::default()
                },
            )
            .unwrap(),
            regex(
                "[0-9]",
                RegexOptions {
                    message: Some("Must contain a number".into()),
                    ..Default::default()
                },
            )
            .unwrap(),
        ])
    }

    #[test]
    fn combine_accepts_when_all_pass() {
        assert!(password()(&json!("Password1")).is_accepted());
    }

    #[test]
    fn combine_returns_first_rejection() {
        let v = password();
        assert_eq!(
            v(&json!("short")).rejection_message(),
            Some("Must be at least 8 characters")
        );
        assert_eq!(
            v(&json!("password1")).rejection_message(),
            Some("Must contain an uppercase letter")
        );
        assert_eq!(
            v(&json!("Passwordx")).rejection_message(),
            Some("Must contain a number")
        );
    }

    #[test]
    fn combine_of_nothing_accepts() {
        assert!(combine(Vec::new())(&json!(null)).is_accepted());
    }

    #[test]
    fn one_of_checks_membership() {
        let v = one_of(vec![json!("red"), json!("blue"), json!("green")], None);
        assert!(v(&json!("blue")).is_accepted());
        assert_eq!(
            v(&json!("yellow")).rejection_message(),
            Some("Value must be one of: red, blue, green")
        );
    }

    #[test]
    fn one_of_custom_message_and_numbers() {
        let v = one_of(vec![json!(1), json!(2)], Some("Pick 1 or 2".into()));
        assert!(v(&json!(2)).is_accepted());
        assert_eq!(v(&json!("2")).rejection_message(), Some("Pick 1 or 2"));
    }
}
