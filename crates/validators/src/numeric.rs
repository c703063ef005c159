use {
    parley_common::Validation,
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::{Validator, validator};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeOptions {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub message: Option<String>,
}

/// Read a number from a JSON number or a numeric string.
fn as_number(value: &Value) -> Option<f64> {
    let num = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    num.is_finite().then_some(num)
}

/// Inclusive numeric bounds. Numeric strings are parsed before comparing.
pub fn range(options: RangeOptions) -> Validator {
    let RangeOptions { min, max, message } = options;

    validator(move |value| {
        let Some(num) = as_number(value) else {
            return Validation::reject(message.as_deref().unwrap_or("Value must be a number"));
        };
        if let Some(min) = min
            && num < min
        {
            return Validation::reject(
                message
                    .clone()
                    .unwrap_or_else(|| format!("Must be at least {min}")),
            );
        }
        if let Some(max) = max
            && num > max
        {
            return Validation::reject(
                message
                    .clone()
                    .unwrap_or_else(|| format!("Must be at most {max}")),
            );
        }
        Validation::Accepted
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    #[rstest]
    #[case(json!(15), true)]
    #[case(json!(100), true)]
    #[case(json!(10), true)]
    #[case(json!(5), false)]
    #[case(json!(150), false)]
    #[case(json!("42"), true)]
    #[case(json!(" 7.5 "), false)]
    #[case(json!(12.5), true)]
    fn bounds(#[case] input: Value, #[case] ok: bool) {
        let v = range(RangeOptions {
            min: Some(10.0),
            max: Some(120.0),
            message: None,
        });
        assert_eq!(v(&input).is_accepted(), ok);
    }

    #[rstest]
    #[case(json!("abc"))]
    #[case(json!(null))]
    #[case(json!(true))]
    #[case(json!("NaN"))]
    fn non_numbers(#[case] input: Value) {
        let v = range(RangeOptions::default());
        assert_eq!(v(&input).rejection_message(), Some("Value must be a number"));
    }

    #[test]
    fn default_messages_format_whole_numbers() {
        let v = range(RangeOptions {
            min: Some(13.0),
            max: Some(120.0),
            message: None,
        });
        assert_eq!(v(&json!(5)).rejection_message(), Some("Must be at least 13"));
        assert_eq!(v(&json!(200)).rejection_message(), Some("Must be at most 120"));
    }

    #[test]
    fn custom_message_wins() {
        let v = range(RangeOptions {
            min: Some(18.0),
            max: None,
            message: Some("Adults only".into()),
        });
        assert_eq!(v(&json!(12)).rejection_message(), Some("Adults only"));
    }
}
