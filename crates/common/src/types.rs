//! Value types shared by the wizard, the session store, and the validators.

use {
    indexmap::IndexMap,
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

/// Accepted responses keyed by step id, in completion order.
pub type ResponseMap = IndexMap<String, Value>;

/// Rejection text used when a validator declines without a message.
pub const DEFAULT_REJECTION: &str = "Invalid response. Please try again.";

/// Identifies the conversation a wizard run belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WizardContext {
    pub user_id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    /// Opaque caller data threaded through the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl WizardContext {
    pub fn new(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            guild_id: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Outcome of validating a candidate response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Accepted,
    /// Rejected, optionally with a message for the user.
    Rejected(Option<String>),
}

impl Validation {
    #[must_use]
    pub fn reject(message: impl Into<String>) -> Self {
        Self::Rejected(Some(message.into()))
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// The message to show the user, if rejected.
    pub fn rejection_message(&self) -> Option<&str> {
        match self {
            Self::Accepted => None,
            Self::Rejected(Some(message)) => Some(message),
            Self::Rejected(None) => Some(DEFAULT_REJECTION),
        }
    }
}

impl From<bool> for Validation {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Accepted
        } else {
            Self::Rejected(None)
        }
    }
}

impl From<String> for Validation {
    fn from(message: String) -> Self {
        Self::Rejected(Some(message))
    }
}

impl From<&str> for Validation {
    fn from(message: &str) -> Self {
        Self::Rejected(Some(message.to_string()))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn false_maps_to_generic_message() {
        let v = Validation::from(false);
        assert_eq!(v.rejection_message(), Some(DEFAULT_REJECTION));
        assert!(Validation::from(true).is_accepted());
    }

    #[test]
    fn string_rejection_keeps_message() {
        let v = Validation::from("too short");
        assert_eq!(v.rejection_message(), Some("too short"));
        assert!(!v.is_accepted());
    }

    #[test]
    fn context_skips_absent_fields() {
        let ctx = WizardContext::new("u1", "c1");
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json, serde_json::json!({"user_id": "u1", "channel_id": "c1"}));
    }
}
