use std::time::{SystemTime, UNIX_EPOCH};

use {
    parley_common::{ResponseMap, WizardContext},
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

/// Serializable checkpoint of a wizard run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    /// Index of the next step to run.
    pub current_step_index: usize,
    pub responses: ResponseMap,
    /// Indices of completed steps, most recent last. Older snapshots may lack it.
    #[serde(default)]
    pub history: Vec<usize>,
    /// Milliseconds since the Unix epoch.
    pub started_at: u64,
    pub last_activity_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl SessionSnapshot {
    /// The conversation this snapshot belongs to.
    pub fn context(&self) -> WizardContext {
        WizardContext {
            user_id: self.user_id.clone(),
            channel_id: self.channel_id.clone(),
            guild_id: self.guild_id.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A fresh session id of the form `wizard_<millis>_<random>`.
pub fn generate_session_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("wizard_{}_{}", now_ms(), &random[..8])
}
