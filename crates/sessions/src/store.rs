use std::collections::HashMap;

use {anyhow::Result, async_trait::async_trait, tokio::sync::RwLock};

use crate::snapshot::SessionSnapshot;

/// Durable storage for session snapshots, keyed by session id.
///
/// Implementations must tolerate concurrent calls for different and equal
/// ids; the last `save` for an id wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;
    async fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>>;
    async fn delete(&self, session_id: &str) -> Result<()>;
}

/// Store that keeps serialized snapshots in memory.
///
/// Snapshots go through JSON on every save and load, so whatever round-trips
/// here round-trips through a real backend too.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.entries.read().await.contains_key(session_id)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let data = serde_json::to_string(snapshot)?;
        self.entries
            .write()
            .await
            .insert(snapshot.session_id.clone(), data);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        let entries = self.entries.read().await;
        match entries.get(session_id) {
            Some(data) => Ok(Some(serde_json::from_str(data)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.entries.write().await.remove(session_id);
        Ok(())
    }
}
