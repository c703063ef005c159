use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use {anyhow::Context as _, tracing::debug};

use crate::{Result, snapshot::SessionSnapshot, store::SessionStore};

/// In-process snapshot map that lives as long as the process.
///
/// Clones share the same map, so several wizard instances in one process can
/// resume each other's sessions without a store.
#[derive(Clone, Default)]
pub struct SessionCache {
    entries: Arc<RwLock<HashMap<String, SessionSnapshot>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }

    pub fn put(&self, snapshot: SessionSnapshot) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(snapshot.session_id.clone(), snapshot);
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Two-tier snapshot access: the in-process cache first, then the store.
#[derive(Clone, Default)]
pub struct SessionRepository {
    cache: SessionCache,
    store: Option<Arc<dyn SessionStore>>,
}

impl SessionRepository {
    pub fn new(cache: SessionCache, store: Option<Arc<dyn SessionStore>>) -> Self {
        Self { cache, store }
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Write through both tiers.
    pub async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        self.cache.put(snapshot.clone());
        if let Some(store) = &self.store {
            store
                .save(snapshot)
                .await
                .with_context(|| format!("save session {}", snapshot.session_id))?;
        }
        debug!(
            session_id = %snapshot.session_id,
            step_index = snapshot.current_step_index,
            "session snapshot saved"
        );
        Ok(())
    }

    /// Look in the cache, then the store. A store hit refills the cache.
    pub async fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        if let Some(snapshot) = self.cache.get(session_id) {
            debug!(session_id, "session snapshot served from cache");
            return Ok(Some(snapshot));
        }
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let loaded = store
            .load(session_id)
            .await
            .with_context(|| format!("load session {session_id}"))?;
        if let Some(snapshot) = &loaded {
            debug!(session_id, "session snapshot loaded from store");
            self.cache.put(snapshot.clone());
        }
        Ok(loaded)
    }

    /// Remove from both tiers.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        self.cache.remove(session_id);
        if let Some(store) = &self.store {
            store
                .delete(session_id)
                .await
                .with_context(|| format!("delete session {session_id}"))?;
        }
        Ok(())
    }
}
