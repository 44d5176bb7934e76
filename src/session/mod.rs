// ==================== SESSIONS ====================
// One `SessionState` per login. Each sits behind its own async mutex: a
// request holds the lock for the whole operation, so mutations to one session
// never interleave.

pub mod state;

pub use state::{Notice, NoticeKind, SessionState};

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub type SharedSession = Arc<Mutex<SessionState>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the session under a fresh id and returns the id.
    pub async fn insert(&self, state: SessionState) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), Arc::new(Mutex::new(state)));
        log::info!("🪪 Session created: {}", session_id);
        session_id
    }

    pub async fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            log::info!("👋 Session closed: {}", session_id);
        }
        removed
    }

    pub async fn all(&self) -> Vec<SharedSession> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drops sessions idle for longer than `ttl`. Sessions busy with a request
    /// are skipped.
    pub async fn prune_idle(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(state) => state.last_activity() >= cutoff,
            Err(_) => true,
        });
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppSettings;

    #[tokio::test]
    async fn test_insert_get_remove() {
        let registry = SessionRegistry::new();
        let id = registry.insert(SessionState::new(&AppSettings::fallback())).await;

        assert!(registry.get(&id).await.is_some());
        assert_eq!(registry.len().await, 1);
        assert!(registry.remove(&id).await);
        assert!(registry.get(&id).await.is_none());
        assert!(!registry.remove(&id).await);
    }

    #[tokio::test]
    async fn test_prune_idle() {
        let registry = SessionRegistry::new();
        registry.insert(SessionState::new(&AppSettings::fallback())).await;

        assert_eq!(registry.prune_idle(Duration::hours(1)).await, 0);
        assert_eq!(registry.prune_idle(Duration::seconds(-1)).await, 1);
        assert!(registry.is_empty().await);
    }
}
