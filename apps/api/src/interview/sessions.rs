use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::orchestrator::Session;

pub type SharedSession = Arc<Mutex<Session>>;

struct Entry {
    session: SharedSession,
    /// Last hand-out to a caller. A session fetched but not yet locked counts as active.
    last_access: DateTime<Utc>,
}

/// In-process interview sessions, keyed by id. A session's own mutex
/// serializes the turns submitted against it.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Session) -> SharedSession {
        let id = session.id;
        let last_access = session.updated_at;
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(
            id,
            Entry {
                session: shared.clone(),
                last_access,
            },
        );
        shared
    }

    pub async fn get(&self, id: Uuid) -> Result<SharedSession, AppError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Interview session {id} not found")))?;
        entry.last_access = Utc::now();
        Ok(entry.session.clone())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions neither fetched nor updated for longer than `ttl`.
    /// Sessions mid-turn are kept.
    pub async fn prune_idle(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            if entry.last_access >= cutoff {
                return true;
            }
            match entry.session.try_lock() {
                Ok(session) => session.updated_at >= cutoff,
                Err(_) => true,
            }
        });
        before - sessions.len()
    }
}

/// Periodically prunes idle sessions for the lifetime of the process.
pub fn spawn_pruner(registry: Arc<SessionRegistry>, ttl: Duration) -> JoinHandle<()> {
    let period = (ttl / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let pruned = registry.prune_idle(ttl).await;
            if pruned > 0 {
                info!("Pruned {pruned} idle interview session(s)");
            } else {
                debug!("No idle interview sessions to prune");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::models::UserId;

    fn session() -> Session {
        Session::new(UserId::parse("ana@example.com").unwrap())
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry = SessionRegistry::new();
        let shared = registry.insert(session()).await;
        let id = shared.lock().await.id;

        let found = registry.get(id).await.unwrap();
        assert!(Arc::ptr_eq(&shared, &found));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let registry = SessionRegistry::new();
        let err = registry.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_prune_drops_only_idle_sessions() {
        let registry = SessionRegistry::new();
        let mut stale = session();
        stale.updated_at = Utc::now() - chrono::Duration::hours(2);
        registry.insert(stale).await;
        let fresh = registry.insert(session()).await;

        let pruned = registry.prune_idle(Duration::from_secs(3600)).await;
        assert_eq!(pruned, 1);
        assert_eq!(registry.len().await, 1);
        let fresh_id = fresh.lock().await.id;
        assert!(registry.get(fresh_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_prune_keeps_sessions_in_use() {
        let registry = SessionRegistry::new();
        let mut stale = session();
        stale.updated_at = Utc::now() - chrono::Duration::hours(2);
        let shared = registry.insert(stale).await;

        let _turn = shared.lock().await;
        assert_eq!(registry.prune_idle(Duration::from_secs(60)).await, 0);
    }

    #[tokio::test]
    async fn test_fetched_session_survives_pruning_before_it_is_locked() {
        let registry = SessionRegistry::new();
        let mut stale = session();
        stale.updated_at = Utc::now() - chrono::Duration::hours(2);
        let id = stale.id;
        registry.insert(stale).await;

        let fetched = registry.get(id).await.unwrap();
        assert_eq!(registry.prune_idle(Duration::from_secs(60)).await, 0);

        drop(fetched.lock().await);
        assert!(registry.get(id).await.is_ok());
    }
}
