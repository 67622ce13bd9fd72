use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::profile::models::UserId;

/// Per-user async locks. Holding a user's guard serializes every
/// read-compute-save cycle for that user.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user: &UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Locks nobody holds or waits on can go.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(user.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let locks = Arc::new(UserLocks::new());
        let user = UserId::parse("a@example.com").unwrap();

        let guard = locks.acquire(&user).await;
        let waiter = {
            let locks = Arc::clone(&locks);
            let user = user.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&user).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let locks = UserLocks::new();
        let _a = locks.acquire(&UserId::parse("a@example.com").unwrap()).await;
        let _b = locks.acquire(&UserId::parse("b@example.com").unwrap()).await;
        assert_eq!(locks.tracked_users(), 2);
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = UserLocks::new();
        drop(locks.acquire(&UserId::parse("a@example.com").unwrap()).await);
        let _b = locks.acquire(&UserId::parse("b@example.com").unwrap()).await;
        assert_eq!(locks.tracked_users(), 1);
    }
}
