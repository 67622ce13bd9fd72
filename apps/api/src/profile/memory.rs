use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::errors::AppError;
use crate::profile::models::{CoreFacts, FactPatch, Profile, SkillDetails, StoredFacts, UserId};
use crate::profile::store::FactStore;

/// Process-local fact store. Same merge rules as the SQLite store; nothing survives a restart.
#[derive(Default)]
pub struct InMemoryFactStore {
    users: RwLock<HashMap<UserId, StoredFacts>>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactStore for InMemoryFactStore {
    async fn get_core(&self, user: &UserId) -> Result<CoreFacts, AppError> {
        let users = self.users.read().await;
        Ok(users.get(user).map(|f| f.core.clone()).unwrap_or_default())
    }

    async fn get_profile(&self, user: &UserId) -> Result<Profile, AppError> {
        let users = self.users.read().await;
        Ok(users.get(user).map(|f| f.profile.clone()).unwrap_or_default())
    }

    async fn get_skills(&self, user: &UserId) -> Result<BTreeMap<String, SkillDetails>, AppError> {
        let users = self.users.read().await;
        Ok(users.get(user).map(|f| f.skills.clone()).unwrap_or_default())
    }

    async fn save(&self, user: &UserId, patch: &FactPatch) -> Result<(), AppError> {
        // Validation happens before the lock is taken; applying a validated patch cannot fail.
        let patch = patch.clone().validated()?;
        if patch.is_empty() {
            return Ok(());
        }

        let mut users = self.users.write().await;
        users.entry(user.clone()).or_default().apply(&patch);

        info!(
            "Saved facts for {user} in memory: core={:?} profile={:?} skills={}",
            patch.core.present_attributes(),
            patch.profile.present_attributes(),
            patch.skills.len()
        );
        Ok(())
    }

    async fn snapshot(&self, user: &UserId) -> Result<StoredFacts, AppError> {
        let users = self.users.read().await;
        Ok(users.get(user).cloned().unwrap_or_default())
    }
}
