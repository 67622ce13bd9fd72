//! Fact Store: persistence of core facts, profile lists, and skills, keyed by user.
//!
//! Every implementation honours the same merge rules:
//! - core facts coalesce (a null never overwrites a stored value),
//! - a supplied profile list fully replaces the stored one,
//! - skills are upserted (last write wins),
//! - one `save` call is atomic: all of it lands or none of it does.
//!
//! Concurrent `save` calls for the same user are NOT serialized by the store.
//! Callers hold the user's lock from `UserLocks` around read-compute-write cycles.

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::AppError;
use crate::models::facts::{ProfileRow, SkillRow, UserRow};
use crate::profile::models::{
    CoreFacts, CoreFactsPatch, FactPatch, Profile, ProfilePatch, SkillDetails, SkillFact,
    StoredFacts, UserId,
};

#[async_trait]
pub trait FactStore: Send + Sync {
    async fn get_core(&self, user: &UserId) -> Result<CoreFacts, AppError>;

    async fn get_profile(&self, user: &UserId) -> Result<Profile, AppError>;

    async fn get_skills(&self, user: &UserId) -> Result<BTreeMap<String, SkillDetails>, AppError>;

    /// Validates and writes a whole patch atomically.
    async fn save(&self, user: &UserId, patch: &FactPatch) -> Result<(), AppError>;

    async fn save_core(&self, user: &UserId, patch: &CoreFactsPatch) -> Result<(), AppError> {
        let patch = FactPatch {
            core: patch.clone(),
            ..Default::default()
        };
        self.save(user, &patch).await
    }

    async fn save_profile(&self, user: &UserId, patch: &ProfilePatch) -> Result<(), AppError> {
        let patch = FactPatch {
            profile: patch.clone(),
            ..Default::default()
        };
        self.save(user, &patch).await
    }

    async fn save_skill(
        &self,
        user: &UserId,
        skill: &str,
        details: &SkillDetails,
    ) -> Result<(), AppError> {
        let patch = FactPatch {
            skills: vec![SkillFact {
                skill: skill.to_string(),
                details: details.clone(),
            }],
            ..Default::default()
        };
        self.save(user, &patch).await
    }

    async fn snapshot(&self, user: &UserId) -> Result<StoredFacts, AppError> {
        Ok(StoredFacts {
            core: self.get_core(user).await?,
            profile: self.get_profile(user).await?,
            skills: self.get_skills(user).await?,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SqliteFactStore
// ────────────────────────────────────────────────────────────────────────────

/// SQLite-backed store. Each `save` runs in a single transaction.
#[derive(Clone)]
pub struct SqliteFactStore {
    pool: SqlitePool,
}

impl SqliteFactStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl From<UserRow> for CoreFacts {
    fn from(row: UserRow) -> Self {
        CoreFacts {
            phone: row.phone,
            state: row.state,
            city: row.city,
            neighborhood: row.neighborhood,
        }
    }
}

#[async_trait]
impl FactStore for SqliteFactStore {
    async fn get_core(&self, user: &UserId) -> Result<CoreFacts, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT email, phone, state, city, neighborhood FROM users WHERE email = ?",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CoreFacts::from).unwrap_or_default())
    }

    async fn get_profile(&self, user: &UserId) -> Result<Profile, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT email, education_json, certifications_json, languages_json, experience_json
            FROM profile
            WHERE email = ?
            "#,
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(Profile::default());
        };

        Ok(Profile {
            education: decode_json(&row.education_json, "education")?,
            certifications: decode_json(&row.certifications_json, "certifications")?,
            languages: decode_json(&row.languages_json, "languages")?,
            experience: decode_json(&row.experience_json, "experience")?,
        })
    }

    async fn get_skills(&self, user: &UserId) -> Result<BTreeMap<String, SkillDetails>, AppError> {
        let rows = sqlx::query_as::<_, SkillRow>(
            "SELECT email, skill, details_json FROM skills WHERE email = ? ORDER BY skill",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let details: SkillDetails = decode_json(&row.details_json, &row.skill)?;
                Ok((row.skill, details))
            })
            .collect()
    }

    async fn save(&self, user: &UserId, patch: &FactPatch) -> Result<(), AppError> {
        let patch = patch.clone().validated()?;
        if patch.is_empty() {
            return Ok(());
        }

        // Encode everything up front so nothing can fail halfway through the transaction.
        let profile_updates = encode_profile_patch(&patch.profile)?;
        let skill_rows = patch
            .skills
            .iter()
            .map(|fact| Ok((fact.skill.as_str(), encode_json(&fact.details)?)))
            .collect::<Result<Vec<_>, AppError>>()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO users (email) VALUES (?)")
            .bind(user.as_str())
            .execute(&mut *tx)
            .await?;

        if !patch.core.is_empty() {
            sqlx::query(
                r#"
                UPDATE users
                SET phone = COALESCE(?, phone),
                    state = COALESCE(?, state),
                    city = COALESCE(?, city),
                    neighborhood = COALESCE(?, neighborhood)
                WHERE email = ?
                "#,
            )
            .bind(&patch.core.phone)
            .bind(&patch.core.state)
            .bind(&patch.core.city)
            .bind(&patch.core.neighborhood)
            .bind(user.as_str())
            .execute(&mut *tx)
            .await?;
        }

        if !profile_updates.is_empty() {
            sqlx::query("INSERT OR IGNORE INTO profile (email) VALUES (?)")
                .bind(user.as_str())
                .execute(&mut *tx)
                .await?;

            for (statement, json) in &profile_updates {
                sqlx::query(*statement)
                    .bind(json)
                    .bind(user.as_str())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for (skill, details_json) in &skill_rows {
            sqlx::query(
                r#"
                INSERT INTO skills (email, skill, details_json)
                VALUES (?, ?, ?)
                ON CONFLICT (email, skill) DO UPDATE SET details_json = excluded.details_json
                "#,
            )
            .bind(user.as_str())
            .bind(*skill)
            .bind(details_json)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            "Saved facts for {user}: core={:?} profile={:?} skills={}",
            patch.core.present_attributes(),
            patch.profile.present_attributes(),
            patch.skills.len()
        );
        Ok(())
    }
}

fn encode_profile_patch(patch: &ProfilePatch) -> Result<Vec<(&'static str, String)>, AppError> {
    let mut updates = Vec::new();
    if let Some(education) = &patch.education {
        updates.push((
            "UPDATE profile SET education_json = ? WHERE email = ?",
            encode_json(education)?,
        ));
    }
    if let Some(certifications) = &patch.certifications {
        updates.push((
            "UPDATE profile SET certifications_json = ? WHERE email = ?",
            encode_json(certifications)?,
        ));
    }
    if let Some(languages) = &patch.languages {
        updates.push((
            "UPDATE profile SET languages_json = ? WHERE email = ?",
            encode_json(languages)?,
        ));
    }
    if let Some(experience) = &patch.experience {
        updates.push((
            "UPDATE profile SET experience_json = ? WHERE email = ?",
            encode_json(experience)?,
        ));
    }
    Ok(updates)
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value)
        .context("Failed to encode fact as JSON")
        .map_err(AppError::Internal)
}

fn decode_json<T: DeserializeOwned>(raw: &str, what: &str) -> Result<T, AppError> {
    serde_json::from_str(raw)
        .with_context(|| format!("Stored {what} record is not valid JSON"))
        .map_err(AppError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, init_schema};
    use crate::profile::models::{EducationRecord, LanguageRecord, SkillLevel};

    async fn temp_store() -> (SqliteFactStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("facts.db").display());
        let pool = create_pool(&url).await.unwrap();
        init_schema(&pool).await.unwrap();
        (SqliteFactStore::new(pool), dir)
    }

    fn user() -> UserId {
        UserId::parse("candidate@example.com").unwrap()
    }

    fn docker() -> SkillDetails {
        SkillDetails {
            experience_text: "1 year with Compose".to_string(),
            level: Some(SkillLevel::Intermediate),
        }
    }

    #[tokio::test]
    async fn test_unknown_user_reads_as_empty() {
        let (store, _dir) = temp_store().await;
        let facts = store.snapshot(&user()).await.unwrap();
        assert_eq!(facts, StoredFacts::default());
    }

    #[tokio::test]
    async fn test_null_phone_never_overwrites_stored_phone() {
        let (store, _dir) = temp_store().await;
        store
            .save_core(
                &user(),
                &CoreFactsPatch {
                    phone: Some("X".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .save_core(
                &user(),
                &CoreFactsPatch {
                    phone: None,
                    city: Some("São Paulo".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let core = store.get_core(&user()).await.unwrap();
        assert_eq!(core.phone.as_deref(), Some("X"));
        assert_eq!(core.city.as_deref(), Some("São Paulo"));
    }

    #[tokio::test]
    async fn test_profile_field_replaced_only_when_supplied() {
        let (store, _dir) = temp_store().await;
        store
            .save_profile(
                &user(),
                &ProfilePatch {
                    languages: Some(vec![LanguageRecord {
                        language: Some("Português".to_string()),
                        proficiency: Some("Nativo".to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .save_profile(
                &user(),
                &ProfilePatch {
                    education: Some(vec![EducationRecord {
                        institution: Some("USP".to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let profile = store.get_profile(&user()).await.unwrap();
        assert_eq!(profile.languages.len(), 1);
        assert_eq!(profile.education[0].institution.as_deref(), Some("USP"));
        assert!(profile.certifications.is_empty());
    }

    #[tokio::test]
    async fn test_saving_same_skill_twice_is_idempotent() {
        let (store, _dir) = temp_store().await;
        store.save_skill(&user(), "Docker", &docker()).await.unwrap();
        let once = store.snapshot(&user()).await.unwrap();
        store.save_skill(&user(), "Docker", &docker()).await.unwrap();
        let twice = store.snapshot(&user()).await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.skills.len(), 1);
    }

    #[tokio::test]
    async fn test_resaving_skill_replaces_details() {
        let (store, _dir) = temp_store().await;
        store.save_skill(&user(), "Docker", &docker()).await.unwrap();
        let updated = SkillDetails {
            experience_text: "3 years running Swarm".to_string(),
            level: None,
        };
        store.save_skill(&user(), "Docker", &updated).await.unwrap();
        let skills = store.get_skills(&user()).await.unwrap();
        assert_eq!(skills["Docker"], updated);
    }

    #[tokio::test]
    async fn test_invalid_patch_writes_nothing() {
        let (store, _dir) = temp_store().await;
        let patch = FactPatch {
            core: CoreFactsPatch {
                phone: Some("+55".to_string()),
                ..Default::default()
            },
            skills: vec![SkillFact {
                skill: "".to_string(),
                details: docker(),
            }],
            ..Default::default()
        };
        assert!(store.save(&user(), &patch).await.is_err());
        let core = store.get_core(&user()).await.unwrap();
        assert_eq!(core.phone, None);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let (store, _dir) = temp_store().await;
        let other = UserId::parse("other@example.com").unwrap();
        store.save_skill(&user(), "Docker", &docker()).await.unwrap();
        assert!(store.get_skills(&other).await.unwrap().is_empty());
    }
}
