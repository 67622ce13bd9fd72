use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// `users`: one row of scalar contact facts per email.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub email: String,
    pub phone: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
}

/// `profile`: the four profile lists, each stored as a JSON array.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRow {
    pub email: String,
    pub education_json: String,
    pub certifications_json: String,
    pub languages_json: String,
    pub experience_json: String,
}

/// `skills`: one row per (email, skill).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SkillRow {
    pub email: String,
    pub skill: String,
    pub details_json: String,
}
