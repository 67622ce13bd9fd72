use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::profile::completeness::{compute_completeness_report, CompletenessReport};
use crate::profile::models::{FactPatch, StoredFacts, UserId};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Deserialize)]
pub struct SaveFactsRequest {
    pub email: String,
    #[serde(flatten)]
    pub patch: FactPatch,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub email: UserId,
    pub facts: StoredFacts,
    pub completeness: CompletenessReport,
}

async fn profile_response(state: &AppState, user: UserId) -> Result<ProfileResponse, AppError> {
    let facts = state.store.snapshot(&user).await?;
    let completeness = compute_completeness_report(&facts.core, &facts.profile);
    Ok(ProfileResponse {
        email: user,
        facts,
        completeness,
    })
}

/// GET /api/v1/profile?email=
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Query(params): Query<EmailQuery>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = UserId::parse(&params.email)?;
    Ok(Json(profile_response(&state, user).await?))
}

/// POST /api/v1/profile/facts
pub async fn handle_save_facts(
    State(state): State<AppState>,
    payload: Result<Json<SaveFactsRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>, AppError> {
    let Json(req) = payload?;
    let user = UserId::parse(&req.email)?;
    state.orchestrator.save_facts(&user, &req.patch).await?;
    Ok(Json(profile_response(&state, user).await?))
}
