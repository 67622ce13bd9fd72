use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::fit_summary::FitSummary;
use crate::interview::jd_parser::{extract_job_requirements, truncate_job_text, JobRequirements};
use crate::interview::negotiator::{Answers, ConsolidatedRequest};
use crate::interview::orchestrator::{Session, TurnOutcome};
use crate::interview::resume::render_resume;
use crate::profile::models::UserId;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AnalyzeJobRequest {
    pub job_text: String,
}

#[derive(Deserialize)]
pub struct StartInterviewRequest {
    pub email: String,
    /// Pre-extracted requirements; takes precedence over `job_text`.
    pub job: Option<JobRequirements>,
    pub job_text: Option<String>,
}

#[derive(Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: Answers,
}

/// Client-facing view of a session. Internal gap bookkeeping stays server-side.
#[derive(Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub email: UserId,
    pub state: &'static str,
    pub role: Option<String>,
    pub turns: u32,
    pub pending_request: Option<ConsolidatedRequest>,
    pub summary: Option<FitSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            email: session.user.clone(),
            state: session.state.name(),
            role: session.job.as_ref().map(|job| job.role.clone()),
            turns: session.turns,
            pending_request: session.pending_request().cloned(),
            summary: session.summary().cloned(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct TurnResponse {
    pub session: SessionView,
    pub outcome: TurnOutcome,
}

/// POST /api/v1/jobs/analyze
pub async fn handle_analyze_job(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeJobRequest>, JsonRejection>,
) -> Result<Json<JobRequirements>, AppError> {
    let Json(req) = payload?;
    let job_text = truncate_job_text(&req.job_text, state.config.max_job_text_chars);
    let job = extract_job_requirements(job_text, &state.llm).await?;
    Ok(Json(job))
}

/// POST /api/v1/interviews
pub async fn handle_start_interview(
    State(state): State<AppState>,
    payload: Result<Json<StartInterviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TurnResponse>), AppError> {
    let Json(req) = payload?;
    let user = UserId::parse(&req.email)?;

    let job = match (req.job, req.job_text) {
        (Some(job), _) => job.normalized(),
        (None, Some(text)) => {
            let text = truncate_job_text(&text, state.config.max_job_text_chars);
            extract_job_requirements(text, &state.llm).await?
        }
        (None, None) => {
            return Err(AppError::Validation(
                "either job or job_text is required".to_string(),
            ))
        }
    };

    let (session, outcome) = state.orchestrator.start(user, job).await?;
    let view = SessionView::from(&session);
    state.sessions.insert(session).await;
    info!("Interview {} started ({})", view.id, view.state);

    Ok((
        StatusCode::CREATED,
        Json(TurnResponse {
            session: view,
            outcome,
        }),
    ))
}

/// GET /api/v1/interviews/:id
pub async fn handle_get_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let shared = state.sessions.get(id).await?;
    let session = shared.lock().await;
    Ok(Json(SessionView::from(&*session)))
}

/// POST /api/v1/interviews/:id/answers
pub async fn handle_submit_answers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SubmitAnswersRequest>, JsonRejection>,
) -> Result<Json<TurnResponse>, AppError> {
    let Json(req) = payload?;
    let shared = state.sessions.get(id).await?;
    let mut session = shared.lock().await;
    let outcome = state
        .orchestrator
        .submit_answers(&mut session, req.answers)
        .await?;
    Ok(Json(TurnResponse {
        session: SessionView::from(&*session),
        outcome,
    }))
}

/// GET /api/v1/interviews/:id/resume
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = state.sessions.get(id).await?;
    let session = shared.lock().await;
    let summary = session.summary().ok_or_else(|| {
        AppError::InvalidTransition(format!(
            "résumé is available once interview {id} is done (currently {})",
            session.state.name()
        ))
    })?;

    let facts = state.store.snapshot(&session.user).await?;
    let markdown = render_resume(&session.user, &facts, summary);
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        markdown,
    ))
}
