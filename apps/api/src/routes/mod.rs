pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers as interview;
use crate::profile::handlers as profile;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Job analysis
        .route("/api/v1/jobs/analyze", post(interview::handle_analyze_job))
        // Interviews
        .route("/api/v1/interviews", post(interview::handle_start_interview))
        .route("/api/v1/interviews/:id", get(interview::handle_get_interview))
        .route(
            "/api/v1/interviews/:id/answers",
            post(interview::handle_submit_answers),
        )
        .route(
            "/api/v1/interviews/:id/resume",
            get(interview::handle_get_resume),
        )
        // Profile facts
        .route("/api/v1/profile", get(profile::handle_get_profile))
        .route("/api/v1/profile/facts", post(profile::handle_save_facts))
        .with_state(state)
}
