use std::sync::Arc;

use crate::config::Config;
use crate::interview::orchestrator::Orchestrator;
use crate::interview::sessions::SessionRegistry;
use crate::llm_client::LlmClient;
use crate::profile::store::FactStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Fact store. SQLite by default, in-memory with `FACT_STORE=memory`.
    pub store: Arc<dyn FactStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionRegistry>,
    /// Used directly for job extraction; the orchestrator's backends hold their own clones.
    pub llm: LlmClient,
    pub config: Config,
}
