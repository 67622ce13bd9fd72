mod config;
mod db;
mod errors;
mod interview;
mod llm_client;
mod models;
mod profile;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::{Config, InterpreterBackend, PhraserBackend, StoreBackend};
use crate::db::{create_pool, init_schema};
use crate::interview::fit_summary::{LlmPhraser, NarrativePhraser, TemplatePhraser};
use crate::interview::interpreter::{
    AnswerInterpreter, KeyValueAnswerInterpreter, LlmAnswerInterpreter,
};
use crate::interview::negotiator::RequestStyle;
use crate::interview::orchestrator::Orchestrator;
use crate::interview::sessions::{spawn_pruner, SessionRegistry};
use crate::llm_client::LlmClient;
use crate::profile::memory::InMemoryFactStore;
use crate::profile::store::{FactStore, SqliteFactStore};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Curriclick API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the fact store
    let store: Arc<dyn FactStore> = match config.fact_store {
        StoreBackend::Sqlite => {
            let pool = create_pool(&config.database_url).await?;
            init_schema(&pool).await?;
            Arc::new(SqliteFactStore::new(pool))
        }
        StoreBackend::Memory => {
            info!("Using in-memory fact store; facts will not survive a restart");
            Arc::new(InMemoryFactStore::new())
        }
    };

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.llm_timeout)?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Pluggable backends, chosen by config
    let interpreter: Arc<dyn AnswerInterpreter> = match config.answer_interpreter {
        InterpreterBackend::Llm => Arc::new(LlmAnswerInterpreter(llm.clone())),
        InterpreterBackend::KeyValue => Arc::new(KeyValueAnswerInterpreter),
    };
    let phraser: Arc<dyn NarrativePhraser> = match config.narrative_phraser {
        PhraserBackend::Llm => Arc::new(LlmPhraser(llm.clone())),
        PhraserBackend::Template => Arc::new(TemplatePhraser),
    };
    info!(
        "Answer interpreter: {}, narrative phraser: {}",
        interpreter.name(),
        phraser.name()
    );

    let orchestrator = Orchestrator::new(
        store.clone(),
        interpreter,
        phraser,
        RequestStyle {
            ask_skill_level: config.ask_skill_level,
        },
    );

    let sessions = Arc::new(SessionRegistry::new());
    let _pruner = spawn_pruner(sessions.clone(), config.session_idle_ttl);

    // Build app state
    let state = AppState {
        store,
        orchestrator: Arc::new(orchestrator),
        sessions,
        llm,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
