use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Which fact store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown FACT_STORE '{other}' (expected sqlite|memory)")),
        }
    }
}

/// How free-form answers are mapped onto requested fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterBackend {
    Llm,
    KeyValue,
}

impl FromStr for InterpreterBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "key_value" | "keyvalue" => Ok(Self::KeyValue),
            other => Err(anyhow!(
                "unknown ANSWER_INTERPRETER '{other}' (expected llm|key_value)"
            )),
        }
    }
}

/// How the fit-summary narrative is worded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraserBackend {
    Llm,
    Template,
}

impl FromStr for PhraserBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "template" => Ok(Self::Template),
            other => Err(anyhow!(
                "unknown NARRATIVE_PHRASER '{other}' (expected llm|template)"
            )),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Built once at startup and handed to constructors explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub fact_store: StoreBackend,
    pub anthropic_api_key: String,
    pub answer_interpreter: InterpreterBackend,
    pub narrative_phraser: PhraserBackend,
    pub max_job_text_chars: usize,
    pub ask_skill_level: bool,
    pub llm_timeout: Duration,
    pub session_idle_ttl: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            database_url: get("DATABASE_URL", "sqlite://interview_agent.db"),
            fact_store: get("FACT_STORE", "sqlite").parse()?,
            anthropic_api_key: lookup("ANTHROPIC_API_KEY").with_context(|| {
                "Required environment variable 'ANTHROPIC_API_KEY' is not set".to_string()
            })?,
            answer_interpreter: get("ANSWER_INTERPRETER", "llm").parse()?,
            narrative_phraser: get("NARRATIVE_PHRASER", "llm").parse()?,
            max_job_text_chars: get("MAX_JOB_TEXT_CHARS", "4000")
                .parse()
                .context("MAX_JOB_TEXT_CHARS must be a positive integer")?,
            ask_skill_level: parse_bool(&get("ASK_SKILL_LEVEL", "true"))
                .context("ASK_SKILL_LEVEL must be true or false")?,
            llm_timeout: Duration::from_secs(
                get("LLM_TIMEOUT_SECS", "120")
                    .parse()
                    .context("LLM_TIMEOUT_SECS must be a number of seconds")?,
            ),
            session_idle_ttl: Duration::from_secs(
                get("SESSION_IDLE_TTL_SECS", "3600")
                    .parse()
                    .context("SESSION_IDLE_TTL_SECS must be a number of seconds")?,
            ),
            port: get("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: get("RUST_LOG", "info"),
        })
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("'{other}' is not a boolean")),
    }
}
