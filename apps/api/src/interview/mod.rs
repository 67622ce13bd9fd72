// Interview flow: job extraction, gap negotiation, fit summary, résumé.
// All model calls go through llm_client.

pub mod fit_summary;
pub mod handlers;
pub mod interpreter;
pub mod jd_parser;
pub mod negotiator;
pub mod orchestrator;
pub mod prompts;
pub mod resume;
pub mod sessions;
