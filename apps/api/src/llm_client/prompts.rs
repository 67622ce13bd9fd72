// Shared prompt fragments. Each module that calls the model keeps its own
// prompts.rs next to it; only cross-cutting instructions live here.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps the model from filling fields the candidate never talked about.
pub const NO_INVENTION_INSTRUCTION: &str = "\
    CRITICAL: Only report facts the candidate actually stated. \
    Do NOT infer, guess, or default a value. \
    If a requested item is not addressed, leave it out entirely.";

/// Builds a system prompt from a role sentence followed by the JSON-only rules.
pub fn json_system(role: &str) -> String {
    format!("{role} {JSON_ONLY_SYSTEM}")
}
