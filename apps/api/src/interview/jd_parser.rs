//! Job requirement extraction: turns a pasted job posting into a requirement snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::interview::prompts::{JOB_EXTRACTION_PROMPT_TEMPLATE, JOB_EXTRACTION_SYSTEM};
use crate::llm_client::{strip_json_fences, LlmClient, LlmError};

/// Recommended upper bounds for the extracted lists.
pub const RECOMMENDED_MUST_HAVE: usize = 6;
pub const RECOMMENDED_NICE_TO_HAVE: usize = 4;

/// Extraction output is small; cap the model's answer accordingly.
const EXTRACTION_MAX_TOKENS: u32 = 400;

/// What a job posting asks for. Derived once per posting, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRequirements {
    pub role: String,
    #[serde(default)]
    pub must_have: Vec<String>,
    #[serde(default)]
    pub nice_to_have: Vec<String>,
    #[serde(default)]
    pub responsibilities: String,
}

impl JobRequirements {
    /// Skills probed against the store: must-haves first, then nice-to-haves.
    pub fn skills_to_probe(&self) -> Vec<String> {
        self.must_have
            .iter()
            .chain(self.nice_to_have.iter())
            .cloned()
            .collect()
    }

    /// Trims entries and drops blank ones.
    pub fn normalized(self) -> Self {
        Self {
            role: self.role.trim().to_string(),
            must_have: clean_list(self.must_have),
            nice_to_have: clean_list(self.nice_to_have),
            responsibilities: self.responsibilities.trim().to_string(),
        }
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Cuts a posting to at most `max_chars` characters without splitting a code point.
pub fn truncate_job_text(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Asks the model for the requirement snapshot of a (pre-truncated) posting.
pub async fn extract_job_requirements(
    job_text: &str,
    llm: &LlmClient,
) -> Result<JobRequirements, AppError> {
    if job_text.trim().is_empty() {
        return Err(AppError::Validation("job_text cannot be empty".to_string()));
    }

    let prompt = JOB_EXTRACTION_PROMPT_TEMPLATE.replace("{job_text}", job_text);
    let raw = llm
        .call_text(&prompt, JOB_EXTRACTION_SYSTEM, Some(EXTRACTION_MAX_TOKENS))
        .await
        .map_err(|e| match e {
            LlmError::EmptyContent => {
                AppError::MalformedExtraction("model returned empty content".to_string())
            }
            other => AppError::Llm(format!("Job extraction failed: {other}")),
        })?;

    let job = parse_extraction(&raw)?;
    info!(
        "Extracted job '{}': {} must-have, {} nice-to-have",
        job.role,
        job.must_have.len(),
        job.nice_to_have.len()
    );
    Ok(job)
}

/// Validates raw extraction output. Missing or mistyped fields are errors, never defaults.
pub fn parse_extraction(raw: &str) -> Result<JobRequirements, AppError> {
    let value: Value = serde_json::from_str(strip_json_fences(raw))
        .map_err(|e| AppError::MalformedExtraction(format!("not valid JSON: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| AppError::MalformedExtraction("expected a JSON object".to_string()))?;

    let role = match object.get("role") {
        Some(Value::String(role)) => role.clone(),
        Some(_) => return Err(malformed("role must be a string")),
        None => return Err(malformed("missing field 'role'")),
    };

    let must_have = string_list(object.get("must_have"), "must_have")?;
    let nice_to_have = string_list(object.get("nice_to_have"), "nice_to_have")?;

    let responsibilities = match object.get("responsibilities") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(_)) => {
            string_list(object.get("responsibilities"), "responsibilities")?.join("; ")
        }
        Some(_) => return Err(malformed("responsibilities must be a string or a list")),
    };

    let job = JobRequirements {
        role,
        must_have,
        nice_to_have,
        responsibilities,
    }
    .normalized();

    if job.must_have.len() > RECOMMENDED_MUST_HAVE
        || job.nice_to_have.len() > RECOMMENDED_NICE_TO_HAVE
    {
        debug!(
            "Extraction exceeds recommended sizes: {} must-have, {} nice-to-have",
            job.must_have.len(),
            job.nice_to_have.len()
        );
    }

    Ok(job)
}

fn string_list(value: Option<&Value>, field: &str) -> Result<Vec<String>, AppError> {
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(malformed(&format!("{field} must be a list of strings"))),
        None => return Err(malformed(&format!("missing field '{field}'"))),
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| malformed(&format!("{field} must only contain strings")))
        })
        .collect()
}

fn malformed(reason: &str) -> AppError {
    AppError::MalformedExtraction(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_STACK_EXTRACTION: &str = r#"```json
    {
        "role": "Desenvolvedor Full Stack",
        "must_have": ["React", "Angular", "Node.js", "Typescript", "PHP", "AWS"],
        "nice_to_have": ["Docker", "Kubernetes", "TDD", "CI/CD"],
        "responsibilities": "Desenvolvimento e manutenção de aplicações web; Integração de sistemas."
    }
    ```"#;

    #[test]
    fn test_parses_fenced_extraction() {
        let job = parse_extraction(FULL_STACK_EXTRACTION).unwrap();
        assert_eq!(job.role, "Desenvolvedor Full Stack");
        assert_eq!(job.must_have.len(), 6);
        assert_eq!(job.nice_to_have[0], "Docker");
        assert!(job.responsibilities.starts_with("Desenvolvimento"));
    }

    #[test]
    fn test_missing_skill_list_is_malformed_not_empty() {
        let err = parse_extraction(r#"{"role": "Dev", "nice_to_have": []}"#).unwrap_err();
        assert!(matches!(err, AppError::MalformedExtraction(ref m) if m.contains("must_have")));
    }

    #[test]
    fn test_non_json_is_malformed() {
        let err = parse_extraction("Sure! The role is a developer.").unwrap_err();
        assert!(matches!(err, AppError::MalformedExtraction(_)));
    }

    #[test]
    fn test_non_string_skill_is_malformed() {
        let err =
            parse_extraction(r#"{"role": "Dev", "must_have": [1, 2], "nice_to_have": []}"#)
                .unwrap_err();
        assert!(matches!(err, AppError::MalformedExtraction(_)));
    }

    #[test]
    fn test_responsibilities_list_is_joined() {
        let job = parse_extraction(
            r#"{"role": "Dev", "must_have": ["Rust"], "nice_to_have": [],
                "responsibilities": ["Build APIs", "Review code"]}"#,
        )
        .unwrap();
        assert_eq!(job.responsibilities, "Build APIs; Review code");
    }

    #[test]
    fn test_blank_entries_are_dropped_and_trimmed() {
        let job = parse_extraction(
            r#"{"role": " Dev ", "must_have": [" Rust ", "  "], "nice_to_have": ["Go"]}"#,
        )
        .unwrap();
        assert_eq!(job.role, "Dev");
        assert_eq!(job.must_have, vec!["Rust".to_string()]);
        assert_eq!(job.responsibilities, "");
    }

    #[test]
    fn test_empty_lists_are_valid() {
        let job = parse_extraction(r#"{"role": "Dev", "must_have": [], "nice_to_have": []}"#)
            .unwrap();
        assert!(job.skills_to_probe().is_empty());
    }

    #[test]
    fn test_skills_to_probe_keeps_must_have_first() {
        let job = JobRequirements {
            role: "Dev".to_string(),
            must_have: vec!["React".to_string(), "AWS".to_string()],
            nice_to_have: vec!["Docker".to_string()],
            responsibilities: String::new(),
        };
        assert_eq!(job.skills_to_probe(), vec!["React", "AWS", "Docker"]);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "manutenção";
        assert_eq!(truncate_job_text(text, 8), "manutenç");
        assert_eq!(truncate_job_text(text, 100), text);
        assert_eq!(truncate_job_text("", 3), "");
    }
}
