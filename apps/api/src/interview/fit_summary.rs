//! Fit Summarizer: deterministic skill coverage plus a short narrative.
//!
//! Coverage is computed in pure Rust from stored skill names. The narrative comes
//! from a pluggable `NarrativePhraser`; when the model-backed phraser fails the
//! template phraser is used instead, so a summary is always produced.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::interview::prompts::{NARRATIVE_PROMPT_TEMPLATE, NARRATIVE_SYSTEM};
use crate::llm_client::LlmClient;
use crate::profile::completeness::CompletenessReport;

pub const MAX_NARRATIVE_SENTENCES: usize = 5;
pub const MAX_NARRATIVE_CHARS: usize = 600;

const NARRATIVE_MAX_TOKENS: u32 = 300;

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillCoverage {
    pub covered: Vec<String>,
    pub uncovered: Vec<String>,
}

impl SkillCoverage {
    fn split(skills: &[String], known: &BTreeSet<String>) -> Self {
        let (covered, uncovered) = skills
            .iter()
            .cloned()
            .partition(|skill| known.contains(skill));
        Self { covered, uncovered }
    }

    pub fn total(&self) -> usize {
        self.covered.len() + self.uncovered.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitCoverage {
    pub must_have: SkillCoverage,
    pub nice_to_have: SkillCoverage,
    /// Weighted profile completeness, 0.0 – 1.0.
    pub profile_completeness: f64,
}

impl FitCoverage {
    /// Share of must-have skills covered, 0 – 100. No must-haves counts as full coverage.
    pub fn must_have_score(&self) -> u32 {
        let total = self.must_have.total();
        if total == 0 {
            return 100;
        }
        ((self.must_have.covered.len() as f64 / total as f64) * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub role: String,
    pub coverage: FitCoverage,
    pub narrative: String,
}

pub fn compute_coverage(
    required: &[String],
    optional: &[String],
    known: &BTreeSet<String>,
    profile_completeness: f64,
) -> FitCoverage {
    FitCoverage {
        must_have: SkillCoverage::split(required, known),
        nice_to_have: SkillCoverage::split(optional, known),
        profile_completeness: profile_completeness.clamp(0.0, 1.0),
    }
}

pub async fn summarize(
    role: &str,
    required: &[String],
    optional: &[String],
    known: &BTreeSet<String>,
    completeness: &CompletenessReport,
    phraser: &dyn NarrativePhraser,
) -> FitSummary {
    let coverage = compute_coverage(required, optional, known, completeness.overall_score);

    let narrative = match phraser.phrase(role, &coverage).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!("Narrative phraser '{}' returned nothing; using template", phraser.name());
            template_narrative(role, &coverage)
        }
        Err(e) => {
            warn!("Narrative phraser '{}' failed, using template: {e}", phraser.name());
            template_narrative(role, &coverage)
        }
    };

    info!(
        "Fit summary for '{role}': must-have {}/{}, nice-to-have {}/{}",
        coverage.must_have.covered.len(),
        coverage.must_have.total(),
        coverage.nice_to_have.covered.len(),
        coverage.nice_to_have.total()
    );

    FitSummary {
        role: role.to_string(),
        narrative: bound_narrative(&narrative),
        coverage,
    }
}

/// Keeps at most five whole sentences and 600 characters.
pub fn bound_narrative(text: &str) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sentences: Vec<&str> = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if matches!(c, '.' | '!' | '?') && at_boundary {
            let end = index + c.len_utf8();
            sentences.push(text[start..end].trim());
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }

    let mut out = String::new();
    for sentence in sentences.into_iter().take(MAX_NARRATIVE_SENTENCES) {
        let separator = usize::from(!out.is_empty());
        if out.chars().count() + separator + sentence.chars().count() > MAX_NARRATIVE_CHARS {
            if out.is_empty() {
                out = sentence.chars().take(MAX_NARRATIVE_CHARS - 1).collect();
                out.push('…');
            }
            break;
        }
        if separator == 1 {
            out.push(' ');
        }
        out.push_str(sentence);
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Phrasers
// ────────────────────────────────────────────────────────────────────────────

/// Swappable at startup via `NARRATIVE_PHRASER`.
#[async_trait]
pub trait NarrativePhraser: Send + Sync {
    async fn phrase(&self, role: &str, coverage: &FitCoverage) -> Result<String, AppError>;

    fn name(&self) -> &'static str;
}

pub struct TemplatePhraser;

#[async_trait]
impl NarrativePhraser for TemplatePhraser {
    async fn phrase(&self, role: &str, coverage: &FitCoverage) -> Result<String, AppError> {
        Ok(template_narrative(role, coverage))
    }

    fn name(&self) -> &'static str {
        "template"
    }
}

fn template_narrative(role: &str, coverage: &FitCoverage) -> String {
    let score = coverage.must_have_score();
    let must = &coverage.must_have;
    let nice = &coverage.nice_to_have;

    let verdict = if score >= 80 {
        "Strong fit"
    } else if score >= 50 {
        "Moderate fit"
    } else {
        "Low fit"
    };
    let mut sentences = vec![format!("{verdict} for the {role} position.")];

    if must.total() == 0 {
        sentences.push("The posting lists no must-have skills.".to_string());
    } else if must.uncovered.is_empty() {
        sentences.push(format!(
            "The candidate covers every must-have skill: {}.",
            name_list(&must.covered)
        ));
    } else {
        sentences.push(format!(
            "The candidate covers {} of {} must-have skills and still lacks {}.",
            must.covered.len(),
            must.total(),
            name_list(&must.uncovered)
        ));
    }

    if !nice.covered.is_empty() {
        sentences.push(format!(
            "Nice-to-have experience includes {}.",
            name_list(&nice.covered)
        ));
    } else if nice.total() > 0 {
        sentences.push("None of the nice-to-have skills are covered yet.".to_string());
    }

    sentences.push(format!(
        "The profile is {}% complete.",
        (coverage.profile_completeness * 100.0).round() as u32
    ));

    sentences.join(" ")
}

/// "A, B and C", or "A, B, C and 2 more" for long lists.
fn name_list(names: &[String]) -> String {
    const SHOWN: usize = 3;
    match names {
        [] => String::new(),
        [only] => only.clone(),
        _ if names.len() <= SHOWN => {
            let last = names.len() - 1;
            format!("{} and {}", names[..last].join(", "), names[last])
        }
        _ => format!(
            "{} and {} more",
            names[..SHOWN].join(", "),
            names.len() - SHOWN
        ),
    }
}

pub struct LlmPhraser(pub LlmClient);

#[async_trait]
impl NarrativePhraser for LlmPhraser {
    async fn phrase(&self, role: &str, coverage: &FitCoverage) -> Result<String, AppError> {
        let prompt = NARRATIVE_PROMPT_TEMPLATE
            .replace("{role}", role)
            .replace("{covered_must}", &or_none(&coverage.must_have.covered))
            .replace("{uncovered_must}", &or_none(&coverage.must_have.uncovered))
            .replace("{covered_nice}", &or_none(&coverage.nice_to_have.covered))
            .replace("{uncovered_nice}", &or_none(&coverage.nice_to_have.uncovered))
            .replace(
                "{completeness}",
                &((coverage.profile_completeness * 100.0).round() as u32).to_string(),
            );

        self.0
            .call_text(&prompt, NARRATIVE_SYSTEM, Some(NARRATIVE_MAX_TOKENS))
            .await
            .map_err(|e| AppError::Llm(format!("Narrative generation failed: {e}")))
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

fn or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::completeness::compute_completeness_report;
    use crate::profile::models::{CoreFacts, Profile};

    fn list(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn known(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    struct FailingPhraser;

    #[async_trait]
    impl NarrativePhraser for FailingPhraser {
        async fn phrase(&self, _role: &str, _coverage: &FitCoverage) -> Result<String, AppError> {
            Err(AppError::Llm("model unavailable".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct VerbosePhraser;

    #[async_trait]
    impl NarrativePhraser for VerbosePhraser {
        async fn phrase(&self, _role: &str, _coverage: &FitCoverage) -> Result<String, AppError> {
            Ok("One. Two. Three. Four. Five. Six. Seven.".to_string())
        }

        fn name(&self) -> &'static str {
            "verbose"
        }
    }

    #[test]
    fn test_coverage_partitions_in_input_order() {
        let coverage = compute_coverage(
            &list(&["React", "AWS", "PHP"]),
            &list(&["Docker", "TDD"]),
            &known(&["PHP", "React", "TDD"]),
            0.5,
        );
        assert_eq!(coverage.must_have.covered, list(&["React", "PHP"]));
        assert_eq!(coverage.must_have.uncovered, list(&["AWS"]));
        assert_eq!(coverage.nice_to_have.covered, list(&["TDD"]));
        assert_eq!(coverage.nice_to_have.uncovered, list(&["Docker"]));
    }

    #[test]
    fn test_coverage_is_exact_match() {
        let coverage = compute_coverage(&list(&["React"]), &[], &known(&["react.js"]), 0.0);
        assert_eq!(coverage.must_have.uncovered, list(&["React"]));
    }

    #[test]
    fn test_empty_requirements_cover_everything() {
        let coverage = compute_coverage(&[], &[], &known(&["Rust"]), 1.0);
        assert_eq!(coverage.must_have_score(), 100);
        assert_eq!(coverage.nice_to_have.total(), 0);
    }

    #[test]
    fn test_bound_narrative_limits_sentences() {
        let bounded = bound_narrative("One. Two. Three. Four. Five. Six.");
        assert_eq!(bounded, "One. Two. Three. Four. Five.");
    }

    #[test]
    fn test_bound_narrative_limits_characters() {
        let long_sentence = format!("{}.", "word ".repeat(200).trim());
        let bounded = bound_narrative(&long_sentence);
        assert_eq!(bounded.chars().count(), MAX_NARRATIVE_CHARS);
        assert!(bounded.ends_with('…'));

        let two = format!("Short. {long_sentence}");
        assert_eq!(bound_narrative(&two), "Short.");
    }

    #[test]
    fn test_bound_narrative_keeps_dotted_names() {
        assert_eq!(
            bound_narrative("Knows Node.js well. Also CI/CD."),
            "Knows Node.js well. Also CI/CD."
        );
    }

    #[test]
    fn test_name_list_formats() {
        assert_eq!(name_list(&list(&["A"])), "A");
        assert_eq!(name_list(&list(&["A", "B", "C"])), "A, B and C");
        assert_eq!(name_list(&list(&["A", "B", "C", "D", "E"])), "A, B, C and 2 more");
    }

    #[tokio::test]
    async fn test_template_summary_mentions_missing_must_haves() {
        let report = compute_completeness_report(&CoreFacts::default(), &Profile::default());
        let summary = summarize(
            "Full Stack Developer",
            &list(&["React", "AWS"]),
            &list(&["Docker"]),
            &known(&["React"]),
            &report,
            &TemplatePhraser,
        )
        .await;
        assert!(summary.narrative.starts_with("Moderate fit for the Full Stack Developer"));
        assert!(summary.narrative.contains("lacks AWS"));
        assert!(summary.narrative.contains("0% complete"));
    }

    #[tokio::test]
    async fn test_phraser_failure_falls_back_to_template() {
        let report = compute_completeness_report(&CoreFacts::default(), &Profile::default());
        let required = list(&["Rust"]);
        let via_failure =
            summarize("Engineer", &required, &[], &known(&["Rust"]), &report, &FailingPhraser)
                .await;
        let via_template =
            summarize("Engineer", &required, &[], &known(&["Rust"]), &report, &TemplatePhraser)
                .await;
        assert_eq!(via_failure, via_template);
        assert!(via_failure.narrative.starts_with("Strong fit"));
    }

    #[tokio::test]
    async fn test_model_narrative_is_bounded() {
        let report = compute_completeness_report(&CoreFacts::default(), &Profile::default());
        let summary = summarize("Engineer", &[], &[], &known(&[]), &report, &VerbosePhraser).await;
        assert_eq!(summary.narrative, "One. Two. Three. Four. Five.");
    }
}
