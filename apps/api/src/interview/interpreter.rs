//! Answer interpretation: maps free-form candidate replies onto requested fields.
//!
//! `LlmAnswerInterpreter` asks the model. `KeyValueAnswerInterpreter` reads
//! `Label: value` lines and needs no network, which makes the whole interview
//! flow testable offline. Either way the negotiator re-checks the result
//! against the gap set, so an interpreter may over-report but can never write.

use async_trait::async_trait;
use tracing::debug;

use crate::errors::AppError;
use crate::interview::negotiator::{InterpretedAnswers, SkillAnswer};
use crate::interview::prompts::{ANSWER_INTERPRETATION_PROMPT_TEMPLATE, ANSWER_INTERPRETATION_ROLE};
use crate::llm_client::prompts::{json_system, NO_INVENTION_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::profile::gaps::GapSet;
use crate::profile::models::{
    CertificationRecord, EducationRecord, ExperienceRecord, LanguageRecord, ProfileAttribute,
    SkillLevel,
};

const INTERPRETATION_MAX_TOKENS: u32 = 1024;

/// Swappable at startup via `ANSWER_INTERPRETER`.
#[async_trait]
pub trait AnswerInterpreter: Send + Sync {
    async fn interpret(&self, answer_text: &str, gaps: &GapSet)
        -> Result<InterpretedAnswers, AppError>;

    fn name(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmAnswerInterpreter
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmAnswerInterpreter(pub LlmClient);

#[async_trait]
impl AnswerInterpreter for LlmAnswerInterpreter {
    async fn interpret(
        &self,
        answer_text: &str,
        gaps: &GapSet,
    ) -> Result<InterpretedAnswers, AppError> {
        let prompt = ANSWER_INTERPRETATION_PROMPT_TEMPLATE
            .replace("{requested}", &describe_requested(gaps))
            .replace("{answer_text}", answer_text);
        let system = format!(
            "{} {NO_INVENTION_INSTRUCTION}",
            json_system(ANSWER_INTERPRETATION_ROLE)
        );

        let answers: InterpretedAnswers = self
            .0
            .call_json(&prompt, &system, Some(INTERPRETATION_MAX_TOKENS))
            .await
            .map_err(|e| AppError::Llm(format!("Answer interpretation failed: {e}")))?;

        debug!(
            "Model mapped answer onto {} skill(s)",
            answers.skills.len()
        );
        Ok(answers)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Bullet list of the requested items, skill names quoted verbatim.
fn describe_requested(gaps: &GapSet) -> String {
    let mut lines: Vec<String> = Vec::new();
    for skill in &gaps.missing_skills {
        let line = format!("- skill: \"{skill}\" (experience and level)");
        if !lines.contains(&line) {
            lines.push(line);
        }
    }
    for attribute in &gaps.missing_profile_attributes {
        lines.push(format!("- {attribute}"));
    }
    lines.join("\n")
}

// ────────────────────────────────────────────────────────────────────────────
// KeyValueAnswerInterpreter
// ────────────────────────────────────────────────────────────────────────────

/// Reads replies shaped like the rendered request: one `Item: answer` per line.
///
/// ```text
/// Docker: 1 year, intermediate level
/// City/State: São Paulo, SP (Vila Mariana)
/// Languages: English (B2), Spanish (basic)
/// ```
pub struct KeyValueAnswerInterpreter;

#[async_trait]
impl AnswerInterpreter for KeyValueAnswerInterpreter {
    async fn interpret(
        &self,
        answer_text: &str,
        gaps: &GapSet,
    ) -> Result<InterpretedAnswers, AppError> {
        Ok(interpret_lines(answer_text, gaps))
    }

    fn name(&self) -> &'static str {
        "key_value"
    }
}

pub fn interpret_lines(answer_text: &str, gaps: &GapSet) -> InterpretedAnswers {
    let mut answers = InterpretedAnswers::default();

    for line in answer_text.lines() {
        let Some((raw_label, raw_value)) = line.split_once(':') else {
            continue;
        };
        let label = clean_label(raw_label);
        let value = raw_value.trim();
        if label.is_empty() || value.is_empty() {
            continue;
        }

        // Requested skills take precedence over attribute labels.
        let lowered = label.to_lowercase();
        if let Some(skill) = gaps
            .missing_skills
            .iter()
            .find(|skill| skill.to_lowercase() == lowered)
        {
            answers.skills.push(SkillAnswer {
                skill: skill.clone(),
                experience_text: Some(value.to_string()),
                level: detect_level(value).map(|level| level.label().to_string()),
            });
            continue;
        }

        let attributes: Option<Vec<ProfileAttribute>> =
            label.split('/').map(attribute_for_label).collect();
        match attributes.as_deref() {
            Some([attribute]) => assign(&mut answers, *attribute, value),
            Some(several) if several.iter().all(ProfileAttribute::is_core) => {
                assign_core_group(&mut answers, several, value)
            }
            _ => debug!("Ignoring answer line with unknown label '{label}'"),
        }
    }

    answers
}

/// Strips one list marker (`3.`, `3)`, `-`, `*`, `•`) and Markdown emphasis.
/// Labels that merely start with a digit or a dot (`3D Modeling`, `.NET`) are kept whole.
fn clean_label(raw: &str) -> String {
    let label = raw.trim();
    let label = strip_list_marker(label).unwrap_or(label);
    label
        .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
        .to_string()
}

fn strip_list_marker(label: &str) -> Option<&str> {
    let digits = label.len() - label.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let rest = if digits > 0 {
        label[digits..].strip_prefix(|c: char| c == '.' || c == ')')?
    } else {
        label.strip_prefix(|c: char| matches!(c, '-' | '*' | '•'))?
    };
    rest.starts_with(char::is_whitespace).then(|| rest.trim_start())
}

fn attribute_for_label(label: &str) -> Option<ProfileAttribute> {
    let label = label.trim().to_lowercase();
    let attribute = match label.as_str() {
        "phone" | "phone number" | "telefone" | "celular" => ProfileAttribute::Phone,
        "state" | "estado" | "uf" => ProfileAttribute::State,
        "city" | "cidade" => ProfileAttribute::City,
        "neighborhood" | "neighbourhood" | "bairro" => ProfileAttribute::Neighborhood,
        "education" | "educação" | "educacao" | "formação" | "formacao" => {
            ProfileAttribute::Education
        }
        "certifications" | "certification" | "certificações" | "certificacoes"
        | "certificados" => ProfileAttribute::Certifications,
        "languages" | "language" | "idiomas" | "línguas" | "linguas" => {
            ProfileAttribute::Languages
        }
        "experience" | "experiência" | "experiencia" => ProfileAttribute::Experience,
        _ => return None,
    };
    Some(attribute)
}

fn assign(answers: &mut InterpretedAnswers, attribute: ProfileAttribute, value: &str) {
    let text = Some(value.to_string());
    match attribute {
        ProfileAttribute::Phone => answers.phone = text,
        ProfileAttribute::State => answers.state = text,
        ProfileAttribute::City => answers.city = text,
        ProfileAttribute::Neighborhood => answers.neighborhood = text,
        ProfileAttribute::Education => {
            let items = split_items(value, &[';']);
            answers.education = Some(items.iter().map(|i| education(i)).collect());
        }
        ProfileAttribute::Certifications => {
            let items = split_items(value, &[';', ',']);
            answers.certifications = Some(items.iter().map(|i| certification(i)).collect());
        }
        ProfileAttribute::Languages => {
            let items = split_items(value, &[';', ',']);
            answers.languages = Some(items.iter().map(|i| language(i)).collect());
        }
        ProfileAttribute::Experience => {
            answers.experience = Some(
                split_items(value, &[';'])
                    .into_iter()
                    .map(|description| ExperienceRecord {
                        description: Some(description),
                        ..Default::default()
                    })
                    .collect(),
            )
        }
    }
}

/// `City/State: São Paulo, SP (Vila Mariana)` fills the labels pairwise; a trailing
/// parenthetical names the neighborhood when that was not one of the labels.
fn assign_core_group(answers: &mut InterpretedAnswers, attributes: &[ProfileAttribute], value: &str) {
    let (main, detail) = split_parenthetical(value);
    let parts: Vec<&str> = main.split(',').map(str::trim).collect();
    if parts.len() != attributes.len() {
        debug!(
            "Cannot split '{value}' across {} labels; ignoring the line",
            attributes.len()
        );
        return;
    }
    for (attribute, part) in attributes.iter().zip(parts) {
        assign(answers, *attribute, part);
    }
    if let Some(neighborhood) = detail {
        if !attributes.contains(&ProfileAttribute::Neighborhood) {
            answers.neighborhood = Some(neighborhood);
        }
    }
}

fn education(item: &str) -> EducationRecord {
    let (main, detail) = split_parenthetical(item);
    let mut record = EducationRecord {
        degree: Some(main),
        ..Default::default()
    };
    for part in detail.iter().flat_map(|d| d.split(',')).map(str::trim) {
        if is_year(part) {
            record.year = Some(part.to_string());
        } else if !part.is_empty() && record.institution.is_none() {
            record.institution = Some(part.to_string());
        }
    }
    record
}

fn certification(item: &str) -> CertificationRecord {
    let (main, detail) = split_parenthetical(item);
    let mut record = CertificationRecord {
        name: Some(main),
        ..Default::default()
    };
    if let Some(detail) = detail {
        if is_year(&detail) {
            record.year = Some(detail);
        } else {
            record.issuer = Some(detail);
        }
    }
    record
}

fn language(item: &str) -> LanguageRecord {
    let (main, detail) = split_parenthetical(item);
    LanguageRecord {
        language: Some(main),
        proficiency: detail,
        ..Default::default()
    }
}

/// Splits on any separator that is not inside parentheses.
fn split_items(value: &str, separators: &[char]) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in value.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 && separators.contains(&c) {
            items.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    items.push(current);
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// `"English (B2)"` → `("English", Some("B2"))`.
fn split_parenthetical(item: &str) -> (String, Option<String>) {
    let item = item.trim();
    if let (Some(open), true) = (item.rfind('('), item.ends_with(')')) {
        let main = item[..open].trim();
        let detail = item[open + 1..item.len() - 1].trim();
        if !main.is_empty() {
            let detail = (!detail.is_empty()).then(|| detail.to_string());
            return (main.to_string(), detail);
        }
    }
    (item.to_string(), None)
}

fn is_year(text: &str) -> bool {
    text.len() == 4 && text.chars().all(|c| c.is_ascii_digit())
}

/// First word in the answer that names a level, if any.
fn detect_level(value: &str) -> Option<SkillLevel> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .find_map(SkillLevel::from_label)
}
