//! Disclosure Negotiator: asks for exactly what is missing, and accepts back only that.
//!
//! `build_request` turns a gap set into one consolidated message. `apply_answers`
//! maps the candidate's reply onto the requested fields; anything outside the gap set
//! is dropped before it can reach the store.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::interview::interpreter::AnswerInterpreter;
use crate::profile::gaps::GapSet;
use crate::profile::models::{
    lenient_text, normalize_text, CertificationRecord, EducationRecord, ExperienceRecord, FactPatch,
    LanguageRecord, ProfileAttribute, ProfileRecord, SkillDetails, SkillFact, SkillLevel,
};

// ────────────────────────────────────────────────────────────────────────────
// Consolidated request
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStyle {
    /// Append a level prompt (Beginner … Expert) to every skill question.
    pub ask_skill_level: bool,
}

impl Default for RequestStyle {
    fn default() -> Self {
        Self {
            ask_skill_level: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillQuestion {
    pub skill: String,
    pub question: String,
    pub level_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeQuestion {
    pub attribute: ProfileAttribute,
    pub question: String,
}

/// Every question for one turn, skills first, then profile attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedRequest {
    pub skill_questions: Vec<SkillQuestion>,
    pub profile_questions: Vec<AttributeQuestion>,
}

impl ConsolidatedRequest {
    pub fn question_count(&self) -> usize {
        self.skill_questions.len() + self.profile_questions.len()
    }

    pub fn requested_skills(&self) -> Vec<&str> {
        self.skill_questions.iter().map(|q| q.skill.as_str()).collect()
    }

    pub fn requested_attributes(&self) -> Vec<ProfileAttribute> {
        self.profile_questions.iter().map(|q| q.attribute).collect()
    }

    /// The single message surfaced to the candidate, verbatim.
    pub fn render(&self) -> String {
        let mut message = String::from(
            "To tailor your résumé to this position, please answer the questions below. \
             You may reply one item per line, in the form `Item: answer`.\n\n",
        );
        let mut number = 1;
        for q in &self.skill_questions {
            message.push_str(&format!("{number}. {}: {}", q.skill, q.question));
            if let Some(level_prompt) = &q.level_prompt {
                message.push(' ');
                message.push_str(level_prompt);
            }
            message.push('\n');
            number += 1;
        }
        for q in &self.profile_questions {
            message.push_str(&format!(
                "{number}. {}: {}\n",
                attribute_label(q.attribute),
                q.question
            ));
            number += 1;
        }
        message
    }
}

/// Returns `None` when nothing is missing, meaning the flow can go straight to the summary.
pub fn build_request(gaps: &GapSet, style: &RequestStyle) -> Option<ConsolidatedRequest> {
    if gaps.is_empty() {
        return None;
    }

    let level_prompt = style.ask_skill_level.then(|| {
        let levels: Vec<&str> = SkillLevel::ALL.iter().map(SkillLevel::label).collect();
        format!("How would you rate your level ({})?", levels.join(", "))
    });

    // One question per distinct skill, in first-requirement order.
    let mut skill_questions: Vec<SkillQuestion> = Vec::new();
    for skill in &gaps.missing_skills {
        if skill_questions.iter().any(|q| &q.skill == skill) {
            continue;
        }
        skill_questions.push(SkillQuestion {
            skill: skill.clone(),
            question: format!("What is your experience with {skill}?"),
            level_prompt: level_prompt.clone(),
        });
    }

    let profile_questions = ProfileAttribute::CANONICAL_ORDER
        .into_iter()
        .filter(|attribute| gaps.contains_attribute(*attribute))
        .map(|attribute| AttributeQuestion {
            attribute,
            question: attribute_question(attribute).to_string(),
        })
        .collect();

    Some(ConsolidatedRequest {
        skill_questions,
        profile_questions,
    })
}

pub fn attribute_label(attribute: ProfileAttribute) -> &'static str {
    match attribute {
        ProfileAttribute::Phone => "Phone",
        ProfileAttribute::State => "State",
        ProfileAttribute::City => "City",
        ProfileAttribute::Neighborhood => "Neighborhood",
        ProfileAttribute::Education => "Education",
        ProfileAttribute::Certifications => "Certifications",
        ProfileAttribute::Languages => "Languages",
        ProfileAttribute::Experience => "Experience",
    }
}

fn attribute_question(attribute: ProfileAttribute) -> &'static str {
    match attribute {
        ProfileAttribute::Phone => "What is your phone number?",
        ProfileAttribute::State => "In which state do you live?",
        ProfileAttribute::City => "In which city do you live?",
        ProfileAttribute::Neighborhood => "In which neighborhood do you live?",
        ProfileAttribute::Education => {
            "What is your education (degree, field, institution, and year)?"
        }
        ProfileAttribute::Certifications => "Which certifications do you hold (name and year)?",
        ProfileAttribute::Languages => "Which languages do you speak, and at what proficiency?",
        ProfileAttribute::Experience => {
            "Please summarize your professional experience (role, company, duration, and main technologies)."
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Answers
// ────────────────────────────────────────────────────────────────────────────

/// One skill as reported back by an interpreter or a structured client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillAnswer {
    pub skill: String,
    #[serde(deserialize_with = "lenient_text")]
    pub experience_text: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub level: Option<String>,
}

/// Answer fields before the gap contract is enforced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpretedAnswers {
    #[serde(deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub state: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub city: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub neighborhood: Option<String>,
    pub education: Option<Vec<EducationRecord>>,
    pub certifications: Option<Vec<CertificationRecord>>,
    pub languages: Option<Vec<LanguageRecord>>,
    pub experience: Option<Vec<ExperienceRecord>>,
    pub skills: Vec<SkillAnswer>,
}

/// A candidate's reply: free text for the interpreter, or already structured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answers {
    FreeText(String),
    Structured(InterpretedAnswers),
}

/// The patch that may be written, plus what was thrown away and why.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstrainedAnswers {
    pub patch: FactPatch,
    pub discarded: Vec<String>,
}

/// Interprets the reply if needed, then enforces the gap contract.
/// An answer that addresses nothing yields an empty patch, not an error.
pub async fn apply_answers(
    answers: Answers,
    gaps: &GapSet,
    interpreter: &dyn AnswerInterpreter,
) -> Result<FactPatch, AppError> {
    let interpreted = match answers {
        Answers::FreeText(text) if text.trim().is_empty() => InterpretedAnswers::default(),
        Answers::FreeText(text) => interpreter.interpret(&text, gaps).await?,
        Answers::Structured(structured) => structured,
    };

    let constrained = constrain_to_gaps(interpreted, gaps);
    if !constrained.discarded.is_empty() {
        warn!(
            "Discarded {} answer field(s) outside the request: {}",
            constrained.discarded.len(),
            constrained.discarded.join(", ")
        );
    }
    info!(
        "Answers mapped to core={:?} profile={:?} skills={}",
        constrained.patch.core.present_attributes(),
        constrained.patch.profile.present_attributes(),
        constrained.patch.skills.len()
    );
    Ok(constrained.patch)
}

/// Keeps only fields the gap set asked for. Never fills anything in.
pub fn constrain_to_gaps(answers: InterpretedAnswers, gaps: &GapSet) -> ConstrainedAnswers {
    let mut out = ConstrainedAnswers::default();

    let core_answers = [
        (ProfileAttribute::Phone, answers.phone),
        (ProfileAttribute::State, answers.state),
        (ProfileAttribute::City, answers.city),
        (ProfileAttribute::Neighborhood, answers.neighborhood),
    ];
    for (attribute, value) in core_answers {
        let Some(value) = normalize_text(value) else {
            continue;
        };
        if gaps.contains_attribute(attribute) {
            out.patch.core.set(attribute, value);
        } else {
            out.discarded.push(format!("{attribute} (not requested)"));
        }
    }

    out.patch.profile.education =
        constrain_list(ProfileAttribute::Education, answers.education, gaps, &mut out.discarded);
    out.patch.profile.certifications = constrain_list(
        ProfileAttribute::Certifications,
        answers.certifications,
        gaps,
        &mut out.discarded,
    );
    out.patch.profile.languages =
        constrain_list(ProfileAttribute::Languages, answers.languages, gaps, &mut out.discarded);
    out.patch.profile.experience = constrain_list(
        ProfileAttribute::Experience,
        answers.experience,
        gaps,
        &mut out.discarded,
    );

    for answer in answers.skills {
        let skill = answer.skill.trim().to_string();
        if !gaps.contains_skill(&skill) {
            out.discarded.push(format!("skill '{skill}' (not requested)"));
            continue;
        }
        let Some(experience_text) = normalize_text(answer.experience_text) else {
            out.discarded.push(format!("skill '{skill}' (no experience given)"));
            continue;
        };
        let level = match normalize_text(answer.level) {
            Some(label) => {
                let level = SkillLevel::from_label(&label);
                if level.is_none() {
                    out.discarded.push(format!("level '{label}' for '{skill}'"));
                }
                level
            }
            None => None,
        };
        let fact = SkillFact {
            skill,
            details: SkillDetails {
                experience_text,
                level,
            },
        };
        // A later answer for the same skill wins.
        match out.patch.skills.iter_mut().find(|f| f.skill == fact.skill) {
            Some(existing) => *existing = fact,
            None => out.patch.skills.push(fact),
        }
    }

    out
}

fn constrain_list<R: ProfileRecord>(
    attribute: ProfileAttribute,
    records: Option<Vec<R>>,
    gaps: &GapSet,
    discarded: &mut Vec<String>,
) -> Option<Vec<R>> {
    let records: Vec<R> = records?.into_iter().filter(R::is_meaningful).collect();
    if records.is_empty() {
        return None;
    }
    if !gaps.contains_attribute(attribute) {
        discarded.push(format!("{attribute} (not requested)"));
        return None;
    }
    Some(records)
}
