use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::AppError;

/// A user is identified by a case-normalized email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let email = raw.trim().to_lowercase();
        let mut parts = email.split('@');
        let valid = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty()
        );
        if !valid || email.chars().any(char::is_whitespace) {
            return Err(AppError::Validation(format!(
                "'{}' is not a valid email address",
                raw.trim()
            )));
        }
        Ok(Self(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The eight attributes a profile can be missing, in canonical question order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileAttribute {
    Phone,
    State,
    City,
    Neighborhood,
    Education,
    Certifications,
    Languages,
    Experience,
}

impl ProfileAttribute {
    pub const CANONICAL_ORDER: [ProfileAttribute; 8] = [
        ProfileAttribute::Phone,
        ProfileAttribute::State,
        ProfileAttribute::City,
        ProfileAttribute::Neighborhood,
        ProfileAttribute::Education,
        ProfileAttribute::Certifications,
        ProfileAttribute::Languages,
        ProfileAttribute::Experience,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileAttribute::Phone => "phone",
            ProfileAttribute::State => "state",
            ProfileAttribute::City => "city",
            ProfileAttribute::Neighborhood => "neighborhood",
            ProfileAttribute::Education => "education",
            ProfileAttribute::Certifications => "certifications",
            ProfileAttribute::Languages => "languages",
            ProfileAttribute::Experience => "experience",
        }
    }

    /// Scalar contact facts live in `CoreFacts`; the rest are profile lists.
    pub fn is_core(&self) -> bool {
        matches!(
            self,
            ProfileAttribute::Phone
                | ProfileAttribute::State
                | ProfileAttribute::City
                | ProfileAttribute::Neighborhood
        )
    }
}

impl fmt::Display for ProfileAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trims a value and turns blank strings into "unknown".
pub fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts a JSON string, number or boolean as text. Model output often sends
/// `"year": 2024` where a string is expected.
pub fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected text, found {other}"
        ))),
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Core facts
// ────────────────────────────────────────────────────────────────────────────

/// Scalar contact facts. `None` means unknown, never empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreFacts {
    pub phone: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
}

impl CoreFacts {
    pub fn get(&self, attribute: ProfileAttribute) -> Option<&str> {
        match attribute {
            ProfileAttribute::Phone => self.phone.as_deref(),
            ProfileAttribute::State => self.state.as_deref(),
            ProfileAttribute::City => self.city.as_deref(),
            ProfileAttribute::Neighborhood => self.neighborhood.as_deref(),
            _ => None,
        }
    }

    /// Merge-by-coalesce: only non-null patch values overwrite.
    pub fn merge(&mut self, patch: &CoreFactsPatch) {
        let patch = patch.clone().normalized();
        if patch.phone.is_some() {
            self.phone = patch.phone;
        }
        if patch.state.is_some() {
            self.state = patch.state;
        }
        if patch.city.is_some() {
            self.city = patch.city;
        }
        if patch.neighborhood.is_some() {
            self.neighborhood = patch.neighborhood;
        }
    }
}

/// A partial update of core facts. Absent and null both mean "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreFactsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
}

impl CoreFactsPatch {
    pub fn is_empty(&self) -> bool {
        self.present_attributes().is_empty()
    }

    pub fn normalized(self) -> Self {
        Self {
            phone: normalize_text(self.phone),
            state: normalize_text(self.state),
            city: normalize_text(self.city),
            neighborhood: normalize_text(self.neighborhood),
        }
    }

    pub fn present_attributes(&self) -> Vec<ProfileAttribute> {
        [
            (ProfileAttribute::Phone, &self.phone),
            (ProfileAttribute::State, &self.state),
            (ProfileAttribute::City, &self.city),
            (ProfileAttribute::Neighborhood, &self.neighborhood),
        ]
        .into_iter()
        .filter(|(_, value)| has_text(value))
        .map(|(attribute, _)| attribute)
        .collect()
    }

    pub fn set(&mut self, attribute: ProfileAttribute, value: String) {
        match attribute {
            ProfileAttribute::Phone => self.phone = Some(value),
            ProfileAttribute::State => self.state = Some(value),
            ProfileAttribute::City => self.city = Some(value),
            ProfileAttribute::Neighborhood => self.neighborhood = Some(value),
            _ => {}
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Profile records
// ────────────────────────────────────────────────────────────────────────────

/// Common behaviour of the typed profile records.
pub trait ProfileRecord {
    /// A record is meaningful when at least one named field carries text.
    fn is_meaningful(&self) -> bool;

    /// One-line rendering used by the résumé.
    fn summary_line(&self) -> String;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationRecord {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub institution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub degree: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProfileRecord for EducationRecord {
    fn is_meaningful(&self) -> bool {
        has_text(&self.institution)
            || has_text(&self.degree)
            || has_text(&self.field)
            || has_text(&self.description)
    }

    fn summary_line(&self) -> String {
        let headline = join_present(&[&self.degree, &self.field], ", ");
        let mut line = match (headline, self.institution.as_deref()) {
            (Some(h), Some(i)) => format!("{h} — {i}"),
            (Some(h), None) => h,
            (None, Some(i)) => i.to_string(),
            (None, None) => self.description.clone().unwrap_or_default(),
        };
        if let Some(year) = self.year.as_deref() {
            line.push_str(&format!(" ({year})"));
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificationRecord {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProfileRecord for CertificationRecord {
    fn is_meaningful(&self) -> bool {
        has_text(&self.name) || has_text(&self.description)
    }

    fn summary_line(&self) -> String {
        let mut line = self
            .name
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_default();
        if let Some(issuer) = self.issuer.as_deref() {
            line.push_str(&format!(", {issuer}"));
        }
        if let Some(year) = self.year.as_deref() {
            line.push_str(&format!(" ({year})"));
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageRecord {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub proficiency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProfileRecord for LanguageRecord {
    fn is_meaningful(&self) -> bool {
        has_text(&self.language) || has_text(&self.description)
    }

    fn summary_line(&self) -> String {
        let name = self
            .language
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_default();
        match self.proficiency.as_deref() {
            Some(p) => format!("{name} ({p})"),
            None => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceRecord {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub technologies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProfileRecord for ExperienceRecord {
    fn is_meaningful(&self) -> bool {
        has_text(&self.title)
            || has_text(&self.company)
            || has_text(&self.description)
            || self.technologies.iter().any(|t| !t.trim().is_empty())
    }

    fn summary_line(&self) -> String {
        let mut line = join_present(&[&self.title, &self.company], " — ")
            .or_else(|| self.description.clone())
            .unwrap_or_else(|| self.technologies.join(", "));
        if let Some(duration) = self.duration.as_deref() {
            line.push_str(&format!(" ({duration})"));
        }
        line
    }
}

fn join_present(values: &[&Option<String>], separator: &str) -> Option<String> {
    let parts: Vec<&str> = values
        .iter()
        .filter_map(|v| v.as_deref())
        .filter(|v| !v.trim().is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(separator))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Profile lists
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub education: Vec<EducationRecord>,
    pub certifications: Vec<CertificationRecord>,
    pub languages: Vec<LanguageRecord>,
    pub experience: Vec<ExperienceRecord>,
}

impl Profile {
    /// Whether the list behind a profile attribute has no records.
    /// Core attributes are not profile lists and report `false`.
    pub fn is_empty_for(&self, attribute: ProfileAttribute) -> bool {
        match attribute {
            ProfileAttribute::Education => self.education.is_empty(),
            ProfileAttribute::Certifications => self.certifications.is_empty(),
            ProfileAttribute::Languages => self.languages.is_empty(),
            ProfileAttribute::Experience => self.experience.is_empty(),
            _ => false,
        }
    }

    /// Full-field replace for every field present in the patch.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(education) = &patch.education {
            self.education = education.clone();
        }
        if let Some(certifications) = &patch.certifications {
            self.certifications = certifications.clone();
        }
        if let Some(languages) = &patch.languages {
            self.languages = languages.clone();
        }
        if let Some(experience) = &patch.experience {
            self.experience = experience.clone();
        }
    }
}

/// A partial update of profile lists. A present field replaces the stored list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<Vec<EducationRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certifications: Option<Vec<CertificationRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<LanguageRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<Vec<ExperienceRecord>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.present_attributes().is_empty()
    }

    pub fn present_attributes(&self) -> Vec<ProfileAttribute> {
        let mut present = Vec::new();
        if self.education.is_some() {
            present.push(ProfileAttribute::Education);
        }
        if self.certifications.is_some() {
            present.push(ProfileAttribute::Certifications);
        }
        if self.languages.is_some() {
            present.push(ProfileAttribute::Languages);
        }
        if self.experience.is_some() {
            present.push(ProfileAttribute::Experience);
        }
        present
    }

    fn validate(&self) -> Result<(), AppError> {
        check_records("education", self.education.as_deref())?;
        check_records("certifications", self.certifications.as_deref())?;
        check_records("languages", self.languages.as_deref())?;
        check_records("experience", self.experience.as_deref())?;
        Ok(())
    }
}

fn check_records<R: ProfileRecord>(field: &str, records: Option<&[R]>) -> Result<(), AppError> {
    let Some(records) = records else {
        return Ok(());
    };
    match records.iter().position(|r| !r.is_meaningful()) {
        Some(index) => Err(AppError::Validation(format!(
            "{field}[{index}] has no named field with a value"
        ))),
        None => Ok(()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Skills
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl SkillLevel {
    pub const ALL: [SkillLevel; 4] = [
        SkillLevel::Beginner,
        SkillLevel::Intermediate,
        SkillLevel::Advanced,
        SkillLevel::Expert,
    ];

    /// Lenient label parsing (English and Portuguese, any case).
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "beginner" | "basic" | "iniciante" | "básico" | "basico" => Some(Self::Beginner),
            "intermediate" | "intermediário" | "intermediario" => Some(Self::Intermediate),
            "advanced" | "avançado" | "avancado" => Some(Self::Advanced),
            "expert" | "especialista" => Some(Self::Expert),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "Beginner",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
            SkillLevel::Expert => "Expert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDetails {
    pub experience_text: String,
    #[serde(default)]
    pub level: Option<SkillLevel>,
}

/// One skill fact for one user. Saving it replaces any prior record for the skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillFact {
    pub skill: String,
    #[serde(flatten)]
    pub details: SkillDetails,
}

// ────────────────────────────────────────────────────────────────────────────
// Patches and snapshots
// ────────────────────────────────────────────────────────────────────────────

/// Everything one `save` call writes. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactPatch {
    pub core: CoreFactsPatch,
    pub profile: ProfilePatch,
    pub skills: Vec<SkillFact>,
}

impl FactPatch {
    pub fn is_empty(&self) -> bool {
        self.core.is_empty() && self.profile.is_empty() && self.skills.is_empty()
    }

    /// Normalizes text and rejects malformed facts before anything is written.
    pub fn validated(self) -> Result<Self, AppError> {
        self.profile.validate()?;
        let mut skills = Vec::with_capacity(self.skills.len());
        for fact in self.skills {
            let skill = fact.skill.trim().to_string();
            if skill.is_empty() {
                return Err(AppError::Validation("skill name cannot be empty".to_string()));
            }
            let experience_text = fact.details.experience_text.trim().to_string();
            if experience_text.is_empty() {
                return Err(AppError::Validation(format!(
                    "skill '{skill}' needs an experience description"
                )));
            }
            skills.push(SkillFact {
                skill,
                details: SkillDetails {
                    experience_text,
                    level: fact.details.level,
                },
            });
        }
        Ok(Self {
            core: self.core.normalized(),
            profile: self.profile,
            skills,
        })
    }
}

/// Everything the store knows about one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredFacts {
    pub core: CoreFacts,
    pub profile: Profile,
    pub skills: BTreeMap<String, SkillDetails>,
}

impl StoredFacts {
    pub fn known_skill_names(&self) -> BTreeSet<String> {
        self.skills.keys().cloned().collect()
    }

    /// Applies a validated patch with the store's merge rules.
    pub fn apply(&mut self, patch: &FactPatch) {
        self.core.merge(&patch.core);
        self.profile.apply(&patch.profile);
        for fact in &patch.skills {
            self.skills.insert(fact.skill.clone(), fact.details.clone());
        }
    }
}
