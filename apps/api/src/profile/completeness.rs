use serde::{Deserialize, Serialize};

use crate::profile::models::{CoreFacts, Profile, ProfileAttribute};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AttributeStatus {
    Present,
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeHealth {
    pub attribute: ProfileAttribute,
    pub weight: f64,
    pub entry_count: usize,
    pub status: AttributeStatus,
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessReport {
    /// Weighted share of known attributes, 0.0 – 1.0.
    pub overall_score: f64,
    pub attributes: Vec<AttributeHealth>,
    pub missing_attributes: Vec<ProfileAttribute>,
}

const ATTRIBUTE_WEIGHTS: &[(ProfileAttribute, f64)] = &[
    (ProfileAttribute::Phone, 0.10),
    (ProfileAttribute::State, 0.05),
    (ProfileAttribute::City, 0.05),
    (ProfileAttribute::Neighborhood, 0.05),
    (ProfileAttribute::Education, 0.20),
    (ProfileAttribute::Certifications, 0.10),
    (ProfileAttribute::Languages, 0.15),
    (ProfileAttribute::Experience, 0.30),
];

pub fn compute_completeness_report(core: &CoreFacts, profile: &Profile) -> CompletenessReport {
    let mut attributes = Vec::new();
    let mut missing_attributes = Vec::new();
    let mut weighted_score_sum = 0.0;

    for (attribute, weight) in ATTRIBUTE_WEIGHTS {
        let entry_count = entry_count(*attribute, core, profile);

        if entry_count == 0 {
            missing_attributes.push(*attribute);
            attributes.push(AttributeHealth {
                attribute: *attribute,
                weight: *weight,
                entry_count,
                status: AttributeStatus::Missing,
                recommendation: Some(recommendation_for(*attribute)),
            });
            continue;
        }

        weighted_score_sum += weight;
        attributes.push(AttributeHealth {
            attribute: *attribute,
            weight: *weight,
            entry_count,
            status: AttributeStatus::Present,
            recommendation: None,
        });
    }

    let total_weight: f64 = ATTRIBUTE_WEIGHTS.iter().map(|(_, w)| w).sum();
    let overall_score = if total_weight > 0.0 {
        (weighted_score_sum / total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    CompletenessReport {
        overall_score,
        attributes,
        missing_attributes,
    }
}

fn entry_count(attribute: ProfileAttribute, core: &CoreFacts, profile: &Profile) -> usize {
    match attribute {
        ProfileAttribute::Education => profile.education.len(),
        ProfileAttribute::Certifications => profile.certifications.len(),
        ProfileAttribute::Languages => profile.languages.len(),
        ProfileAttribute::Experience => profile.experience.len(),
        core_attribute => usize::from(core.get(core_attribute).is_some()),
    }
}

fn recommendation_for(attribute: ProfileAttribute) -> String {
    if attribute.is_core() {
        format!("Add your {attribute} so recruiters can reach and place you")
    } else {
        format!("Add at least one {attribute} entry to strengthen your résumé")
    }
}
