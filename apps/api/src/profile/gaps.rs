//! Gap Calculator: which required skills and profile attributes a user has not told us yet.
//!
//! Skill membership is an exact, case-sensitive string match against the stored skill
//! names ("React" and "react.js" are different skills).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::profile::models::{CoreFacts, Profile, ProfileAttribute};

/// What is still unknown about a user for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapSet {
    /// Required skills not yet stored, in requirement order, duplicates kept.
    pub missing_skills: Vec<String>,
    /// Null core facts and empty profile lists, in canonical order.
    pub missing_profile_attributes: Vec<ProfileAttribute>,
}

impl GapSet {
    pub fn is_empty(&self) -> bool {
        self.missing_skills.is_empty() && self.missing_profile_attributes.is_empty()
    }

    pub fn contains_skill(&self, skill: &str) -> bool {
        self.missing_skills.iter().any(|s| s == skill)
    }

    pub fn contains_attribute(&self, attribute: ProfileAttribute) -> bool {
        self.missing_profile_attributes.contains(&attribute)
    }

    /// Keeps only the gaps that are still open in `current`.
    pub fn narrowed_to(&self, current: &GapSet) -> GapSet {
        GapSet {
            missing_skills: self
                .missing_skills
                .iter()
                .filter(|skill| current.contains_skill(skill))
                .cloned()
                .collect(),
            missing_profile_attributes: self
                .missing_profile_attributes
                .iter()
                .copied()
                .filter(|attribute| current.contains_attribute(*attribute))
                .collect(),
        }
    }
}

pub fn compute_gaps(
    required_skills: &[String],
    known_skills: &BTreeSet<String>,
    core: &CoreFacts,
    profile: &Profile,
) -> GapSet {
    let missing_skills = required_skills
        .iter()
        .filter(|skill| !known_skills.contains(skill.as_str()))
        .cloned()
        .collect();

    let missing_profile_attributes = ProfileAttribute::CANONICAL_ORDER
        .into_iter()
        .filter(|attribute| {
            if attribute.is_core() {
                core.get(*attribute).is_none()
            } else {
                profile.is_empty_for(*attribute)
            }
        })
        .collect();

    GapSet {
        missing_skills,
        missing_profile_attributes,
    }
}
