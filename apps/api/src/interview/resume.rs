//! One-page Markdown résumé built from stored facts and a finished fit summary.

use std::collections::BTreeSet;

use crate::interview::fit_summary::FitSummary;
use crate::profile::models::{ProfileRecord, SkillDetails, StoredFacts, UserId};

const MAX_SKILLS: usize = 12;
const MAX_EXPERIENCE: usize = 4;
const MAX_EDUCATION: usize = 3;
const MAX_CERTIFICATIONS: usize = 4;
const MAX_LANGUAGES: usize = 4;

pub fn render_resume(user: &UserId, facts: &StoredFacts, summary: &FitSummary) -> String {
    let mut md = format!("# Résumé — {}\n\n", summary.role);

    let location: Vec<&str> = [&facts.core.neighborhood, &facts.core.city, &facts.core.state]
        .into_iter()
        .filter_map(|v| v.as_deref())
        .collect();
    let mut contact = vec![user.as_str().to_string()];
    if let Some(phone) = facts.core.phone.as_deref() {
        contact.push(phone.to_string());
    }
    if !location.is_empty() {
        contact.push(location.join(", "));
    }
    md.push_str(&contact.join(" · "));
    md.push_str("\n\n");

    if !summary.narrative.is_empty() {
        md.push_str("## Summary\n\n");
        md.push_str(&summary.narrative);
        md.push_str("\n\n");
    }

    let skills = ordered_skills(facts, summary);
    if !skills.is_empty() {
        md.push_str("## Skills\n\n");
        for (name, details) in skills.into_iter().take(MAX_SKILLS) {
            match details.level {
                Some(level) => md.push_str(&format!(
                    "- **{name}** ({}): {}\n",
                    level.label(),
                    details.experience_text
                )),
                None => md.push_str(&format!("- **{name}**: {}\n", details.experience_text)),
            }
        }
        md.push('\n');
    }

    push_section(&mut md, "Experience", &facts.profile.experience, MAX_EXPERIENCE);
    push_section(&mut md, "Education", &facts.profile.education, MAX_EDUCATION);
    push_section(
        &mut md,
        "Certifications",
        &facts.profile.certifications,
        MAX_CERTIFICATIONS,
    );
    push_section(&mut md, "Languages", &facts.profile.languages, MAX_LANGUAGES);

    md.trim_end().to_string() + "\n"
}

/// Covered must-haves, covered nice-to-haves, then everything else the user told us.
fn ordered_skills<'a>(
    facts: &'a StoredFacts,
    summary: &'a FitSummary,
) -> Vec<(&'a str, &'a SkillDetails)> {
    let mut seen = BTreeSet::new();
    let prioritized = summary
        .coverage
        .must_have
        .covered
        .iter()
        .chain(summary.coverage.nice_to_have.covered.iter())
        .map(String::as_str);
    let rest = facts.skills.keys().map(String::as_str);

    prioritized
        .chain(rest)
        .filter(|name| seen.insert(*name))
        .filter_map(|name| facts.skills.get(name).map(|details| (name, details)))
        .collect()
}

fn push_section<R: ProfileRecord>(md: &mut String, title: &str, records: &[R], cap: usize) {
    let lines: Vec<String> = records
        .iter()
        .filter(|r| r.is_meaningful())
        .take(cap)
        .map(R::summary_line)
        .collect();
    if lines.is_empty() {
        return;
    }
    md.push_str(&format!("## {title}\n\n"));
    for line in lines {
        md.push_str(&format!("- {line}\n"));
    }
    md.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::fit_summary::compute_coverage;
    use crate::profile::models::{CoreFacts, ExperienceRecord, LanguageRecord, SkillLevel};

    fn summary(facts: &StoredFacts, must: &[&str], nice: &[&str]) -> FitSummary {
        let must: Vec<String> = must.iter().map(|s| s.to_string()).collect();
        let nice: Vec<String> = nice.iter().map(|s| s.to_string()).collect();
        FitSummary {
            role: "Backend Engineer".to_string(),
            coverage: compute_coverage(&must, &nice, &facts.known_skill_names(), 0.5),
            narrative: "Strong fit for the Backend Engineer position.".to_string(),
        }
    }

    fn details(text: &str, level: Option<SkillLevel>) -> SkillDetails {
        SkillDetails {
            experience_text: text.to_string(),
            level,
        }
    }

    fn facts() -> StoredFacts {
        let mut facts = StoredFacts {
            core: CoreFacts {
                phone: Some("+55 11 99999-0000".to_string()),
                state: Some("SP".to_string()),
                city: Some("São Paulo".to_string()),
                neighborhood: None,
            },
            ..Default::default()
        };
        facts.skills.insert("Ansible".to_string(), details("some scripts", None));
        facts.skills.insert(
            "Rust".to_string(),
            details("3 years", Some(SkillLevel::Advanced)),
        );
        facts.skills.insert("Docker".to_string(), details("1 year", None));
        facts.profile.experience.push(ExperienceRecord {
            title: Some("Developer".to_string()),
            company: Some("Acme".to_string()),
            duration: Some("2 years".to_string()),
            ..Default::default()
        });
        facts.profile.languages.push(LanguageRecord {
            language: Some("English".to_string()),
            proficiency: Some("B2".to_string()),
            ..Default::default()
        });
        facts
    }

    #[test]
    fn test_header_and_sections() {
        let facts = facts();
        let user = UserId::parse("ana@example.com").unwrap();
        let md = render_resume(&user, &facts, &summary(&facts, &["Rust"], &["Docker"]));

        assert!(md.starts_with("# Résumé — Backend Engineer\n"));
        assert!(md.contains("ana@example.com · +55 11 99999-0000 · São Paulo, SP"));
        assert!(md.contains("## Summary\n\nStrong fit"));
        assert!(md.contains("- **Rust** (Advanced): 3 years"));
        assert!(md.contains("- Developer — Acme (2 years)"));
        assert!(md.contains("- English (B2)"));
        assert!(!md.contains("## Education"));
        assert!(!md.contains("## Certifications"));
    }

    #[test]
    fn test_matched_skills_come_first() {
        let facts = facts();
        let user = UserId::parse("ana@example.com").unwrap();
        let md = render_resume(&user, &facts, &summary(&facts, &["Rust"], &["Docker"]));

        let rust = md.find("**Rust**").unwrap();
        let docker = md.find("**Docker**").unwrap();
        let ansible = md.find("**Ansible**").unwrap();
        assert!(rust < docker && docker < ansible);
    }

    #[test]
    fn test_skills_are_capped() {
        let mut facts = facts();
        for i in 0..20 {
            facts
                .skills
                .insert(format!("Tool{i:02}"), details("used it", None));
        }
        let user = UserId::parse("ana@example.com").unwrap();
        let md = render_resume(&user, &facts, &summary(&facts, &[], &[]));
        assert_eq!(md.matches("- **").count(), MAX_SKILLS);
    }
}
