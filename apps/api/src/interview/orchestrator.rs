//! Orchestrator: drives one interview session through its states.
//!
//! ```text
//! AwaitingJob → GapCheck → AwaitingAnswers ⇄ GapCheck → FitSummary → Done
//! ```
//!
//! Facts live only in the `FactStore`; a session remembers the job snapshot, the
//! pending request, and (once done) the summary. Every read-compute-write cycle
//! for a user runs under that user's lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::fit_summary::{summarize, FitSummary, NarrativePhraser};
use crate::interview::interpreter::AnswerInterpreter;
use crate::interview::jd_parser::JobRequirements;
use crate::interview::negotiator::{
    apply_answers, build_request, Answers, ConsolidatedRequest, RequestStyle,
};
use crate::profile::completeness::compute_completeness_report;
use crate::profile::gaps::{compute_gaps, GapSet};
use crate::profile::locks::UserLocks;
use crate::profile::models::{FactPatch, UserId};
use crate::profile::store::FactStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InterviewState {
    AwaitingJob,
    GapCheck,
    AwaitingAnswers {
        gaps: GapSet,
        request: ConsolidatedRequest,
    },
    FitSummary,
    Done {
        summary: FitSummary,
    },
}

impl InterviewState {
    pub fn name(&self) -> &'static str {
        match self {
            InterviewState::AwaitingJob => "awaiting_job",
            InterviewState::GapCheck => "gap_check",
            InterviewState::AwaitingAnswers { .. } => "awaiting_answers",
            InterviewState::FitSummary => "fit_summary",
            InterviewState::Done { .. } => "done",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user: UserId,
    pub job: Option<JobRequirements>,
    pub state: InterviewState,
    /// Answer turns accepted so far.
    pub turns: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user,
            job: None,
            state: InterviewState::AwaitingJob,
            turns: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pending_request(&self) -> Option<&ConsolidatedRequest> {
        match &self.state {
            InterviewState::AwaitingAnswers { request, .. } => Some(request),
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<&FitSummary> {
        match &self.state {
            InterviewState::Done { summary } => Some(summary),
            _ => None,
        }
    }

    fn transition(&mut self, next: InterviewState) {
        info!(
            "Session {} ({}): {} -> {}",
            self.id,
            self.user,
            self.state.name(),
            next.name()
        );
        self.state = next;
        self.updated_at = Utc::now();
    }

    fn invalid(&self, operation: &str) -> AppError {
        AppError::InvalidTransition(format!(
            "cannot {operation} while session {} is {}",
            self.id,
            self.state.name()
        ))
    }
}

/// What a turn hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnOutcome {
    Questions {
        request: ConsolidatedRequest,
        message: String,
    },
    Summary {
        summary: FitSummary,
    },
}

impl TurnOutcome {
    fn questions(request: ConsolidatedRequest) -> Self {
        let message = request.render();
        TurnOutcome::Questions { request, message }
    }
}

pub struct Orchestrator {
    store: Arc<dyn FactStore>,
    interpreter: Arc<dyn AnswerInterpreter>,
    phraser: Arc<dyn NarrativePhraser>,
    locks: UserLocks,
    style: RequestStyle,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn FactStore>,
        interpreter: Arc<dyn AnswerInterpreter>,
        phraser: Arc<dyn NarrativePhraser>,
        style: RequestStyle,
    ) -> Self {
        Self {
            store,
            interpreter,
            phraser,
            locks: UserLocks::new(),
            style,
        }
    }

    /// Opens a session for `user` and runs the first gap check against `job`.
    pub async fn start(
        &self,
        user: UserId,
        job: JobRequirements,
    ) -> Result<(Session, TurnOutcome), AppError> {
        let mut session = Session::new(user);
        let outcome = self.submit_job(&mut session, job).await?;
        Ok((session, outcome))
    }

    /// `AwaitingJob` only. On failure the session is back in `AwaitingJob`.
    pub async fn submit_job(
        &self,
        session: &mut Session,
        job: JobRequirements,
    ) -> Result<TurnOutcome, AppError> {
        if session.state != InterviewState::AwaitingJob {
            return Err(session.invalid("submit a job"));
        }

        session.job = Some(job);
        session.transition(InterviewState::GapCheck);

        let _guard = self.locks.acquire(&session.user).await;
        match self.run_gap_check(session).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("Gap check failed for session {}: {e}", session.id);
                session.job = None;
                session.transition(InterviewState::AwaitingJob);
                Err(e)
            }
        }
    }

    /// `AwaitingAnswers` only. Any failure leaves the pending request untouched.
    ///
    /// Answers are checked against the gaps that are still open when the turn runs:
    /// a field another session stored since the request went out is never overwritten.
    pub async fn submit_answers(
        &self,
        session: &mut Session,
        answers: Answers,
    ) -> Result<TurnOutcome, AppError> {
        let InterviewState::AwaitingAnswers { gaps: pending, .. } = &session.state else {
            return Err(session.invalid("submit answers"));
        };
        let pending = pending.clone();
        let job = session
            .job
            .clone()
            .ok_or_else(|| session.invalid("submit answers without a job"))?;

        let _guard = self.locks.acquire(&session.user).await;
        let facts = self.store.snapshot(&session.user).await?;
        let current = compute_gaps(
            &job.skills_to_probe(),
            &facts.known_skill_names(),
            &facts.core,
            &facts.profile,
        );
        let gaps = pending.narrowed_to(&current);
        if gaps != pending {
            info!(
                "Session {}: some requested fields were filled elsewhere, accepting only {:?} {:?}",
                session.id, gaps.missing_skills, gaps.missing_profile_attributes
            );
        }

        let patch = apply_answers(answers, &gaps, self.interpreter.as_ref()).await?;
        if patch.is_empty() {
            info!("Session {}: answer mapped to no requested field", session.id);
        } else {
            self.store.save(&session.user, &patch).await?;
        }

        let previous = session.state.clone();
        session.turns += 1;
        session.transition(InterviewState::GapCheck);
        match self.run_gap_check(session).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("Gap check failed for session {}: {e}", session.id);
                session.transition(previous);
                Err(e)
            }
        }
    }

    /// Caller holds the user's lock.
    async fn run_gap_check(&self, session: &mut Session) -> Result<TurnOutcome, AppError> {
        let job = session
            .job
            .clone()
            .ok_or_else(|| session.invalid("run a gap check without a job"))?;

        let facts = self.store.snapshot(&session.user).await?;
        let gaps = compute_gaps(
            &job.skills_to_probe(),
            &facts.known_skill_names(),
            &facts.core,
            &facts.profile,
        );

        if let Some(request) = build_request(&gaps, &self.style) {
            info!(
                "Session {}: asking {} question(s), skills {:?}, attributes {:?}",
                session.id,
                request.question_count(),
                request.requested_skills(),
                request.requested_attributes()
            );
            session.transition(InterviewState::AwaitingAnswers {
                gaps,
                request: request.clone(),
            });
            return Ok(TurnOutcome::questions(request));
        }

        session.transition(InterviewState::FitSummary);
        let completeness = compute_completeness_report(&facts.core, &facts.profile);
        let summary = summarize(
            &job.role,
            &job.must_have,
            &job.nice_to_have,
            &facts.known_skill_names(),
            &completeness,
            self.phraser.as_ref(),
        )
        .await;
        session.transition(InterviewState::Done {
            summary: summary.clone(),
        });
        Ok(TurnOutcome::Summary { summary })
    }

    /// Direct fact write outside an interview, under the same per-user lock.
    pub async fn save_facts(&self, user: &UserId, patch: &FactPatch) -> Result<(), AppError> {
        let _guard = self.locks.acquire(user).await;
        self.store.save(user, patch).await
    }

    pub fn interpreter_name(&self) -> &'static str {
        self.interpreter.name()
    }

    pub fn phraser_name(&self) -> &'static str {
        self.phraser.name()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;

    use super::*;
    use crate::interview::fit_summary::TemplatePhraser;
    use crate::interview::interpreter::KeyValueAnswerInterpreter;
    use crate::profile::memory::InMemoryFactStore;
    use crate::profile::models::{
        CertificationRecord, CoreFacts, CoreFactsPatch, EducationRecord, ExperienceRecord,
        FactPatch, LanguageRecord, Profile, ProfileAttribute, ProfilePatch, SkillDetails,
        SkillFact, SkillLevel,
    };

    fn user() -> UserId {
        UserId::parse("ana@example.com").unwrap()
    }

    fn job(must: &[&str], nice: &[&str]) -> JobRequirements {
        JobRequirements {
            role: "Full Stack Developer".to_string(),
            must_have: must.iter().map(|s| s.to_string()).collect(),
            nice_to_have: nice.iter().map(|s| s.to_string()).collect(),
            responsibilities: String::new(),
        }
    }

    fn orchestrator(store: Arc<dyn FactStore>) -> Orchestrator {
        Orchestrator::new(
            store,
            Arc::new(KeyValueAnswerInterpreter),
            Arc::new(TemplatePhraser),
            RequestStyle::default(),
        )
    }

    fn skill(name: &str) -> SkillFact {
        SkillFact {
            skill: name.to_string(),
            details: SkillDetails {
                experience_text: "2 years".to_string(),
                level: Some(SkillLevel::Advanced),
            },
        }
    }

    fn complete_profile_patch(skills: &[&str]) -> FactPatch {
        FactPatch {
            core: CoreFactsPatch {
                phone: Some("+55 11 99999-0000".to_string()),
                state: Some("SP".to_string()),
                city: Some("São Paulo".to_string()),
                neighborhood: Some("Vila Mariana".to_string()),
            },
            profile: ProfilePatch {
                education: Some(vec![EducationRecord {
                    degree: Some("BSc Information Systems".to_string()),
                    ..Default::default()
                }]),
                certifications: Some(vec![CertificationRecord {
                    name: Some("AWS Cloud Practitioner".to_string()),
                    ..Default::default()
                }]),
                languages: Some(vec![LanguageRecord {
                    language: Some("English".to_string()),
                    ..Default::default()
                }]),
                experience: Some(vec![ExperienceRecord {
                    title: Some("Developer".to_string()),
                    ..Default::default()
                }]),
            },
            skills: skills.iter().map(|s| skill(s)).collect(),
        }
    }

    /// Reads work, writes always fail.
    struct FailingStore(InMemoryFactStore);

    #[async_trait]
    impl FactStore for FailingStore {
        async fn get_core(&self, user: &UserId) -> Result<CoreFacts, AppError> {
            self.0.get_core(user).await
        }

        async fn get_profile(&self, user: &UserId) -> Result<Profile, AppError> {
            self.0.get_profile(user).await
        }

        async fn get_skills(
            &self,
            user: &UserId,
        ) -> Result<BTreeMap<String, SkillDetails>, AppError> {
            self.0.get_skills(user).await
        }

        async fn save(&self, _user: &UserId, _patch: &FactPatch) -> Result<(), AppError> {
            Err(AppError::Persistence(sqlx::Error::PoolClosed))
        }
    }

    #[tokio::test]
    async fn test_new_user_gets_one_consolidated_request() {
        let orchestrator = orchestrator(Arc::new(InMemoryFactStore::new()));
        let (session, outcome) = orchestrator
            .start(user(), job(&["React", "AWS"], &["Docker"]))
            .await
            .unwrap();

        let TurnOutcome::Questions { request, message } = outcome else {
            panic!("expected questions");
        };
        assert_eq!(request.requested_skills(), vec!["React", "AWS", "Docker"]);
        assert_eq!(request.requested_attributes().len(), 8);
        assert!(message.contains("1. React:"));
        assert!(matches!(session.state, InterviewState::AwaitingAnswers { .. }));
    }

    #[tokio::test]
    async fn test_complete_profile_goes_straight_to_summary() {
        let store = Arc::new(InMemoryFactStore::new());
        store
            .save(&user(), &complete_profile_patch(&["React", "AWS"]))
            .await
            .unwrap();
        let orchestrator = orchestrator(store);

        let (session, outcome) = orchestrator
            .start(user(), job(&["React", "AWS"], &[]))
            .await
            .unwrap();
        let TurnOutcome::Summary { summary } = outcome else {
            panic!("expected a summary");
        };
        assert_eq!(summary.coverage.must_have.covered, vec!["React", "AWS"]);
        assert!(summary.coverage.must_have.uncovered.is_empty());
        assert_eq!(session.summary(), Some(&summary));
    }

    #[tokio::test]
    async fn test_answers_loop_until_nothing_is_missing() {
        let store = Arc::new(InMemoryFactStore::new());
        let mut patch = complete_profile_patch(&["React"]);
        patch.core.phone = None;
        store.save(&user(), &patch).await.unwrap();
        let orchestrator = orchestrator(store.clone());

        let (mut session, outcome) = orchestrator
            .start(user(), job(&["React"], &["Docker"]))
            .await
            .unwrap();
        let TurnOutcome::Questions { request, .. } = outcome else {
            panic!("expected questions");
        };
        assert_eq!(request.requested_skills(), vec!["Docker"]);
        assert_eq!(request.requested_attributes(), vec![ProfileAttribute::Phone]);

        // First answer covers only the phone; Docker is asked again.
        let outcome = orchestrator
            .submit_answers(&mut session, Answers::FreeText("Phone: +55 11 98888-7777".to_string()))
            .await
            .unwrap();
        let TurnOutcome::Questions { request, .. } = outcome else {
            panic!("expected questions");
        };
        assert_eq!(request.requested_skills(), vec!["Docker"]);
        assert!(request.profile_questions.is_empty());

        let outcome = orchestrator
            .submit_answers(
                &mut session,
                Answers::FreeText("Docker: 1 year, intermediate".to_string()),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Summary { .. }));
        assert_eq!(session.turns, 2);

        let stored = store.snapshot(&user()).await.unwrap();
        assert_eq!(stored.core.phone.as_deref(), Some("+55 11 98888-7777"));
        assert_eq!(
            stored.skills.get("Docker").and_then(|d| d.level),
            Some(SkillLevel::Intermediate)
        );
    }

    #[tokio::test]
    async fn test_unmappable_answer_repeats_the_request() {
        let orchestrator = orchestrator(Arc::new(InMemoryFactStore::new()));
        let (mut session, first) = orchestrator.start(user(), job(&["Rust"], &[])).await.unwrap();

        let second = orchestrator
            .submit_answers(&mut session, Answers::FreeText("Let me think.".to_string()))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(session.turns, 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_pending_request() {
        let orchestrator = orchestrator(Arc::new(FailingStore(InMemoryFactStore::new())));
        let (mut session, _) = orchestrator.start(user(), job(&["Rust"], &[])).await.unwrap();
        let before = session.state.clone();

        let err = orchestrator
            .submit_answers(&mut session, Answers::FreeText("Rust: 3 years".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(session.state, before);
        assert_eq!(session.turns, 0);
    }

    #[tokio::test]
    async fn test_done_is_terminal() {
        let store = Arc::new(InMemoryFactStore::new());
        store
            .save(&user(), &complete_profile_patch(&[]))
            .await
            .unwrap();
        let orchestrator = orchestrator(store);
        let (mut session, _) = orchestrator.start(user(), job(&[], &[])).await.unwrap();
        assert!(matches!(session.state, InterviewState::Done { .. }));

        let err = orchestrator
            .submit_answers(&mut session, Answers::FreeText("Phone: 1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        let err = orchestrator
            .submit_job(&mut session, job(&["Rust"], &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_answers_before_job_are_rejected() {
        let orchestrator = orchestrator(Arc::new(InMemoryFactStore::new()));
        let mut session = Session::new(user());
        let err = orchestrator
            .submit_answers(&mut session, Answers::FreeText("Phone: 1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert_eq!(session.state, InterviewState::AwaitingJob);
    }

    #[tokio::test]
    async fn test_stale_request_never_overwrites_facts_saved_by_another_session() {
        let store = Arc::new(InMemoryFactStore::new());
        let orchestrator = orchestrator(store.clone());
        let (mut first, _) = orchestrator.start(user(), job(&["Go"], &[])).await.unwrap();
        let (mut second, _) = orchestrator.start(user(), job(&["Go"], &[])).await.unwrap();

        orchestrator
            .submit_answers(
                &mut second,
                Answers::FreeText("Phone: 111\nEducation: BSc (USP, 2020)".to_string()),
            )
            .await
            .unwrap();
        let outcome = orchestrator
            .submit_answers(
                &mut first,
                Answers::FreeText(
                    "Phone: 222\nEducation: MBA (FGV, 2024)\nCity: Campinas".to_string(),
                ),
            )
            .await
            .unwrap();

        let stored = store.snapshot(&user()).await.unwrap();
        assert_eq!(stored.core.phone.as_deref(), Some("111"));
        assert_eq!(stored.profile.education.len(), 1);
        assert_eq!(stored.profile.education[0].degree.as_deref(), Some("BSc"));
        assert_eq!(stored.core.city.as_deref(), Some("Campinas"));

        let TurnOutcome::Questions { request, .. } = outcome else {
            panic!("expected questions");
        };
        assert!(!request.requested_attributes().contains(&ProfileAttribute::Phone));
        assert!(!request.requested_attributes().contains(&ProfileAttribute::Education));
    }

    #[tokio::test]
    async fn test_unrequested_facts_are_never_written() {
        let store = Arc::new(InMemoryFactStore::new());
        let mut patch = complete_profile_patch(&[]);
        patch.core.city = None;
        store.save(&user(), &patch).await.unwrap();
        let orchestrator = orchestrator(store.clone());
        let (mut session, _) = orchestrator.start(user(), job(&["Go"], &[])).await.unwrap();

        orchestrator
            .submit_answers(
                &mut session,
                Answers::FreeText("Phone: 000\nCity: Campinas\nRust: 5 years".to_string()),
            )
            .await
            .unwrap();

        let stored = store.snapshot(&user()).await.unwrap();
        assert_eq!(stored.core.phone.as_deref(), Some("+55 11 99999-0000"));
        assert_eq!(stored.core.city.as_deref(), Some("Campinas"));
        assert!(!stored.skills.contains_key("Rust"));
    }
}
