//! SessionOrchestrator - drives diagnostic sessions through the flow machine.
//!
//! Every action runs under the session's machine lock. Handlers work on a
//! copy of the machine and the stored session; the copy is committed to the
//! cache only after the session has been written back, so a failed write
//! leaves both untouched.

use super::action::{
    ActionOutcome, CategoryScore, SessionAction, SessionProgress, SessionStateView, SessionSummary,
};
use super::machine_cache::MachineCache;
use casewise_core::case::{CaseProvider, Rubric};
use casewise_core::config::OrchestratorConfig;
use casewise_core::flow::{FlowAction, FlowState, FlowStateMachine};
use casewise_core::grading::{
    Answer, GradingCoordinator, GradingProvider, GradingRequest, select_follow_up_categories,
};
use casewise_core::question::{Question, QuestionProvider, WeakAnswerContext};
use casewise_core::session::{Session, SessionRepository, SessionStatus};
use casewise_core::teaching::{TeachingContext, TeachingProvider};
use casewise_core::{CasewiseError, Result};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;

const SUMMARY_KEY: &str = "summary";

/// Result of a handler: the outcome, and whether the session must be written.
struct Step {
    outcome: ActionOutcome,
    persist: bool,
}

impl Step {
    fn persist(outcome: ActionOutcome) -> Self {
        Self {
            outcome,
            persist: true,
        }
    }

    /// An outcome that leaves session and machine as they were.
    fn unchanged(outcome: ActionOutcome) -> Self {
        Self {
            outcome,
            persist: false,
        }
    }
}

pub struct SessionOrchestrator {
    cases: Arc<dyn CaseProvider>,
    questions: Arc<dyn QuestionProvider>,
    grading: GradingCoordinator,
    teaching: Arc<dyn TeachingProvider>,
    sessions: Arc<dyn SessionRepository>,
    machines: MachineCache,
    config: OrchestratorConfig,
}

impl SessionOrchestrator {
    pub fn builder() -> SessionOrchestratorBuilder {
        SessionOrchestratorBuilder::default()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn SessionRepository> {
        &self.sessions
    }

    /// Number of sessions with a live machine in this process.
    pub async fn live_sessions(&self) -> usize {
        self.machines.len().await
    }

    /// Creates a session for `case_id` and loads its case and questions.
    ///
    /// Nothing is stored unless both loads succeed.
    pub async fn start_session(&self, case_id: &str, user_id: Option<&str>) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let mut session = Session::new(&session_id, case_id, user_id.map(str::to_string));
        let mut machine = FlowStateMachine::new();

        let case_info = self
            .bounded("case_provider", self.cases.load_case(case_id))
            .await?;
        let rubric = self
            .bounded("case_provider", self.cases.load_rubric(case_id))
            .await?;
        let questions = self.load_questions(case_id).await?;

        session.case_info = Some(case_info);
        session.rubric = Some(rubric);
        session.total_questions = questions.len();
        session.available_questions = questions;
        machine.apply(FlowAction::LoadCase)?;
        session.set_flow_state(machine.current());

        self.sessions.insert(&session).await.inspect_err(|e| {
            tracing::error!(target: "orchestrator", session_id = %session_id, error = %e, "failed to store new session");
        })?;
        self.machines.insert(session_id.clone(), machine).await;

        tracing::info!(
            target: "orchestrator",
            session_id = %session_id,
            case_id,
            total_questions = session.total_questions,
            "session started"
        );
        Ok(session_id)
    }

    /// Applies one client action to a session.
    pub async fn process_action(
        &self,
        session_id: &str,
        action: SessionAction,
    ) -> Result<ActionOutcome> {
        let shared = match self.machines.get(session_id).await {
            Some(shared) => shared,
            None => {
                let stored = self.sessions.get(session_id).await?;
                if stored.is_ended() {
                    return Err(CasewiseError::invalid_transition(
                        stored.flow_state,
                        action.name(),
                    ));
                }
                self.machines
                    .get_or_resume(session_id, stored.flow_state)
                    .await
            }
        };
        let mut guard = shared.lock().await;

        // Re-read under the lock so the handler sees the last committed write.
        // Ended or deleted sessions lose their cached machine.
        let mut session = match self.sessions.get(session_id).await {
            Ok(session) if !session.is_ended() => session,
            Ok(session) => {
                drop(guard);
                self.machines.remove(session_id).await;
                return Err(CasewiseError::invalid_transition(
                    session.flow_state,
                    action.name(),
                ));
            }
            Err(err) => {
                if err.is_session_not_found() {
                    drop(guard);
                    self.machines.remove(session_id).await;
                }
                return Err(err);
            }
        };
        if guard.current() != session.flow_state {
            tracing::debug!(
                target: "orchestrator",
                session_id,
                cached = %guard.current(),
                stored = %session.flow_state,
                "resyncing machine with stored session"
            );
            *guard = FlowStateMachine::resume(session.flow_state);
        }

        let mut machine = guard.clone();
        tracing::debug!(
            target: "orchestrator",
            session_id,
            action = action.name(),
            state = %machine.current(),
            "processing action"
        );

        let step = match action {
            SessionAction::StartQuestions => self.handle_start_questions(&mut session, &mut machine)?,
            SessionAction::GetQuestion => self.handle_get_question(&mut session, &mut machine).await?,
            SessionAction::SubmitAnswer {
                question_id,
                answer,
            } => {
                self.handle_submit_answer(&mut session, &mut machine, question_id.as_deref(), answer)
                    .await?
            }
            SessionAction::GetFeedback => self.handle_get_feedback(&mut session, &mut machine).await?,
            SessionAction::Reset => self.handle_reset(&mut session, &mut machine).await?,
        };

        if step.persist {
            self.commit(&mut session, &machine).await?;
            *guard = machine;
        }
        Ok(step.outcome)
    }

    /// Read-only view of a session. Never changes stored or cached state.
    pub async fn get_session_state(&self, session_id: &str) -> Result<SessionStateView> {
        let session = self.sessions.get(session_id).await?;
        let history = match self.machines.get(session_id).await {
            Some(shared) => shared.lock().await.history().cloned().collect(),
            None => Vec::new(),
        };
        let machine = FlowStateMachine::resume(session.flow_state);
        let valid_actions = if session.is_ended() {
            Vec::new()
        } else {
            machine.valid_actions()
        };

        Ok(SessionStateView {
            progress: progress_of(&session),
            awaiting_answer_for: session.awaiting_answer_for().cloned(),
            ended: session.is_ended(),
            session_id: session.session_id,
            case_id: session.case_id,
            user_id: session.user_id,
            state: session.flow_state,
            status: session.status,
            valid_actions,
            history,
            metadata: session.metadata,
        })
    }

    /// Ends a session and returns its final results.
    ///
    /// Ending an already ended session returns the summary computed the
    /// first time.
    pub async fn end_session(&self, session_id: &str) -> Result<SessionSummary> {
        let shared = self.machines.get(session_id).await;
        let guard = match &shared {
            Some(shared) => Some(shared.lock().await),
            None => None,
        };

        let mut session = self.sessions.get(session_id).await?;
        if session.is_ended()
            && let Some(stored) = session.metadata.get(SUMMARY_KEY)
            && let Ok(summary) = serde_json::from_value::<SessionSummary>(stored.clone())
        {
            return Ok(summary);
        }

        let ended_at = session.ended_at.unwrap_or_else(Utc::now);
        session.ended_at = Some(ended_at);
        session.status = SessionStatus::Completed;

        let summary = self.summarize(&session).await;
        session.metadata.insert(
            SUMMARY_KEY.to_string(),
            serde_json::to_value(&summary)?,
        );

        if !self.sessions.update(&mut session).await? {
            return Err(CasewiseError::session_not_found(session_id));
        }
        drop(guard);
        self.machines.remove(session_id).await;

        tracing::info!(
            target: "orchestrator",
            session_id,
            overall_score = summary.overall_score,
            questions_answered = summary.questions_answered,
            "session ended"
        );
        Ok(summary)
    }

    fn handle_start_questions(
        &self,
        session: &mut Session,
        machine: &mut FlowStateMachine,
    ) -> Result<Step> {
        machine.apply(FlowAction::StartQuestions)?;
        Ok(Step::persist(ActionOutcome::Ready {
            total_questions: session.total_questions,
        }))
    }

    async fn handle_get_question(
        &self,
        session: &mut Session,
        machine: &mut FlowStateMachine,
    ) -> Result<Step> {
        match machine.current() {
            FlowState::AskingDiagnostic => Ok(self.ask_diagnostic(session, machine)?),
            FlowState::AskingFollowUp => self.ask_follow_up(session, machine).await,
            FlowState::ProvidingTeaching => {
                if session.has_more_questions() {
                    machine.apply(FlowAction::ContinueQuestions)?;
                    self.ask_diagnostic(session, machine)
                } else {
                    machine.apply(FlowAction::Complete)?;
                    Ok(Step::persist(completion(session)))
                }
            }
            FlowState::SessionComplete => Ok(Step::unchanged(completion(session))),
            state => Err(CasewiseError::invalid_transition(state, "get_question")),
        }
    }

    fn ask_diagnostic(&self, session: &mut Session, machine: &mut FlowStateMachine) -> Result<Step> {
        let Some(question) = session.current_question().cloned() else {
            let message = format!(
                "question index {} is outside the loaded set of {}",
                session.current_question_index,
                session.available_questions.len()
            );
            tracing::error!(target: "orchestrator", session_id = %session.session_id, "{message}");
            machine.apply(FlowAction::Error)?;
            return Ok(Step::persist(ActionOutcome::Error { message }));
        };

        machine.apply(FlowAction::AskQuestion)?;
        session.questions_asked.push(question.clone());
        Ok(Step::persist(question_outcome(session, question)))
    }

    async fn ask_follow_up(
        &self,
        session: &mut Session,
        machine: &mut FlowStateMachine,
    ) -> Result<Step> {
        let Some(last) = session.last_question() else {
            return Ok(Step::unchanged(ActionOutcome::Error {
                message: "no answered question to follow up on".to_string(),
            }));
        };
        let category = last.scoring_category().to_string();
        let context = weak_answer_context(session, last);

        let generated = self
            .bounded(
                "question_provider",
                self.questions.generate_follow_up(&category, &context),
            )
            .await;
        let question = match generated {
            Ok(question) => question,
            Err(err) => {
                tracing::warn!(target: "orchestrator", session_id = %session.session_id, error = %err, "follow-up generation failed");
                return Ok(Step::unchanged(ActionOutcome::Error {
                    message: err.to_string(),
                }));
            }
        };

        machine.apply(FlowAction::AskFollowUp)?;
        session.follow_up_questions.push(question.clone());
        session.questions_asked.push(question.clone());
        Ok(Step::persist(question_outcome(session, question)))
    }

    async fn handle_submit_answer(
        &self,
        session: &mut Session,
        machine: &mut FlowStateMachine,
        question_id: Option<&str>,
        text: String,
    ) -> Result<Step> {
        if !machine.can_apply(FlowAction::SubmitAnswer) {
            return Err(CasewiseError::invalid_transition(
                machine.current(),
                "submit_answer",
            ));
        }
        let Some(question) = session.awaiting_answer_for().cloned() else {
            return Ok(Step::unchanged(ActionOutcome::Error {
                message: "no question is awaiting an answer".to_string(),
            }));
        };
        if let Some(given) = question_id
            && given != question.id
        {
            return Ok(Step::unchanged(ActionOutcome::Error {
                message: format!("answer is for '{given}' but '{}' is awaiting", question.id),
            }));
        }

        let answer = Answer::new(&question.id, &session.session_id, text);
        session.answers.push(answer.clone());
        machine.apply(FlowAction::SubmitAnswer)?;

        let rubric = session.rubric.clone().unwrap_or_default();
        let request = GradingRequest {
            question: &question,
            answer: &answer,
            case_id: &session.case_id,
            criteria: rubric.category(question.scoring_category()),
        };
        let grade = self.grading.grade(&request).await;
        let score = grade.score;
        let feedback = grade.feedback.clone();
        session.grades.push(grade);
        machine.apply(FlowAction::GradeComplete)?;

        tracing::info!(
            target: "orchestrator",
            session_id = %session.session_id,
            question_id = %question.id,
            score,
            "answer graded"
        );

        let below_threshold = score < self.config.follow_up_threshold;
        let outcome = if below_threshold && !question.is_follow_up() {
            machine.apply(FlowAction::NeedsFollowUp)?;
            ActionOutcome::FollowUpNeeded { score, feedback }
        } else if below_threshold {
            ActionOutcome::TeachingRecommended { score, feedback }
        } else {
            session.current_question_index += 1;
            if session.has_more_questions() {
                machine.apply(FlowAction::NextQuestion)?;
                ActionOutcome::NextQuestion { score, feedback }
            } else {
                machine.apply(FlowAction::AllComplete)?;
                ActionOutcome::Complete {
                    score: Some(score),
                    feedback: Some(feedback),
                }
            }
        };
        Ok(Step::persist(outcome))
    }

    async fn handle_get_feedback(
        &self,
        session: &mut Session,
        machine: &mut FlowStateMachine,
    ) -> Result<Step> {
        if !machine.can_apply(FlowAction::ProvideTeaching) {
            return Err(CasewiseError::invalid_transition(
                machine.current(),
                "get_feedback",
            ));
        }
        let (Some(question), Some(grade)) = (session.last_question(), session.last_grade()) else {
            return Ok(Step::unchanged(ActionOutcome::Error {
                message: "no graded answer to teach from".to_string(),
            }));
        };

        let question_id = question.id.clone();
        let context = TeachingContext {
            case_id: session.case_id.clone(),
            category: question.scoring_category().to_string(),
            question_text: question.text.clone(),
            answer_text: session
                .last_answer()
                .map(|a| a.text.clone())
                .unwrap_or_default(),
            feedback: grade.feedback.clone(),
            score: grade.score,
        };

        let teaching = match self
            .bounded(
                "teaching_provider",
                self.teaching.get_teaching_point(&question_id, &context),
            )
            .await
        {
            Ok(point) => point,
            Err(err) => {
                tracing::warn!(target: "orchestrator", session_id = %session.session_id, error = %err, "teaching unavailable");
                return Ok(Step::unchanged(ActionOutcome::Error {
                    message: err.to_string(),
                }));
            }
        };

        machine.apply(FlowAction::ProvideTeaching)?;
        session.teaching_points.push(teaching.clone());
        session.current_question_index += 1;
        Ok(Step::persist(ActionOutcome::TeachingDelivered { teaching }))
    }

    async fn handle_reset(
        &self,
        session: &mut Session,
        machine: &mut FlowStateMachine,
    ) -> Result<Step> {
        if !machine.can_apply(FlowAction::Reset) {
            return Err(CasewiseError::invalid_transition(machine.current(), "reset"));
        }

        let reloaded = async {
            let case_info = self
                .bounded("case_provider", self.cases.load_case(&session.case_id))
                .await?;
            let rubric = self
                .bounded("case_provider", self.cases.load_rubric(&session.case_id))
                .await?;
            let questions = self.load_questions(&session.case_id).await?;
            Ok::<_, CasewiseError>((case_info, rubric, questions))
        }
        .await;
        let (case_info, rubric, questions) = match reloaded {
            Ok(loaded) => loaded,
            Err(err) => {
                return Ok(Step::unchanged(ActionOutcome::Error {
                    message: err.to_string(),
                }));
            }
        };

        machine.apply(FlowAction::Reset)?;
        machine.apply(FlowAction::LoadCase)?;
        session.case_info = Some(case_info);
        session.rubric = Some(rubric);
        session.total_questions = questions.len();
        session.available_questions = questions;

        tracing::info!(target: "orchestrator", session_id = %session.session_id, "session reset");
        Ok(Step::persist(ActionOutcome::Ready {
            total_questions: session.total_questions,
        }))
    }

    async fn load_questions(&self, case_id: &str) -> Result<Vec<Question>> {
        let questions = self
            .bounded("question_provider", self.questions.load_questions(case_id))
            .await?;
        if questions.is_empty() {
            return Err(CasewiseError::agent(
                "question_provider",
                format!("no questions available for case '{case_id}'"),
            ));
        }
        Ok(questions)
    }

    async fn commit(&self, session: &mut Session, machine: &FlowStateMachine) -> Result<()> {
        session.set_flow_state(machine.current());
        match self.sessions.update(session).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(CasewiseError::session_not_found(&session.session_id)),
            Err(err) => {
                tracing::error!(
                    target: "orchestrator",
                    session_id = %session.session_id,
                    error = %err,
                    "failed to store session"
                );
                Err(err)
            }
        }
    }

    async fn summarize(&self, session: &Session) -> SessionSummary {
        let category_scores = session.category_scores();
        let rubric = session.rubric.clone().unwrap_or_else(Rubric::default);
        let weighted_score = rubric.weighted_score(
            category_scores
                .iter()
                .map(|(name, score)| (name.as_str(), *score)),
        );

        let weak = select_follow_up_categories(
            &category_scores,
            self.config.follow_up_threshold,
            self.config.max_recommended_follow_ups,
        );
        let mut recommended_follow_ups = Vec::with_capacity(weak.len());
        for category in weak {
            let context = session
                .questions_asked
                .iter()
                .rev()
                .find(|q| q.scoring_category() == category)
                .map(|q| weak_answer_context(session, q))
                .unwrap_or_default();
            match self
                .bounded(
                    "question_provider",
                    self.questions.generate_follow_up(&category, &context),
                )
                .await
            {
                Ok(question) => recommended_follow_ups.push(question),
                Err(err) => tracing::warn!(
                    target: "orchestrator",
                    category = %category,
                    error = %err,
                    "could not generate recommended follow-up"
                ),
            }
        }

        let ended_at = session.ended_at.unwrap_or_else(Utc::now);
        SessionSummary {
            session_id: session.session_id.clone(),
            case_id: session.case_id.clone(),
            user_id: session.user_id.clone(),
            overall_score: session.average_score(),
            weighted_score,
            category_scores: category_scores
                .into_iter()
                .map(|(category, score)| CategoryScore { category, score })
                .collect(),
            recommended_follow_ups,
            questions_answered: session.answers.len(),
            follow_ups_completed: session.follow_up_questions.len(),
            teaching_points_viewed: session.teaching_points.len(),
            duration_minutes: session.duration_minutes(),
            started_at: session.created_at,
            ended_at,
        }
    }

    /// Runs a provider call under the provider timeout.
    async fn bounded<T, F>(&self, agent: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.config.provider_timeout();
        tokio::time::timeout(limit, call).await.map_err(|_| {
            CasewiseError::agent(agent, format!("timed out after {}s", limit.as_secs_f64()))
        })?
    }
}

fn question_outcome(session: &Session, question: Question) -> ActionOutcome {
    let total = session.total_questions;
    ActionOutcome::Question {
        question,
        question_number: (session.current_question_index + 1).min(total.max(1)),
        total_questions: total,
        progress: completion_ratio(session),
    }
}

fn completion(session: &Session) -> ActionOutcome {
    ActionOutcome::Complete {
        score: Some(session.average_score()),
        feedback: None,
    }
}

fn completion_ratio(session: &Session) -> f64 {
    if session.total_questions == 0 {
        return 0.0;
    }
    (session.current_question_index as f64 / session.total_questions as f64).min(1.0)
}

fn progress_of(session: &Session) -> SessionProgress {
    SessionProgress {
        current_question_index: session.current_question_index,
        total_questions: session.total_questions,
        questions_answered: session.answers.len(),
        grades_received: session.grades.len(),
        follow_ups_asked: session.follow_up_questions.len(),
        teaching_points: session.teaching_points.len(),
        completion: completion_ratio(session),
    }
}

/// Context about the answer given to `question`, for follow-up generation.
fn weak_answer_context(session: &Session, question: &Question) -> WeakAnswerContext {
    let answer = session
        .answers
        .iter()
        .rev()
        .find(|a| a.question_id == question.id);
    let grade = session
        .grades
        .iter()
        .rev()
        .find(|g| g.question_id == question.id);

    WeakAnswerContext {
        case_id: session.case_id.clone(),
        question_text: question.text.clone(),
        answer_text: answer.map(|a| a.text.clone()).unwrap_or_default(),
        feedback: grade.map(|g| g.feedback.clone()).unwrap_or_default(),
        score: grade.map(|g| g.score).unwrap_or_default(),
        weak_areas: grade.map(|g| g.weaknesses.clone()).unwrap_or_default(),
    }
}

/// Assembles a [`SessionOrchestrator`] from its collaborators.
#[derive(Default)]
pub struct SessionOrchestratorBuilder {
    cases: Option<Arc<dyn CaseProvider>>,
    questions: Option<Arc<dyn QuestionProvider>>,
    grader: Option<Arc<dyn GradingProvider>>,
    teaching: Option<Arc<dyn TeachingProvider>>,
    sessions: Option<Arc<dyn SessionRepository>>,
    config: OrchestratorConfig,
}

impl SessionOrchestratorBuilder {
    pub fn case_provider(mut self, provider: Arc<dyn CaseProvider>) -> Self {
        self.cases = Some(provider);
        self
    }

    pub fn question_provider(mut self, provider: Arc<dyn QuestionProvider>) -> Self {
        self.questions = Some(provider);
        self
    }

    /// Primary grader. Without one, every answer goes to the content scorer.
    pub fn grading_provider(mut self, provider: Arc<dyn GradingProvider>) -> Self {
        self.grader = Some(provider);
        self
    }

    pub fn teaching_provider(mut self, provider: Arc<dyn TeachingProvider>) -> Self {
        self.teaching = Some(provider);
        self
    }

    pub fn session_repository(mut self, repository: Arc<dyn SessionRepository>) -> Self {
        self.sessions = Some(repository);
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<SessionOrchestrator> {
        let missing = |what: &str| CasewiseError::config(format!("orchestrator needs a {what}"));
        let grading = GradingCoordinator::new(
            self.grader,
            self.config.grading_timeout(),
            self.config.follow_up_threshold,
        );

        Ok(SessionOrchestrator {
            cases: self.cases.ok_or_else(|| missing("case provider"))?,
            questions: self.questions.ok_or_else(|| missing("question provider"))?,
            teaching: self.teaching.ok_or_else(|| missing("teaching provider"))?,
            sessions: self.sessions.ok_or_else(|| missing("session repository"))?,
            grading,
            machines: MachineCache::new(),
            config: self.config,
        })
    }
}
