use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::branching::{resolve_next, Next};
use super::controller::{on_end_of_set, scoring_set, tier_scope, Advance};
use super::domain::{AnswerValue, Question, QuestionId, ResponseRecord, UserId};
use super::error::QuizError;
use super::repository::{
    IdentityProvider, QuestionRepository, QuizObserver, ResponseStore, RiskTierLookup,
    SubmittedAnswer,
};
use super::scoring::score;
use super::state::{Phase, QuizOutcome, SessionState, Terminal};

/// External collaborators the orchestrator calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub questions: Arc<dyn QuestionRepository>,
    pub responses: Arc<dyn ResponseStore>,
    pub tiers: Arc<dyn RiskTierLookup>,
    pub identity: Arc<dyn IdentityProvider>,
    pub observer: Arc<dyn QuizObserver>,
}

/// Result handed back for every submitted answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    InProgress { state: SessionState },
    Completed { payload: CompletionPayload },
}

/// Data the result view renders once the quiz is done.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionPayload {
    pub user_id: UserId,
    pub outcome: QuizOutcome,
    pub detected_candidates: Vec<String>,
    pub answered: usize,
    /// Non-fatal problems raised while finishing (persistence, tier lookup).
    pub issues: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Orchestrates one user's pass through the adaptive quiz.
pub struct QuizSession {
    collaborators: Collaborators,
    general: Vec<Question>,
    specialized: Vec<Question>,
    state: SessionState,
}

impl QuizSession {
    /// Load both question partitions and enter the general phase.
    pub async fn start(collaborators: Collaborators) -> Result<Self, QuizError> {
        let loaded = load_questions(collaborators.questions.as_ref()).await;
        let (general, specialized) = match loaded {
            Ok(partitions) => partitions,
            Err(error) => {
                collaborators.observer.on_error(&error);
                return Err(error);
            }
        };

        tracing::info!(
            general = general.len(),
            specialized = specialized.len(),
            "quiz session started"
        );
        let state = SessionState::initial(&general);

        Ok(Self {
            collaborators,
            general,
            specialized,
            state,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn general_questions(&self) -> &[Question] {
        &self.general
    }

    pub fn specialized_questions(&self) -> &[Question] {
        &self.specialized
    }

    /// Record an answer for the current question and move the quiz forward.
    pub async fn submit_answer(
        &mut self,
        question_id: QuestionId,
        value: AnswerValue,
    ) -> Result<SubmitOutcome, QuizError> {
        if self.state.completed {
            return Err(QuizError::AlreadyCompleted);
        }
        if self.state.is_pending_completion() {
            return Err(QuizError::CompletionPending);
        }

        let current = self
            .state
            .current_question()
            .cloned()
            .ok_or(QuizError::AlreadyCompleted)?;
        if current.id != question_id {
            return Err(QuizError::UnexpectedQuestion {
                expected: current.id,
                received: question_id,
            });
        }

        let mut next = self.state.clone();
        next.answers.insert(question_id, value.clone());
        self.collaborators
            .observer
            .on_answer_submitted(&SubmittedAnswer {
                question_id,
                response: value.as_text(),
                answered: next.answers.len(),
            });

        match resolve_next(&current, &value, &next.active_questions, next.current_index) {
            Next::Index(index) => {
                next.current_index = index;
                self.state = next;
                return Ok(SubmitOutcome::InProgress {
                    state: self.state.clone(),
                });
            }
            Next::EndOfSet => {}
        }

        let (next, advance) = on_end_of_set(&next, &self.general, &self.specialized);
        self.state = next;

        match advance {
            Advance::Continue => Ok(SubmitOutcome::InProgress {
                state: self.state.clone(),
            }),
            Advance::Finished(_) => {
                let payload = self.complete().await?;
                Ok(SubmitOutcome::Completed { payload })
            }
        }
    }

    /// Retry a completion that stopped for lack of an authenticated user.
    pub async fn resume_completion(&mut self) -> Result<CompletionPayload, QuizError> {
        if self.state.completed {
            return Err(QuizError::AlreadyCompleted);
        }
        if self.state.phase != Phase::Done {
            return Err(QuizError::NotFinished);
        }
        self.complete().await
    }

    /// Return to the general phase, keeping the already loaded questions.
    pub fn reset(&mut self) -> &SessionState {
        self.state = SessionState::initial(&self.general);
        tracing::info!("quiz session reset");
        &self.state
    }

    async fn complete(&mut self) -> Result<CompletionPayload, QuizError> {
        let Some(user_id) = self.collaborators.identity.current_user() else {
            let error = QuizError::AuthenticationRequired;
            self.collaborators.observer.on_error(&error);
            return Err(error);
        };

        let mut issues = Vec::new();
        if let Err(error) = self.persist(&user_id).await {
            issues.push(error);
        }

        let terminal = self.state.terminal.unwrap_or(Terminal::Assessment);
        let mut next = self.state.clone();
        let outcome = match terminal {
            Terminal::Healthy => QuizOutcome::Healthy,
            Terminal::Assessment => {
                let questions = scoring_set(&next, &self.general, &self.specialized);
                let breakdown = score(&next.answers, &questions);
                let scope = tier_scope(&next);

                let tier = match self
                    .collaborators
                    .tiers
                    .find_tier(breakdown.score, scope.as_deref())
                    .await
                {
                    Ok(Some(tier)) => Some(tier),
                    Ok(None) => {
                        issues.push(QuizError::NoTierMatch {
                            score: breakdown.score,
                        });
                        None
                    }
                    Err(error) => {
                        issues.push(QuizError::from(error));
                        None
                    }
                };

                next.score = Some(breakdown.score);
                next.result_tier = tier.clone();
                QuizOutcome::Assessed {
                    breakdown,
                    tier,
                    scope,
                }
            }
        };

        next.completed = true;
        next.outcome = Some(outcome.clone());
        self.state = next;

        for issue in &issues {
            self.collaborators.observer.on_error(issue);
        }

        let payload = CompletionPayload {
            user_id,
            outcome,
            detected_candidates: self.state.detected_candidates.clone(),
            answered: self.state.answers.len(),
            issues: issues.iter().map(ToString::to_string).collect(),
            completed_at: Utc::now(),
        };
        tracing::info!(
            outcome = payload.outcome.label(),
            score = self.state.score,
            issues = payload.issues.len(),
            "quiz session completed"
        );
        self.collaborators.observer.on_quiz_complete(&payload);

        Ok(payload)
    }

    /// Write every answer in id order; failures are collected, not rolled back.
    async fn persist(&self, user_id: &UserId) -> Result<(), QuizError> {
        let mut failed = Vec::new();
        let attempted = self.state.answers.len();

        for (question_id, value) in &self.state.answers {
            let record = ResponseRecord {
                user_id: user_id.clone(),
                question_id: *question_id,
                response: value.as_text(),
                recorded_at: Utc::now(),
            };
            if let Err(error) = self.collaborators.responses.record(record).await {
                tracing::warn!(question_id = %question_id, %error, "failed to persist answer");
                failed.push(*question_id);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(QuizError::PersistenceFailure { failed, attempted })
        }
    }
}

async fn load_questions(
    repository: &dyn QuestionRepository,
) -> Result<(Vec<Question>, Vec<Question>), QuizError> {
    let general = repository.general_questions().await?;
    let specialized = repository.specialized_questions().await?;

    if general.is_empty() {
        return Err(QuizError::FetchFailure(
            "no general questions available".to_string(),
        ));
    }

    Ok((general, specialized))
}
