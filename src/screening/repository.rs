use async_trait::async_trait;

use super::domain::{Question, ResponseRecord, RiskTier, UserId};
use super::session::CompletionPayload;
use super::QuizError;

/// Source of the two question partitions, each ordered by id.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn general_questions(&self) -> Result<Vec<Question>, RepositoryError>;
    async fn specialized_questions(&self) -> Result<Vec<Question>, RepositoryError>;
}

/// Durable per-user answer log. One call per answered question.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn record(&self, record: ResponseRecord) -> Result<(), RepositoryError>;
}

/// Score range lookup, optionally narrowed to a candidate condition.
#[async_trait]
pub trait RiskTierLookup: Send + Sync {
    async fn find_tier(
        &self,
        score: u32,
        scope: Option<&str>,
    ) -> Result<Option<RiskTier>, RepositoryError>;
}

/// Supplies the currently authenticated user, if any.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// Presentation callbacks; every hook defaults to doing nothing.
pub trait QuizObserver: Send + Sync {
    fn on_answer_submitted(&self, _answer: &SubmittedAnswer) {}
    fn on_quiz_complete(&self, _payload: &CompletionPayload) {}
    fn on_error(&self, _error: &QuizError) {}
}

/// Snapshot handed to [`QuizObserver::on_answer_submitted`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedAnswer {
    pub question_id: super::domain::QuestionId,
    pub response: String,
    pub answered: usize,
}

/// Error enumeration for collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("malformed data: {0}")]
    Malformed(String),
}

/// Observer that forwards every callback to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl QuizObserver for TracingObserver {
    fn on_answer_submitted(&self, answer: &SubmittedAnswer) {
        tracing::debug!(
            question_id = %answer.question_id,
            response = %answer.response,
            answered = answer.answered,
            "answer submitted"
        );
    }

    fn on_quiz_complete(&self, payload: &CompletionPayload) {
        tracing::info!(outcome = payload.outcome.label(), "quiz complete");
    }

    fn on_error(&self, error: &QuizError) {
        tracing::warn!(kind = error.kind(), %error, "quiz error");
    }
}

/// Identity that never resolves; useful for anonymous previews.
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn current_user(&self) -> Option<UserId> {
        None
    }
}

impl IdentityProvider for UserId {
    fn current_user(&self) -> Option<UserId> {
        Some(self.clone())
    }
}
