use super::domain::QuestionId;
use super::repository::RepositoryError;

/// Failures surfaced to the presentation layer. None of them end the session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuizError {
    #[error("failed to fetch quiz data: {0}")]
    FetchFailure(String),
    #[error("sign in to save your screening results")]
    AuthenticationRequired,
    #[error("{} of {attempted} answers could not be saved", .failed.len())]
    PersistenceFailure {
        failed: Vec<QuestionId>,
        attempted: usize,
    },
    #[error("no risk tier covers score {score}")]
    NoTierMatch { score: u32 },
    #[error("expected an answer for question {expected}, received {received}")]
    UnexpectedQuestion {
        expected: QuestionId,
        received: QuestionId,
    },
    #[error("quiz already completed; reset to start again")]
    AlreadyCompleted,
    #[error("quiz is finished but results are not saved yet")]
    CompletionPending,
    #[error("quiz still has unanswered questions")]
    NotFinished,
}

impl QuizError {
    pub const fn kind(&self) -> &'static str {
        match self {
            QuizError::FetchFailure(_) => "fetch_failure",
            QuizError::AuthenticationRequired => "authentication_required",
            QuizError::PersistenceFailure { .. } => "persistence_failure",
            QuizError::NoTierMatch { .. } => "no_tier_match",
            QuizError::UnexpectedQuestion { .. } => "unexpected_question",
            QuizError::AlreadyCompleted => "already_completed",
            QuizError::CompletionPending => "completion_pending",
            QuizError::NotFinished => "not_finished",
        }
    }
}

impl From<RepositoryError> for QuizError {
    fn from(value: RepositoryError) -> Self {
        QuizError::FetchFailure(value.to_string())
    }
}

/// Malformed configuration detected while running the quiz. These are
/// logged and replaced by a safe fallback, never returned to callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationFault {
    #[error("question {question} branches to {target}, which is not in the active set")]
    BranchTargetNotFound {
        question: QuestionId,
        target: QuestionId,
    },
    #[error("range question {question} has identical min and max")]
    DegenerateRange { question: QuestionId },
    #[error("answer `{answer}` is not an option of question {question}")]
    UnknownOption {
        question: QuestionId,
        answer: String,
    },
}

impl ConfigurationFault {
    pub fn log(&self) {
        let kind = match self {
            ConfigurationFault::BranchTargetNotFound { .. } => "branch_target_not_found",
            ConfigurationFault::DegenerateRange { .. } => "degenerate_range",
            ConfigurationFault::UnknownOption { .. } => "unknown_option",
        };
        tracing::warn!(kind, fault = %self, "ignoring malformed question configuration");
    }
}
