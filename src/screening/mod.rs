//! Adaptive screening quiz: branching, candidate detection, phase queueing,
//! scoring, and the session orchestrator tying them together.

pub mod branching;
pub mod catalog;
pub mod controller;
pub mod detection;
pub mod domain;
mod error;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod session;
pub mod state;
pub mod tiers;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, QuestionCatalog, QuestionRow};
pub use detection::Detection;
pub use domain::{
    AnswerValue, Answers, BranchRules, ConditionHint, Question, QuestionId, QuestionKind,
    ResponseRecord, RiskTier, UserId, GENERAL_CATEGORY, NEGATIVE_ANSWER, POSITIVE_ANSWER,
};
pub use error::{ConfigurationFault, QuizError};
pub use repository::{
    Anonymous, IdentityProvider, QuestionRepository, QuizObserver, RepositoryError,
    ResponseStore, RiskTierLookup, SubmittedAnswer, TracingObserver,
};
pub use router::screening_router;
pub use scoring::{ScoreBreakdown, ScoreComponent};
pub use service::{ScreeningService, ServiceError, SessionId};
pub use session::{Collaborators, CompletionPayload, QuizSession, SubmitOutcome};
pub use state::{Phase, QuizOutcome, SessionState, SessionView, Terminal};
pub use tiers::{RiskTierTable, TierTableError};
