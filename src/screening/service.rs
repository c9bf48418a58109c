use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AnswerValue, QuestionId, UserId};
use super::error::QuizError;
use super::repository::{
    IdentityProvider, QuestionRepository, QuizObserver, ResponseStore, RiskTierLookup,
};
use super::session::{Collaborators, CompletionPayload, QuizSession, SubmitOutcome};
use super::state::SessionState;

/// Identifier handed to clients for an in-memory quiz session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("quiz-{id:06}"))
}

/// Identity slot refreshed from each request that touches the session.
#[derive(Debug, Clone, Default)]
struct SessionIdentity {
    user: Arc<RwLock<Option<UserId>>>,
}

impl SessionIdentity {
    fn set(&self, user: Option<UserId>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct ManagedSession {
    quiz: QuizSession,
    identity: SessionIdentity,
}

type SessionHandle = Arc<tokio::sync::Mutex<ManagedSession>>;

struct SessionSlot {
    handle: SessionHandle,
    last_touched: DateTime<Utc>,
}

/// Sessions untouched for this long are dropped on the next `start`.
pub const DEFAULT_IDLE_TIMEOUT_MINUTES: u32 = 30;

/// Registry of live quiz sessions sharing one set of collaborators.
///
/// Each session sits behind its own async mutex so answers to the same
/// session are applied strictly one after another. A session leaves the
/// registry once its completion payload has been handed out, when it is
/// discarded, or when it has been idle longer than the idle timeout.
pub struct ScreeningService {
    questions: Arc<dyn QuestionRepository>,
    responses: Arc<dyn ResponseStore>,
    tiers: Arc<dyn RiskTierLookup>,
    observer: Arc<dyn QuizObserver>,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<SessionId, SessionSlot>>,
}

impl ScreeningService {
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        responses: Arc<dyn ResponseStore>,
        tiers: Arc<dyn RiskTierLookup>,
        observer: Arc<dyn QuizObserver>,
    ) -> Self {
        Self {
            questions,
            responses,
            tiers,
            observer,
            idle_timeout: Duration::minutes(i64::from(DEFAULT_IDLE_TIMEOUT_MINUTES)),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Start a new session and return its id and initial state.
    pub async fn start(
        &self,
        user: Option<UserId>,
    ) -> Result<(SessionId, SessionState), ServiceError> {
        self.evict_idle(Utc::now());

        let identity = SessionIdentity::default();
        identity.set(user);

        let collaborators = Collaborators {
            questions: self.questions.clone(),
            responses: self.responses.clone(),
            tiers: self.tiers.clone(),
            identity: Arc::new(identity.clone()),
            observer: self.observer.clone(),
        };
        let quiz = QuizSession::start(collaborators).await?;
        let state = quiz.state().clone();

        let id = next_session_id();
        let handle = Arc::new(tokio::sync::Mutex::new(ManagedSession { quiz, identity }));
        self.registry().insert(
            id.clone(),
            SessionSlot {
                handle,
                last_touched: Utc::now(),
            },
        );
        tracing::info!(session_id = %id, "screening session registered");

        Ok((id, state))
    }

    pub async fn state(&self, id: &SessionId) -> Result<SessionState, ServiceError> {
        let handle = self.handle(id)?;
        let managed = handle.lock().await;
        Ok(managed.quiz.state().clone())
    }

    pub async fn submit(
        &self,
        id: &SessionId,
        user: Option<UserId>,
        question_id: QuestionId,
        value: AnswerValue,
    ) -> Result<SubmitOutcome, ServiceError> {
        let handle = self.handle(id)?;
        let mut managed = handle.lock().await;
        managed.identity.set(user);
        let outcome = managed.quiz.submit_answer(question_id, value).await?;
        if matches!(outcome, SubmitOutcome::Completed { .. }) {
            self.release(id);
        }
        Ok(outcome)
    }

    pub async fn resume(
        &self,
        id: &SessionId,
        user: Option<UserId>,
    ) -> Result<CompletionPayload, ServiceError> {
        let handle = self.handle(id)?;
        let mut managed = handle.lock().await;
        managed.identity.set(user);
        let payload = managed.quiz.resume_completion().await?;
        self.release(id);
        Ok(payload)
    }

    pub async fn reset(&self, id: &SessionId) -> Result<SessionState, ServiceError> {
        let handle = self.handle(id)?;
        let mut managed = handle.lock().await;
        Ok(managed.quiz.reset().clone())
    }

    /// Drop an abandoned session. Nothing is persisted.
    pub fn discard(&self, id: &SessionId) -> bool {
        self.registry().remove(id).is_some()
    }

    pub fn active_sessions(&self) -> usize {
        self.registry().len()
    }

    /// Drop every session last touched at or before `now - idle_timeout`.
    /// Returns how many were removed.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.idle_timeout;
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|_, slot| slot.last_touched > cutoff);
        let evicted = before - registry.len();
        if evicted > 0 {
            tracing::info!(evicted, "idle screening sessions dropped");
        }
        evicted
    }

    fn release(&self, id: &SessionId) {
        if self.registry().remove(id).is_some() {
            tracing::info!(session_id = %id, "completed screening session released");
        }
    }

    fn handle(&self, id: &SessionId) -> Result<SessionHandle, ServiceError> {
        let mut registry = self.registry();
        let slot = registry
            .get_mut(id)
            .ok_or_else(|| ServiceError::SessionNotFound(id.clone()))?;
        slot.last_touched = Utc::now();
        Ok(slot.handle.clone())
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SessionSlot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Error raised by the screening service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}
