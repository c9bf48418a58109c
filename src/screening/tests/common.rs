use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Value};

use crate::screening::catalog::{QuestionCatalog, QuestionRow};
use crate::screening::domain::{Question, QuestionId, ResponseRecord, RiskTier, UserId};
use crate::screening::repository::{
    IdentityProvider, QuestionRepository, QuizObserver, RepositoryError, ResponseStore,
    RiskTierLookup, SubmittedAnswer,
};
use crate::screening::service::ScreeningService;
use crate::screening::session::{Collaborators, CompletionPayload};
use crate::screening::tiers::RiskTierTable;
use crate::screening::QuizError;

fn row(value: Value) -> QuestionRow {
    serde_json::from_value(value).expect("fixture row deserializes")
}

/// G1 (hint skin:5), G2 (no hints) and one skin range question.
pub(super) fn skin_catalog() -> QuestionCatalog {
    QuestionCatalog::from_rows(vec![
        row(json!({
            "id": 1, "text": "New or changing moles?", "type": "boolean", "weight": 10,
            "category": "general", "condition_hints": { "skin": 5 }
        })),
        row(json!({
            "id": 2, "text": "Persistent fatigue?", "type": "boolean", "weight": 10,
            "category": "general"
        })),
        row(json!({
            "id": 11, "text": "Hours in direct sun per day", "type": "range",
            "options": { "min": 0, "max": 10, "step": 1 }, "weight": 20, "category": "skin"
        })),
    ])
    .expect("skin catalog is valid")
}

/// One general question implicating three candidates; "b" has no questions.
pub(super) fn queue_catalog() -> QuestionCatalog {
    QuestionCatalog::from_rows(vec![
        row(json!({
            "id": 1, "text": "Any symptoms?", "type": "boolean", "weight": 10,
            "category": "general", "condition_hints": { "a": 3, "b": 2, "c": 1 }
        })),
        row(json!({
            "id": 10, "text": "A first", "type": "boolean", "weight": 5, "category": "a"
        })),
        row(json!({
            "id": 11, "text": "A second", "type": "select",
            "options": { "choices": ["Low", "Mid", "High"] }, "weight": 10, "category": "a"
        })),
        row(json!({
            "id": 30, "text": "C only", "type": "boolean", "weight": 5, "category": "c"
        })),
    ])
    .expect("queue catalog is valid")
}

pub(super) fn tier(min: u32, max: u32, level: &str, scope: Option<&str>) -> RiskTier {
    RiskTier {
        min_score: min,
        max_score: max,
        risk_level: level.to_string(),
        advice: format!("{level} advice"),
        foods_to_eat: vec!["Broccoli".to_string()],
        foods_to_avoid: vec!["Alcohol".to_string()],
        condition_scope: scope.map(str::to_string),
    }
}

pub(super) fn tier_table() -> RiskTierTable {
    RiskTierTable::new(vec![
        tier(0, 15, "Low", None),
        tier(16, 1000, "High", None),
        tier(0, 30, "Skin moderate", Some("skin")),
        tier(31, 1000, "Skin high", Some("skin")),
    ])
    .expect("tier fixture valid")
}

/// Question repository that counts how often it is queried.
pub(super) struct CountingQuestions {
    catalog: QuestionCatalog,
    pub(super) calls: AtomicUsize,
}

impl CountingQuestions {
    pub(super) fn new(catalog: QuestionCatalog) -> Self {
        Self {
            catalog,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionRepository for CountingQuestions {
    async fn general_questions(&self) -> Result<Vec<Question>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.catalog.general().to_vec())
    }

    async fn specialized_questions(&self) -> Result<Vec<Question>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.catalog.specialized().to_vec())
    }
}

pub(super) struct UnavailableQuestions;

#[async_trait]
impl QuestionRepository for UnavailableQuestions {
    async fn general_questions(&self) -> Result<Vec<Question>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    async fn specialized_questions(&self) -> Result<Vec<Question>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Response store that keeps every record and can reject chosen questions.
#[derive(Default)]
pub(super) struct MemoryResponses {
    records: Mutex<Vec<ResponseRecord>>,
    reject: Vec<QuestionId>,
}

impl MemoryResponses {
    pub(super) fn rejecting(reject: Vec<QuestionId>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            reject,
        }
    }

    pub(super) fn records(&self) -> Vec<ResponseRecord> {
        self.records.lock().expect("responses mutex poisoned").clone()
    }
}

#[async_trait]
impl ResponseStore for MemoryResponses {
    async fn record(&self, record: ResponseRecord) -> Result<(), RepositoryError> {
        if self.reject.contains(&record.question_id) {
            return Err(RepositoryError::Unavailable("write rejected".to_string()));
        }
        self.records
            .lock()
            .expect("responses mutex poisoned")
            .push(record);
        Ok(())
    }
}

/// Tier lookup that remembers every `(score, scope)` it was asked for.
pub(super) struct RecordingTiers {
    table: RiskTierTable,
    lookups: Mutex<Vec<(u32, Option<String>)>>,
}

impl RecordingTiers {
    pub(super) fn new(table: RiskTierTable) -> Self {
        Self {
            table,
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn lookups(&self) -> Vec<(u32, Option<String>)> {
        self.lookups.lock().expect("lookups mutex poisoned").clone()
    }
}

#[async_trait]
impl RiskTierLookup for RecordingTiers {
    async fn find_tier(
        &self,
        score: u32,
        scope: Option<&str>,
    ) -> Result<Option<RiskTier>, RepositoryError> {
        self.lookups
            .lock()
            .expect("lookups mutex poisoned")
            .push((score, scope.map(str::to_string)));
        self.table.find_tier(score, scope).await
    }
}

/// Identity that can be switched between signed-in and anonymous.
#[derive(Default)]
pub(super) struct SwitchableIdentity {
    user: Mutex<Option<UserId>>,
}

impl SwitchableIdentity {
    pub(super) fn signed_in(user: &str) -> Self {
        Self {
            user: Mutex::new(Some(UserId(user.to_string()))),
        }
    }

    pub(super) fn sign_in(&self, user: &str) {
        *self.user.lock().expect("identity mutex poisoned") = Some(UserId(user.to_string()));
    }
}

impl IdentityProvider for SwitchableIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user.lock().expect("identity mutex poisoned").clone()
    }
}

/// Observer capturing callback names in call order.
#[derive(Default)]
pub(super) struct MemoryObserver {
    events: Mutex<Vec<String>>,
}

impl MemoryObserver {
    pub(super) fn events(&self) -> Vec<String> {
        self.events.lock().expect("observer mutex poisoned").clone()
    }

    fn push(&self, event: String) {
        self.events
            .lock()
            .expect("observer mutex poisoned")
            .push(event);
    }
}

impl QuizObserver for MemoryObserver {
    fn on_answer_submitted(&self, answer: &SubmittedAnswer) {
        self.push(format!("answer:{}", answer.question_id));
    }

    fn on_quiz_complete(&self, payload: &CompletionPayload) {
        self.push(format!("complete:{}", payload.outcome.label()));
    }

    fn on_error(&self, error: &QuizError) {
        self.push(format!("error:{}", error.kind()));
    }
}

/// Handles onto every collaborator so tests can inspect side effects.
pub(super) struct Harness {
    pub(super) questions: Arc<CountingQuestions>,
    pub(super) responses: Arc<MemoryResponses>,
    pub(super) tiers: Arc<RecordingTiers>,
    pub(super) identity: Arc<SwitchableIdentity>,
    pub(super) observer: Arc<MemoryObserver>,
}

impl Harness {
    pub(super) fn new(catalog: QuestionCatalog) -> Self {
        Self::with_parts(
            catalog,
            MemoryResponses::default(),
            SwitchableIdentity::signed_in("user-1"),
        )
    }

    pub(super) fn with_parts(
        catalog: QuestionCatalog,
        responses: MemoryResponses,
        identity: SwitchableIdentity,
    ) -> Self {
        Self {
            questions: Arc::new(CountingQuestions::new(catalog)),
            responses: Arc::new(responses),
            tiers: Arc::new(RecordingTiers::new(tier_table())),
            identity: Arc::new(identity),
            observer: Arc::new(MemoryObserver::default()),
        }
    }

    /// Service sharing this harness' collaborators; identity comes per call.
    pub(super) fn service(&self) -> Arc<ScreeningService> {
        Arc::new(self.bare_service())
    }

    pub(super) fn bare_service(&self) -> ScreeningService {
        ScreeningService::new(
            self.questions.clone(),
            self.responses.clone(),
            self.tiers.clone(),
            self.observer.clone(),
        )
    }

    pub(super) fn collaborators(&self) -> Collaborators {
        Collaborators {
            questions: self.questions.clone(),
            responses: self.responses.clone(),
            tiers: self.tiers.clone(),
            identity: self.identity.clone(),
            observer: self.observer.clone(),
        }
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
