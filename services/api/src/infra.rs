use async_trait::async_trait;
use clap::Args;
use metrics_exporter_prometheus::PrometheusHandle;
use onco_screen::config::QuizDataConfig;
use onco_screen::error::AppError;
use onco_screen::screening::{
    AnswerValue, QuestionCatalog, QuestionId, RepositoryError, ResponseRecord, ResponseStore,
    RiskTierTable,
};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Response sink for local runs; records live as long as the process.
#[derive(Default, Clone)]
pub(crate) struct InMemoryResponseStore {
    records: Arc<Mutex<Vec<ResponseRecord>>>,
}

#[async_trait]
impl ResponseStore for InMemoryResponseStore {
    async fn record(&self, record: ResponseRecord) -> Result<(), RepositoryError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("response store poisoned".to_string()))?;
        guard.push(record);
        Ok(())
    }
}

impl InMemoryResponseStore {
    pub(crate) fn records(&self) -> Vec<ResponseRecord> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Seed data overrides shared by the offline subcommands.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct DataArgs {
    /// Question catalog JSON file (defaults to APP_QUESTIONS_PATH or the bundled seed)
    #[arg(long)]
    pub(crate) questions: Option<PathBuf>,
    /// Risk tier CSV file (defaults to APP_RISK_TIERS_PATH or the bundled seed)
    #[arg(long)]
    pub(crate) tiers: Option<PathBuf>,
}

impl DataArgs {
    pub(crate) fn resolve(self, configured: QuizDataConfig) -> QuizDataConfig {
        QuizDataConfig {
            questions_path: self.questions.or(configured.questions_path),
            risk_tiers_path: self.tiers.or(configured.risk_tiers_path),
        }
    }
}

pub(crate) fn load_seed_data(
    data: &QuizDataConfig,
) -> Result<(QuestionCatalog, RiskTierTable), AppError> {
    let catalog = data.load_catalog()?;
    let tiers = data.load_tiers()?;
    Ok((catalog, tiers))
}

/// Parse a scripted answer of the form `ID=VALUE`. Numeric values become
/// numbers; anything else is kept as text.
pub(crate) fn parse_answer(raw: &str) -> Result<(QuestionId, AnswerValue), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{raw}'"))?;
    let id = id
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("question id '{id}' is not a number ({err})"))?;
    let value = value.trim();
    let answer = match value.parse::<f64>() {
        Ok(number) if number.is_finite() => AnswerValue::Number(number),
        _ => AnswerValue::Text(value.to_string()),
    };
    Ok((QuestionId(id), answer))
}
