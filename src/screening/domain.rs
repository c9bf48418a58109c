use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Category label reserved for the general screening phase.
pub const GENERAL_CATEGORY: &str = "general";

/// Answer literal treated as a positive response.
pub const POSITIVE_ANSWER: &str = "Yes";

/// Answer literal treated as a negative response (alongside the empty string).
pub const NEGATIVE_ANSWER: &str = "No";

/// Stable question identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub u32);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated user identifier supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Type-specific question parameters, validated once when the catalog loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Boolean,
    Range { min: f64, max: f64, step: f64 },
    Select { choices: Vec<String> },
}

impl QuestionKind {
    pub const fn label(&self) -> &'static str {
        match self {
            QuestionKind::Boolean => "boolean",
            QuestionKind::Range { .. } => "range",
            QuestionKind::Select { .. } => "select",
        }
    }
}

/// Per-question navigation overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchRules {
    /// Literal answer value mapped to the id of the next question.
    pub on_answer: Vec<(String, QuestionId)>,
    pub default: Option<QuestionId>,
}

impl BranchRules {
    pub fn target_for(&self, answer: &str) -> Option<QuestionId> {
        self.on_answer
            .iter()
            .find(|(literal, _)| literal == answer)
            .map(|(_, target)| *target)
    }

    pub fn is_empty(&self) -> bool {
        self.on_answer.is_empty() && self.default.is_none()
    }
}

/// Weight a general question contributes towards a candidate condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionHint {
    pub label: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    pub weight: f64,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_rules: Option<BranchRules>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub condition_hints: Vec<ConditionHint>,
}

impl Question {
    pub fn is_general(&self) -> bool {
        self.category == GENERAL_CATEGORY
    }
}

/// Raw answer payload; the presentation layer sends either text or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
}

impl AnswerValue {
    /// String form used for branch matching and persistence.
    pub fn as_text(&self) -> String {
        match self {
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::Number(value) => format_number(*value),
        }
    }

    /// Finite numeric reading of the answer; `NaN` and infinities are `None`.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            AnswerValue::Number(value) => Some(*value),
            AnswerValue::Text(text) => text.trim().parse::<f64>().ok(),
        };
        value.filter(|value| value.is_finite())
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, AnswerValue::Text(text) if text == POSITIVE_ANSWER)
    }

    /// Empty text and the negative literal both count as "no signal".
    pub fn is_negative_or_empty(&self) -> bool {
        match self {
            AnswerValue::Text(text) => text.trim().is_empty() || text == NEGATIVE_ANSWER,
            AnswerValue::Number(_) => false,
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        AnswerValue::Number(value)
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// One answer per question; later submissions overwrite earlier ones.
pub type Answers = BTreeMap<QuestionId, AnswerValue>;

/// Advice bracket selected by the final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTier {
    pub min_score: u32,
    pub max_score: u32,
    pub risk_level: String,
    pub advice: String,
    pub foods_to_eat: Vec<String>,
    pub foods_to_avoid: Vec<String>,
    /// `None` applies regardless of the detected candidate.
    pub condition_scope: Option<String>,
}

impl RiskTier {
    pub fn contains(&self, score: u32) -> bool {
        self.min_score <= score && score <= self.max_score
    }
}

/// Row persisted to the response store for every answered question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub response: String,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}
