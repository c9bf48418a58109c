//! Question catalog loading and validation.
//!
//! Rows arrive with JSON-typed `options` and `branch_rules` columns. They are
//! converted into tagged [`QuestionKind`] variants here so that nothing
//! downstream has to inspect raw JSON again.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::domain::{BranchRules, ConditionHint, Question, QuestionId, QuestionKind};
use super::repository::{QuestionRepository, RepositoryError};

const BUNDLED_QUESTIONS: &str = include_str!("../../data/questions.json");

/// Repository row exactly as stored, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRow {
    pub id: u32,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(default)]
    pub options: Value,
    #[serde(default)]
    pub weight: f64,
    pub category: String,
    #[serde(default)]
    pub branch_rules: Value,
    #[serde(default)]
    pub condition_hints: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read question catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid question catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("question {id} is malformed: {reason}")]
    InvalidRow { id: u32, reason: String },
    #[error("question id {0} appears more than once")]
    DuplicateId(u32),
}

fn invalid(id: u32, reason: impl Into<String>) -> CatalogError {
    CatalogError::InvalidRow {
        id,
        reason: reason.into(),
    }
}

impl TryFrom<QuestionRow> for Question {
    type Error = CatalogError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let id = row.id;
        if !row.weight.is_finite() || row.weight < 0.0 {
            return Err(invalid(id, format!("weight {} must be non-negative", row.weight)));
        }
        if row.category.trim().is_empty() {
            return Err(invalid(id, "category is empty"));
        }

        let kind = parse_kind(id, &row.question_type, &row.options)?;
        let branch_rules = parse_branch_rules(id, &row.branch_rules)?;
        let condition_hints = parse_condition_hints(id, &row.condition_hints)?;

        Ok(Question {
            id: QuestionId(id),
            text: row.text,
            kind,
            weight: row.weight,
            category: row.category.trim().to_string(),
            branch_rules,
            condition_hints,
        })
    }
}

fn parse_kind(id: u32, question_type: &str, options: &Value) -> Result<QuestionKind, CatalogError> {
    match question_type.trim().to_ascii_lowercase().as_str() {
        "boolean" => Ok(QuestionKind::Boolean),
        "range" => {
            let fields = options
                .as_object()
                .ok_or_else(|| invalid(id, "range options must be an object"))?;
            let min = number_field(id, fields, "min")?;
            let max = number_field(id, fields, "max")?;
            let step = match fields.get("step") {
                None | Some(Value::Null) => 1.0,
                Some(_) => number_field(id, fields, "step")?,
            };
            if max < min {
                return Err(invalid(id, format!("range max {max} is below min {min}")));
            }
            Ok(QuestionKind::Range { min, max, step })
        }
        "select" => {
            // Both `{"choices": [...]}` and a bare array are seen in stored rows.
            let raw = match options {
                Value::Array(items) => items,
                Value::Object(fields) => fields
                    .get("choices")
                    .and_then(Value::as_array)
                    .ok_or_else(|| invalid(id, "select options need a `choices` array"))?,
                _ => return Err(invalid(id, "select options must list choices")),
            };
            let choices = raw
                .iter()
                .map(|choice| {
                    choice
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid(id, "select choices must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            if choices.is_empty() {
                return Err(invalid(id, "select question has no choices"));
            }
            Ok(QuestionKind::Select { choices })
        }
        other => Err(invalid(id, format!("unknown question type `{other}`"))),
    }
}

fn number_field(id: u32, fields: &Map<String, Value>, key: &str) -> Result<f64, CatalogError> {
    fields
        .get(key)
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
        .ok_or_else(|| invalid(id, format!("range option `{key}` must be a number")))
}

fn target_id(id: u32, value: &Value) -> Result<QuestionId, CatalogError> {
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|raw| u32::try_from(raw).ok())
        .map(QuestionId)
        .ok_or_else(|| invalid(id, format!("branch target {value} is not a question id")))
}

fn parse_branch_rules(id: u32, raw: &Value) -> Result<Option<BranchRules>, CatalogError> {
    let fields = match raw {
        Value::Null => return Ok(None),
        Value::Object(fields) => fields,
        _ => return Err(invalid(id, "branch_rules must be an object")),
    };

    let mut rules = BranchRules::default();
    for (literal, target) in fields {
        if literal == "default" {
            rules.default = Some(target_id(id, target)?);
        } else {
            rules.on_answer.push((literal.clone(), target_id(id, target)?));
        }
    }

    Ok((!rules.is_empty()).then_some(rules))
}

fn parse_condition_hints(id: u32, raw: &Value) -> Result<Vec<ConditionHint>, CatalogError> {
    let fields = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::Object(fields) => fields,
        _ => return Err(invalid(id, "condition_hints must be an object")),
    };

    fields
        .iter()
        .map(|(label, weight)| {
            let weight = weight
                .as_f64()
                .filter(|value| value.is_finite() && *value >= 0.0)
                .ok_or_else(|| invalid(id, format!("hint `{label}` needs a non-negative weight")))?;
            Ok(ConditionHint {
                label: label.trim().to_string(),
                weight,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    questions: Vec<QuestionRow>,
}

/// Validated questions split into the general and specialized partitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionCatalog {
    general: Vec<Question>,
    specialized: Vec<Question>,
}

impl QuestionCatalog {
    pub fn from_rows(rows: Vec<QuestionRow>) -> Result<Self, CatalogError> {
        let mut seen = BTreeSet::new();
        let mut general = Vec::new();
        let mut specialized = Vec::new();

        for row in rows {
            if !seen.insert(row.id) {
                return Err(CatalogError::DuplicateId(row.id));
            }
            let question = Question::try_from(row)?;
            if question.is_general() {
                general.push(question);
            } else {
                specialized.push(question);
            }
        }

        general.sort_by_key(|question| question.id);
        specialized.sort_by_key(|question| question.id);

        Ok(Self {
            general,
            specialized,
        })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_reader(reader)?;
        Self::from_rows(document.questions)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Seed catalog compiled into the binary.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_reader(BUNDLED_QUESTIONS.as_bytes())
    }

    pub fn general(&self) -> &[Question] {
        &self.general
    }

    pub fn specialized(&self) -> &[Question] {
        &self.specialized
    }

    /// Distinct specialized categories in id order of first appearance.
    pub fn conditions(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for question in &self.specialized {
            if !labels.contains(&question.category.as_str()) {
                labels.push(question.category.as_str());
            }
        }
        labels
    }
}

#[async_trait]
impl QuestionRepository for QuestionCatalog {
    async fn general_questions(&self) -> Result<Vec<Question>, RepositoryError> {
        Ok(self.general.clone())
    }

    async fn specialized_questions(&self) -> Result<Vec<Question>, RepositoryError> {
        Ok(self.specialized.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> QuestionRow {
        serde_json::from_value(value).expect("row deserializes")
    }

    #[test]
    fn converts_range_rows_into_tagged_kind() {
        let question = Question::try_from(row(json!({
            "id": 7,
            "text": "Hours of sun per day",
            "type": "range",
            "options": { "min": 0, "max": 10, "step": 1 },
            "weight": 20,
            "category": "skin"
        })))
        .expect("valid row");

        assert_eq!(
            question.kind,
            QuestionKind::Range {
                min: 0.0,
                max: 10.0,
                step: 1.0
            }
        );
        assert!(question.branch_rules.is_none());
    }

    #[test]
    fn branch_rules_keep_literal_and_default_targets() {
        let question = Question::try_from(row(json!({
            "id": 1,
            "text": "Do you smoke?",
            "type": "boolean",
            "weight": 10,
            "category": "general",
            "branch_rules": { "Yes": 2, "default": "4" }
        })))
        .expect("valid row");

        let rules = question.branch_rules.expect("rules parsed");
        assert_eq!(rules.target_for("Yes"), Some(QuestionId(2)));
        assert_eq!(rules.default, Some(QuestionId(4)));
    }

    #[test]
    fn condition_hints_preserve_source_order() {
        let question = Question::try_from(row(json!({
            "id": 3,
            "text": "Persistent cough?",
            "type": "boolean",
            "weight": 5,
            "category": "general",
            "condition_hints": { "lung": 4, "breast": 1, "colon": 2 }
        })))
        .expect("valid row");

        let labels: Vec<_> = question
            .condition_hints
            .iter()
            .map(|hint| hint.label.as_str())
            .collect();
        assert_eq!(labels, vec!["lung", "breast", "colon"]);
    }

    #[test]
    fn rejects_select_without_choices() {
        let err = Question::try_from(row(json!({
            "id": 9,
            "text": "Diet",
            "type": "select",
            "options": { "choices": [] },
            "weight": 5,
            "category": "colon"
        })))
        .expect_err("empty choices rejected");

        assert!(matches!(err, CatalogError::InvalidRow { id: 9, .. }));
    }

    #[test]
    fn rejects_unknown_types_and_duplicate_ids() {
        let err = Question::try_from(row(json!({
            "id": 2,
            "text": "Free text",
            "type": "text",
            "weight": 1,
            "category": "general"
        })))
        .expect_err("unknown type rejected");
        assert!(err.to_string().contains("unknown question type"));

        let duplicate = json!({
            "id": 1, "text": "a", "type": "boolean", "weight": 1, "category": "general"
        });
        let err = QuestionCatalog::from_rows(vec![row(duplicate.clone()), row(duplicate)])
            .expect_err("duplicate ids rejected");
        assert!(matches!(err, CatalogError::DuplicateId(1)));
    }

    #[test]
    fn bundled_catalog_partitions_by_category() {
        let catalog = QuestionCatalog::bundled().expect("bundled catalog loads");
        assert!(!catalog.general().is_empty());
        assert!(catalog.general().iter().all(Question::is_general));
        assert!(catalog.specialized().iter().all(|q| !q.is_general()));
        assert!(catalog
            .general()
            .windows(2)
            .all(|pair| pair[0].id < pair[1].id));
        assert!(catalog.conditions().contains(&"skin"));
    }
}
