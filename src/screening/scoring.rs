use serde::{Deserialize, Serialize};

use super::domain::{AnswerValue, Answers, Question, QuestionId, QuestionKind};
use super::ConfigurationFault;

/// Discrete contribution of one answered question, kept for audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub question_id: QuestionId,
    pub contribution: f64,
    pub notes: String,
}

/// Weighted risk score over a set of answered questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub score: u32,
    /// Sum of the weights of every answered question.
    pub max_score: u32,
    /// `score` as a share of `max_score`, 0-100.
    pub percentage: u8,
    pub components: Vec<ScoreComponent>,
}

pub fn score(answers: &Answers, questions: &[Question]) -> ScoreBreakdown {
    let mut components = Vec::new();
    let mut total = 0.0_f64;
    let mut max_possible = 0.0_f64;

    for question in questions {
        let Some(answer) = answers.get(&question.id) else {
            continue;
        };
        max_possible += question.weight;

        let Some((contribution, notes)) = contribution(question, answer) else {
            continue;
        };
        total += contribution;
        components.push(ScoreComponent {
            question_id: question.id,
            contribution,
            notes,
        });
    }

    let score = round_to_u32(total);
    let max_score = round_to_u32(max_possible);
    let percentage = if max_score == 0 {
        0
    } else {
        ((f64::from(score) / f64::from(max_score)) * 100.0)
            .round()
            .clamp(0.0, 100.0) as u8
    };

    ScoreBreakdown {
        score,
        max_score,
        percentage,
        components,
    }
}

/// `None` means the question is skipped entirely.
fn contribution(question: &Question, answer: &AnswerValue) -> Option<(f64, String)> {
    match &question.kind {
        QuestionKind::Boolean => {
            if answer.is_positive() {
                Some((question.weight, "positive answer".to_string()))
            } else {
                Some((0.0, format!("answered `{}`", answer.as_text())))
            }
        }
        QuestionKind::Range { min, max, .. } => {
            if max == min {
                ConfigurationFault::DegenerateRange {
                    question: question.id,
                }
                .log();
                return Some((0.0, "degenerate range".to_string()));
            }
            let Some(value) = answer.as_number() else {
                tracing::warn!(
                    question_id = %question.id,
                    answer = %answer.as_text(),
                    "non-numeric answer to range question"
                );
                return Some((0.0, "non-numeric answer".to_string()));
            };
            let fraction = ((value - min) / (max - min)).clamp(0.0, 1.0);
            let contribution = (question.weight * fraction).round();
            Some((contribution, format!("{value} on a {min}-{max} scale")))
        }
        QuestionKind::Select { choices } => {
            let literal = answer.as_text();
            let Some(index) = choices.iter().position(|choice| choice == &literal) else {
                ConfigurationFault::UnknownOption {
                    question: question.id,
                    answer: literal,
                }
                .log();
                return None;
            };
            if choices.len() < 2 {
                return Some((0.0, "single-choice select".to_string()));
            }
            let fraction = index as f64 / (choices.len() - 1) as f64;
            let contribution = (question.weight * fraction).round();
            Some((contribution, format!("choice {} of {}", index + 1, choices.len())))
        }
    }
}

fn round_to_u32(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}
