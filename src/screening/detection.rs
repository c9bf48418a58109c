use serde::Serialize;

use super::domain::{Answers, Question, GENERAL_CATEGORY};

/// Candidate conditions implicated by the general-phase answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Descending by accumulated hint weight; ties keep discovery order.
    pub candidates: Vec<String>,
    pub any_positive: bool,
}

impl Detection {
    /// True when no specific condition was implicated.
    pub fn is_general_only(&self) -> bool {
        self.candidates.iter().all(|label| label == GENERAL_CATEGORY)
    }
}

pub fn detect(answers: &Answers, general_questions: &[Question]) -> Detection {
    // Seeded in discovery order so the stable sort below keeps that order on ties.
    let mut scores: Vec<(String, f64)> = Vec::new();
    for question in general_questions {
        for hint in &question.condition_hints {
            if !scores.iter().any(|(label, _)| label == &hint.label) {
                scores.push((hint.label.clone(), 0.0));
            }
        }
    }

    let mut any_positive = false;
    for question in general_questions {
        let Some(answer) = answers.get(&question.id) else {
            continue;
        };
        if answer.is_negative_or_empty() {
            continue;
        }
        any_positive = true;

        for hint in &question.condition_hints {
            if let Some((_, total)) = scores.iter_mut().find(|(label, _)| label == &hint.label) {
                *total += hint.weight;
            }
        }
    }

    let max = scores
        .iter()
        .map(|(_, total)| *total)
        .fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return Detection {
            candidates: vec![GENERAL_CATEGORY.to_string()],
            any_positive,
        };
    }

    let mut positive: Vec<(String, f64)> = scores
        .into_iter()
        .filter(|(_, total)| *total > 0.0)
        .collect();
    positive.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut candidates: Vec<String> = positive.into_iter().map(|(label, _)| label).collect();
    if candidates.iter().any(|label| label != GENERAL_CATEGORY) {
        candidates.retain(|label| label != GENERAL_CATEGORY);
    }

    Detection {
        candidates,
        any_positive,
    }
}
