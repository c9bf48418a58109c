//! Traversal across the general phase and the queue of specialized phases.

use std::collections::VecDeque;

use super::detection::detect;
use super::domain::{Question, GENERAL_CATEGORY};
use super::state::{Phase, SessionState, Terminal};

/// Result of handling an end-of-set event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A new question set is active.
    Continue,
    Finished(Terminal),
}

/// Questions belonging to one candidate condition, in id order.
pub fn questions_for(specialized: &[Question], candidate: &str) -> Vec<Question> {
    specialized
        .iter()
        .filter(|question| question.category == candidate)
        .cloned()
        .collect()
}

/// Apply the end-of-set transition to `state`, returning the next state.
pub fn on_end_of_set(
    state: &SessionState,
    general: &[Question],
    specialized: &[Question],
) -> (SessionState, Advance) {
    let mut next = state.clone();

    match state.phase {
        Phase::General => {
            let detection = detect(&state.answers, general);
            next.any_positive_general_answer = detection.any_positive;
            next.detected_candidates = detection.candidates.clone();

            if !detection.any_positive || detection.is_general_only() {
                tracing::info!(
                    any_positive = detection.any_positive,
                    "no candidate condition detected"
                );
                return finish(next, Terminal::Healthy);
            }

            tracing::info!(candidates = ?detection.candidates, "candidate conditions detected");
            next.candidate_queue = detection.candidates.into_iter().collect();
            next.active_candidate = None;
            advance_queue(next, specialized)
        }
        Phase::Specialized => advance_queue(next, specialized),
        Phase::Done => (next, Advance::Finished(done_terminal(state))),
    }
}

/// Questions the final score is computed over: every general question plus
/// the specialized questions of every detected candidate.
pub fn scoring_set(
    state: &SessionState,
    general: &[Question],
    specialized: &[Question],
) -> Vec<Question> {
    general
        .iter()
        .chain(
            specialized
                .iter()
                .filter(|question| state.detected_candidates.contains(&question.category)),
        )
        .cloned()
        .collect()
}

/// Condition scope used for the tier lookup.
pub fn tier_scope(state: &SessionState) -> Option<String> {
    state
        .active_candidate
        .clone()
        .filter(|candidate| candidate != GENERAL_CATEGORY)
}

fn advance_queue(mut state: SessionState, specialized: &[Question]) -> (SessionState, Advance) {
    while let Some(candidate) = state.candidate_queue.pop_front() {
        let questions = questions_for(specialized, &candidate);
        state.active_candidate = Some(candidate);

        if questions.is_empty() {
            tracing::debug!(
                candidate = state.active_candidate.as_deref(),
                "candidate has no specialized questions; skipping"
            );
            continue;
        }

        tracing::info!(
            candidate = state.active_candidate.as_deref(),
            questions = questions.len(),
            remaining = state.candidate_queue.len(),
            "entering specialized phase"
        );
        state.phase = Phase::Specialized;
        state.active_questions = questions;
        state.current_index = 0;
        return (state, Advance::Continue);
    }

    finish(state, Terminal::Assessment)
}

fn finish(mut state: SessionState, terminal: Terminal) -> (SessionState, Advance) {
    state.phase = Phase::Done;
    state.candidate_queue = VecDeque::new();
    state.terminal = Some(terminal);
    (state, Advance::Finished(terminal))
}

fn done_terminal(state: &SessionState) -> Terminal {
    state.terminal.unwrap_or(Terminal::Assessment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::domain::{AnswerValue, ConditionHint, QuestionId, QuestionKind};

    fn question(id: u32, category: &str, hints: &[(&str, f64)]) -> Question {
        Question {
            id: QuestionId(id),
            text: format!("Q{id}"),
            kind: QuestionKind::Boolean,
            weight: 10.0,
            category: category.to_string(),
            branch_rules: None,
            condition_hints: hints
                .iter()
                .map(|(label, weight)| ConditionHint {
                    label: label.to_string(),
                    weight: *weight,
                })
                .collect(),
        }
    }

    fn answered(state: &SessionState, id: u32, value: &str) -> SessionState {
        let mut next = state.clone();
        next.answers.insert(QuestionId(id), AnswerValue::from(value));
        next
    }

    fn general() -> Vec<Question> {
        vec![question(1, "general", &[("a", 3.0), ("b", 2.0), ("c", 1.0)])]
    }

    #[test]
    fn drains_queue_in_detection_order_skipping_empty_sets() {
        let general = general();
        let specialized = vec![
            question(10, "a", &[]),
            question(11, "a", &[]),
            question(30, "c", &[]),
        ];
        let state = answered(&SessionState::initial(&general), 1, "Yes");

        let (state, advance) = on_end_of_set(&state, &general, &specialized);
        assert_eq!(advance, Advance::Continue);
        assert_eq!(state.phase, Phase::Specialized);
        assert_eq!(state.active_candidate.as_deref(), Some("a"));
        assert_eq!(state.active_questions.len(), 2);
        assert_eq!(state.candidate_queue, VecDeque::from(vec!["b".to_string(), "c".to_string()]));

        // "b" has no questions and is skipped without asking anything.
        let (state, advance) = on_end_of_set(&state, &general, &specialized);
        assert_eq!(advance, Advance::Continue);
        assert_eq!(state.active_candidate.as_deref(), Some("c"));
        assert_eq!(state.active_questions[0].id, QuestionId(30));
        assert!(state.candidate_queue.is_empty());

        let (state, advance) = on_end_of_set(&state, &general, &specialized);
        assert_eq!(advance, Advance::Finished(Terminal::Assessment));
        assert_eq!(state.phase, Phase::Done);
        assert_eq!(tier_scope(&state).as_deref(), Some("c"));
    }

    #[test]
    fn negative_general_answers_finish_healthy() {
        let general = general();
        let state = answered(&SessionState::initial(&general), 1, "No");
        let (state, advance) = on_end_of_set(&state, &general, &[]);
        assert_eq!(advance, Advance::Finished(Terminal::Healthy));
        assert!(!state.any_positive_general_answer);
        assert_eq!(state.terminal, Some(Terminal::Healthy));
    }

    #[test]
    fn candidates_without_questions_finish_with_assessment() {
        let general = general();
        let state = answered(&SessionState::initial(&general), 1, "Yes");
        let (state, advance) = on_end_of_set(&state, &general, &[]);
        assert_eq!(advance, Advance::Finished(Terminal::Assessment));
        assert_eq!(state.detected_candidates, vec!["a", "b", "c"]);
        assert!(state.candidate_queue.is_empty());
    }

    #[test]
    fn queue_never_holds_the_active_candidate() {
        let general = general();
        let specialized = vec![question(10, "a", &[]), question(20, "b", &[])];
        let state = answered(&SessionState::initial(&general), 1, "Yes");
        let (state, _) = on_end_of_set(&state, &general, &specialized);
        let active = state.active_candidate.clone().expect("active candidate");
        assert!(!state.candidate_queue.contains(&active));
    }

    #[test]
    fn scoring_set_covers_general_and_detected_categories() {
        let general = general();
        let specialized = vec![question(10, "a", &[]), question(40, "z", &[])];
        let mut state = SessionState::initial(&general);
        state.detected_candidates = vec!["a".to_string()];
        let ids: Vec<_> = scoring_set(&state, &general, &specialized)
            .iter()
            .map(|question| question.id)
            .collect();
        assert_eq!(ids, vec![QuestionId(1), QuestionId(10)]);
    }
}
