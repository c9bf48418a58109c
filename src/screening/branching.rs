use super::domain::{AnswerValue, Question, QuestionId};
use super::ConfigurationFault;

/// Where the quiz goes after the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Index(usize),
    EndOfSet,
}

/// Resolve the index of the next question inside `active_set`.
///
/// A literal rule matching the answer wins; `default` only applies when no
/// literal matches. A chosen target outside the active set is logged and the
/// quiz moves on sequentially.
pub fn resolve_next(
    question: &Question,
    answer: &AnswerValue,
    active_set: &[Question],
    current_index: usize,
) -> Next {
    if let Some(rules) = &question.branch_rules {
        let literal = answer.as_text();
        if let Some(target) = rules.target_for(&literal).or(rules.default) {
            match position_of(target, active_set) {
                Some(index) => {
                    tracing::debug!(from = %question.id, to = %target, "branch rule applied");
                    return Next::Index(index);
                }
                None => ConfigurationFault::BranchTargetNotFound {
                    question: question.id,
                    target,
                }
                .log(),
            }
        }
    }

    let sequential = current_index.saturating_add(1);
    if sequential < active_set.len() {
        Next::Index(sequential)
    } else {
        Next::EndOfSet
    }
}

fn position_of(target: QuestionId, active_set: &[Question]) -> Option<usize> {
    active_set.iter().position(|question| question.id == target)
}
