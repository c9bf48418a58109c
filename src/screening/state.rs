use std::collections::VecDeque;

use serde::Serialize;

use super::domain::{Answers, Question, RiskTier};
use super::scoring::ScoreBreakdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    General,
    Specialized,
    Done,
}

impl Phase {
    pub const fn label(self) -> &'static str {
        match self {
            Phase::General => "general",
            Phase::Specialized => "specialized",
            Phase::Done => "done",
        }
    }
}

/// Which terminal the traversal reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    /// No specific condition implicated; no score or tier is produced.
    Healthy,
    Assessment,
}

/// Final result attached to a completed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuizOutcome {
    Healthy,
    Assessed {
        breakdown: ScoreBreakdown,
        tier: Option<RiskTier>,
        scope: Option<String>,
    },
}

impl QuizOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            QuizOutcome::Healthy => "healthy",
            QuizOutcome::Assessed { .. } => "assessed",
        }
    }
}

/// Snapshot of a quiz traversal. Every orchestrator call produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub phase: Phase,
    pub active_questions: Vec<Question>,
    pub current_index: usize,
    pub answers: Answers,
    pub candidate_queue: VecDeque<String>,
    pub active_candidate: Option<String>,
    pub detected_candidates: Vec<String>,
    pub completed: bool,
    pub any_positive_general_answer: bool,
    pub terminal: Option<Terminal>,
    pub score: Option<u32>,
    pub result_tier: Option<RiskTier>,
    pub outcome: Option<QuizOutcome>,
}

impl SessionState {
    pub fn initial(general: &[Question]) -> Self {
        Self {
            phase: Phase::General,
            active_questions: general.to_vec(),
            current_index: 0,
            answers: Answers::new(),
            candidate_queue: VecDeque::new(),
            active_candidate: None,
            detected_candidates: Vec::new(),
            completed: false,
            any_positive_general_answer: false,
            terminal: None,
            score: None,
            result_tier: None,
            outcome: None,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        if self.phase == Phase::Done {
            return None;
        }
        self.active_questions.get(self.current_index)
    }

    /// Terminal reached but results not yet persisted (e.g. awaiting sign-in).
    pub fn is_pending_completion(&self) -> bool {
        self.phase == Phase::Done && !self.completed
    }

    pub fn view(&self) -> SessionView {
        let current_question = self.current_question().cloned();
        SessionView {
            phase: self.phase,
            position: current_question
                .as_ref()
                .map_or(0, |_| self.current_index + 1),
            current_question,
            set_size: self.active_questions.len(),
            answered: self.answers.len(),
            active_candidate: self.active_candidate.clone(),
            pending_candidates: self.candidate_queue.iter().cloned().collect(),
            detected_candidates: self.detected_candidates.clone(),
            completed: self.completed,
            pending_completion: self.is_pending_completion(),
            outcome: self.outcome.clone(),
        }
    }
}

/// Client-facing projection of [`SessionState`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<Question>,
    /// 1-based position in the active set; 0 once there is no current question.
    pub position: usize,
    pub set_size: usize,
    pub answered: usize,
    pub active_candidate: Option<String>,
    pub pending_candidates: Vec<String>,
    pub detected_candidates: Vec<String>,
    pub completed: bool,
    pub pending_completion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<QuizOutcome>,
}
