//! The per-session flow state machine.

use super::state::{FlowAction, FlowState, TRANSITIONS, target_of};
use crate::error::{CasewiseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of applied transitions retained in the history ring.
pub const HISTORY_LIMIT: usize = 10;

/// One applied transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub from: FlowState,
    pub to: FlowState,
    pub action: FlowAction,
    pub at: DateTime<Utc>,
}

/// Snapshot of a machine for read-only views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateInfo {
    pub current_state: FlowState,
    pub valid_actions: Vec<FlowAction>,
    pub history: Vec<StateChange>,
}

/// Validates and applies flow transitions for a single session.
///
/// The machine performs no I/O. A rejected transition leaves it untouched.
#[derive(Debug, Clone)]
pub struct FlowStateMachine {
    current: FlowState,
    history: VecDeque<StateChange>,
}

impl FlowStateMachine {
    pub fn new() -> Self {
        Self::resume(FlowState::Initialized)
    }

    /// Rebuilds a machine positioned at a persisted state, with empty history.
    pub fn resume(state: FlowState) -> Self {
        Self {
            current: state,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    pub fn current(&self) -> FlowState {
        self.current
    }

    pub fn can_transition(&self, to: FlowState, action: FlowAction) -> bool {
        target_of(self.current, action) == Some(to)
    }

    /// Whether `action` has an edge out of the current state.
    pub fn can_apply(&self, action: FlowAction) -> bool {
        target_of(self.current, action).is_some()
    }

    pub fn transition(&mut self, to: FlowState, action: FlowAction) -> Result<()> {
        if !self.can_transition(to, action) {
            return Err(CasewiseError::invalid_transition(self.current, action.as_ref()));
        }
        self.record(to, action);
        Ok(())
    }

    /// Applies `action` along its unique edge and returns the new state.
    pub fn apply(&mut self, action: FlowAction) -> Result<FlowState> {
        let to = target_of(self.current, action)
            .ok_or_else(|| CasewiseError::invalid_transition(self.current, action.as_ref()))?;
        self.record(to, action);
        Ok(to)
    }

    pub fn valid_actions(&self) -> Vec<FlowAction> {
        TRANSITIONS
            .iter()
            .filter(|(from, _, _)| *from == self.current)
            .map(|(_, action, _)| *action)
            .collect()
    }

    pub fn history(&self) -> impl Iterator<Item = &StateChange> {
        self.history.iter()
    }

    pub fn state_info(&self) -> StateInfo {
        StateInfo {
            current_state: self.current,
            valid_actions: self.valid_actions(),
            history: self.history.iter().cloned().collect(),
        }
    }

    /// Returns to `Initialized` unconditionally and forgets the history.
    pub fn reset(&mut self) {
        self.current = FlowState::Initialized;
        self.history.clear();
    }

    fn record(&mut self, to: FlowState, action: FlowAction) {
        tracing::debug!(
            target: "flow",
            from = %self.current,
            to = %to,
            action = %action,
            "state transition"
        );
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(StateChange {
            from: self.current,
            to,
            action,
            at: Utc::now(),
        });
        self.current = to;
    }
}

impl Default for FlowStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(machine: &mut FlowStateMachine, actions: &[FlowAction]) {
        for action in actions {
            machine.apply(*action).unwrap();
        }
    }

    #[test]
    fn test_new_machine_starts_initialized() {
        let machine = FlowStateMachine::new();
        assert_eq!(machine.current(), FlowState::Initialized);
        assert_eq!(machine.valid_actions(), vec![FlowAction::LoadCase]);
    }

    #[test]
    fn test_happy_path_reaches_completion() {
        let mut machine = FlowStateMachine::new();
        walk(
            &mut machine,
            &[
                FlowAction::LoadCase,
                FlowAction::StartQuestions,
                FlowAction::AskQuestion,
                FlowAction::SubmitAnswer,
                FlowAction::GradeComplete,
                FlowAction::AllComplete,
            ],
        );
        assert_eq!(machine.current(), FlowState::SessionComplete);
        assert!(machine.valid_actions().is_empty());
    }

    #[test]
    fn test_follow_up_loop_returns_to_awaiting_answer() {
        let mut machine = FlowStateMachine::new();
        walk(
            &mut machine,
            &[
                FlowAction::LoadCase,
                FlowAction::StartQuestions,
                FlowAction::AskQuestion,
                FlowAction::SubmitAnswer,
                FlowAction::GradeComplete,
                FlowAction::NeedsFollowUp,
                FlowAction::AskFollowUp,
            ],
        );
        assert_eq!(machine.current(), FlowState::AwaitingAnswer);
    }

    #[test]
    fn test_invalid_transition_does_not_mutate() {
        let mut machine = FlowStateMachine::new();
        let err = machine
            .transition(FlowState::GradingAnswer, FlowAction::SubmitAnswer)
            .unwrap_err();

        match err {
            CasewiseError::InvalidStateTransition {
                current_state,
                action,
            } => {
                assert_eq!(current_state, FlowState::Initialized);
                assert_eq!(action, "submit_answer");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(machine.current(), FlowState::Initialized);
        assert_eq!(machine.history().count(), 0);
    }

    #[test]
    fn test_transition_requires_matching_target() {
        let mut machine = FlowStateMachine::new();
        assert!(!machine.can_transition(FlowState::AskingDiagnostic, FlowAction::LoadCase));
        assert!(machine
            .transition(FlowState::AskingDiagnostic, FlowAction::LoadCase)
            .is_err());
        assert!(machine
            .transition(FlowState::CaseLoaded, FlowAction::LoadCase)
            .is_ok());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut machine = FlowStateMachine::new();
        walk(&mut machine, &[FlowAction::LoadCase, FlowAction::StartQuestions]);
        for _ in 0..6 {
            walk(
                &mut machine,
                &[
                    FlowAction::AskQuestion,
                    FlowAction::SubmitAnswer,
                    FlowAction::GradeComplete,
                    FlowAction::NextQuestion,
                ],
            );
        }

        let history: Vec<_> = machine.history().collect();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.last().unwrap().to, FlowState::AskingDiagnostic);
    }

    #[test]
    fn test_error_recovers_only_through_reset() {
        let mut machine = FlowStateMachine::new();
        walk(
            &mut machine,
            &[FlowAction::LoadCase, FlowAction::StartQuestions, FlowAction::Error],
        );
        assert_eq!(machine.current(), FlowState::Error);
        assert_eq!(machine.valid_actions(), vec![FlowAction::Reset]);
        assert!(machine.apply(FlowAction::AskQuestion).is_err());

        machine.apply(FlowAction::Reset).unwrap();
        assert_eq!(machine.current(), FlowState::Initialized);
        assert_eq!(machine.history().count(), 4);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut machine = FlowStateMachine::new();
        walk(&mut machine, &[FlowAction::LoadCase]);
        machine.reset();
        assert_eq!(machine.current(), FlowState::Initialized);
        assert_eq!(machine.state_info().history.len(), 0);
    }

    #[test]
    fn test_resume_positions_machine() {
        let machine = FlowStateMachine::resume(FlowState::DecidingFollowUp);
        let actions = machine.valid_actions();
        assert_eq!(actions.len(), 4);
        assert!(actions.contains(&FlowAction::ProvideTeaching));
    }
}
