//! Flow states, actions, and the transition table.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// A state of the diagnostic flow.
///
/// `SessionComplete` is the normal terminal state; `Error` is terminal until
/// a `Reset` is applied.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowState {
    Initialized,
    CaseLoaded,
    AskingDiagnostic,
    AwaitingAnswer,
    GradingAnswer,
    DecidingFollowUp,
    AskingFollowUp,
    ProvidingTeaching,
    SessionComplete,
    Error,
}

impl FlowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowState::SessionComplete | FlowState::Error)
    }
}

/// A named edge of the flow graph.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowAction {
    LoadCase,
    StartQuestions,
    AskQuestion,
    SubmitAnswer,
    GradeComplete,
    NeedsFollowUp,
    NextQuestion,
    AllComplete,
    ProvideTeaching,
    AskFollowUp,
    ContinueQuestions,
    Complete,
    Error,
    Reset,
}

/// Every permitted `(from, action, to)` edge.
///
/// A `(from, action)` pair appears at most once, so an action applied in a
/// given state has exactly one target.
pub const TRANSITIONS: &[(FlowState, FlowAction, FlowState)] = &[
    (FlowState::Initialized, FlowAction::LoadCase, FlowState::CaseLoaded),
    (FlowState::CaseLoaded, FlowAction::StartQuestions, FlowState::AskingDiagnostic),
    (FlowState::AskingDiagnostic, FlowAction::AskQuestion, FlowState::AwaitingAnswer),
    (FlowState::AwaitingAnswer, FlowAction::SubmitAnswer, FlowState::GradingAnswer),
    (FlowState::GradingAnswer, FlowAction::GradeComplete, FlowState::DecidingFollowUp),
    (FlowState::DecidingFollowUp, FlowAction::NeedsFollowUp, FlowState::AskingFollowUp),
    (FlowState::DecidingFollowUp, FlowAction::NextQuestion, FlowState::AskingDiagnostic),
    (FlowState::DecidingFollowUp, FlowAction::AllComplete, FlowState::SessionComplete),
    (FlowState::DecidingFollowUp, FlowAction::ProvideTeaching, FlowState::ProvidingTeaching),
    (FlowState::AskingFollowUp, FlowAction::AskFollowUp, FlowState::AwaitingAnswer),
    (FlowState::ProvidingTeaching, FlowAction::ContinueQuestions, FlowState::AskingDiagnostic),
    (FlowState::ProvidingTeaching, FlowAction::Complete, FlowState::SessionComplete),
    (FlowState::AskingDiagnostic, FlowAction::Error, FlowState::Error),
    (FlowState::GradingAnswer, FlowAction::Error, FlowState::Error),
    (FlowState::Error, FlowAction::Reset, FlowState::Initialized),
];

/// Looks up the target of `action` taken from `from`.
pub fn target_of(from: FlowState, action: FlowAction) -> Option<FlowState> {
    TRANSITIONS
        .iter()
        .find(|(f, a, _)| *f == from && *a == action)
        .map(|(_, _, to)| *to)
}
