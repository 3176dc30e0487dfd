//! Flow domain module.
//!
//! - `state`: the states, actions and transition table
//! - `machine`: `FlowStateMachine`, which validates and applies transitions

mod machine;
mod state;

pub use machine::{FlowStateMachine, HISTORY_LIMIT, StateChange, StateInfo};
pub use state::{FlowAction, FlowState, TRANSITIONS, target_of};
