//! Application layer for CaseWise.
//!
//! Coordinates the domain rules of `casewise-core` with whatever providers
//! and session store the caller injects.

pub mod orchestrator;

pub use orchestrator::{
    ActionOutcome, SessionAction, SessionOrchestrator, SessionStateView, SessionSummary,
};
