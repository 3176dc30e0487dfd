//! Session orchestration.
//!
//! - `action`: the typed action/outcome surface and read-only views
//! - `machine_cache`: live flow machines keyed by session id
//! - `session_orchestrator`: `SessionOrchestrator` and its builder

mod action;
mod machine_cache;
mod session_orchestrator;

pub use action::{
    ActionOutcome, CategoryScore, SessionAction, SessionProgress, SessionStateView, SessionSummary,
};
pub use machine_cache::{MachineCache, SharedMachine};
pub use session_orchestrator::{SessionOrchestrator, SessionOrchestratorBuilder};
