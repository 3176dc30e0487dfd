//! Grading domain module.
//!
//! - `model`: `Answer`, `GradingResult`, the `GradingProvider` trait
//! - `content_scorer`: deterministic fallback scorer
//! - `coordinator`: primary-with-fallback grading and skip handling
//! - `follow_up`: weak-category selection

mod content_scorer;
mod coordinator;
mod follow_up;
mod model;

pub use content_scorer::{ContentScorer, FALLBACK_SCORE_CAP};
pub use coordinator::GradingCoordinator;
pub use follow_up::select_follow_up_categories;
pub use model::{
    Answer, GradingMethod, GradingProvider, GradingRequest, GradingResult, SKIP_SENTINEL,
    is_skip_sentinel,
};
