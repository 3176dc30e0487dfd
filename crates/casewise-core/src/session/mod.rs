//! Session domain module.
//!
//! - `model`: the `Session` aggregate and its coarse `SessionStatus`
//! - `repository`: the `SessionRepository` persistence contract
//! - `stats`: aggregate statistics over stored sessions

mod model;
mod repository;
mod stats;

pub use model::{Session, SessionStatus};
pub use repository::{SessionRepository, purge_cutoff};
pub use stats::SessionStats;
