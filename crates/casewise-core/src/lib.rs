//! Domain layer of the CaseWise diagnostic session engine.
//!
//! Holds the flow state machine, the session aggregate, the provider and
//! repository interfaces, and the grading rules shared by every other crate.

pub mod case;
pub mod config;
pub mod error;
pub mod flow;
pub mod grading;
pub mod question;
pub mod session;
pub mod teaching;

pub use error::{CasewiseError, Result};
