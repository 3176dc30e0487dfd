//! Low-level file storage primitives.

pub mod atomic_json;

pub use atomic_json::{AtomicJsonError, AtomicJsonFile};

use casewise_core::CasewiseError;

impl From<AtomicJsonError> for CasewiseError {
    fn from(err: AtomicJsonError) -> Self {
        match err {
            AtomicJsonError::Json { path, source } => CasewiseError::Serialization {
                format: "JSON".to_string(),
                message: format!("{}: {}", path.display(), source),
            },
            other => CasewiseError::io(other.to_string()),
        }
    }
}
