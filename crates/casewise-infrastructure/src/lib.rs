//! Storage backends, file-backed providers and configuration loading.

pub mod case_directory;
pub mod config_service;
pub mod file_session_repository;
pub mod in_memory_session_repository;
pub mod paths;
pub mod storage;

#[cfg(test)]
mod test_fixtures;

pub use crate::case_directory::CaseDirectory;
pub use crate::config_service::ConfigService;
pub use crate::file_session_repository::FileSessionRepository;
pub use crate::in_memory_session_repository::InMemorySessionRepository;
pub use crate::paths::CasewisePaths;
