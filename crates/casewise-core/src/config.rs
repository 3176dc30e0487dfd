//! Application configuration model.
//!
//! Loaded from `config.toml` by the infrastructure layer. Every field has a
//! default so a partial (or missing) file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FOLLOW_UP_THRESHOLD: f64 = 0.7;
pub const DEFAULT_GRADING_MODEL: &str = "gpt-4o";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: Option<String>,
    pub orchestrator: OrchestratorConfig,
    pub storage: StorageConfig,
    pub cases: CasesConfig,
    pub grading: GradingConfig,
}

/// Business rules and timeouts applied by the session orchestrator.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Scores strictly below this trigger a follow-up.
    pub follow_up_threshold: f64,
    pub grading_timeout_secs: u64,
    pub provider_timeout_secs: u64,
    /// How many weak categories the end-of-session summary recommends.
    pub max_recommended_follow_ups: usize,
}

impl OrchestratorConfig {
    pub fn grading_timeout(&self) -> Duration {
        Duration::from_secs(self.grading_timeout_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Budget for a generative call made inside a provider that has its own
    /// fallback. It ends before `provider_timeout` so the fallback can still
    /// answer within the outer deadline.
    pub fn generation_timeout(&self) -> Duration {
        self.provider_timeout() * 4 / 5
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            follow_up_threshold: DEFAULT_FOLLOW_UP_THRESHOLD,
            grading_timeout_secs: 60,
            provider_timeout_secs: 10,
            max_recommended_follow_ups: 2,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Defaults to `<data dir>/casewise/sessions`.
    pub sessions_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct CasesConfig {
    /// Directory holding one sub-directory per case. Defaults to `./cases`.
    pub root: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GradingConfig {
    /// Disables the AI path entirely when false.
    pub ai_enabled: bool,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Read from `OPENAI_API_KEY` when unset.
    pub api_key: Option<String>,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            ai_enabled: true,
            model: DEFAULT_GRADING_MODEL.to_string(),
            max_tokens: 2000,
            temperature: 0.3,
            api_key: None,
        }
    }
}
