//! Configuration service implementation.
//!
//! Loads `AppConfig` from `config.toml` (by default
//! `~/.config/casewise/config.toml`) and layers environment overrides on top.

use crate::paths::CasewisePaths;
use casewise_core::config::AppConfig;
use casewise_core::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub const ENV_CASES_DIR: &str = "CASEWISE_CASES_DIR";
pub const ENV_SESSIONS_DIR: &str = "CASEWISE_SESSIONS_DIR";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL_NAME";

/// Loads and caches the application configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    config: Arc<RwLock<Option<AppConfig>>>,
}

impl ConfigService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::new(CasewisePaths::config_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the configuration, loading it from disk on first access.
    pub fn get_config(&self) -> Result<AppConfig> {
        {
            let cached = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let mut loaded = Self::load_file(&self.path)?;
        apply_env_overrides(&mut loaded, |key| std::env::var(key).ok());

        let mut cached = self.config.write().unwrap_or_else(|e| e.into_inner());
        *cached = Some(loaded.clone());
        Ok(loaded)
    }

    /// Forces a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut cached = self.config.write().unwrap_or_else(|e| e.into_inner());
        *cached = None;
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load_file(path: &Path) -> Result<AppConfig> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config: AppConfig = toml::from_str(&content)?;
                tracing::debug!(target: "config", path = %path.display(), "loaded configuration");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    target: "config",
                    path = %path.display(),
                    "no configuration file, using defaults"
                );
                Ok(AppConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the default configuration if no file exists yet.
    pub fn write_default_if_missing(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&AppConfig::default())?;
        std::fs::write(&self.path, content)?;
        Ok(true)
    }
}

/// Applies environment overrides through `lookup`.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup(ENV_CASES_DIR) {
        config.cases.root = Some(PathBuf::from(dir));
    }
    if let Some(dir) = lookup(ENV_SESSIONS_DIR) {
        config.storage.sessions_dir = Some(PathBuf::from(dir));
    }
    if let Some(key) = lookup(ENV_OPENAI_API_KEY).filter(|k| !k.trim().is_empty()) {
        config.grading.api_key = Some(key);
    }
    if let Some(model) = lookup(ENV_OPENAI_MODEL) {
        config.grading.model = model;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casewise_core::config::StorageBackend;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigService::load_file(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_file_values_are_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[storage]\nbackend = \"memory\"\n\n[cases]\nroot = \"/srv/cases\"\n",
        )
        .unwrap();

        let config = ConfigService::load_file(&path).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.cases.root, Some(PathBuf::from("/srv/cases")));
    }

    #[test]
    fn test_malformed_file_is_serialization_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[storage\nbackend=").unwrap();

        let err = ConfigService::load_file(&path).unwrap_err();
        assert!(matches!(err, casewise_core::CasewiseError::Serialization { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_CASES_DIR, "/data/cases"),
            (ENV_OPENAI_API_KEY, "sk-test"),
            (ENV_OPENAI_MODEL, "gpt-4o-mini"),
        ]);
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.cases.root, Some(PathBuf::from("/data/cases")));
        assert_eq!(config.grading.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.grading.model, "gpt-4o-mini");
        assert!(config.storage.sessions_dir.is_none());
    }

    #[test]
    fn test_write_default_if_missing() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path().join("nested/config.toml"));
        assert!(service.write_default_if_missing().unwrap());
        assert!(!service.write_default_if_missing().unwrap());
        assert_eq!(
            ConfigService::load_file(service.path()).unwrap(),
            AppConfig::default()
        );
    }
}
