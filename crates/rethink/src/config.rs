//! Project configuration file support.
//!
//! Loads configuration from `rethink.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Default OpenRouter-style endpoint; any OpenAI-compatible server works.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Default generator model: creates ideas and drafts the final answer.
pub const DEFAULT_GENERATOR_MODEL: &str = "deepseek/deepseek-v3.2";
/// Default auditor model: verifying a micro-idea is cheaper than producing
/// one, so a faster model usually suffices here.
pub const DEFAULT_AUDITOR_MODEL: &str = "anthropic/claude-haiku-4.5";

/// The config file name
pub const CONFIG_FILE_NAME: &str = "rethink.toml";

/// Project-level configuration loaded from `rethink.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Base URL of the OpenAI-compatible endpoint
    pub base_url: Option<String>,
    /// Global default model (applies to both generator and auditor)
    pub model: Option<String>,
    /// Generator-specific configuration
    #[serde(default)]
    pub generator: RoleConfig,
    /// Auditor-specific configuration
    #[serde(default)]
    pub auditor: RoleConfig,
    /// Maximum takeovers before the run aborts
    pub max_takeovers: Option<u32>,
    /// Base generation temperature
    pub base_temperature: Option<f32>,
}

/// Configuration for a specific role (generator or auditor)
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    /// Model to use for this role
    pub model: Option<String>,
}

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Get the effective model for the generator role.
    /// Priority: [generator].model > global model > default
    pub fn generator_model(&self) -> &str {
        self.generator
            .model
            .as_deref()
            .or(self.model.as_deref())
            .unwrap_or(DEFAULT_GENERATOR_MODEL)
    }

    /// Get the effective model for the auditor role.
    /// Priority: [auditor].model > global model > default
    pub fn auditor_model(&self) -> &str {
        self.auditor
            .model
            .as_deref()
            .or(self.model.as_deref())
            .unwrap_or(DEFAULT_AUDITOR_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ProjectConfig::default();
        assert_eq!(config.generator_model(), DEFAULT_GENERATOR_MODEL);
        assert_eq!(config.auditor_model(), DEFAULT_AUDITOR_MODEL);
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_global_model_applies_to_both_roles() {
        let config: ProjectConfig = toml::from_str(r#"model = "some/model""#).unwrap();
        assert_eq!(config.generator_model(), "some/model");
        assert_eq!(config.auditor_model(), "some/model");
    }

    #[test]
    fn test_role_model_beats_global() {
        let config: ProjectConfig = toml::from_str(
            r#"
model = "some/model"

[auditor]
model = "small/model"
"#,
        )
        .unwrap();
        assert_eq!(config.generator_model(), "some/model");
        assert_eq!(config.auditor_model(), "small/model");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<ProjectConfig, _> = toml::from_str(r#"api_key = "sk-nope""#);
        assert!(result.is_err());
    }
}
