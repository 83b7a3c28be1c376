//! Pipeline configuration (`blueprint.toml`) and model credential resolution.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::backoff::RetryPolicy;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "blueprint.toml";

const MODEL_ENV: &[&str] = &["MODEL_NAME"];
const BASE_URL_ENV: &[&str] = &[
    "OPENAI_BASE_URL",
    "AZURE_OPENAI_BASE_URL",
    "GITHUB_MODELS_BASE_URL",
];
const API_KEY_ENV: &[&str] = &["GITHUB_TOKEN", "AZURE_OPENAI_API_KEY", "OPENAI_API_KEY"];

/// Pipeline configuration (TOML).
///
/// Missing fields default to the values the pipeline was tuned with, so an
/// empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BlueprintConfig {
    pub model: ModelConfig,
    pub project: ProjectConfig,
    pub run: RunConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier sent with every request.
    pub name: String,
    /// OpenAI-compatible endpoint base URL.
    pub base_url: String,
    /// Sampling temperature for every stage.
    pub temperature: f32,
    /// Completion token cap per model call.
    pub max_tokens: u32,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gpt-4o".to_string(),
            base_url: "https://models.inference.ai.azure.com".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            request_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory that generated files are written into.
    pub root: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("generated_project"),
        }
    }
}

/// What the coder does when a task's tool loop does not finish cleanly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskFailurePolicy {
    /// Record the task as incomplete and move on to the next one.
    #[default]
    Advance,
    /// Stop the run.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    /// Coder turns allowed per run, counting the turn that emits `DONE`.
    pub max_coder_turns: u32,
    /// Model calls allowed inside one coder turn's tool loop.
    pub max_tool_rounds: u32,
    pub on_task_failure: TaskFailurePolicy,
    /// Byte budget for a rendered coder task prompt.
    pub prompt_budget_bytes: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_coder_turns: 30,
            max_tool_rounds: 25,
            on_task_failure: TaskFailurePolicy::Advance,
            prompt_budget_bytes: 40_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total tries when the endpoint rate-limits, including the first.
    pub attempts: u32,
    /// Wait before each retry, in seconds.
    pub delays_secs: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delays_secs: vec![12, 24, 36],
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            delays: self
                .delays_secs
                .iter()
                .copied()
                .map(Duration::from_secs)
                .collect(),
        }
    }
}

impl BlueprintConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.name.trim().is_empty() {
            return Err(anyhow!("model.name must not be empty"));
        }
        if self.model.base_url.trim().is_empty() {
            return Err(anyhow!("model.base_url must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(anyhow!("model.temperature must be within [0, 2]"));
        }
        if self.model.max_tokens == 0 {
            return Err(anyhow!("model.max_tokens must be > 0"));
        }
        if self.model.request_timeout_secs == 0 {
            return Err(anyhow!("model.request_timeout_secs must be > 0"));
        }
        if self.project.root.as_os_str().is_empty() {
            return Err(anyhow!("project.root must not be empty"));
        }
        if self.run.max_coder_turns == 0 {
            return Err(anyhow!("run.max_coder_turns must be > 0"));
        }
        if self.run.max_tool_rounds == 0 {
            return Err(anyhow!("run.max_tool_rounds must be > 0"));
        }
        if self.run.prompt_budget_bytes < 1_000 {
            return Err(anyhow!("run.prompt_budget_bytes must be >= 1000"));
        }
        if self.retry.attempts == 0 {
            return Err(anyhow!("retry.attempts must be > 0"));
        }
        if self.retry.attempts > 1 && self.retry.delays_secs.is_empty() {
            return Err(anyhow!(
                "retry.delays_secs must not be empty when retry.attempts > 1"
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BlueprintConfig::default()`.
pub fn load_config(path: &Path) -> Result<BlueprintConfig> {
    if !path.exists() {
        let cfg = BlueprintConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BlueprintConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &BlueprintConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

/// No API credential was found in any supported source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing API credential: set one of {}", .searched.join(", "))]
pub struct MissingCredential {
    pub searched: Vec<String>,
}

/// Everything needed to talk to the model endpoint, resolved once at startup.
#[derive(Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSettings")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ModelSettings {
    /// Resolve settings from `lookup` (usually the process environment) layered
    /// over the config file.
    ///
    /// Environment variables win over the file, in the order listed in
    /// `MODEL_ENV`, `BASE_URL_ENV` and `API_KEY_ENV`. Blank values are skipped.
    pub fn resolve<F>(cfg: &ModelConfig, lookup: F) -> Result<Self, MissingCredential>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let api_key = first(API_KEY_ENV).ok_or_else(|| MissingCredential {
            searched: API_KEY_ENV.iter().map(|s| s.to_string()).collect(),
        })?;

        Ok(Self {
            model: first(MODEL_ENV).unwrap_or_else(|| cfg.name.clone()),
            base_url: first(BASE_URL_ENV).unwrap_or_else(|| cfg.base_url.clone()),
            api_key,
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
        })
    }

    /// Resolve from the real process environment.
    pub fn from_env(cfg: &ModelConfig) -> Result<Self, MissingCredential> {
        Self::resolve(cfg, |name| std::env::var(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, BlueprintConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("blueprint.toml");
        let mut cfg = BlueprintConfig::default();
        cfg.run.on_task_failure = TaskFailurePolicy::Abort;
        cfg.retry.delays_secs = vec![1, 2];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("blueprint.toml");
        fs::write(&path, "[run]\nmax_coder_turns = 5\non_task_failure = \"abort\"\n")
            .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.run.max_coder_turns, 5);
        assert_eq!(cfg.run.on_task_failure, TaskFailurePolicy::Abort);
        assert_eq!(cfg.run.max_tool_rounds, 25);
        assert_eq!(cfg.run.prompt_budget_bytes, 40_000);
        assert_eq!(cfg.model, ModelConfig::default());
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let mut cfg = BlueprintConfig::default();
        cfg.run.max_coder_turns = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("max_coder_turns"));

        let mut cfg = BlueprintConfig::default();
        cfg.retry.delays_secs.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("delays_secs"));
    }

    #[test]
    fn retry_policy_converts_seconds() {
        let policy = RetryConfig::default().policy();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delays[1], Duration::from_secs(24));
    }

    #[test]
    fn resolve_prefers_environment_in_priority_order() {
        let vars = env(&[
            ("OPENAI_API_KEY", "openai"),
            ("GITHUB_TOKEN", "github"),
            ("AZURE_OPENAI_BASE_URL", "https://azure.example"),
            ("GITHUB_MODELS_BASE_URL", "https://github.example"),
            ("MODEL_NAME", "gpt-4o-mini"),
        ]);
        let settings =
            ModelSettings::resolve(&ModelConfig::default(), |k| vars.get(k).cloned()).expect("ok");
        assert_eq!(settings.api_key, "github");
        assert_eq!(settings.base_url, "https://azure.example");
        assert_eq!(settings.model, "gpt-4o-mini");
    }

    #[test]
    fn resolve_falls_back_to_config_and_skips_blank_values() {
        let vars = env(&[("GITHUB_TOKEN", "  "), ("OPENAI_API_KEY", "key")]);
        let cfg = ModelConfig::default();
        let settings = ModelSettings::resolve(&cfg, |k| vars.get(k).cloned()).expect("ok");
        assert_eq!(settings.api_key, "key");
        assert_eq!(settings.model, cfg.name);
        assert_eq!(settings.base_url, cfg.base_url);
    }

    #[test]
    fn resolve_without_credential_fails() {
        let err = ModelSettings::resolve(&ModelConfig::default(), |_| None).unwrap_err();
        assert!(err.to_string().contains("GITHUB_TOKEN"));
        assert_eq!(err.searched.len(), 3);
    }

    #[test]
    fn debug_redacts_api_key() {
        let vars = env(&[("OPENAI_API_KEY", "sk-secret")]);
        let settings =
            ModelSettings::resolve(&ModelConfig::default(), |k| vars.get(k).cloned()).expect("ok");
        assert!(!format!("{settings:?}").contains("sk-secret"));
    }
}
