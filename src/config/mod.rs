// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Configuration loading with precedence handling.
//!
//! Precedence, highest first: CLI flags, `MERMAIDE_MODEL`/`MERMAIDE_ENDPOINT`, the config
//! file (`--config`, else `MERMAIDE_CONFIG`, else `~/.config/mermaide/config.toml`), then
//! built-in defaults. A missing config file is not an error.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::controller::{RetryPolicy, DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_RETRY_CEILING};
use crate::llm::openai::{DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::validate::cli::DEFAULT_MMDC;
use crate::validate::DEFAULT_VALIDATION_TIMEOUT;

pub const CONFIG_ENV: &str = "MERMAIDE_CONFIG";
pub const MODEL_ENV: &str = "MERMAIDE_MODEL";
pub const ENDPOINT_ENV: &str = "MERMAIDE_ENDPOINT";

pub const FALLBACK_ENDPOINT: &str = "https://api.groq.com/openai/v1";
pub const FALLBACK_MODEL: &str = "llama3-groq-70b-8192-tool-use-preview";
pub const FALLBACK_API_KEY_ENV: &str = "GROQ_API_KEY";

pub const DEFAULT_WORKER_SCRIPT: &str = "assets/mermaid-worker.mjs";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },
    #[error("invalid TOML in {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },
}

/// `config.toml`. Every field is optional; unknown keys are rejected.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub model: Option<ModelSection>,
    #[serde(default)]
    pub fallback: Option<FallbackSection>,
    #[serde(default)]
    pub retry: Option<RetrySection>,
    #[serde(default)]
    pub validator: Option<ValidatorSection>,
    #[serde(default)]
    pub output: Option<OutputSection>,
    #[serde(default)]
    pub log_file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelSection {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// The secondary ("fast") provider used first for outlines.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FallbackSection {
    pub enabled: Option<bool>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    pub ceiling: Option<usize>,
    pub max_tool_rounds: Option<usize>,
    pub nesting_hint: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ValidatorSection {
    pub kind: Option<ValidatorKind>,
    pub mmdc: Option<PathBuf>,
    pub worker_command: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    pub dir: Option<PathBuf>,
    pub document_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorKind {
    /// Render with the mermaid CLI (`mmdc`).
    #[default]
    Cli,
    /// A long-running JSON-lines worker speaking the page protocol.
    Worker,
    /// Accept every non-empty diagram.
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub kind: ValidatorKind,
    pub mmdc: PathBuf,
    pub worker_command: Vec<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub document_name: String,
}

/// Configuration after merging defaults, file, env vars and CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub model: ProviderConfig,
    /// `None` unless the `[fallback]` section enables it.
    pub fallback: Option<ProviderConfig>,
    pub retry: RetryPolicy,
    pub validator: ValidatorConfig,
    pub output: OutputConfig,
    pub log_file_path: PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            model: ProviderConfig {
                endpoint: DEFAULT_ENDPOINT.to_owned(),
                model: DEFAULT_MODEL.to_owned(),
                api_key_env: DEFAULT_API_KEY_ENV.to_owned(),
                temperature: None,
                max_tokens: None,
            },
            fallback: None,
            retry: RetryPolicy {
                ceiling: DEFAULT_RETRY_CEILING,
                max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
                nesting_hint: true,
            },
            validator: ValidatorConfig {
                kind: ValidatorKind::Cli,
                mmdc: PathBuf::from(DEFAULT_MMDC),
                worker_command: vec!["node".to_owned(), DEFAULT_WORKER_SCRIPT.to_owned()],
                timeout: DEFAULT_VALIDATION_TIMEOUT,
            },
            output: OutputConfig {
                dir: PathBuf::from(".mermaide"),
                document_name: "diagram".to_owned(),
            },
            log_file_path: default_log_path(),
        }
    }
}

/// `~/.local/state/mermaide/mermaide.log`, or `mermaide.log` when no state dir exists.
pub fn default_log_path() -> PathBuf {
    match dirs::state_dir() {
        Some(state_dir) => state_dir.join("mermaide").join("mermaide.log"),
        None => PathBuf::from("mermaide.log"),
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mermaide").join("config.toml"))
}

/// Loads `path`; `Ok(None)` when the file does not exist.
pub fn load_config_file(path: impl Into<PathBuf>) -> Result<Option<ConfigFile>, ConfigError> {
    let path = path.into();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    let config = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    Ok(Some(config))
}

pub fn load_config_with_precedence(
    config_path: Option<PathBuf>,
) -> Result<Option<ConfigFile>, ConfigError> {
    if let Some(path) = config_path {
        return load_config_file(path);
    }
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return load_config_file(PathBuf::from(env_path));
    }
    match default_config_path() {
        Some(default_path) => load_config_file(default_path),
        None => Ok(None),
    }
}

pub fn merge_config(config_file: Option<ConfigFile>) -> ResolvedConfig {
    let defaults = ResolvedConfig::default();
    let Some(config) = config_file else {
        return defaults;
    };

    let model = config.model.unwrap_or_default();
    let fallback = config.fallback.unwrap_or_default();
    let retry = config.retry.unwrap_or_default();
    let validator = config.validator.unwrap_or_default();
    let output = config.output.unwrap_or_default();

    ResolvedConfig {
        model: ProviderConfig {
            endpoint: model.endpoint.unwrap_or(defaults.model.endpoint),
            model: model.model.unwrap_or(defaults.model.model),
            api_key_env: model.api_key_env.unwrap_or(defaults.model.api_key_env),
            temperature: model.temperature,
            max_tokens: model.max_tokens,
        },
        fallback: fallback.enabled.unwrap_or(false).then(|| ProviderConfig {
            endpoint: fallback
                .endpoint
                .unwrap_or_else(|| FALLBACK_ENDPOINT.to_owned()),
            model: fallback.model.unwrap_or_else(|| FALLBACK_MODEL.to_owned()),
            api_key_env: fallback
                .api_key_env
                .unwrap_or_else(|| FALLBACK_API_KEY_ENV.to_owned()),
            temperature: fallback.temperature,
            max_tokens: fallback.max_tokens,
        }),
        retry: RetryPolicy {
            ceiling: retry.ceiling.unwrap_or(defaults.retry.ceiling).max(1),
            max_tool_rounds: retry
                .max_tool_rounds
                .unwrap_or(defaults.retry.max_tool_rounds),
            nesting_hint: retry.nesting_hint.unwrap_or(defaults.retry.nesting_hint),
        },
        validator: ValidatorConfig {
            kind: validator.kind.unwrap_or(defaults.validator.kind),
            mmdc: validator.mmdc.unwrap_or(defaults.validator.mmdc),
            worker_command: validator
                .worker_command
                .filter(|command| !command.is_empty())
                .unwrap_or(defaults.validator.worker_command),
            timeout: validator
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.validator.timeout),
        },
        output: OutputConfig {
            dir: output.dir.unwrap_or(defaults.output.dir),
            document_name: output
                .document_name
                .unwrap_or(defaults.output.document_name),
        },
        log_file_path: config.log_file_path.unwrap_or(defaults.log_file_path),
    }
}

pub fn apply_env_overrides(config: ResolvedConfig) -> ResolvedConfig {
    apply_env_overrides_from(config, |name| std::env::var(name).ok())
}

/// Applies `MERMAIDE_MODEL` and `MERMAIDE_ENDPOINT` as seen through `lookup`.
pub fn apply_env_overrides_from(
    mut config: ResolvedConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    if let Some(model) = lookup(MODEL_ENV).filter(|value| !value.is_empty()) {
        config.model.model = model;
    }
    if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|value| !value.is_empty()) {
        config.model.endpoint = endpoint;
    }
    config
}

/// Flags that override everything else when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub retries: Option<usize>,
    pub no_validate: bool,
}

pub fn apply_cli_overrides(mut config: ResolvedConfig, overrides: &CliOverrides) -> ResolvedConfig {
    if let Some(model) = &overrides.model {
        config.model.model = model.clone();
    }
    if let Some(endpoint) = &overrides.endpoint {
        config.model.endpoint = endpoint.clone();
    }
    if let Some(retries) = overrides.retries {
        config.retry.ceiling = retries.max(1);
    }
    if overrides.no_validate {
        config.validator.kind = ValidatorKind::None;
    }
    config
}

#[cfg(test)]
mod tests;
