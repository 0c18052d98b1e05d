// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::path::PathBuf;
use std::time::Duration;

use rstest::{fixture, rstest};
use serial_test::serial;

use super::*;

#[fixture]
fn dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("tempdir")
}

fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn default_paths_name_mermaide() {
    let config = default_config_path().expect("config dir");
    assert!(config.ends_with("mermaide/config.toml"));
    assert!(default_log_path().to_string_lossy().ends_with("mermaide.log"));
}

#[test]
fn missing_file_is_not_an_error() {
    assert_eq!(load_config_file("/nonexistent/mermaide/config.toml"), Ok(None));
}

#[rstest]
fn full_file_is_merged_over_defaults(dir: tempfile::TempDir) {
    let path = write_config(
        &dir,
        r#"
log_file_path = "/var/log/mermaide.log"

[model]
model = "gpt-4o-mini"
temperature = 0.2

[fallback]
enabled = true

[retry]
ceiling = 6
nesting_hint = false

[validator]
kind = "worker"
worker_command = ["node", "worker.mjs"]
timeout_secs = 5

[output]
dir = "out"
"#,
    );
    let config = merge_config(load_config_file(&path).expect("load"));

    assert_eq!(config.model.model, "gpt-4o-mini");
    assert_eq!(config.model.endpoint, DEFAULT_ENDPOINT);
    assert_eq!(config.model.temperature, Some(0.2));
    let fallback = config.fallback.expect("fallback enabled");
    assert_eq!(fallback.endpoint, FALLBACK_ENDPOINT);
    assert_eq!(fallback.api_key_env, FALLBACK_API_KEY_ENV);
    assert_eq!(config.retry.ceiling, 6);
    assert_eq!(config.retry.max_tool_rounds, DEFAULT_MAX_TOOL_ROUNDS);
    assert!(!config.retry.nesting_hint);
    assert_eq!(config.validator.kind, ValidatorKind::Worker);
    assert_eq!(config.validator.worker_command, vec!["node", "worker.mjs"]);
    assert_eq!(config.validator.timeout, Duration::from_secs(5));
    assert_eq!(config.output.dir, PathBuf::from("out"));
    assert_eq!(config.output.document_name, "diagram");
    assert_eq!(config.log_file_path, PathBuf::from("/var/log/mermaide.log"));
}

#[rstest]
#[case("unknown = 1\n")]
#[case("[model]\nmodle = \"typo\"\n")]
#[case("[validator]\nkind = \"browser\"\n")]
#[case("not toml at all [")]
fn invalid_files_are_parse_errors(dir: tempfile::TempDir, #[case] contents: &str) {
    let path = write_config(&dir, contents);
    assert!(matches!(
        load_config_file(&path),
        Err(ConfigError::ParseError { .. })
    ));
}

#[test]
fn defaults_have_no_fallback_and_cli_validator() {
    let config = merge_config(None);
    assert_eq!(config, ResolvedConfig::default());
    assert!(config.fallback.is_none());
    assert_eq!(config.validator.kind, ValidatorKind::Cli);
    assert_eq!(config.retry.ceiling, DEFAULT_RETRY_CEILING);
}

#[test]
fn zero_ceiling_in_file_is_clamped() {
    let file = ConfigFile {
        retry: Some(RetrySection {
            ceiling: Some(0),
            ..RetrySection::default()
        }),
        ..ConfigFile::default()
    };
    assert_eq!(merge_config(Some(file)).retry.ceiling, 1);
}

#[test]
fn env_then_cli_overrides_win() {
    let env = |name: &str| match name {
        MODEL_ENV => Some("env-model".to_owned()),
        ENDPOINT_ENV => Some("http://localhost:8080/v1".to_owned()),
        _ => None,
    };
    let config = apply_env_overrides_from(ResolvedConfig::default(), env);
    assert_eq!(config.model.model, "env-model");
    assert_eq!(config.model.endpoint, "http://localhost:8080/v1");

    let config = apply_cli_overrides(
        config,
        &CliOverrides {
            model: Some("cli-model".to_owned()),
            retries: Some(2),
            no_validate: true,
            ..CliOverrides::default()
        },
    );
    assert_eq!(config.model.model, "cli-model");
    assert_eq!(config.model.endpoint, "http://localhost:8080/v1");
    assert_eq!(config.retry.ceiling, 2);
    assert_eq!(config.validator.kind, ValidatorKind::None);
}

#[test]
fn empty_env_values_are_ignored() {
    let config = apply_env_overrides_from(ResolvedConfig::default(), |_| Some(String::new()));
    assert_eq!(config.model.model, DEFAULT_MODEL);
}

#[rstest]
#[serial(mermaide_config_env)]
fn config_env_var_is_used_without_explicit_path(dir: tempfile::TempDir) {
    let path = write_config(&dir, "[retry]\nceiling = 9\n");
    std::env::set_var(CONFIG_ENV, &path);
    let loaded = load_config_with_precedence(None);
    std::env::remove_var(CONFIG_ENV);

    let file = loaded.expect("load").expect("file");
    assert_eq!(file.retry.and_then(|retry| retry.ceiling), Some(9));
}

#[rstest]
#[serial(mermaide_config_env)]
fn explicit_path_beats_env_var(dir: tempfile::TempDir) {
    let explicit = write_config(&dir, "[retry]\nceiling = 3\n");
    std::env::set_var(CONFIG_ENV, "/nonexistent/other.toml");
    let loaded = load_config_with_precedence(Some(explicit));
    std::env::remove_var(CONFIG_ENV);

    let file = loaded.expect("load").expect("file");
    assert_eq!(file.retry.and_then(|retry| retry.ceiling), Some(3));
}
