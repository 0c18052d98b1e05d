// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Out-of-process validation with the mermaid CLI (`mmdc`).
//!
//! The renderer may exit 0 without writing anything, so success requires both a clean exit
//! status and the output artifact on disk.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Validator, ValidatorError, DEFAULT_VALIDATION_TIMEOUT};
use crate::model::{Diagram, ValidationResult};

pub const DEFAULT_MMDC: &str = "mmdc";

const INPUT_FILE: &str = "diagram.mmd";
const OUTPUT_FILE: &str = "diagram.svg";

#[derive(Debug, Clone)]
pub struct MermaidCli {
    program: PathBuf,
    extra_args: Vec<String>,
    timeout: Duration,
}

impl Default for MermaidCli {
    fn default() -> Self {
        Self::new(DEFAULT_MMDC)
    }
}

impl MermaidCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            timeout: DEFAULT_VALIDATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extra arguments appended after `-i <in> -o <out>` (e.g. `--quiet`, `-c config.json`).
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Renders `diagram` to `output` (SVG, or whatever the extension asks the CLI for).
    ///
    /// The CLI always writes into a fresh staging directory; `output` is only replaced once
    /// the artifact exists there, so a stale file at `output` never passes for a render.
    pub async fn render_svg(
        &self,
        diagram: &Diagram,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, ValidatorError> {
        let staging = tempfile::tempdir().map_err(|source| ValidatorError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
        let artifact = match output.extension() {
            Some(extension) => Path::new(OUTPUT_FILE).with_extension(extension),
            None => PathBuf::from(OUTPUT_FILE),
        };
        let artifact = staging.path().join(artifact);
        let result = self.run(diagram, staging.path(), &artifact, cancel).await?;
        if !result.is_success() {
            return Ok(result);
        }
        tokio::fs::copy(&artifact, output)
            .await
            .map_err(|source| ValidatorError::Io {
                path: output.to_path_buf(),
                source,
            })?;
        Ok(result)
    }

    async fn run(
        &self,
        diagram: &Diagram,
        staging: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, ValidatorError> {
        let input = staging.join(INPUT_FILE);
        tokio::fs::write(&input, diagram.content())
            .await
            .map_err(|source| ValidatorError::Io {
                path: input.clone(),
                source,
            })?;

        let child = Command::new(&self.program)
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(output)
            .args(&self.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ValidatorError::RendererUnavailable {
                program: self.program.display().to_string(),
                source,
            })?;

        let finished = tokio::select! {
            _ = cancel.cancelled() => return Err(ValidatorError::Cancelled),
            finished = tokio::time::timeout(self.timeout, child.wait_with_output()) => finished,
        };
        let output_status = finished
            .map_err(|_| ValidatorError::Timeout(self.timeout))?
            .map_err(|source| ValidatorError::Io {
                path: self.program.clone(),
                source,
            })?;

        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr).trim().to_owned();
            debug!(status = %output_status.status, "renderer rejected diagram");
            let error = if stderr.is_empty() {
                format!("renderer exited with {}", output_status.status)
            } else {
                stderr
            };
            return Ok(ValidationResult::failure(error));
        }

        let produced = tokio::fs::try_exists(output).await.unwrap_or(false);
        if !produced {
            return Ok(ValidationResult::failure(format!(
                "renderer exited successfully but produced no output at {}",
                output.display()
            )));
        }
        Ok(ValidationResult::Success)
    }
}

#[async_trait]
impl Validator for MermaidCli {
    async fn validate(
        &self,
        diagram: &Diagram,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, ValidatorError> {
        let staging = tempfile::tempdir().map_err(|source| ValidatorError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
        let output = staging.path().join(OUTPUT_FILE);
        self.run(diagram, staging.path(), &output, cancel).await
    }
}
