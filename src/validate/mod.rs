// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Diagram validation against a real Mermaid renderer.
//!
//! A [`Validator`] answers "does this diagram render?". Renderer complaints come back as
//! [`ValidationResult::Failure`]; a broken renderer setup (missing binary, dead worker)
//! is a [`ValidatorError`] and ends the turn.

pub mod channel;
pub mod cli;
pub mod protocol;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::model::{Diagram, ValidationResult};

pub use channel::{connect_json_lines, ChannelValidator, PageRouter, WorkerValidator};
pub use cli::MermaidCli;
pub use protocol::{HostMessage, PageMessage, ProtocolError};

pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Validator: Send + Sync {
    /// Validates `diagram`. Holds no per-diagram state between calls.
    async fn validate(
        &self,
        diagram: &Diagram,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, ValidatorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("renderer `{program}` could not be started: {source}")]
    RendererUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),
    #[error("validation page disconnected")]
    Disconnected,
    #[error("validation cancelled")]
    Cancelled,
    #[error("failed to stage diagram at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Accepts every non-empty diagram. For hosts without a renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl Validator for AcceptAll {
    async fn validate(
        &self,
        diagram: &Diagram,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, ValidatorError> {
        if cancel.is_cancelled() {
            return Err(ValidatorError::Cancelled);
        }
        if diagram.is_empty() {
            return Ok(ValidationResult::failure("diagram is empty"));
        }
        Ok(ValidationResult::Success)
    }
}
