// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::path::PathBuf;

use crate::assistant::AssistantError;
use crate::config::ConfigError;
use crate::controller::ControllerError;
use crate::llm::LanguageModelError;
use crate::logging::LoggingError;
use crate::outline::OutlineError;
use crate::prompt::{PromptError, UnknownCommand};
use crate::store::StoreError;
use crate::validate::ValidatorError;

/// Everything that can end a `mermaide` invocation.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Assistant(#[from] AssistantError),
    #[error(transparent)]
    Outline(#[from] OutlineError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Command(#[from] UnknownCommand),
    #[error(transparent)]
    Model(#[from] LanguageModelError),
    #[error(transparent)]
    Validator(#[from] ValidatorError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("mcp server error: {0}")]
    Mcp(String),
    #[error("diagram is invalid: {0}")]
    InvalidDiagram(String),
}
