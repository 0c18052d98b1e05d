// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DiagramValidateParams {
    /// Mermaid source, with or without a ```mermaid fence.
    pub mermaid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DiagramValidateResponse {
    pub valid: bool,
    pub kind: String,
    pub error: Option<String>,
    pub friendly_error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DiagramCurrentParams {
    /// `chat` (default) or `outline`.
    pub view: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct McpNavigationTarget {
    pub label: String,
    pub path: String,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DiagramCurrentResponse {
    pub view: String,
    pub mermaid: Option<String>,
    pub kind: Option<String>,
    pub navigation: Vec<McpNavigationTarget>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DiagramGenerateParams {
    pub prompt: String,
    /// `help`, `uml`, `flow` or `iterate`.
    pub command: Option<String>,
    /// Workspace files to attach: `path`, `path:12` or `path:12-40`.
    pub references: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerateOutcome {
    Success,
    Exhausted,
    Cancelled,
    Answered,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DiagramGenerateResponse {
    pub outcome: GenerateOutcome,
    pub attempts: usize,
    pub mermaid: Option<String>,
    pub errors: Vec<String>,
    /// The reply as it would have been streamed to a chat.
    pub reply_markdown: String,
    pub progress: Vec<String>,
}
