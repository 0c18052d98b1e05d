// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Language model access.
//!
//! A [`LanguageModel`] takes the conversation plus the advertised tools and yields a stream
//! of [`ResponsePart`]s: text deltas as they arrive, tool calls once fully assembled.

pub mod openai;
pub mod sse;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::model::{ChatMessage, ToolCall};

pub use openai::OpenAiChatModel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Text(String),
    ToolCall(ToolCall),
}

pub type ResponseStream = BoxStream<'static, Result<ResponsePart, LanguageModelError>>;

/// A function tool advertised to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolSpec],
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short provider/model label used in logs.
    fn name(&self) -> &str;

    async fn send(
        &self,
        request: ChatRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<ResponseStream, LanguageModelError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LanguageModelError {
    #[error("no API key: set the `{env}` environment variable")]
    MissingApiKey { env: String },
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model endpoint answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model stream failed: {0}")]
    Stream(String),
    #[error("model sent an unreadable event: {0}")]
    Decode(String),
    #[error("model request cancelled")]
    Cancelled,
}
