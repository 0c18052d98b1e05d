// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Decoding of OpenAI-compatible `chat.completion.chunk` server-sent events.
//!
//! Tool calls arrive as fragments keyed by `index`: the first fragment carries the id and
//! name, later ones append to `arguments`. They are released only once complete, at the
//! chunk carrying a `finish_reason` or at the end of the stream.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use super::{LanguageModelError, ResponsePart};
use crate::model::{ToolCall, ToolCallId};

/// Marker payload closing an OpenAI stream.
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct ChunkData {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    partial: BTreeMap<usize, PartialToolCall>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one event payload (the `data:` field).
    pub fn decode(&mut self, data: &str) -> Result<Vec<ResponsePart>, LanguageModelError> {
        trace!(data, "model event");
        if data.trim() == DONE_MARKER {
            return Ok(self.finish());
        }

        let json: Value = serde_json::from_str(data)
            .map_err(|err| LanguageModelError::Decode(format!("{err}: {data}")))?;
        if let Some(message) = api_error_message(&json) {
            return Err(LanguageModelError::Stream(message));
        }
        let chunk: ChunkData = serde_json::from_value(json)
            .map_err(|err| LanguageModelError::Decode(format!("{err}: {data}")))?;

        let mut parts = Vec::new();
        let mut finished = false;
        for choice in chunk.choices.into_iter().take(1) {
            if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
                parts.push(ResponsePart::Text(text));
            }
            for delta in choice.delta.tool_calls.unwrap_or_default() {
                let entry = self.partial.entry(delta.index).or_default();
                if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
                    entry.id = Some(id);
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }
            finished = choice.finish_reason.is_some();
        }
        if finished {
            parts.extend(self.finish());
        }
        Ok(parts)
    }

    /// Releases every assembled tool call, in index order.
    pub fn finish(&mut self) -> Vec<ResponsePart> {
        std::mem::take(&mut self.partial)
            .into_iter()
            .filter(|(_, call)| !call.name.is_empty())
            .map(|(index, call)| {
                let id = call
                    .id
                    .and_then(|id| ToolCallId::new(id).ok())
                    .unwrap_or_else(|| ToolCallId::synthetic(index));
                ResponsePart::ToolCall(ToolCall {
                    id,
                    name: call.name,
                    arguments: call.arguments,
                })
            })
            .collect()
    }
}

fn api_error_message(event: &Value) -> Option<String> {
    let error = event.get("error")?;
    if let Some(message) = error.get("message").and_then(Value::as_str) {
        return Some(message.to_owned());
    }
    if let Some(message) = error.as_str() {
        return Some(message.to_owned());
    }
    Some("the provider reported an error while streaming".to_owned())
}
