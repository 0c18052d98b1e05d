// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::ToolCallId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model. `arguments` is the raw JSON text as streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub name: String,
    pub arguments: String,
}

/// One turn of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant {
        text: String,
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        call_id: ToolCallId,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System(text.into())
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::User(text.into())
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            text: text.into(),
            tool_calls,
        }
    }

    pub fn tool_result(call_id: ToolCallId, content: impl Into<String>) -> Self {
        Self::ToolResult {
            call_id,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System(_) => Role::System,
            Self::User(_) => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::ToolResult { .. } => Role::Tool,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::System(text) | Self::User(text) => text,
            Self::Assistant { text, .. } => text,
            Self::ToolResult { content, .. } => content,
        }
    }
}

/// The tool calls of one model response plus the prose that preceded them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolCallRound {
    pub response: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Everything a finished turn contributes to later turns' history.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnTranscript {
    pub response: String,
    pub tool_rounds: Vec<ToolCallRound>,
    pub tool_results: BTreeMap<ToolCallId, String>,
}

#[cfg(test)]
mod tests {
    use super::{ChatMessage, Role};
    use crate::model::ToolCallId;

    #[test]
    fn roles_follow_variants() {
        assert_eq!(ChatMessage::user("hi").role(), Role::User);
        assert_eq!(ChatMessage::assistant("ok").role(), Role::Assistant);
        let id = ToolCallId::new("call_1").expect("id");
        assert_eq!(ChatMessage::tool_result(id, "out").role(), Role::Tool);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).expect("serialize");
        assert_eq!(json, "\"assistant\"");
    }
}
