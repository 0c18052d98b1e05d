// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Tools the model may call while drafting a diagram.

pub mod symbol;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::llm::ToolSpec;
use crate::model::ToolCall;

pub use symbol::SymbolDefinitionTool;

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// Progress line shown while the tool runs.
    fn invocation_message(&self, _arguments: &Value) -> Option<String> {
        None
    }

    async fn invoke(&self, arguments: Value, cancel: &CancellationToken)
        -> Result<String, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("model called unknown tool `{name}`")]
    UnknownTool { name: String },
    #[error("invalid arguments for tool `{name}`: {reason}")]
    InvalidArguments { name: String, reason: String },
    #[error("tool `{name}` failed: {reason}")]
    Failed { name: String, reason: String },
    #[error("tool invocation cancelled")]
    Cancelled,
}

/// The tools advertised to the model, by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A tool call whose tool exists and whose arguments parsed.
pub struct ResolvedCall {
    pub call: ToolCall,
    pub tool: Arc<dyn Tool>,
    pub arguments: Value,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.spec().name, tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec()).collect()
    }

    /// Looks up the tool and parses the arguments. Empty argument text means `{}`.
    pub fn resolve(&self, call: &ToolCall) -> Result<ResolvedCall, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool {
                name: call.name.clone(),
            })?;
        let raw = call.arguments.trim();
        let arguments = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).map_err(|err| ToolError::InvalidArguments {
                name: call.name.clone(),
                reason: err.to_string(),
            })?
        };
        Ok(ResolvedCall {
            call: call.clone(),
            tool,
            arguments,
        })
    }
}
