// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Scripted stand-ins for the model, validator, tools and view.
//!
//! Used by unit and integration tests; kept public so the `tests/` crate can reach them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::llm::{
    ChatRequest, LanguageModel, LanguageModelError, ResponsePart, ResponseStream, ToolSpec,
};
use crate::model::{ChatMessage, Diagram, ToolCall, ToolCallId, ValidationResult};
use crate::present::DiagramView;
use crate::tools::{Tool, ToolError};
use crate::validate::{Validator, ValidatorError};

type Script = Vec<Result<ResponsePart, LanguageModelError>>;

/// Replays canned responses in order and records every request it receives.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    name: String,
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    tool_names: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Queues a response streamed as the given text chunks.
    pub fn reply(self, chunks: &[&str]) -> Self {
        self.push(
            chunks
                .iter()
                .map(|chunk| Ok(ResponsePart::Text((*chunk).to_owned())))
                .collect(),
        )
    }

    /// Queues a response made only of tool calls, as `(name, arguments)`.
    pub fn tool_calls(self, calls: &[(&str, &str)]) -> Self {
        self.push(
            calls
                .iter()
                .enumerate()
                .map(|(index, (name, arguments))| {
                    Ok(ResponsePart::ToolCall(ToolCall {
                        id: ToolCallId::synthetic(index),
                        name: (*name).to_owned(),
                        arguments: (*arguments).to_owned(),
                    }))
                })
                .collect(),
        )
    }

    pub fn push(self, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(script);
        self
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Tool names advertised on each request.
    pub fn advertised_tools(&self) -> Vec<Vec<String>> {
        self.tool_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        request: ChatRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<ResponseStream, LanguageModelError> {
        if cancel.is_cancelled() {
            return Err(LanguageModelError::Cancelled);
        }
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.messages.to_vec());
        self.tool_names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.tools.iter().map(|tool| tool.name.clone()).collect());
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| LanguageModelError::Stream("script exhausted".to_owned()))?;
        Ok(stream::iter(script).boxed())
    }
}

/// Answers with queued results, then succeeds. Records what it was asked to validate.
#[derive(Clone, Default)]
pub struct ScriptedValidator {
    results: Arc<Mutex<VecDeque<ValidationResult>>>,
    seen: Arc<Mutex<Vec<Diagram>>>,
}

impl ScriptedValidator {
    pub fn new(results: impl IntoIterator<Item = ValidationResult>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results.into_iter().collect())),
            seen: Arc::default(),
        }
    }

    /// Fails every diagram with `error`.
    pub fn always_failing(error: &str, times: usize) -> Self {
        Self::new(std::iter::repeat_with(|| ValidationResult::failure(error)).take(times))
    }

    pub fn seen(&self) -> Vec<Diagram> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    async fn validate(
        &self,
        diagram: &Diagram,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, ValidatorError> {
        if cancel.is_cancelled() {
            return Err(ValidatorError::Cancelled);
        }
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagram.clone());
        Ok(self
            .results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(ValidationResult::Success))
    }
}

/// Returns its arguments as text and counts invocations.
#[derive(Clone)]
pub struct EchoTool {
    name: String,
    calls: Arc<AtomicUsize>,
}

impl EchoTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: "Echoes its arguments".to_owned(),
            parameters: json!({"type": "object"}),
        }
    }

    fn invocation_message(&self, _arguments: &Value) -> Option<String> {
        Some(format!("Running {}", self.name))
    }

    async fn invoke(
        &self,
        arguments: Value,
        _cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("echo {arguments}"))
    }
}

/// Remembers every diagram it was asked to show.
#[derive(Debug, Default, Clone)]
pub struct RecordingView {
    pub shown: Vec<Diagram>,
}

#[async_trait]
impl DiagramView for RecordingView {
    async fn show(&mut self, diagram: &Diagram) {
        self.shown.push(diagram.clone());
    }
}

/// A current-thread runtime for driving async code from `#[test]` functions.
pub fn new_runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => panic!("tokio runtime: {err}"),
    }
}
