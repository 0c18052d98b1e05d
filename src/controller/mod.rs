// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The draft → validate → repair loop of one chat turn.
//!
//! Each attempt streams a model response (running any tool calls it asks for), extracts
//! the fenced diagram and validates it. A failure feeds the error back to the model and
//! tries again until the retry ceiling is reached. The ceiling is the maximum number of
//! candidate diagrams requested per turn; empty and invalid candidates both count.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::format::FenceScanner;
use crate::llm::{ChatRequest, LanguageModel, LanguageModelError, ResponsePart, ToolSpec};
use crate::model::{
    ChatMessage, Diagram, DiagramKind, ToolCallRound, TurnTranscript, ValidationResult,
};
use crate::present::{DiagramView, ResponseSink, SinkAction};
use crate::prompt::{nesting_hint_message, retry_message, TOOL_RESULTS_NOTE};
use crate::session::{Session, ViewKind};
use crate::tools::{ToolError, ToolRegistry};
use crate::translate;
use crate::validate::{Validator, ValidatorError};

pub const DEFAULT_RETRY_CEILING: usize = 4;
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

pub const EMPTY_DIAGRAM_ERROR: &str = "The diagram is empty, please retry";
pub const EXHAUSTED_MESSAGE: &str =
    "Failed to display your requested mermaid diagram. Check output log for details.\n\n";

/// Attempts from this index on never use the secondary provider.
const LAST_FALLBACK_ATTEMPT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Drafting,
    ExtractingDiagram,
    Validating,
    Retrying,
    Success,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum candidate diagrams per turn. At least 1.
    pub ceiling: usize,
    /// Maximum tool-call rounds inside a single draft.
    pub max_tool_rounds: usize,
    /// Inject the flat-classes reminder on the first retry of a class diagram.
    pub nesting_hint: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_RETRY_CEILING,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            nesting_hint: true,
        }
    }
}

/// Failed candidates so far and their errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: usize,
    errors: Vec<String>,
}

impl RetryState {
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn record_failure(&mut self, error: &str) {
        self.attempts += 1;
        self.errors.push(error.to_owned());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Success { diagram: Diagram, attempts: usize },
    Exhausted { last_diagram: Diagram, retry: RetryState },
    Cancelled,
    /// Answered without a model call (help, nothing to iterate on).
    Answered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    pub transcript: TurnTranscript,
}

impl TurnReport {
    pub fn answered() -> Self {
        Self {
            outcome: TurnOutcome::Answered,
            transcript: TurnTranscript::default(),
        }
    }

    fn cancelled(transcript: TurnTranscript) -> Self {
        Self {
            outcome: TurnOutcome::Cancelled,
            transcript,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Model(LanguageModelError),
    #[error(transparent)]
    Tool(ToolError),
    #[error(transparent)]
    Validator(ValidatorError),
    #[error("model kept calling tools for more than {limit} rounds")]
    ToolRoundsExceeded { limit: usize },
}

/// Where a turn's output goes.
pub struct TurnContext<'a> {
    pub session: &'a Session,
    pub view_kind: ViewKind,
    pub sink: &'a mut dyn ResponseSink,
    pub view: &'a mut dyn DiagramView,
    pub cancel: &'a CancellationToken,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOptions {
    /// Start with the secondary provider, when one is configured.
    pub prefer_fallback: bool,
}

struct Draft {
    diagram_text: String,
}

enum Step<T> {
    Done(T),
    Cancelled,
}

#[derive(Clone)]
pub struct RetryController {
    model: Arc<dyn LanguageModel>,
    fallback: Option<Arc<dyn LanguageModel>>,
    tools: Arc<ToolRegistry>,
    validator: Arc<dyn Validator>,
    policy: RetryPolicy,
    log_path: Option<PathBuf>,
}

impl RetryController {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        Self {
            model,
            fallback: None,
            tools,
            validator,
            policy: RetryPolicy::default(),
            log_path: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = RetryPolicy {
            ceiling: policy.ceiling.max(1),
            ..policy
        };
        self
    }

    pub fn with_fallback(mut self, fallback: Option<Arc<dyn LanguageModel>>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Diagnostic log shown to the user when a turn is exhausted.
    pub fn with_log_path(mut self, log_path: Option<PathBuf>) -> Self {
        self.log_path = log_path;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn validator(&self) -> &Arc<dyn Validator> {
        &self.validator
    }

    /// Runs one turn starting from the rendered conversation `messages`.
    pub async fn run(
        &self,
        mut messages: Vec<ChatMessage>,
        turn: TurnContext<'_>,
        options: TurnOptions,
    ) -> Result<TurnReport, ControllerError> {
        let TurnContext {
            session,
            view_kind,
            sink,
            view,
            cancel,
        } = turn;
        let specs = self.tools.specs();
        let mut transcript = TurnTranscript::default();
        let mut retry = RetryState::default();
        let mut fallback_enabled = options.prefer_fallback && self.fallback.is_some();
        let mut last_diagram = Diagram::empty();

        for attempt in 0..self.policy.ceiling {
            if attempt >= LAST_FALLBACK_ATTEMPT && fallback_enabled {
                info!(attempt, "disabling secondary provider");
                fallback_enabled = false;
            }
            let model = match (&self.fallback, fallback_enabled) {
                (Some(fallback), true) => fallback.as_ref(),
                _ => self.model.as_ref(),
            };

            debug!(attempt, model = model.name(), phase = ?Phase::Drafting, "drafting");
            let draft = match self
                .draft(model, &specs, &mut messages, &mut transcript, sink, cancel)
                .await?
            {
                Step::Done(draft) => draft,
                Step::Cancelled => return Ok(TurnReport::cancelled(transcript)),
            };

            let diagram = Diagram::from_response(&draft.diagram_text);
            debug!(attempt, kind = %diagram.kind(), phase = ?Phase::ExtractingDiagram, "extracted diagram");

            let result = if diagram.is_empty() {
                fallback_enabled = false;
                ValidationResult::failure(EMPTY_DIAGRAM_ERROR)
            } else {
                sink.progress("Validating mermaid diagram");
                match self.validator.validate(&diagram, cancel).await {
                    Ok(result) => result,
                    Err(ValidatorError::Cancelled) => return Ok(TurnReport::cancelled(transcript)),
                    Err(err) => return Err(ControllerError::Validator(err)),
                }
            };
            if cancel.is_cancelled() {
                return Ok(TurnReport::cancelled(transcript));
            }

            let (raw_error, friendly_error) = match result
                .with_friendly_error(|raw| translate::friendly_error(raw, Some(diagram.content())))
            {
                ValidationResult::Success => {
                    info!(attempt, kind = %diagram.kind(), "diagram validated");
                    session.set_current(view_kind, diagram.clone());
                    view.show(&diagram).await;
                    sink.markdown(&diagram.as_markdown());
                    sink.action(SinkAction::OpenMarkdownSource {
                        title: "Open mermaid source".to_owned(),
                    });
                    return Ok(TurnReport {
                        outcome: TurnOutcome::Success {
                            diagram,
                            attempts: retry.attempts() + 1,
                        },
                        transcript,
                    });
                }
                ValidationResult::Failure {
                    error,
                    friendly_error,
                } => (error, friendly_error),
            };

            warn!(attempt, error = %raw_error, "diagram failed validation");
            retry.record_failure(&raw_error);
            let is_class = diagram.kind() == DiagramKind::Class;
            last_diagram = diagram;
            if retry.attempts() >= self.policy.ceiling {
                break;
            }

            debug!(attempt, phase = ?Phase::Retrying, "re-prompting");
            sink.progress("Attempting to fix validation errors");
            if retry.attempts() == 1 && self.policy.nesting_hint && is_class {
                messages.push(nesting_hint_message());
            }
            messages.push(retry_message(
                &raw_error,
                friendly_error.as_deref(),
                &last_diagram,
            ));
        }

        error!(
            attempts = retry.attempts(),
            errors = ?retry.errors(),
            "giving up on diagram"
        );
        sink.markdown(&exhausted_message(self.log_path.as_deref()));
        sink.markdown(last_diagram.content());
        Ok(TurnReport {
            outcome: TurnOutcome::Exhausted { last_diagram, retry },
            transcript,
        })
    }

    /// Streams one model response, looping through tool rounds until the model answers
    /// without tool calls.
    async fn draft(
        &self,
        model: &dyn LanguageModel,
        specs: &[ToolSpec],
        messages: &mut Vec<ChatMessage>,
        transcript: &mut TurnTranscript,
        sink: &mut dyn ResponseSink,
        cancel: &CancellationToken,
    ) -> Result<Step<Draft>, ControllerError> {
        let mut round = 0;
        loop {
            let request = ChatRequest {
                messages: messages.as_slice(),
                tools: specs,
            };
            let sent = tokio::select! {
                _ = cancel.cancelled() => return Ok(Step::Cancelled),
                sent = model.send(request, cancel) => sent,
            };
            let mut stream = match sent {
                Ok(stream) => stream,
                Err(LanguageModelError::Cancelled) => return Ok(Step::Cancelled),
                Err(err) => return Err(ControllerError::Model(err)),
            };

            let mut scanner = FenceScanner::new();
            let mut prose = String::new();
            let mut tool_calls = Vec::new();
            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => return Ok(Step::Cancelled),
                    next = stream.next() => next,
                };
                match next {
                    None => break,
                    Some(Ok(ResponsePart::Text(text))) => {
                        let was_in_diagram = scanner.in_diagram();
                        let released = scanner.push(&text);
                        if !released.is_empty() {
                            sink.markdown(&released);
                            prose.push_str(&released);
                        }
                        if !was_in_diagram && scanner.in_diagram() {
                            sink.progress("Capturing mermaid diagram from the model...");
                        }
                    }
                    Some(Ok(ResponsePart::ToolCall(call))) => tool_calls.push(call),
                    Some(Err(LanguageModelError::Cancelled)) => return Ok(Step::Cancelled),
                    Some(Err(err)) => return Err(ControllerError::Model(err)),
                }
            }

            let scanned = scanner.finish();
            if !scanned.prose_tail.is_empty() {
                sink.markdown(&scanned.prose_tail);
                prose.push_str(&scanned.prose_tail);
            }

            if tool_calls.is_empty() {
                transcript.response = prose;
                return Ok(Step::Done(Draft {
                    diagram_text: scanned.diagram,
                }));
            }

            if round >= self.policy.max_tool_rounds {
                return Err(ControllerError::ToolRoundsExceeded {
                    limit: self.policy.max_tool_rounds,
                });
            }
            round += 1;

            let resolved = tool_calls
                .iter()
                .map(|call| self.tools.resolve(call))
                .collect::<Result<Vec<_>, _>>()
                .map_err(ControllerError::Tool)?;

            messages.push(ChatMessage::assistant_with_tool_calls(
                prose.clone(),
                tool_calls.clone(),
            ));
            for resolved in resolved {
                if let Some(message) = resolved.tool.invocation_message(&resolved.arguments) {
                    sink.progress(&message);
                }
                info!(tool = %resolved.call.name, call_id = %resolved.call.id, "invoking tool");
                let output = tokio::select! {
                    _ = cancel.cancelled() => return Ok(Step::Cancelled),
                    output = resolved.tool.invoke(resolved.arguments, cancel) => output,
                };
                let output = match output {
                    Ok(output) => output,
                    Err(ToolError::Cancelled) => return Ok(Step::Cancelled),
                    Err(err) => return Err(ControllerError::Tool(err)),
                };
                transcript
                    .tool_results
                    .insert(resolved.call.id.clone(), output.clone());
                messages.push(ChatMessage::tool_result(resolved.call.id, output));
            }
            messages.push(ChatMessage::user(TOOL_RESULTS_NOTE));
            transcript.tool_rounds.push(ToolCallRound {
                response: prose,
                tool_calls,
            });
        }
    }
}

fn exhausted_message(log_path: Option<&Path>) -> String {
    match log_path {
        Some(path) => format!("{EXHAUSTED_MESSAGE}Log file: {}\n\n", path.display()),
        None => EXHAUSTED_MESSAGE.to_owned(),
    }
}

#[cfg(test)]
mod tests;
