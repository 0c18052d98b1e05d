// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::assistant::{AssistantError, ChatAssistant};
use crate::controller::TurnOutcome;
use crate::format::navigation_targets;
use crate::model::Diagram;
use crate::present::{CollectingSink, NoView};
use crate::prompt::{ChatCommand, ChatTurnRequest, Reference};
use crate::session::ViewKind;
use crate::translate;
use crate::validate::ValidatorError;

use super::types::*;

#[derive(Clone)]
pub struct MermaideMcp {
    assistant: Arc<ChatAssistant>,
    /// Serializes generations; one model turn at a time.
    turn_lock: Arc<Mutex<()>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl MermaideMcp {
    pub fn new(assistant: ChatAssistant) -> Self {
        Self {
            assistant: Arc::new(assistant),
            turn_lock: Arc::new(Mutex::new(())),
            tool_router: Self::tool_router(),
        }
    }

    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    /// Check whether Mermaid source renders; failures come with a plain-language hint that
    /// names the offending line.
    #[tool(name = "diagram.validate")]
    async fn diagram_validate(
        &self,
        params: Parameters<DiagramValidateParams>,
    ) -> Result<Json<DiagramValidateResponse>, ErrorData> {
        let DiagramValidateParams { mermaid } = params.0;
        let diagram = Diagram::from_response(&mermaid);
        let result = self
            .assistant
            .controller()
            .validator()
            .validate(&diagram, &CancellationToken::new())
            .await
            .map_err(validator_error)?
            .with_friendly_error(|raw| translate::friendly_error(raw, Some(diagram.content())));

        Ok(Json(DiagramValidateResponse {
            valid: result.is_success(),
            kind: diagram.kind().label().to_owned(),
            error: result.error().map(str::to_owned),
            friendly_error: result.friendly_error().map(str::to_owned),
        }))
    }

    /// Read the diagram currently shown in a view (`chat` by default, or `outline`), with
    /// the source locations its click handlers point at.
    #[tool(name = "diagram.current")]
    async fn diagram_current(
        &self,
        params: Parameters<DiagramCurrentParams>,
    ) -> Result<Json<DiagramCurrentResponse>, ErrorData> {
        let view = match params.0.view.as_deref() {
            None => ViewKind::Chat,
            Some(label) => ViewKind::parse(label).ok_or_else(|| {
                ErrorData::invalid_params(
                    format!("unknown view {label:?} (expected 'chat' or 'outline')"),
                    None,
                )
            })?,
        };
        let current = self.assistant.session().current(view);
        let navigation = current
            .as_ref()
            .map(|diagram| {
                navigation_targets(diagram)
                    .into_iter()
                    .map(|target| McpNavigationTarget {
                        label: target.label,
                        path: target.path.display().to_string(),
                        line: target.line,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Json(DiagramCurrentResponse {
            view: view.label().to_owned(),
            mermaid: current.as_ref().map(|diagram| diagram.content().to_owned()),
            kind: current.as_ref().map(|diagram| diagram.kind().label().to_owned()),
            navigation,
        }))
    }

    /// Ask the assistant for a diagram. Runs the full draft, validate and repair loop; a
    /// successful diagram becomes the current chat diagram.
    #[tool(name = "diagram.generate")]
    async fn diagram_generate(
        &self,
        params: Parameters<DiagramGenerateParams>,
    ) -> Result<Json<DiagramGenerateResponse>, ErrorData> {
        let DiagramGenerateParams {
            prompt,
            command,
            references,
        } = params.0;
        let command = command
            .as_deref()
            .map(str::parse::<ChatCommand>)
            .transpose()
            .map_err(|err| ErrorData::invalid_params(err.to_string(), None))?;
        let mut request = ChatTurnRequest::new(prompt).with_command(command);
        request.references = references
            .unwrap_or_default()
            .iter()
            .map(|raw| Reference::parse(raw))
            .collect();

        let _turn = self.turn_lock.lock().await;
        info!(command = ?command, "mcp generate");
        let mut sink = CollectingSink::default();
        let report = self
            .assistant
            .respond(&request, &mut sink, &mut NoView, &CancellationToken::new())
            .await
            .map_err(assistant_error)?;

        let (outcome, attempts, mermaid, errors) = match report.outcome {
            TurnOutcome::Success { diagram, attempts } => (
                GenerateOutcome::Success,
                attempts,
                Some(diagram.content().to_owned()),
                Vec::new(),
            ),
            TurnOutcome::Exhausted {
                last_diagram,
                retry,
            } => (
                GenerateOutcome::Exhausted,
                retry.attempts(),
                Some(last_diagram.content().to_owned()),
                retry.errors().to_vec(),
            ),
            TurnOutcome::Cancelled => (GenerateOutcome::Cancelled, 0, None, Vec::new()),
            TurnOutcome::Answered => (GenerateOutcome::Answered, 0, None, Vec::new()),
        };

        Ok(Json(DiagramGenerateResponse {
            outcome,
            attempts,
            mermaid,
            errors,
            reply_markdown: sink.markdown,
            progress: sink.progress,
        }))
    }
}

fn validator_error(err: ValidatorError) -> ErrorData {
    ErrorData::internal_error(format!("validator unavailable: {err}"), None)
}

fn assistant_error(err: AssistantError) -> ErrorData {
    match err {
        AssistantError::Prompt(err) => ErrorData::invalid_params(err.to_string(), None),
        AssistantError::Controller(err) => ErrorData::internal_error(err.to_string(), None),
    }
}

#[tool_handler]
impl ServerHandler for MermaideMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Mermaide diagram assistant (tools: diagram.validate, diagram.current, diagram.generate)"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
