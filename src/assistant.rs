// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The chat surface: slash commands, prompt assembly and one controller run per request.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::controller::{ControllerError, RetryController, TurnContext, TurnOptions, TurnReport};
use crate::present::{DiagramView, ResponseSink};
use crate::prompt::commands::NO_DIAGRAM_TO_ITERATE;
use crate::prompt::{ChatCommand, ChatTurnRequest, PromptBuilder, PromptError, HELP_MARKDOWN};
use crate::session::{Session, ViewKind};

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

#[derive(Clone)]
pub struct ChatAssistant {
    controller: RetryController,
    session: Arc<Session>,
    workspace_root: PathBuf,
}

impl ChatAssistant {
    pub fn new(
        controller: RetryController,
        session: Arc<Session>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            controller,
            session,
            workspace_root: workspace_root.into(),
        }
    }

    pub fn controller(&self) -> &RetryController {
        &self.controller
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn workspace_root(&self) -> &std::path::Path {
        &self.workspace_root
    }

    /// Answers one chat request. `/help` and `/iterate` without a diagram never reach the
    /// model.
    pub async fn respond(
        &self,
        request: &ChatTurnRequest,
        sink: &mut dyn ResponseSink,
        view: &mut dyn DiagramView,
        cancel: &CancellationToken,
    ) -> Result<TurnReport, AssistantError> {
        let current = self.session.current(ViewKind::Chat);
        match request.command {
            Some(ChatCommand::Help) => {
                sink.markdown(HELP_MARKDOWN);
                return Ok(TurnReport::answered());
            }
            Some(ChatCommand::Iterate) if current.is_none() => {
                sink.markdown(NO_DIAGRAM_TO_ITERATE);
                return Ok(TurnReport::answered());
            }
            _ => {}
        }

        if let Some(focus) = &request.focus {
            self.session.set_last_focused(focus);
        }
        let messages = PromptBuilder::new(&self.workspace_root)
            .with_current_diagram(current.as_ref())
            .chat(request)?;
        for path in request.references.iter().filter_map(|reference| reference.path()) {
            sink.reference(&self.workspace_root.join(path));
        }

        info!(
            command = request.command.map(ChatCommand::name).unwrap_or("chat"),
            references = request.references.len(),
            "chat turn"
        );
        let turn = TurnContext {
            session: &self.session,
            view_kind: ViewKind::Chat,
            sink,
            view,
            cancel,
        };
        Ok(self
            .controller
            .run(messages, turn, TurnOptions::default())
            .await?)
    }
}
