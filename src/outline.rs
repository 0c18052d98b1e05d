// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Outline diagrams of a single document.
//!
//! Only one outline run is live at a time: starting a new one cancels the previous run.
//! In follow mode every change of the active document starts a new run.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::controller::{ControllerError, RetryController, TurnContext, TurnOptions, TurnOutcome};
use crate::model::Diagram;
use crate::present::{DiagramView, ResponseSink, SinkAction};
use crate::prompt::outline_messages;
use crate::session::{Session, ViewKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineOutcome {
    Generated(Diagram),
    /// Every attempt failed; the host should offer to continue in chat.
    Failed { errors: Vec<String> },
    Cancelled,
    /// No document given and none focused before.
    NoDocument,
}

#[derive(Debug, thiserror::Error)]
pub enum OutlineError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

pub struct OutlineService {
    controller: RetryController,
    session: Arc<Session>,
    running: Mutex<Option<CancellationToken>>,
}

impl OutlineService {
    pub fn new(controller: RetryController, session: Arc<Session>) -> Self {
        Self {
            controller,
            session,
            running: Mutex::new(None),
        }
    }

    /// Cancels the live run, if any.
    pub fn cancel(&self) {
        if let Some(token) = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }

    fn start_run(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    /// Generates an outline of `document`, or of the last focused document when `None`.
    pub async fn refresh(
        &self,
        document: Option<&Path>,
        sink: &mut dyn ResponseSink,
        view: &mut dyn DiagramView,
    ) -> Result<OutlineOutcome, OutlineError> {
        let cancel = self.start_run();
        let Some(document) = document
            .map(Path::to_path_buf)
            .or_else(|| self.session.last_focused())
        else {
            warn!("no document to outline");
            return Ok(OutlineOutcome::NoDocument);
        };

        info!(document = %document.display(), "generating outline diagram");
        let contents = tokio::fs::read_to_string(&document)
            .await
            .map_err(|source| OutlineError::Read {
                path: document.clone(),
                source,
            })?;
        self.session.set_last_focused(&document);

        let turn = TurnContext {
            session: &self.session,
            view_kind: ViewKind::Outline,
            sink: &mut *sink,
            view,
            cancel: &cancel,
        };
        let report = self
            .controller
            .run(
                outline_messages(&document, &contents),
                turn,
                TurnOptions {
                    prefer_fallback: true,
                },
            )
            .await?;

        Ok(match report.outcome {
            TurnOutcome::Success { diagram, .. } => OutlineOutcome::Generated(diagram),
            TurnOutcome::Exhausted { retry, .. } => {
                sink.action(SinkAction::ContinueInChat);
                OutlineOutcome::Failed {
                    errors: retry.errors().to_vec(),
                }
            }
            TurnOutcome::Cancelled | TurnOutcome::Answered => {
                info!("outline run cancelled");
                OutlineOutcome::Cancelled
            }
        })
    }

    /// Records `document` as focused and, in follow mode, refreshes the outline for it.
    pub async fn active_document_changed(
        &self,
        document: &Path,
        sink: &mut dyn ResponseSink,
        view: &mut dyn DiagramView,
    ) -> Result<Option<OutlineOutcome>, OutlineError> {
        self.session.set_last_focused(document);
        if !self.session.follows_active_document() {
            return Ok(None);
        }
        // Only real files replace the running outline.
        let is_file = tokio::fs::metadata(document)
            .await
            .is_ok_and(|metadata| metadata.is_file());
        if !is_file {
            return Ok(None);
        }
        self.refresh(Some(document), sink, view).await.map(Some)
    }

    /// Turns follow mode on or off; turning it on refreshes the focused document.
    pub async fn set_follow(
        &self,
        follow: bool,
        sink: &mut dyn ResponseSink,
        view: &mut dyn DiagramView,
    ) -> Result<Option<OutlineOutcome>, OutlineError> {
        self.session.set_follow_active_document(follow);
        match (follow, self.session.last_focused()) {
            (true, Some(document)) => self.refresh(Some(&document), sink, view).await.map(Some),
            _ => Ok(None),
        }
    }
}
