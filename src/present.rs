// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Output surfaces of a chat turn.
//!
//! [`ResponseSink`] receives the streamed chat reply; [`DiagramView`] displays the
//! validated diagram. Both are implemented by the terminal front end and the MCP server.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::model::Diagram;

/// A follow-up the host can offer next to the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkAction {
    /// Open the Markdown source of the current diagram.
    OpenMarkdownSource { title: String },
    /// Hand the conversation over to the chat surface.
    ContinueInChat,
}

pub trait ResponseSink: Send {
    fn markdown(&mut self, text: &str);

    fn progress(&mut self, message: &str);

    fn action(&mut self, action: SinkAction);

    /// A file the reply is grounded on.
    fn reference(&mut self, _path: &Path) {}
}

#[async_trait]
pub trait DiagramView: Send {
    async fn show(&mut self, diagram: &Diagram);
}

/// Discards every diagram.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoView;

#[async_trait]
impl DiagramView for NoView {
    async fn show(&mut self, _diagram: &Diagram) {}
}

/// Collects the reply in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectingSink {
    pub markdown: String,
    pub progress: Vec<String>,
    pub actions: Vec<SinkAction>,
    pub references: Vec<PathBuf>,
}

impl ResponseSink for CollectingSink {
    fn markdown(&mut self, text: &str) {
        self.markdown.push_str(text);
    }

    fn progress(&mut self, message: &str) {
        self.progress.push(message.to_owned());
    }

    fn action(&mut self, action: SinkAction) {
        self.actions.push(action);
    }

    fn reference(&mut self, path: &Path) {
        self.references.push(path.to_path_buf());
    }
}
