// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Presentation for the command line: replies on stdout, progress on stderr, accepted
//! diagrams written to disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{Diagram, ValidationResult};
use crate::present::{DiagramView, ResponseSink, SinkAction};
use crate::store::DiagramDocument;
use crate::validate::{ChannelValidator, MermaidCli};

/// Streams the reply to `out` and progress lines to `status`.
pub struct TerminalSink<W, S> {
    out: W,
    status: S,
    /// Markdown document of the last shown diagram, for the "open source" action.
    source: Option<PathBuf>,
}

impl<W: Write + Send, S: Write + Send> TerminalSink<W, S> {
    pub fn new(out: W, status: S) -> Self {
        Self {
            out,
            status,
            source: None,
        }
    }

    pub fn set_source(&mut self, path: Option<PathBuf>) {
        self.source = path;
    }

    pub fn into_parts(self) -> (W, S) {
        (self.out, self.status)
    }

    fn status_line(&mut self, line: &str) {
        if let Err(err) = writeln!(self.status, "{line}").and_then(|()| self.status.flush()) {
            debug!(error = %err, "status write failed");
        }
    }
}

impl<W: Write + Send, S: Write + Send> ResponseSink for TerminalSink<W, S> {
    fn markdown(&mut self, text: &str) {
        if let Err(err) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            debug!(error = %err, "reply write failed");
        }
    }

    fn progress(&mut self, message: &str) {
        self.status_line(&format!("… {message}"));
    }

    fn action(&mut self, action: SinkAction) {
        let line = match (action, &self.source) {
            (SinkAction::OpenMarkdownSource { title }, Some(path)) => {
                format!("→ {title}: {}", path.display())
            }
            (SinkAction::OpenMarkdownSource { title }, None) => format!("→ {title}"),
            (SinkAction::ContinueInChat, _) => {
                "→ Continue in chat: mermaide chat, then /help".to_owned()
            }
        };
        self.status_line(&line);
    }

    fn reference(&mut self, path: &Path) {
        self.status_line(&format!("  using {}", path.display()));
    }
}

/// Writes each accepted diagram as `<name>.md`, optionally renders `<name>.svg` next to it
/// and forwards it to a connected page.
pub struct DocumentView {
    documents: DiagramDocument,
    name: String,
    renderer: Option<MermaidCli>,
    page: Option<ChannelValidator>,
    written: Vec<PathBuf>,
}

impl DocumentView {
    pub fn new(documents: DiagramDocument, name: impl Into<String>) -> Self {
        Self {
            documents,
            name: name.into(),
            renderer: None,
            page: None,
            written: Vec::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: Option<MermaidCli>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_page(mut self, page: Option<ChannelValidator>) -> Self {
        self.page = page;
        self
    }

    /// Files written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn last_document(&self) -> Option<&Path> {
        self.written
            .iter()
            .rev()
            .find(|path| path.extension().is_some_and(|ext| ext == "md"))
            .map(PathBuf::as_path)
    }
}

#[async_trait]
impl DiagramView for DocumentView {
    async fn show(&mut self, diagram: &Diagram) {
        let document = match self.documents.save(&self.name, diagram) {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "failed to save diagram document");
                return;
            }
        };
        info!(path = %document.display(), "diagram document written");
        self.written.push(document.clone());

        if let Some(renderer) = &self.renderer {
            let svg = document.with_extension("svg");
            match renderer
                .render_svg(diagram, &svg, &CancellationToken::new())
                .await
            {
                Ok(ValidationResult::Success) => self.written.push(svg),
                Ok(failure) => {
                    warn!(error = failure.error().unwrap_or_default(), "svg render failed")
                }
                Err(err) => warn!(error = %err, "svg renderer unavailable"),
            }
        }

        if let Some(page) = &self.page {
            if let Err(err) = page.render(diagram).await {
                warn!(error = %err, "page did not take the diagram");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{DocumentView, TerminalSink};
    use crate::model::Diagram;
    use crate::present::{DiagramView, ResponseSink, SinkAction};
    use crate::store::DiagramDocument;
    use crate::testing::new_runtime;
    use crate::validate::{ChannelValidator, HostMessage};

    #[test]
    fn sink_splits_reply_and_status() {
        let mut sink = TerminalSink::new(Vec::new(), Vec::new());
        sink.markdown("Here");
        sink.markdown(" it is");
        sink.progress("Validating mermaid diagram");
        sink.set_source(Some(PathBuf::from("out/diagram.md")));
        sink.action(SinkAction::OpenMarkdownSource {
            title: "Open mermaid source".to_owned(),
        });
        sink.action(SinkAction::ContinueInChat);

        let (out, status) = sink.into_parts();
        assert_eq!(String::from_utf8(out).expect("utf8"), "Here it is");
        let status = String::from_utf8(status).expect("utf8");
        assert_eq!(
            status.lines().collect::<Vec<_>>(),
            vec![
                "… Validating mermaid diagram",
                "→ Open mermaid source: out/diagram.md",
                "→ Continue in chat: mermaide chat, then /help",
            ]
        );
    }

    #[test]
    fn view_writes_markdown_and_forwards_to_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let mut view = DocumentView::new(DiagramDocument::new(dir.path()), "chat")
            .with_page(Some(ChannelValidator::new(tx)));
        let diagram = Diagram::from_response("flowchart TD\nA --> B");

        new_runtime().block_on(view.show(&diagram));

        let document = dir.path().join("chat.md");
        assert_eq!(view.last_document(), Some(document.as_path()));
        assert_eq!(
            std::fs::read_to_string(&document).expect("read"),
            diagram.as_markdown()
        );
        assert_eq!(
            rx.try_recv().expect("render message"),
            HostMessage::Render {
                diagram: "flowchart TD\nA --> B".to_owned()
            }
        );
    }

    #[test]
    fn unsavable_name_is_logged_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut view = DocumentView::new(DiagramDocument::new(dir.path()), "../escape");
        new_runtime().block_on(view.show(&Diagram::from_response("pie")));
        assert!(view.written().is_empty());
    }
}
