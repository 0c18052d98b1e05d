// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;

/// Opening delimiter of a Mermaid block in Markdown.
pub const MERMAID_FENCE: &str = "```mermaid";
/// Generic Markdown code-fence delimiter.
pub const FENCE: &str = "```";

/// The type of diagram, detected from its header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagramKind {
    Class,
    Sequence,
    Flowchart,
    State,
    EntityRelationship,
    Journey,
    Gantt,
    Pie,
    Mindmap,
    Other,
}

impl DiagramKind {
    /// Detects the kind from the first meaningful line, skipping `%%` comments and a
    /// leading `---` front-matter block.
    pub fn detect(content: &str) -> Self {
        let mut in_front_matter = false;
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("%%") {
                continue;
            }
            if line == "---" {
                in_front_matter = !in_front_matter || idx == 0;
                continue;
            }
            if in_front_matter {
                continue;
            }
            let keyword = line.split_whitespace().next().unwrap_or_default();
            return Self::from_keyword(keyword);
        }
        Self::Other
    }

    fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "classDiagram" | "classDiagram-v2" => Self::Class,
            "sequenceDiagram" => Self::Sequence,
            "flowchart" | "graph" | "flowchart-elk" => Self::Flowchart,
            "stateDiagram" | "stateDiagram-v2" => Self::State,
            "erDiagram" => Self::EntityRelationship,
            "journey" => Self::Journey,
            "gantt" => Self::Gantt,
            "pie" => Self::Pie,
            "mindmap" => Self::Mindmap,
            _ => Self::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Sequence => "sequence",
            Self::Flowchart => "flowchart",
            Self::State => "state",
            Self::EntityRelationship => "entity-relationship",
            Self::Journey => "journey",
            Self::Gantt => "gantt",
            Self::Pie => "pie",
            Self::Mindmap => "mindmap",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mermaid source with any Markdown fencing removed.
///
/// The content never contains "```": construction cuts at the first closing fence, and an
/// input without any fence contains none to begin with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagram {
    content: String,
    kind: DiagramKind,
}

impl Diagram {
    /// Builds a diagram from raw model output.
    ///
    /// A "```mermaid" fence wins over any other fence; otherwise the first bare (or
    /// other-language) fence is used. An unclosed fence runs to the end of the input, and
    /// input without a fence is taken whole. Surrounding whitespace is trimmed.
    pub fn from_response(raw: &str) -> Self {
        let content = strip_fences(raw).to_owned();
        let kind = DiagramKind::detect(&content);
        Self { content, kind }
    }

    pub fn empty() -> Self {
        Self {
            content: String::new(),
            kind: DiagramKind::Other,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn kind(&self) -> DiagramKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The 0-based physical line of the content, if present.
    pub fn line(&self, index: usize) -> Option<&str> {
        self.content.lines().nth(index)
    }

    /// Content re-wrapped in a mermaid fence for Markdown output.
    pub fn as_markdown(&self) -> String {
        format!("{MERMAID_FENCE}\n{}\n{FENCE}\n", self.content)
    }
}

impl Default for Diagram {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Diagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

fn strip_fences(raw: &str) -> &str {
    let body = if let Some(start) = raw.find(MERMAID_FENCE) {
        &raw[start + MERMAID_FENCE.len()..]
    } else if let Some(start) = raw.find(FENCE) {
        skip_info_string(&raw[start + FENCE.len()..])
    } else {
        return raw.trim();
    };

    let body = match body.find(FENCE) {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim()
}

// "```js\n..." carries a language tag up to the first whitespace.
fn skip_info_string(after_fence: &str) -> &str {
    after_fence.trim_start_matches(|ch: char| !ch.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::{Diagram, DiagramKind};
    use rstest::rstest;

    #[test]
    fn strips_mermaid_fence_and_trims() {
        let diagram = Diagram::from_response("```mermaid\n  classDiagram\n  A <|-- B\n```\n");
        assert_eq!(diagram.content(), "classDiagram\n  A <|-- B");
        assert_eq!(diagram.kind(), DiagramKind::Class);
    }

    #[test]
    fn ignores_prose_around_the_fence() {
        let raw = "Here you go:\n```mermaid\ngraph TD\nA-->B\n```\nHope that helps.";
        assert_eq!(Diagram::from_response(raw).content(), "graph TD\nA-->B");
    }

    #[test]
    fn fence_free_input_is_taken_whole() {
        let diagram = Diagram::from_response("  sequenceDiagram\nA->>B: hi\n ");
        assert_eq!(diagram.content(), "sequenceDiagram\nA->>B: hi");
        assert_eq!(diagram.kind(), DiagramKind::Sequence);
    }

    #[test]
    fn unclosed_fence_runs_to_end_of_input() {
        let diagram = Diagram::from_response("```mermaid\nflowchart LR\nA-->B");
        assert_eq!(diagram.content(), "flowchart LR\nA-->B");
    }

    #[test]
    fn bare_fence_skips_language_tag() {
        assert_eq!(Diagram::from_response("```\npie\n```").content(), "pie");
        assert_eq!(Diagram::from_response("```text\npie\n```").content(), "pie");
    }

    #[test]
    fn mermaid_fence_wins_over_earlier_bare_fence() {
        let raw = "```rust\nfn main() {}\n```\n```mermaid\nerDiagram\n```";
        assert_eq!(Diagram::from_response(raw).content(), "erDiagram");
    }

    #[test]
    fn empty_inputs_produce_empty_diagrams() {
        assert!(Diagram::from_response("").is_empty());
        assert!(Diagram::from_response("```mermaid\n```").is_empty());
        assert!(Diagram::from_response("```").is_empty());
    }

    #[test]
    fn as_markdown_rewraps_content() {
        let diagram = Diagram::from_response("pie\n\"a\": 1");
        assert_eq!(diagram.as_markdown(), "```mermaid\npie\n\"a\": 1\n```\n");
    }

    #[test]
    fn line_lookup_is_zero_based() {
        let diagram = Diagram::from_response("classDiagram\nclass A\nclass B");
        assert_eq!(diagram.line(1), Some("class A"));
        assert_eq!(diagram.line(9), None);
    }

    #[rstest]
    #[case("classDiagram", DiagramKind::Class)]
    #[case("%% comment\nsequenceDiagram", DiagramKind::Sequence)]
    #[case("graph TD", DiagramKind::Flowchart)]
    #[case("flowchart LR", DiagramKind::Flowchart)]
    #[case("stateDiagram-v2", DiagramKind::State)]
    #[case("erDiagram", DiagramKind::EntityRelationship)]
    #[case("journey", DiagramKind::Journey)]
    #[case("gantt", DiagramKind::Gantt)]
    #[case("pie title Pets", DiagramKind::Pie)]
    #[case("mindmap", DiagramKind::Mindmap)]
    #[case("---\ntitle: Demo\n---\nclassDiagram", DiagramKind::Class)]
    #[case("quadrantChart", DiagramKind::Other)]
    #[case("", DiagramKind::Other)]
    fn detects_kind(#[case] content: &str, #[case] expected: DiagramKind) {
        assert_eq!(DiagramKind::detect(content), expected);
    }
}
