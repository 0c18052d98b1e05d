// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Conversation rendering.
//!
//! A chat turn becomes: base instructions, command instructions, earlier turns, the focus
//! document, the current diagram, `<context>` references and finally the user's prompt.
//! Retry feedback and tool rounds are appended by the controller as the turn proceeds.

pub mod commands;
pub mod examples;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{ChatMessage, Diagram, ToolCallId, ToolCallRound, TurnTranscript};
use crate::store::resolve_in_workspace;

pub use commands::{command_instructions, ChatCommand, UnknownCommand, HELP_MARKDOWN};

pub const BASE_INSTRUCTIONS: &str = "Instructions:
- You are a helpful chat assistant that creates diagrams using the mermaid syntax.
- If you aren't sure which tool is relevant, you can call multiple tools. You can call tools repeatedly to take actions or gather as much context as needed until you have completed the task fully. Don't give up unless you are sure the request cannot be fulfilled with the tools you have.
- Don't make assumptions about the situation: gather context first, then perform the task or answer the question.
- Don't ask for confirmation to use tools, just use them.
- If you find a symbol you want to get the definition for, like an interface implemented by a class in the context, use the provided tool.
- The final segment of your response should always be a valid mermaid diagram prefixed with a line containing ```mermaid and suffixed with a line containing ```.
- Do not add anything to the response past the closing ``` delimiter or we won't be able to parse the response correctly.
- The ``` delimiter should only occur in the two places mentioned above.";

pub const OUTLINE_INSTRUCTIONS: &str = "You are a helpful chat assistant that creates diagrams for the user using the mermaid syntax.
The output diagram should represent an outline of the document.
Use tools to help you formulate the structure of the code.
You must provide a valid mermaid diagram prefixed with a line containing ```mermaid and suffixed with a line containing ```.
Only ever include the ``` delimiter in the two places mentioned above.
Do not include any other text before or after the diagram, only include the diagram.";

pub const TOOL_RESULTS_NOTE: &str = "Above is the result of calling one or more tools, but they are not displayed, so you should explain them if referencing them in your answer.";

/// Placeholder text for an assistant tool-call turn that had no prose.
const EMPTY_TOOL_TURN: &str = "placeholder";

/// Material the user attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    File(PathBuf),
    /// 1-based inclusive line range.
    Range {
        path: PathBuf,
        start_line: usize,
        end_line: usize,
    },
    Text(String),
}

impl Reference {
    /// Parses `path`, `path:12` or `path:12-40`.
    pub fn parse(raw: &str) -> Self {
        if let Some((path, range)) = raw.rsplit_once(':') {
            let (start, end) = range.split_once('-').unwrap_or((range, range));
            if let (Ok(start_line), Ok(end_line)) = (start.parse(), end.parse()) {
                return Self::Range {
                    path: PathBuf::from(path),
                    start_line,
                    end_line,
                };
            }
        }
        Self::File(PathBuf::from(raw))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) | Self::Range { path, .. } => Some(path),
            Self::Text(_) => None,
        }
    }
}

/// A previous exchange replayed into the next turn's prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryTurn {
    Request {
        prompt: String,
        references: Vec<Reference>,
    },
    Response(TurnTranscript),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatTurnRequest {
    pub prompt: String,
    pub command: Option<ChatCommand>,
    pub references: Vec<Reference>,
    pub history: Vec<HistoryTurn>,
    /// Document the user is looking at, if any.
    pub focus: Option<PathBuf>,
}

impl ChatTurnRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_command(mut self, command: Option<ChatCommand>) -> Self {
        self.command = command;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("invalid tag name `{0}`")]
    InvalidTag(String),
    #[error("failed to read reference {path}: {source}")]
    Reference {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reference {path} is outside the workspace")]
    OutsideWorkspace { path: PathBuf },
}

pub struct PromptBuilder<'a> {
    workspace_root: &'a Path,
    current_diagram: Option<&'a Diagram>,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(workspace_root: &'a Path) -> Self {
        Self {
            workspace_root,
            current_diagram: None,
        }
    }

    pub fn with_current_diagram(mut self, diagram: Option<&'a Diagram>) -> Self {
        self.current_diagram = diagram;
        self
    }

    pub fn chat(&self, request: &ChatTurnRequest) -> Result<Vec<ChatMessage>, PromptError> {
        let mut messages = vec![ChatMessage::user(BASE_INSTRUCTIONS)];
        messages.extend(
            command_instructions(request.command, self.current_diagram)
                .into_iter()
                .map(ChatMessage::user),
        );

        for turn in &request.history {
            match turn {
                HistoryTurn::Request { prompt, references } => {
                    if let Some(context) = self.references(references)? {
                        messages.push(ChatMessage::user(context));
                    }
                    messages.push(ChatMessage::user(prompt.clone()));
                }
                HistoryTurn::Response(transcript) if !transcript.tool_rounds.is_empty() => {
                    messages.extend(tool_round_messages(
                        &transcript.tool_rounds,
                        &transcript.tool_results,
                    ));
                }
                HistoryTurn::Response(transcript) => {
                    messages.push(ChatMessage::assistant(transcript.response.clone()));
                }
            }
        }

        messages.push(ChatMessage::user(match &request.focus {
            Some(path) => format!("My focus is currently on the file {}", path.display()),
            None => format!(
                "There is not a current file open, the root of the workspace is: {}",
                self.workspace_root.display()
            ),
        }));
        messages.push(ChatMessage::user(match self.current_diagram {
            Some(diagram) => format!(
                "The diagram: {} is open, so refer to that if it sounds like I'm referring to an existing diagram.",
                diagram.content()
            ),
            None => "There isn't a diagram open that you created.".to_owned(),
        }));
        if let Some(context) = self.references(&request.references)? {
            messages.push(ChatMessage::user(context));
        }
        messages.push(ChatMessage::user(request.prompt.clone()));
        Ok(messages)
    }

    fn references(&self, references: &[Reference]) -> Result<Option<String>, PromptError> {
        if references.is_empty() {
            return Ok(None);
        }
        let mut blocks = Vec::with_capacity(references.len());
        for reference in references {
            let body = match reference {
                Reference::File(path) => {
                    let contents = self.read(path)?;
                    format!("{}:\n```\n{contents}\n```", path.display())
                }
                Reference::Range {
                    path,
                    start_line,
                    end_line,
                } => {
                    let contents = self.read(path)?;
                    let start = start_line.saturating_sub(1);
                    let len = end_line.saturating_sub(start);
                    let excerpt: Vec<&str> = contents.lines().skip(start).take(len).collect();
                    format!(
                        "{}:{start_line}-{end_line}:\n```\n{}\n```",
                        path.display(),
                        excerpt.join("\n")
                    )
                }
                Reference::Text(text) => text.clone(),
            };
            blocks.push(tag("context", &body)?);
        }
        Ok(Some(blocks.join("\n")))
    }

    fn read(&self, path: &Path) -> Result<String, PromptError> {
        let full = resolve_in_workspace(self.workspace_root, path).ok_or_else(|| {
            PromptError::OutsideWorkspace {
                path: path.to_path_buf(),
            }
        })?;
        std::fs::read_to_string(&full).map_err(|source| PromptError::Reference { path: full, source })
    }
}

/// Messages asking for an outline diagram of `document`.
pub fn outline_messages(document: &Path, contents: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::user(OUTLINE_INSTRUCTIONS),
        ChatMessage::user(format!(
            "The file the user currently has open is: {} with contents: {contents}",
            document.display()
        )),
    ]
}

/// Replays tool rounds: each as an assistant tool-call turn followed by one result turn per
/// call, then a closing user note.
pub fn tool_round_messages(
    rounds: &[ToolCallRound],
    results: &BTreeMap<ToolCallId, String>,
) -> Vec<ChatMessage> {
    if rounds.is_empty() {
        return Vec::new();
    }
    let mut messages = Vec::new();
    for round in rounds {
        let text = if round.response.is_empty() {
            EMPTY_TOOL_TURN.to_owned()
        } else {
            round.response.clone()
        };
        messages.push(ChatMessage::assistant_with_tool_calls(
            text,
            round.tool_calls.clone(),
        ));
        for call in &round.tool_calls {
            let result = results
                .get(&call.id)
                .cloned()
                .unwrap_or_else(|| "Tool result unavailable".to_owned());
            messages.push(ChatMessage::tool_result(call.id.clone(), result));
        }
    }
    messages.push(ChatMessage::user(TOOL_RESULTS_NOTE));
    messages
}

/// The user turn asking the model to repair a diagram that failed validation.
pub fn retry_message(raw_error: &str, friendly_error: Option<&str>, diagram: &Diagram) -> ChatMessage {
    let mut text = String::new();
    if let Some(friendly) = friendly_error {
        text.push_str(friendly);
        text.push('\n');
    }
    text.push_str(&format!(
        "Please fix this mermaid parse error to make the diagram render correctly: {raw_error}. The produced diagram with the parse error is:\n{}",
        diagram.content()
    ));
    ChatMessage::user(text)
}

/// Assistant turn reminding the model that Mermaid classes cannot nest.
pub fn nesting_hint_message() -> ChatMessage {
    ChatMessage::assistant(format!(
        "Remember when creating the UML diagram in Mermaid, classes are represented as flat structures, \
         and Mermaid does not support nested class definitions. Instead, each class must be defined separately, \
         and relationships between them must be explicitly stated. \
         Use association to connect the main class to the nested class, using cardinality to denote relationships (e.g., one-to-many).\n\
         example of correct syntax:\n{}",
        examples::FLAT_CLASSES
    ))
}

fn tag_name_regex() -> Option<&'static Regex> {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"^[a-zA-Z_][\w.\-]*$").ok()).as_ref()
}

/// Wraps `body` in `<name>` tags; `name` must look like an XML name.
pub fn tag(name: &str, body: &str) -> Result<String, PromptError> {
    let valid = tag_name_regex().is_some_and(|regex| regex.is_match(name));
    if !valid {
        return Err(PromptError::InvalidTag(name.to_owned()));
    }
    Ok(format!("<{name}>\n{body}\n</{name}>"))
}
