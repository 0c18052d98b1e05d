// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fmt;
use std::str::FromStr;

use super::examples::{ITERATE_AFTER, ITERATE_BEFORE};
use crate::model::Diagram;
use crate::tools::symbol::TOOL_NAME as SYMBOL_TOOL;

/// Slash commands accepted in chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatCommand {
    Help,
    Uml,
    Flow,
    Iterate,
}

impl ChatCommand {
    pub const ALL: [ChatCommand; 4] = [Self::Help, Self::Uml, Self::Flow, Self::Iterate];

    pub fn name(self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Uml => "uml",
            Self::Flow => "flow",
            Self::Iterate => "iterate",
        }
    }
}

impl fmt::Display for ChatCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command `{0}` (expected help, uml, flow or iterate)")]
pub struct UnknownCommand(pub String);

impl FromStr for ChatCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches(['/', '\\']);
        Self::ALL
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownCommand(s.to_owned()))
    }
}

pub const HELP_MARKDOWN: &str = "## Welcome to the Mermaid Diagram Generator!

Mermaid is a diagramming and charting tool that extends markdown. Visit their [website](https://mermaid.js.org/) to learn more about the tool.

This chat agent generates useful diagrams using Mermaid to help you better understand your code and communicate your ideas to others. You can chat just by typing or use a command for a more specific intent.

### Available Commands:
- **/uml**: Create Unified Modeling Language graph, or Class Diagram.
- **/flow**: Create a sequence, state, or user journey Diagram.
- **/iterate**: To be called when you already have a diagram up to refine, add, and change the existing diagram.

Good luck and happy diagramming!
";

pub const NO_DIAGRAM_TO_ITERATE: &str =
    "No diagram found in editor view. Please create a diagram first to iterate on it.";

/// Instructions specific to `command`, as user turns.
pub fn command_instructions(command: Option<ChatCommand>, current: Option<&Diagram>) -> Vec<String> {
    match command {
        Some(ChatCommand::Iterate) => match current {
            Some(_) => vec![format!(
                "Please make changes to the currently open diagram.\n\
                 There will be following instructions on how to update the diagram. \
                 Do not make any other edits except my directed suggestion. \
                 It is much less likely you will need to use a tool, unless the question references the codebase.\n\
                 For example, if the instructions are 'Change all int data types to doubles and change Duck to Bunny' in the following diagram:\n\
                 {ITERATE_BEFORE}\n\
                 Then you should emit the following diagram:\n\
                 {ITERATE_AFTER}"
            )],
            None => vec![
                "End this chat conversation after explaining that you cannot iterate on a diagram that does not exist."
                    .to_owned(),
            ],
        },
        Some(ChatCommand::Uml) => vec![
            format!(
                "Please create a UML diagram. Include all relevant classes in the file attached as context. \
                 You must use the tool {SYMBOL_TOOL} to get definitions of symbols not defined in the current context. \
                 You should call it multiple times since you will likely need to get the definitions of multiple symbols. \
                 Therefore for all classes you touch, explore their related classes using {SYMBOL_TOOL} to get their definitions and add them to the diagram.\n\
                 All class relationships should be defined, the types of relationships that you can include, and their syntax in mermaid UML diagrams, are as follows:\n\
                 Inheritance: <|-- : Represents a \"is-a\" relationship where a subclass inherits from a superclass.\n\
                 Composition: *-- : Represents a \"whole-part\" relationship where the part cannot exist without the whole.\n\
                 Aggregation: o-- : Represents a \"whole-part\" relationship where the part can exist independently of the whole.\n\
                 Association: --> : Represents a general connection between two classes.\n\
                 Dependency: ..> : Represents a \"uses\" relationship where one class depends on another.\n\
                 Realization: ..|> : Represents an implementation relationship between an interface and a class.\n\
                 Link; solid or dashed: -- : used when no other relationship fits.\n\
                 Add the correct Cardinality / Multiplicity to associations like 1..n one to n where n is greater than 1.\n\
                 Before returning the diagram, list all the class relationships and explain them."
            ),
            "Remember that all class associations should be defined! If one class has an instance of another it should be connected to it in the UML diagram."
                .to_owned(),
        ],
        Some(ChatCommand::Flow) => vec![
            "Please create a sequence diagram, state diagram or user journey diagram, whichever best shows how control and data flow through the code or process being discussed. \
             Name participants and states after the real functions, types and actors involved."
                .to_owned(),
        ],
        Some(ChatCommand::Help) | None => vec![
            "Pick an appropriate diagram type, for example: sequence, class, or flowchart.".to_owned(),
        ],
    }
}
