// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! `mermAId_get_symbol_definition`: hands the model the source files that define the
//! symbols it wants to draw.
//!
//! The file the user is looking at is searched first, then the workspace (honoring
//! `.gitignore`). A definition is a declaration keyword followed by the symbol name.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Tool, ToolError};
use crate::llm::ToolSpec;
use crate::store::resolve_in_workspace;

pub const TOOL_NAME: &str = "mermAId_get_symbol_definition";

const DEFAULT_MAX_FILE_BYTES: u64 = 256 * 1024;
const MAX_DEFINING_FILES: usize = 3;
const DECLARATION_KEYWORDS: &str = "class|struct|interface|trait|enum|type|fn|def|function|impl|record|protocol|module|object|union|namespace";

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SymbolDefinitionParams {
    /// Names of the classes, types or functions whose definitions are needed.
    pub symbols: Vec<String>,
    /// Path of the file the symbols were seen in, searched before the rest of the workspace.
    #[serde(rename = "fileString", default)]
    pub file_string: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SymbolDefinitionTool {
    root: PathBuf,
    max_file_bytes: u64,
}

impl SymbolDefinitionTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    /// Runs the lookup synchronously and renders the tool's text result.
    pub fn lookup(&self, params: &SymbolDefinitionParams) -> String {
        let mut files: BTreeMap<String, String> = BTreeMap::new();
        let mut errors = Vec::new();
        let preferred = params
            .file_string
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .and_then(|path| {
                let resolved = resolve_in_workspace(&self.root, Path::new(path));
                if resolved.is_none() {
                    errors.push(format!("File '{path}' is outside the workspace"));
                }
                resolved
            });

        for symbol in &params.symbols {
            let symbol = symbol.trim();
            if symbol.is_empty() {
                continue;
            }
            let Ok(pattern) = definition_regex(symbol) else {
                errors.push(format!("Symbol '{symbol}' is not a searchable name"));
                continue;
            };

            let in_preferred = preferred
                .as_deref()
                .and_then(|path| self.read_defining(path, &pattern))
                .map(|found| vec![found]);
            let found = in_preferred.unwrap_or_else(|| self.search_workspace(&pattern));
            if found.is_empty() {
                errors.push(format!("Symbol '{symbol}' not found in workspace"));
                continue;
            }
            debug!(symbol, files = found.len(), "resolved symbol definition");
            for (path, contents) in found {
                files.entry(self.display_path(&path)).or_insert(contents);
            }
        }

        let mut out = String::new();
        for (path, contents) in &files {
            out.push_str(&format!("File: {path}\nContents: {contents}\n\n"));
        }
        out.push_str("Errors:\n");
        for error in &errors {
            info!(error = %error, "symbol lookup");
            out.push_str(error);
            out.push('\n');
        }
        out
    }

    fn read_defining(&self, path: &Path, pattern: &Regex) -> Option<(PathBuf, String)> {
        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_file() || metadata.len() > self.max_file_bytes {
            return None;
        }
        let contents = fs::read_to_string(path).ok()?;
        pattern
            .is_match(&contents)
            .then(|| (path.to_path_buf(), contents))
    }

    fn search_workspace(&self, pattern: &Regex) -> Vec<(PathBuf, String)> {
        let mut found = Vec::new();
        for entry in ignore::WalkBuilder::new(&self.root).build().flatten() {
            if !entry.file_type().is_some_and(|kind| kind.is_file()) {
                continue;
            }
            if let Some(hit) = self.read_defining(entry.path(), pattern) {
                found.push(hit);
                if found.len() >= MAX_DEFINING_FILES {
                    break;
                }
            }
        }
        found
    }

    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

fn definition_regex(symbol: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"\b(?:{DECLARATION_KEYWORDS})\s+{}\b|\b(?:const|let|var)\s+{}\s*=",
        regex::escape(symbol),
        regex::escape(symbol)
    ))
}

#[async_trait]
impl Tool for SymbolDefinitionTool {
    fn spec(&self) -> ToolSpec {
        let parameters = serde_json::to_value(schemars::schema_for!(SymbolDefinitionParams))
            .unwrap_or_else(|_| Value::Object(Default::default()));
        ToolSpec {
            name: TOOL_NAME.to_owned(),
            description: "Get the full source of the files defining the given symbols (classes, types, functions). Use this to learn the fields, methods and relationships of types referenced by the code being diagrammed.".to_owned(),
            parameters,
        }
    }

    fn invocation_message(&self, arguments: &Value) -> Option<String> {
        let symbols = arguments.get("symbols")?.as_array()?;
        let names: Vec<&str> = symbols.iter().filter_map(Value::as_str).collect();
        Some(format!("Getting definition for '{}'", names.join(", ")))
    }

    async fn invoke(
        &self,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        let params: SymbolDefinitionParams =
            serde_json::from_value(arguments).map_err(|err| ToolError::InvalidArguments {
                name: TOOL_NAME.to_owned(),
                reason: err.to_string(),
            })?;
        let tool = self.clone();
        let lookup = tokio::task::spawn_blocking(move || tool.lookup(&params));
        tokio::select! {
            _ = cancel.cancelled() => Err(ToolError::Cancelled),
            joined = lookup => joined.map_err(|err| ToolError::Failed {
                name: TOOL_NAME.to_owned(),
                reason: err.to_string(),
            }),
        }
    }
}
