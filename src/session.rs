// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Per-process state shared by the chat, outline and MCP surfaces.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::Diagram;

/// Surfaces that each keep their own current diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewKind {
    Chat,
    Outline,
}

impl ViewKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Outline => "outline",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "chat" => Some(Self::Chat),
            "outline" => Some(Self::Outline),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    current: BTreeMap<ViewKind, Diagram>,
    follow_active_document: bool,
    last_focused: Option<PathBuf>,
}

/// The current diagram per view plus outline focus. Last writer wins.
#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self, view: ViewKind) -> Option<Diagram> {
        self.lock().current.get(&view).cloned()
    }

    /// Replaces the view's current diagram, returning the previous one.
    pub fn set_current(&self, view: ViewKind, diagram: Diagram) -> Option<Diagram> {
        self.lock().current.insert(view, diagram)
    }

    pub fn follows_active_document(&self) -> bool {
        self.lock().follow_active_document
    }

    pub fn set_follow_active_document(&self, follow: bool) {
        self.lock().follow_active_document = follow;
    }

    pub fn last_focused(&self) -> Option<PathBuf> {
        self.lock().last_focused.clone()
    }

    pub fn set_last_focused(&self, path: &Path) {
        self.lock().last_focused = Some(path.to_path_buf());
    }
}
