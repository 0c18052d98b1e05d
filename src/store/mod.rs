// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Diagrams on disk.
//!
//! Accepted diagrams are saved as Markdown documents (one fenced `mermaid` block) so any
//! Markdown previewer can show them, and read back the same way.

pub mod document;

use std::path::{Component, Path, PathBuf};

pub use document::{DiagramDocument, StoreError, WriteDurability};

/// Joins `path` onto `root`, or `None` when the result could leave `root`.
///
/// Absolute paths are accepted only below `root`; `..` components never are.
pub fn resolve_in_workspace(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = if path.is_absolute() {
        path.strip_prefix(root).ok()?
    } else {
        path
    };
    let confined = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    confined.then(|| root.join(relative))
}
