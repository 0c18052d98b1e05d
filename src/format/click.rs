// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Source navigation links embedded in diagrams.
//!
//! Generated diagrams may carry `click {Label} call linkCallback("{Path}#L{N}")` lines.
//! Each becomes a [`NavigationTarget`] a host can open.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::Diagram;

const CLICK_PATTERN: &str = r#"(?m)^\s*click\s+(\S+)\s+call\s+linkCallback\(\s*"([^"]*)"\s*\)"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    pub label: String,
    pub path: PathBuf,
    /// 1-based line, when the link carries an `#L` anchor.
    pub line: Option<u32>,
}

impl NavigationTarget {
    /// Builds a target from a link location such as `src/lib.rs#L12`.
    pub fn from_location(label: impl Into<String>, location: &str) -> Option<Self> {
        let (path, line) = split_location(location);
        if path.is_empty() {
            return None;
        }
        Some(Self {
            label: label.into(),
            path: PathBuf::from(path),
            line,
        })
    }
}

/// Splits `path#L12` into its path and 1-based line.
///
/// Also accepts the `L12` / `12` forms the validation page posts in `navigate` messages.
pub fn split_location(location: &str) -> (&str, Option<u32>) {
    match location.rsplit_once('#') {
        Some((path, anchor)) => (path, parse_line_anchor(anchor)),
        None => (location, None),
    }
}

pub fn parse_line_anchor(anchor: &str) -> Option<u32> {
    let digits = anchor.trim().trim_start_matches('L');
    digits.parse().ok().filter(|line| *line > 0)
}

fn click_regex() -> Option<&'static Regex> {
    static CLICK: OnceLock<Option<Regex>> = OnceLock::new();
    CLICK.get_or_init(|| Regex::new(CLICK_PATTERN).ok()).as_ref()
}

/// All navigation targets in the diagram, in source order.
pub fn navigation_targets(diagram: &Diagram) -> Vec<NavigationTarget> {
    let Some(regex) = click_regex() else {
        return Vec::new();
    };
    regex
        .captures_iter(diagram.content())
        .filter_map(|caps| NavigationTarget::from_location(&caps[1], &caps[2]))
        .collect()
}
