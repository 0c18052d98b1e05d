// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Splits a streamed model response into prose and diagram text.
//!
//! Everything before the first "```" is prose and is released as soon as it is known not
//! to be the start of a fence. Everything from the fence onwards is diagram text, kept
//! verbatim (fence included) until the stream ends. A fence split across chunks is still
//! recognized because up to two trailing backticks are held back.

use crate::model::FENCE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ScanState {
    #[default]
    Prose,
    Diagram,
}

#[derive(Debug, Clone, Default)]
pub struct FenceScanner {
    state: ScanState,
    held: String,
    diagram: String,
}

/// What remains once the stream has ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanOutput {
    /// Prose that was still held back when the stream ended.
    pub prose_tail: String,
    /// Raw diagram text starting at the first fence, empty if no fence was seen.
    pub diagram: String,
}

impl FenceScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_diagram(&self) -> bool {
        self.state == ScanState::Diagram
    }

    /// Feeds one chunk and returns the prose that can be emitted now (possibly empty).
    pub fn push(&mut self, chunk: &str) -> String {
        if self.state == ScanState::Diagram {
            self.diagram.push_str(chunk);
            return String::new();
        }

        self.held.push_str(chunk);
        if let Some(start) = self.held.find(FENCE) {
            self.diagram.push_str(&self.held[start..]);
            self.held.truncate(start);
            self.state = ScanState::Diagram;
            return std::mem::take(&mut self.held);
        }

        let backticks = self.held.bytes().rev().take_while(|b| *b == b'`').count();
        let release = self.held.len() - backticks;
        let tail = self.held.split_off(release);
        std::mem::replace(&mut self.held, tail)
    }

    pub fn finish(self) -> ScanOutput {
        ScanOutput {
            prose_tail: self.held,
            diagram: self.diagram,
        }
    }
}
