// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Core value types.
//!
//! Diagrams, chat messages exchanged with the model, and validation outcomes.

pub mod diagram;
pub mod ids;
pub mod message;
pub mod validation;

pub use diagram::{Diagram, DiagramKind, FENCE, MERMAID_FENCE};
pub use ids::{Id, IdError, Nonce, ToolCallId};
pub use message::{ChatMessage, Role, ToolCall, ToolCallRound, TurnTranscript};
pub use validation::ValidationResult;
