// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Model Context Protocol (MCP) server surface.
//!
//! Lets other agents validate Mermaid, read the current diagrams and ask for new ones.

mod server;
mod types;

pub use server::MermaideMcp;
pub use types::{
    DiagramCurrentResponse, DiagramGenerateResponse, DiagramValidateResponse, GenerateOutcome,
    McpNavigationTarget,
};
