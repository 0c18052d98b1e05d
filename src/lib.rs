// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Mermaide: a chat assistant that drafts Mermaid diagrams with a language model, validates
//! them with a renderer and feeds render errors back until a diagram parses.

pub mod app;
pub mod assistant;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod model;
pub mod outline;
pub mod present;
pub mod prompt;
pub mod session;
pub mod store;
pub mod terminal;
pub mod testing;
pub mod tools;
pub mod translate;
pub mod validate;
