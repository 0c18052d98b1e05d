// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Text formats around Mermaid: streamed fences and click navigation links.

pub mod click;
pub mod fence;

pub use click::{navigation_targets, NavigationTarget};
pub use fence::{FenceScanner, ScanOutput};
