// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

/// Outcome of submitting a diagram to a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Success,
    Failure {
        /// Raw renderer error text.
        error: String,
        /// Natural-language rendition of `error`, when it could be translated.
        friendly_error: Option<String>,
    },
}

impl ValidationResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            friendly_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    pub fn friendly_error(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure { friendly_error, .. } => friendly_error.as_deref(),
        }
    }

    /// Fills in `friendly_error` unless it is already present.
    pub fn with_friendly_error(self, translate: impl FnOnce(&str) -> Option<String>) -> Self {
        match self {
            Self::Failure {
                error,
                friendly_error: None,
            } => {
                let friendly_error = translate(&error);
                Self::Failure {
                    error,
                    friendly_error,
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ValidationResult;

    #[test]
    fn translation_only_fills_missing_friendly_error() {
        let translated =
            ValidationResult::failure("raw").with_friendly_error(|raw| Some(format!("nice {raw}")));
        assert_eq!(translated.friendly_error(), Some("nice raw"));

        let kept = translated.with_friendly_error(|_| Some("other".to_owned()));
        assert_eq!(kept.friendly_error(), Some("nice raw"));

        let success = ValidationResult::Success.with_friendly_error(|_| Some("x".to_owned()));
        assert!(success.is_success());
        assert_eq!(success.error(), None);
    }
}
