// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Messages exchanged with a validation/display page.
//!
//! Both directions are JSON objects tagged by `command`.

use serde::{Deserialize, Serialize};

/// Page → host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum PageMessage {
    ParseResult {
        #[serde(default)]
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nonce: Option<String>,
    },
    MermaidSource,
    Navigate {
        path: String,
        #[serde(default)]
        line: String,
    },
    ContinueInChat,
    Alert {
        text: String,
    },
}

/// Host → page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum HostMessage {
    Validate { nonce: String, diagram: String },
    Render { diagram: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed page message: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn decode_page_message(raw: &str) -> Result<PageMessage, ProtocolError> {
    Ok(serde_json::from_str(raw)?)
}

pub fn encode_host_message(message: &HostMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

#[cfg(test)]
mod tests {
    use super::{decode_page_message, encode_host_message, HostMessage, PageMessage};

    #[test]
    fn decodes_parse_result_with_optional_fields() {
        let message =
            decode_page_message(r#"{"command":"parse-result","success":false,"error":"{}","nonce":"n1"}"#)
                .expect("decode");
        assert_eq!(
            message,
            PageMessage::ParseResult {
                success: false,
                error: Some("{}".to_owned()),
                nonce: Some("n1".to_owned()),
            }
        );

        let bare = decode_page_message(r#"{"command":"parse-result"}"#).expect("decode");
        assert_eq!(
            bare,
            PageMessage::ParseResult {
                success: false,
                error: None,
                nonce: None,
            }
        );
    }

    #[test]
    fn decodes_navigation_and_unit_commands() {
        assert_eq!(
            decode_page_message(r#"{"command":"navigate","path":"src/a.rs","line":"L4"}"#)
                .expect("decode"),
            PageMessage::Navigate {
                path: "src/a.rs".to_owned(),
                line: "L4".to_owned(),
            }
        );
        assert_eq!(
            decode_page_message(r#"{"command":"mermaid-source"}"#).expect("decode"),
            PageMessage::MermaidSource
        );
        assert_eq!(
            decode_page_message(r#"{"command":"continue-in-chat"}"#).expect("decode"),
            PageMessage::ContinueInChat
        );
    }

    #[test]
    fn unknown_commands_are_rejected_at_the_boundary() {
        decode_page_message(r#"{"command":"zoom-in"}"#).unwrap_err();
        decode_page_message(r#"{"success":true}"#).unwrap_err();
        decode_page_message("not json").unwrap_err();
    }

    #[test]
    fn encodes_validate_request() {
        let json = encode_host_message(&HostMessage::Validate {
            nonce: "abc".to_owned(),
            diagram: "pie".to_owned(),
        })
        .expect("encode");
        assert_eq!(json, r#"{"command":"validate","nonce":"abc","diagram":"pie"}"#);
    }
}
