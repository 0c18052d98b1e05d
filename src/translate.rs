// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Turns renderer parse errors into a sentence a model can act on.
//!
//! Two shapes are understood: the JSON-serialized parser error the validation page posts
//! (`{"hash": {"text", "token", "line", "loc", "expected"}}`, `line` 0-based), and the
//! textual form the mermaid CLI prints on stderr:
//!
//! ```text
//! Parse error on line 10:
//! ...ouse {    {
//! -------------^
//! Expecting 'STRUCT_STOP', 'MEMBER', got 'OPEN_IN_STRUCT'
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// Structured fields of a parser error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrorDetails {
    /// Offending source text.
    pub text: String,
    pub token: Option<String>,
    /// 0-based line in the diagram.
    pub line: usize,
    /// Expected token names with surrounding quotes removed.
    pub expected: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawParseError {
    hash: RawHash,
}

#[derive(Debug, Deserialize)]
struct RawHash {
    #[serde(default)]
    text: Option<Value>,
    #[serde(default)]
    token: Option<Value>,
    line: Option<u64>,
    #[serde(default)]
    expected: Vec<String>,
}

/// Extracts the structured fields from either supported error shape.
pub fn parse_error_details(raw: &str) -> Option<ParseErrorDetails> {
    from_json(raw).or_else(|| from_jison_text(raw))
}

/// The natural-language hint for `raw`, quoting the offending line of `diagram` when it
/// can be found. `None` when the error has no recognizable structure.
pub fn friendly_error(raw: &str, diagram: Option<&str>) -> Option<String> {
    let details = parse_error_details(raw)?;
    Some(describe(&details, diagram))
}

pub fn describe(details: &ParseErrorDetails, diagram: Option<&str>) -> String {
    let mut sentence = format!("The text '{}'", details.text);
    match (&details.token, details.expected.is_empty()) {
        (Some(token), false) => {
            let expected = details
                .expected
                .iter()
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(", ");
            sentence.push_str(&format!(
                " with token type '{token}', where we expected one of: {expected},"
            ));
        }
        (Some(token), true) => sentence.push_str(&format!(" with token type '{token}'")),
        (None, _) => {}
    }
    sentence.push_str(&format!(
        " somewhere on line {} has caused a parse error in the generated Mermaid diagram.",
        details.line + 1
    ));
    if let Some(line) = diagram.and_then(|diagram| diagram.lines().nth(details.line)) {
        sentence.push_str(&format!(" The full contents of that line is: '{}'.", line.trim_end()));
    }
    sentence.push_str(" Please correct this and any subsequent lines with similar errors.");
    sentence
}

fn from_json(raw: &str) -> Option<ParseErrorDetails> {
    let parsed: RawParseError = serde_json::from_str(raw.trim()).ok()?;
    let hash = parsed.hash;
    let text = hash.text.as_ref().and_then(value_text)?;
    if text.is_empty() {
        return None;
    }
    let line = usize::try_from(hash.line?).ok()?;
    Some(ParseErrorDetails {
        text,
        token: hash.token.as_ref().and_then(value_text),
        line,
        expected: hash.expected.iter().map(|name| unquote(name)).collect(),
    })
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn unquote(name: &str) -> String {
    name.trim().trim_matches(|ch| ch == '\'' || ch == '"').to_owned()
}

const JISON_PATTERN: &str = r"(?m)(?:Parse|Lexical) error on line (\d+)[:.][^\n]*\n([^\n]*)\n(-*)\^(?:\s*\nExpecting (.+?), got '([^']*)')?";

fn jison_regex() -> Option<&'static Regex> {
    static JISON: OnceLock<Option<Regex>> = OnceLock::new();
    JISON.get_or_init(|| Regex::new(JISON_PATTERN).ok()).as_ref()
}

fn from_jison_text(raw: &str) -> Option<ParseErrorDetails> {
    let caps = jison_regex()?.captures(raw)?;
    let line_no: usize = caps.get(1)?.as_str().parse().ok()?;
    let snippet = caps.get(2).map_or("", |m| m.as_str());
    let column = caps.get(3).map_or(0, |m| m.as_str().len());
    let token = caps.get(5).map(|m| m.as_str().to_owned());
    let expected = caps
        .get(4)
        .map(|m| m.as_str().split(',').map(unquote).filter(|name| !name.is_empty()).collect())
        .unwrap_or_default();

    let text = snippet
        .get(column..)
        .map(|rest| rest.split_whitespace().next().unwrap_or_default().to_owned())
        .filter(|text| !text.is_empty())
        .or_else(|| token.clone())?;

    Some(ParseErrorDetails {
        text,
        token,
        line: line_no.saturating_sub(1),
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::{friendly_error, parse_error_details, ParseErrorDetails};

    const MISSING_BRACE_DIAGRAM: &str = "classDiagram\n\
        class House {\n\
        string address\n\
        int rooms\n\
        }\n\
        class Kitchen {\n\
        string appliances\n\
        int size\n\
        class Garden\n\
        class Garage {    {\n\
        }";

    const JSON_ERROR: &str = r#"{"hash":{"text":"{","token":"OPEN_IN_STRUCT","line":9,"loc":{"first_line":10,"last_line":10,"first_column":0,"last_column":38},"expected":["'STRUCT_STOP'","'MEMBER'"]}}"#;

    #[test]
    fn json_error_names_line_tokens_and_source_line() {
        let friendly = friendly_error(JSON_ERROR, Some(MISSING_BRACE_DIAGRAM)).expect("friendly");
        assert!(friendly.starts_with("The text '{' with token type 'OPEN_IN_STRUCT'"));
        assert!(friendly.contains("where we expected one of: 'STRUCT_STOP', 'MEMBER'"));
        assert!(friendly.contains("somewhere on line 10 "));
        assert!(friendly.contains("The full contents of that line is: 'class Garage {    {'"));
        assert!(friendly.ends_with("Please correct this and any subsequent lines with similar errors."));
    }

    #[test]
    fn json_error_without_diagram_skips_line_quote() {
        let friendly = friendly_error(JSON_ERROR, None).expect("friendly");
        assert!(!friendly.contains("full contents"));
    }

    #[test]
    fn jison_text_form_is_understood() {
        let raw = "Error: Parse error on line 10:\n...rage {    {\n-------------^\nExpecting 'STRUCT_STOP', 'MEMBER', got 'OPEN_IN_STRUCT'\n    at Parser.parseError";
        let details = parse_error_details(raw).expect("details");
        assert_eq!(
            details,
            ParseErrorDetails {
                text: "{".to_owned(),
                token: Some("OPEN_IN_STRUCT".to_owned()),
                line: 9,
                expected: vec!["STRUCT_STOP".to_owned(), "MEMBER".to_owned()],
            }
        );
    }

    #[test]
    fn lexical_error_has_no_expected_tokens() {
        let raw = "Lexical error on line 3. Unrecognized text.\n...A --> B ;; C\n----------^";
        let details = parse_error_details(raw).expect("details");
        assert_eq!(details.line, 2);
        assert_eq!(details.text, ";;");
        assert!(details.token.is_none());
        assert!(details.expected.is_empty());
    }

    #[test]
    fn unstructured_errors_are_not_translated() {
        assert_eq!(friendly_error("Syntax error in graph", None), None);
        assert_eq!(friendly_error("{\"hash\":{}}", None), None);
        assert_eq!(friendly_error("{\"hash\":{\"text\":\"\",\"line\":1}}", None), None);
        assert_eq!(friendly_error("{not json", None), None);
        assert_eq!(friendly_error("", None), None);
    }

    #[test]
    fn line_beyond_diagram_is_reported_without_quote() {
        let raw = r#"{"hash":{"text":"x","line":40}}"#;
        let friendly = friendly_error(raw, Some("graph TD")).expect("friendly");
        assert!(friendly.contains("line 41"));
        assert!(!friendly.contains("full contents"));
    }
}
