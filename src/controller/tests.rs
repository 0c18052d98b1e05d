// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{
    ControllerError, RetryController, RetryPolicy, TurnContext, TurnOptions, TurnOutcome,
    TurnReport, EMPTY_DIAGRAM_ERROR, EXHAUSTED_MESSAGE,
};
use crate::model::{ChatMessage, Diagram, Role, ValidationResult};
use crate::present::{CollectingSink, SinkAction};
use crate::prompt::TOOL_RESULTS_NOTE;
use crate::session::{Session, ViewKind};
use crate::testing::{new_runtime, EchoTool, RecordingView, ScriptedModel, ScriptedValidator};
use crate::tools::{ToolError, ToolRegistry};
use crate::validate::{Validator, ValidatorError};

const FLOW_REPLY: [&str; 3] = [
    "Here you go.\n",
    "```mer",
    "maid\nflowchart TD\n  A --> B\n```",
];
const CLASS_REPLY: [&str; 1] = ["```mermaid\nclassDiagram\nclass House {\n  class Kitchen {\n  }\n}\n```"];

const CLASS_ERROR: &str = r#"{"hash":{"text":"class","token":"CLASS","line":2,"expected":["'STRUCT_STOP'","'MEMBER'"]}}"#;

struct Harness {
    session: Session,
    sink: CollectingSink,
    view: RecordingView,
    cancel: CancellationToken,
}

impl Harness {
    fn new() -> Self {
        Self {
            session: Session::new(),
            sink: CollectingSink::default(),
            view: RecordingView::default(),
            cancel: CancellationToken::new(),
        }
    }

    fn run(
        &mut self,
        controller: &RetryController,
        options: TurnOptions,
    ) -> Result<TurnReport, ControllerError> {
        let messages = vec![ChatMessage::user("draw something")];
        let turn = TurnContext {
            session: &self.session,
            view_kind: ViewKind::Chat,
            sink: &mut self.sink,
            view: &mut self.view,
            cancel: &self.cancel,
        };
        new_runtime().block_on(controller.run(messages, turn, options))
    }
}

fn controller(model: &ScriptedModel, validator: &ScriptedValidator) -> RetryController {
    RetryController::new(
        Arc::new(model.clone()),
        Arc::new(ToolRegistry::new()),
        Arc::new(validator.clone()),
    )
}

#[test]
fn valid_first_draft_is_shown_and_stored() {
    let model = ScriptedModel::new("primary").reply(&FLOW_REPLY);
    let validator = ScriptedValidator::default();
    let mut harness = Harness::new();

    let report = harness
        .run(&controller(&model, &validator), TurnOptions::default())
        .expect("turn");

    let TurnOutcome::Success { diagram, attempts } = report.outcome else {
        panic!("expected success, got {:?}", report.outcome);
    };
    assert_eq!(attempts, 1);
    assert_eq!(diagram.content(), "flowchart TD\n  A --> B");
    assert_eq!(report.transcript.response, "Here you go.\n");
    assert_eq!(harness.session.current(ViewKind::Chat), Some(diagram.clone()));
    assert_eq!(harness.view.shown, vec![diagram.clone()]);
    assert_eq!(
        harness.sink.markdown,
        format!("Here you go.\n{}", diagram.as_markdown())
    );
    assert_eq!(
        harness.sink.progress,
        vec![
            "Capturing mermaid diagram from the model...".to_owned(),
            "Validating mermaid diagram".to_owned(),
        ]
    );
    assert_eq!(
        harness.sink.actions,
        vec![SinkAction::OpenMarkdownSource {
            title: "Open mermaid source".to_owned()
        }]
    );
}

#[test]
fn failed_draft_is_fed_back_and_repaired() {
    let model = ScriptedModel::new("primary")
        .reply(&FLOW_REPLY)
        .reply(&FLOW_REPLY);
    let validator = ScriptedValidator::new([ValidationResult::failure("boom")]);
    let mut harness = Harness::new();

    let report = harness
        .run(&controller(&model, &validator), TurnOptions::default())
        .expect("turn");

    assert!(matches!(report.outcome, TurnOutcome::Success { attempts: 2, .. }));
    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    let feedback = requests[1].last().expect("feedback");
    assert_eq!(feedback.role(), Role::User);
    assert_eq!(
        feedback.text(),
        "Please fix this mermaid parse error to make the diagram render correctly: boom. The produced diagram with the parse error is:\nflowchart TD\n  A --> B"
    );
    assert!(harness
        .sink
        .progress
        .contains(&"Attempting to fix validation errors".to_owned()));
    assert_eq!(harness.view.shown.len(), 1);
}

#[test]
fn class_failures_get_one_nesting_hint_and_friendly_errors() {
    let model = ScriptedModel::new("primary")
        .reply(&CLASS_REPLY)
        .reply(&CLASS_REPLY)
        .reply(&CLASS_REPLY);
    let validator = ScriptedValidator::always_failing(CLASS_ERROR, 2);
    let mut harness = Harness::new();

    let report = harness
        .run(&controller(&model, &validator), TurnOptions::default())
        .expect("turn");
    assert!(matches!(report.outcome, TurnOutcome::Success { attempts: 3, .. }));

    let requests = model.requests();
    let second = &requests[1];
    let hint = &second[second.len() - 2];
    assert_eq!(hint.role(), Role::Assistant);
    assert!(hint.text().contains("does not support nested class definitions"));
    let feedback = second.last().expect("feedback").text();
    assert!(feedback.starts_with("The text 'class' with token type 'CLASS'"));
    assert!(feedback.contains("The full contents of that line is: '  class Kitchen {'"));

    let hints = requests[2]
        .iter()
        .filter(|message| message.text().contains("does not support nested class definitions"))
        .count();
    assert_eq!(hints, 1);
}

#[test]
fn nesting_hint_can_be_disabled() {
    let model = ScriptedModel::new("primary")
        .reply(&CLASS_REPLY)
        .reply(&CLASS_REPLY);
    let validator = ScriptedValidator::always_failing("boom", 1);
    let controller = controller(&model, &validator).with_policy(RetryPolicy {
        nesting_hint: false,
        ..RetryPolicy::default()
    });
    let mut harness = Harness::new();

    harness.run(&controller, TurnOptions::default()).expect("turn");
    assert!(model.requests()[1]
        .iter()
        .all(|message| message.role() != Role::Assistant));
}

#[test]
fn exhausted_turn_reports_log_and_last_diagram() {
    let mut model = ScriptedModel::new("primary");
    for _ in 0..4 {
        model = model.reply(&FLOW_REPLY);
    }
    let validator = ScriptedValidator::always_failing("boom", 4);
    let controller = controller(&model, &validator)
        .with_log_path(Some(PathBuf::from("/tmp/mermaide.log")));
    let mut harness = Harness::new();

    let report = harness.run(&controller, TurnOptions::default()).expect("turn");

    let TurnOutcome::Exhausted { last_diagram, retry } = report.outcome else {
        panic!("expected exhaustion");
    };
    assert_eq!(retry.attempts(), 4);
    assert_eq!(retry.errors(), vec!["boom".to_owned(); 4].as_slice());
    assert_eq!(model.request_count(), 4);
    assert_eq!(validator.seen().len(), 4);
    assert!(harness.sink.markdown.contains(EXHAUSTED_MESSAGE));
    assert!(harness.sink.markdown.contains("Log file: /tmp/mermaide.log"));
    assert!(harness.sink.markdown.ends_with(last_diagram.content()));
    assert!(harness.view.shown.is_empty());
    assert_eq!(harness.session.current(ViewKind::Chat), None);
}

#[test]
fn empty_diagrams_count_as_attempts_without_validation() {
    let model = ScriptedModel::new("primary")
        .reply(&["I cannot draw that."])
        .reply(&["Still nothing."]);
    let validator = ScriptedValidator::default();
    let controller = controller(&model, &validator).with_policy(RetryPolicy {
        ceiling: 2,
        ..RetryPolicy::default()
    });
    let mut harness = Harness::new();

    let report = harness.run(&controller, TurnOptions::default()).expect("turn");

    let TurnOutcome::Exhausted { retry, .. } = report.outcome else {
        panic!("expected exhaustion");
    };
    assert_eq!(retry.errors(), vec![EMPTY_DIAGRAM_ERROR.to_owned(); 2].as_slice());
    assert!(validator.seen().is_empty());
    assert!(model.requests()[1]
        .last()
        .expect("feedback")
        .text()
        .contains(EMPTY_DIAGRAM_ERROR));
}

#[test]
fn zero_ceiling_is_clamped_to_one_attempt() {
    let model = ScriptedModel::new("primary").reply(&FLOW_REPLY);
    let validator = ScriptedValidator::always_failing("boom", 1);
    let controller = controller(&model, &validator).with_policy(RetryPolicy {
        ceiling: 0,
        ..RetryPolicy::default()
    });
    assert_eq!(controller.policy().ceiling, 1);

    let report = Harness::new()
        .run(&controller, TurnOptions::default())
        .expect("turn");
    assert!(matches!(report.outcome, TurnOutcome::Exhausted { .. }));
    assert_eq!(model.request_count(), 1);
}

#[test]
fn tool_rounds_run_before_the_diagram_and_land_in_the_transcript() {
    let model = ScriptedModel::new("primary")
        .tool_calls(&[("echo", r#"{"symbols":["House"]}"#)])
        .reply(&FLOW_REPLY);
    let validator = ScriptedValidator::default();
    let tool = EchoTool::new("echo");
    let controller = RetryController::new(
        Arc::new(model.clone()),
        Arc::new(ToolRegistry::new().with_tool(tool.clone())),
        Arc::new(validator.clone()),
    );
    let mut harness = Harness::new();

    let report = harness.run(&controller, TurnOptions::default()).expect("turn");

    assert!(matches!(report.outcome, TurnOutcome::Success { attempts: 1, .. }));
    assert_eq!(tool.calls(), 1);
    assert_eq!(validator.seen().len(), 1);
    assert_eq!(model.advertised_tools()[0], vec!["echo".to_owned()]);
    assert!(harness.sink.progress.contains(&"Running echo".to_owned()));

    let second = &model.requests()[1];
    let roles: Vec<Role> = second.iter().map(ChatMessage::role).collect();
    assert_eq!(
        &roles[roles.len() - 3..],
        &[Role::Assistant, Role::Tool, Role::User]
    );
    assert_eq!(second[second.len() - 2].text(), r#"echo {"symbols":["House"]}"#);
    assert_eq!(second[second.len() - 1].text(), TOOL_RESULTS_NOTE);

    assert_eq!(report.transcript.tool_rounds.len(), 1);
    assert_eq!(report.transcript.tool_results.len(), 1);
}

#[test]
fn unknown_tool_ends_the_turn() {
    let model = ScriptedModel::new("primary").tool_calls(&[("missing", "{}")]);
    let validator = ScriptedValidator::default();
    let err = Harness::new()
        .run(&controller(&model, &validator), TurnOptions::default())
        .unwrap_err();
    assert!(matches!(err, ControllerError::Tool(ToolError::UnknownTool { .. })));
}

#[test]
fn endless_tool_calls_are_bounded() {
    let model = ScriptedModel::new("primary")
        .tool_calls(&[("echo", "{}")])
        .tool_calls(&[("echo", "{}")]);
    let validator = ScriptedValidator::default();
    let controller = RetryController::new(
        Arc::new(model.clone()),
        Arc::new(ToolRegistry::new().with_tool(EchoTool::new("echo"))),
        Arc::new(validator.clone()),
    )
    .with_policy(RetryPolicy {
        max_tool_rounds: 1,
        ..RetryPolicy::default()
    });

    let err = Harness::new()
        .run(&controller, TurnOptions::default())
        .unwrap_err();
    assert!(matches!(err, ControllerError::ToolRoundsExceeded { limit: 1 }));
}

#[test]
fn cancelled_turn_does_nothing_visible() {
    let model = ScriptedModel::new("primary").reply(&FLOW_REPLY);
    let validator = ScriptedValidator::default();
    let mut harness = Harness::new();
    harness.cancel.cancel();

    let report = harness
        .run(&controller(&model, &validator), TurnOptions::default())
        .expect("turn");
    assert_eq!(report.outcome, TurnOutcome::Cancelled);
    assert!(harness.sink.markdown.is_empty());
    assert!(harness.view.shown.is_empty());
}

/// Fails the diagram and cancels the turn while validating it.
struct CancellingValidator;

#[async_trait]
impl Validator for CancellingValidator {
    async fn validate(
        &self,
        _diagram: &Diagram,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, ValidatorError> {
        cancel.cancel();
        Ok(ValidationResult::failure("boom"))
    }
}

#[test]
fn cancelling_mid_turn_stops_retrying() {
    let mut model = ScriptedModel::new("primary");
    for _ in 0..4 {
        model = model.reply(&FLOW_REPLY);
    }
    let controller = RetryController::new(
        Arc::new(model.clone()),
        Arc::new(ToolRegistry::new()),
        Arc::new(CancellingValidator),
    );
    let mut harness = Harness::new();

    let report = harness
        .run(&controller, TurnOptions::default())
        .expect("turn");
    assert_eq!(report.outcome, TurnOutcome::Cancelled);
    assert_eq!(model.request_count(), 1);
    assert!(!harness.sink.markdown.contains(EXHAUSTED_MESSAGE));
    assert!(harness.view.shown.is_empty());
}

#[test]
fn fallback_serves_the_first_two_attempts_only() {
    let mut primary = ScriptedModel::new("primary");
    let mut fallback = ScriptedModel::new("fallback");
    for _ in 0..2 {
        primary = primary.reply(&FLOW_REPLY);
        fallback = fallback.reply(&FLOW_REPLY);
    }
    let validator = ScriptedValidator::always_failing("boom", 4);
    let controller = controller(&primary, &validator)
        .with_fallback(Some(Arc::new(fallback.clone())));

    let report = Harness::new()
        .run(&controller, TurnOptions { prefer_fallback: true })
        .expect("turn");
    assert!(matches!(report.outcome, TurnOutcome::Exhausted { .. }));
    assert_eq!(fallback.request_count(), 2);
    assert_eq!(primary.request_count(), 2);
}

#[test]
fn empty_fallback_draft_switches_to_primary() {
    let primary = ScriptedModel::new("primary").reply(&FLOW_REPLY);
    let fallback = ScriptedModel::new("fallback").reply(&["nothing to see"]);
    let validator = ScriptedValidator::default();
    let controller = controller(&primary, &validator)
        .with_fallback(Some(Arc::new(fallback.clone())));

    let report = Harness::new()
        .run(&controller, TurnOptions { prefer_fallback: true })
        .expect("turn");
    assert!(matches!(report.outcome, TurnOutcome::Success { attempts: 2, .. }));
    assert_eq!(fallback.request_count(), 1);
    assert_eq!(primary.request_count(), 1);
}

#[test]
fn without_preference_the_primary_model_is_used() {
    let primary = ScriptedModel::new("primary").reply(&FLOW_REPLY);
    let fallback = ScriptedModel::new("fallback");
    let validator = ScriptedValidator::default();
    let controller = controller(&primary, &validator)
        .with_fallback(Some(Arc::new(fallback.clone())));

    Harness::new()
        .run(&controller, TurnOptions::default())
        .expect("turn");
    assert_eq!(fallback.request_count(), 0);
}
