// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Streaming client for OpenAI-compatible `/chat/completions` endpoints (OpenAI, Groq,
//! local gateways).

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::sse::SseDecoder;
use super::{ChatRequest, LanguageModel, LanguageModelError, ResponsePart, ResponseStream};
use crate::model::ChatMessage;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAiChatModel {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_owned(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Reads the key from `env` now; a missing key surfaces on the first request.
    pub fn with_api_key_env(mut self, env: impl Into<String>) -> Self {
        self.api_key_env = env.into();
        self.api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    pub fn request_body(&self, request: ChatRequest<'_>) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_json).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = json!("auto");
        }
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

fn message_json(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::System(text) => json!({ "role": "system", "content": text }),
        ChatMessage::User(text) => json!({ "role": "user", "content": text }),
        ChatMessage::Assistant { text, tool_calls } if tool_calls.is_empty() => {
            json!({ "role": "assistant", "content": text })
        }
        ChatMessage::Assistant { text, tool_calls } => {
            let calls: Vec<Value> = tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id.as_str(),
                        "type": "function",
                        "function": { "name": call.name, "arguments": call.arguments },
                    })
                })
                .collect();
            let content = if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        ChatMessage::ToolResult { call_id, content } => {
            json!({ "role": "tool", "tool_call_id": call_id.as_str(), "content": content })
        }
    }
}

type SseEvents =
    BoxStream<'static, Result<eventsource_stream::Event, EventStreamError<reqwest::Error>>>;

struct StreamState {
    events: SseEvents,
    decoder: SseDecoder,
    ready: VecDeque<ResponsePart>,
    ended: bool,
}

fn response_stream(events: SseEvents) -> ResponseStream {
    let state = StreamState {
        events,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        ended: false,
    };
    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(part) = state.ready.pop_front() {
                return Some((Ok(part), state));
            }
            if state.ended {
                return None;
            }
            let next = match tokio::time::timeout(IDLE_TIMEOUT, state.events.next()).await {
                Ok(next) => next,
                Err(_) => {
                    state.ended = true;
                    let err = LanguageModelError::Stream(format!(
                        "no data for {}s",
                        IDLE_TIMEOUT.as_secs()
                    ));
                    return Some((Err(err), state));
                }
            };
            match next {
                Some(Ok(event)) => match state.decoder.decode(&event.data) {
                    Ok(parts) => {
                        state.ended = event.data.trim() == super::sse::DONE_MARKER;
                        state.ready.extend(parts);
                    }
                    Err(err) => {
                        state.ended = true;
                        return Some((Err(err), state));
                    }
                },
                Some(Err(err)) => {
                    state.ended = true;
                    return Some((Err(LanguageModelError::Stream(err.to_string())), state));
                }
                None => {
                    state.ended = true;
                    let parts = state.decoder.finish();
                    state.ready.extend(parts);
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn send(
        &self,
        request: ChatRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<ResponseStream, LanguageModelError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LanguageModelError::MissingApiKey {
                env: self.api_key_env.clone(),
            })?;
        let body = self.request_body(request);
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat request"
        );

        let pending = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(LanguageModelError::Cancelled),
            response = pending => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "model endpoint rejected request");
            return Err(LanguageModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response_stream(response.bytes_stream().eventsource().boxed()))
    }
}

#[cfg(test)]
mod tests {
    use super::{response_stream, OpenAiChatModel, SseEvents};
    use crate::llm::{ChatRequest, LanguageModel, LanguageModelError, ResponsePart, ToolSpec};
    use crate::model::{ChatMessage, ToolCall, ToolCallId};
    use futures::StreamExt;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn event(data: &str) -> eventsource_stream::Event {
        eventsource_stream::Event {
            event: "message".to_owned(),
            data: data.to_owned(),
            id: String::new(),
            retry: None,
        }
    }

    #[test]
    fn request_body_maps_roles_and_tools() {
        let model = OpenAiChatModel::new("http://localhost:1234/v1/", "test-model")
            .with_temperature(Some(0.5));
        let call_id = ToolCallId::new("call_1").expect("id");
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("draw"),
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![ToolCall {
                    id: call_id.clone(),
                    name: "lookup".to_owned(),
                    arguments: "{}".to_owned(),
                }],
            ),
            ChatMessage::tool_result(call_id, "result"),
        ];
        let tools = vec![ToolSpec {
            name: "lookup".to_owned(),
            description: "Looks things up".to_owned(),
            parameters: json!({"type": "object"}),
        }];
        let body = model.request_body(ChatRequest {
            messages: &messages,
            tools: &tools,
        });

        assert_eq!(model.completions_url(), "http://localhost:1234/v1/chat/completions");
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["content"], serde_json::Value::Null);
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "lookup");
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["name"], "lookup");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn missing_key_fails_before_any_request() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");
        let model = OpenAiChatModel::new("http://127.0.0.1:9", "m")
            .with_api_key_env("MERMAIDE_TEST_KEY_THAT_IS_NEVER_SET");
        let result = rt.block_on(model.send(
            ChatRequest {
                messages: &[],
                tools: &[],
            },
            &CancellationToken::new(),
        ));
        assert!(matches!(result, Err(LanguageModelError::MissingApiKey { env }) if env == "MERMAIDE_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn event_stream_yields_text_then_tool_calls() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");
        let events: SseEvents = futures::stream::iter(vec![
            Ok(event(r#"{"choices":[{"delta":{"content":"Here"}}]}"#)),
            Ok(event(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"t","arguments":"{}"}}]}}]}"#)),
            Ok(event("[DONE]")),
            Ok(event(r#"{"choices":[{"delta":{"content":"ignored"}}]}"#)),
        ])
        .boxed();
        let parts: Vec<_> = rt.block_on(response_stream(events).collect());
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], Ok(ResponsePart::Text(text)) if text == "Here"));
        assert!(matches!(&parts[1], Ok(ResponsePart::ToolCall(call)) if call.name == "t"));
    }
}
