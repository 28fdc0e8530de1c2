//! HTTP inference client for OpenAI-compatible `/v1/chat/completions`.
//!
//! Supports tool-use (function calling), blocking and SSE-streamed.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::inference::streaming::{parse_arguments, SseAccumulator};
use crate::inference::{ChatModel, InferenceError, TokenSink};
use crate::tools::ToolDefinition;
use crate::types::*;

/// Time allowed to open a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest silence tolerated between reads. A streamed answer may run longer
/// than this in total as long as bytes keep arriving.
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared HTTP client for inference and the protocol adapters.
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(READ_TIMEOUT)
        .build()
}

/// Inference client wrapping a chat completions API.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    http: reqwest::Client,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<MessagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolPayload<'a>>>,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct MessagePayload {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ToolPayload<'a> {
    r#type: &'a str,
    function: FunctionPayload<'a>,
}

#[derive(Debug, Serialize)]
struct FunctionPayload<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCallPayload {
    id: String,
    r#type: String,
    function: FunctionCallPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCallPayload {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallPayload>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Pricing per 1M tokens (prompt, completion) in USD.
const MODEL_PRICING: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4-turbo", 10.00, 30.00),
    ("gpt-4.1-mini", 0.40, 1.60),
    ("gpt-4.1", 2.00, 8.00),
];

impl InferenceClient {
    /// Create a new inference client.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        max_tokens: u32,
        http: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
            http,
        }
    }

    fn build_request<'a>(
        &self,
        model: &'a str,
        messages: &[ChatMessage],
        tools: &'a [ToolDefinition],
        stream: bool,
    ) -> ChatRequest<'a> {
        let msg_payloads: Vec<MessagePayload> = messages.iter().map(to_payload).collect();

        let tool_payloads: Option<Vec<ToolPayload>> = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|t| ToolPayload {
                        r#type: "function",
                        function: FunctionPayload {
                            name: &t.name,
                            description: &t.description,
                            parameters: &t.parameters,
                        },
                    })
                    .collect(),
            )
        };

        ChatRequest {
            model,
            messages: msg_payloads,
            tools: tool_payloads,
            max_tokens: self.max_tokens,
            temperature: 0.7,
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
        }
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response, InferenceError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!("Inference request to model: {} (stream: {})", request.model, request.stream);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = resp.text().await.unwrap_or_default();
            warn!("Inference rate limited: {}", body);
            return Err(InferenceError::RateLimited(body));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InferenceError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Run inference with tool support. Returns a response with optional tool calls.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<InferenceResponse, InferenceError> {
        let request = self.build_request(model, messages, tools, false);
        let resp = self.send(&request).await?;

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| InferenceError::Decode(e.to_string()))?;

        let choice = body.choices.into_iter().next().unwrap_or(Choice {
            message: ResponseMessage {
                content: None,
                tool_calls: Vec::new(),
            },
        });

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| ToolCall {
                arguments: parse_arguments(&tc.function.arguments),
                id: tc.id,
                name: tc.function.name,
            })
            .collect();

        let usage = body
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(InferenceResponse {
            content: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls,
            usage,
        })
    }

    /// Streamed inference: text fragments go to `sink` as they arrive.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        sink: &TokenSink,
    ) -> Result<InferenceResponse, InferenceError> {
        let request = self.build_request(model, messages, tools, true);
        let resp = self.send(&request).await?;

        let mut stream = resp.bytes_stream();
        let mut acc = SseAccumulator::new();
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            pending.extend_from_slice(&chunk?);
            let text = drain_utf8(&mut pending);

            for delta in acc.feed(&text)? {
                forward(sink, delta).await;
            }
            if acc.is_done() {
                break;
            }
        }

        let (response, rest) = acc.finish()?;
        for delta in rest {
            forward(sink, delta).await;
        }
        Ok(response)
    }

    /// Estimate the USD cost of a token usage for a given model.
    pub fn estimate_cost(model: &str, usage: &TokenUsage) -> f64 {
        let (prompt_rate, completion_rate) = MODEL_PRICING
            .iter()
            .find(|(name, _, _)| model.contains(name))
            .map(|(_, p, c)| (*p, *c))
            .unwrap_or((2.50, 10.00)); // Default to gpt-4o pricing

        let prompt_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * prompt_rate;
        let completion_cost = (usage.completion_tokens as f64 / 1_000_000.0) * completion_rate;
        prompt_cost + completion_cost
    }
}

/// Take the decodable prefix of `pending`. Invalid bytes become U+FFFD; a
/// sequence cut off at the end stays buffered for the next chunk.
fn drain_utf8(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    loop {
        match std::str::from_utf8(&pending[..]) {
            Ok(s) => {
                text.push_str(s);
                pending.clear();
                return text;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[..valid]));
                match e.error_len() {
                    Some(bad) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + bad);
                    }
                    None => {
                        pending.drain(..valid);
                        return text;
                    }
                }
            }
        }
    }
}

async fn forward(sink: &TokenSink, delta: String) {
    // A closed receiver means the client went away; keep consuming the stream.
    if sink.send(delta).await.is_err() {
        debug!("Token receiver dropped");
    }
}

fn to_payload(m: &ChatMessage) -> MessagePayload {
    let tool_calls = (!m.tool_calls.is_empty()).then(|| {
        m.tool_calls
            .iter()
            .map(|tc| ToolCallPayload {
                id: tc.id.clone(),
                r#type: "function".into(),
                function: FunctionCallPayload {
                    name: tc.name.clone(),
                    arguments: tc.arguments.to_string(),
                },
            })
            .collect()
    });
    // Assistant messages that only carry tool calls send null content.
    let content = if m.content.is_empty() && tool_calls.is_some() {
        None
    } else {
        Some(m.content.clone())
    };
    MessagePayload {
        role: m.role.to_string(),
        content,
        tool_calls,
        tool_call_id: m.tool_call_id.clone(),
    }
}

#[async_trait]
impl ChatModel for InferenceClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        sink: Option<&TokenSink>,
    ) -> Result<InferenceResponse, InferenceError> {
        match sink {
            Some(sink) => self.chat_stream(model, messages, tools, sink).await,
            None => self.chat(model, messages, tools).await,
        }
    }
}
