//! Chat endpoint: runs the tool loop and assembles a streamed text body or
//! a JSON envelope.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::agent::{context, run_tool_loop, system_prompt, LoopSettings};
use crate::config::ConfigError;
use crate::inference::{InferenceError, RATE_LIMIT_MESSAGE};
use crate::server::AppState;
use crate::types::{ChatMessage, ChatRole};

/// Header selecting JSON mode and naming the conversation thread.
pub const THREAD_ID_HEADER: &str = "x-thread-id";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ClientMessage>,
    #[serde(default)]
    pub selected_model: Option<String>,
    #[serde(default)]
    pub stream: Option<bool>,
}

/// A message as sent by the chat UI. `content` is a string or a list of
/// `{type: "text", text}` parts.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub role: String,
    pub content: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatEnvelope {
    #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatEnvelope {
    fn error(thread_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            thread_id,
            message: None,
            error: Some(message.into()),
        }
    }
}

fn error_response(status: StatusCode, thread_id: Option<String>, message: impl Into<String>) -> Response {
    (status, Json(ChatEnvelope::error(thread_id, message))).into_response()
}

/// Convert client messages into the conversation. Only user and assistant
/// turns are accepted and the last one must come from the user.
pub fn parse_conversation(messages: &[ClientMessage]) -> Result<Vec<ChatMessage>, String> {
    let mut conversation = Vec::with_capacity(messages.len());
    for (i, m) in messages.iter().enumerate() {
        let content = content_text(&m.content)
            .ok_or_else(|| format!("messages[{}].content must be text", i))?;
        let message = match m.role.as_str() {
            "user" => ChatMessage::user(content),
            "assistant" => ChatMessage::assistant(content),
            other => return Err(format!("messages[{}] has unsupported role '{}'", i, other)),
        };
        conversation.push(message);
    }
    match conversation.last() {
        None => Err("messages must not be empty".into()),
        Some(last) if last.role != ChatRole::User => {
            Err("the last message must come from the user".into())
        }
        Some(last) if last.content.trim().is_empty() => Err("the last message is empty".into()),
        Some(_) => Ok(conversation),
    }
}

fn content_text(content: &serde_json::Value) -> Option<String> {
    match content {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter(|p| p.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect();
            (!texts.is_empty()).then(|| texts.join("\n"))
        }
        _ => None,
    }
}

/// `POST /api/chat`
pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let header_thread = headers
        .get(THREAD_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let json_mode = header_thread.is_some() || request.stream == Some(false);

    let conversation = match parse_conversation(&request.messages) {
        Ok(conversation) => conversation,
        Err(reason) => {
            warn!("Rejected chat request: {}", reason);
            return error_response(StatusCode::BAD_REQUEST, header_thread, reason);
        }
    };

    if !state.config.mock_mode && state.tools.wallet.is_none() {
        error!("Chat request refused: {}", ConfigError::MissingMnemonic);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            header_thread,
            ConfigError::MissingMnemonic.to_string(),
        );
    }

    let wallet_address = state.tools.default_address().ok();
    let prompt = system_prompt::build_system_prompt(&state.config, wallet_address.as_deref());
    let messages = context::build_messages(&prompt, &conversation);
    let model_name = state
        .config
        .effective_model(request.selected_model.as_deref())
        .to_string();
    let settings = LoopSettings {
        max_steps: state.config.max_steps,
        max_tool_calls_per_step: state.config.max_tool_calls_per_step,
    };

    info!(
        "Chat request: {} message(s), model {}, {}",
        conversation.len(),
        model_name,
        if json_mode { "json" } else { "stream" }
    );

    if json_mode {
        let thread_id = header_thread.unwrap_or_else(|| ulid::Ulid::new().to_string());
        let result = run_tool_loop(
            &*state.model,
            &model_name,
            &state.tools,
            &state.definitions,
            messages,
            settings,
            None,
        )
        .await;
        return match result {
            Ok(outcome) => Json(ChatEnvelope {
                thread_id: Some(thread_id),
                message: Some(outcome.text),
                error: None,
            })
            .into_response(),
            Err(e) => inference_failure(Some(thread_id), e),
        };
    }

    let (tx, rx) = mpsc::channel::<String>(64);
    tokio::spawn(async move {
        let result = run_tool_loop(
            &*state.model,
            &model_name,
            &state.tools,
            &state.definitions,
            messages,
            settings,
            Some(&tx),
        )
        .await;
        let tail = match result {
            Ok(outcome) if outcome.from_model => None,
            Ok(outcome) => Some(outcome.text),
            Err(e) => {
                error!("Streamed chat failed: {}", e);
                Some(e.user_message())
            }
        };
        if let Some(text) = tail {
            let _ = tx.send(text).await;
        }
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    });
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|e| {
            error!("Failed to build streaming response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

fn inference_failure(thread_id: Option<String>, e: InferenceError) -> Response {
    if e.is_rate_limited() {
        warn!("Chat request rate limited");
        return error_response(StatusCode::TOO_MANY_REQUESTS, thread_id, RATE_LIMIT_MESSAGE);
    }
    error!("Chat request failed: {}", e);
    error_response(StatusCode::BAD_GATEWAY, thread_id, e.user_message())
}
