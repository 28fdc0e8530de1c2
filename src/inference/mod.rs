//! Model inference against an OpenAI-compatible chat completions API.
//!
//! The loop talks to a [`ChatModel`]; [`InferenceClient`] is the HTTP
//! implementation and [`ScriptedModel`] replays canned responses.

pub mod client;
pub mod scripted;
pub mod streaming;

pub use client::{build_http_client, InferenceClient};
pub use scripted::ScriptedModel;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::tools::ToolDefinition;
use crate::types::{ChatMessage, InferenceResponse};

/// User-facing text returned when the model service throttles us.
pub const RATE_LIMIT_MESSAGE: &str =
    "The assistant is receiving too many requests right now. Please wait a moment and try again.";

/// Inference failures the caller needs to tell apart.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Inference rate limited: {0}")]
    RateLimited(String),

    #[error("Inference failed ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("Inference request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode inference response: {0}")]
    Decode(String),
}

impl InferenceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Text suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimited(_) => RATE_LIMIT_MESSAGE.to_string(),
            other => format!("The assistant could not complete the request: {}", other),
        }
    }
}

/// Channel receiving assistant text fragments in production order.
pub type TokenSink = mpsc::Sender<String>;

/// A chat model that supports tool calling.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model used when a request does not select one.
    fn model_id(&self) -> &str;

    /// Run one completion. When `sink` is given, assistant text is forwarded
    /// to it as it is produced; the full response is still returned.
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        sink: Option<&TokenSink>,
    ) -> Result<InferenceResponse, InferenceError>;
}
