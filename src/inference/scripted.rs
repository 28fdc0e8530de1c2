//! Scripted chat model for tests and offline runs.
//!
//! Returns predefined responses in sequence, cycling through them, and
//! records every request it sees.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::inference::{ChatModel, InferenceError, TokenSink};
use crate::tools::ToolDefinition;
use crate::types::{ChatMessage, InferenceResponse};

#[derive(Debug, Clone)]
enum Script {
    Respond(Vec<InferenceResponse>),
    RateLimited,
}

/// A model that replays canned responses.
#[derive(Debug)]
pub struct ScriptedModel {
    model_id: String,
    script: Script,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    /// Create a model that returns `responses` in order, then cycles.
    pub fn new(responses: Vec<InferenceResponse>) -> Self {
        Self {
            model_id: "scripted-model".to_string(),
            script: Script::Respond(responses),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call is rejected as rate limited.
    pub fn rate_limited() -> Self {
        Self {
            script: Script::RateLimited,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Number of completions requested so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Message lists sent on each call, in call order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(
        &self,
        _model: &str,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
        sink: Option<&TokenSink>,
    ) -> Result<InferenceResponse, InferenceError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        let responses = match &self.script {
            Script::RateLimited => {
                return Err(InferenceError::RateLimited("scripted rate limit".into()))
            }
            Script::Respond(responses) => responses,
        };

        let response = if responses.is_empty() {
            InferenceResponse::text("No response")
        } else {
            responses[index % responses.len()].clone()
        };

        if let (Some(sink), Some(content)) = (sink, response.content.as_deref()) {
            for word in content.split_inclusive(' ') {
                let _ = sink.send(word.to_string()).await;
            }
        }
        Ok(response)
    }
}
