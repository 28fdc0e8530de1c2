//! Server-sent-event accumulation for streamed chat completions.
//!
//! Content deltas are surfaced as they arrive; tool-call fragments are
//! stitched together by their `index` and only materialized at the end.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::inference::InferenceError;
use crate::types::{InferenceResponse, TokenUsage, ToolCall};

/// Incremental SSE parser that builds an [`InferenceResponse`].
#[derive(Debug, Default)]
pub struct SseAccumulator {
    buffer: String,
    content: String,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    usage: Option<TokenUsage>,
    done: bool,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl SseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the response body. Returns the content deltas
    /// contained in every complete line seen so far.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<String>, InferenceError> {
        self.buffer.push_str(chunk);
        let mut deltas = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            if let Some(delta) = self.parse_line(&line)? {
                deltas.push(delta);
            }
        }
        Ok(deltas)
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Flush any trailing partial line and build the final response.
    pub fn finish(mut self) -> Result<(InferenceResponse, Vec<String>), InferenceError> {
        let rest = std::mem::take(&mut self.buffer);
        let mut deltas = Vec::new();
        for line in rest.lines() {
            if let Some(delta) = self.parse_line(line)? {
                deltas.push(delta);
            }
        }

        let tool_calls = self
            .tool_calls
            .into_values()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.name,
                arguments: parse_arguments(&tc.arguments),
            })
            .collect();

        let response = InferenceResponse {
            content: (!self.content.is_empty()).then_some(self.content),
            tool_calls,
            usage: self.usage.unwrap_or_default(),
        };
        Ok((response, deltas))
    }

    fn parse_line(&mut self, line: &str) -> Result<Option<String>, InferenceError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return Ok(None);
        }
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let data = data.trim();
        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let chunk: StreamChunk = serde_json::from_str(data)
            .map_err(|e| InferenceError::Decode(format!("bad stream chunk: {}", e)))?;

        if let Some(u) = chunk.usage {
            self.usage = Some(TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });
        }

        let mut delta_text = None;
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                self.content.push_str(&content);
                delta_text.get_or_insert_with(String::new).push_str(&content);
            }
            for tc in choice.delta.tool_calls.unwrap_or_default() {
                let index = tc.index.unwrap_or(self.tool_calls.len());
                let entry = self.tool_calls.entry(index).or_default();
                if let Some(id) = tc.id {
                    entry.id = id;
                }
                if let Some(function) = tc.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(args) = function.arguments {
                        entry.arguments.push_str(&args);
                    }
                }
            }
        }
        Ok(delta_text)
    }
}

/// Decode a tool-call argument string. Malformed JSON is kept as a string so
/// argument validation reports it instead of silently seeing `{}`.
pub fn parse_arguments(raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: Option<usize>,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_deltas_are_forwarded_in_order() {
        let mut acc = SseAccumulator::new();
        let mut seen = acc
            .feed("data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n")
            .unwrap();
        // Split mid-line across two chunks.
        seen.extend(acc.feed("data: {\"choices\":[{\"delta\":{\"con").unwrap());
        seen.extend(acc.feed("tent\":\"lo\"}}]}\n\ndata: [DONE]\n\n").unwrap());
        assert_eq!(seen, vec!["Hel", "lo"]);
        assert!(acc.is_done());

        let (response, rest) = acc.finish().unwrap();
        assert!(rest.is_empty());
        assert_eq!(response.content.as_deref(), Some("Hello"));
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn tool_call_fragments_are_stitched_by_index() {
        let mut acc = SseAccumulator::new();
        let lines = [
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"get_stx_balance","arguments":""}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"get_sbtc_current_cycle","arguments":"{}"}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"address\":"}}]}}]}"#,
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"SP1\"}"}}]}}]}"#,
            r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
            "data: [DONE]",
        ];
        for line in lines {
            assert!(acc.feed(&format!("{}\n", line)).unwrap().is_empty());
        }
        let (response, _) = acc.finish().unwrap();
        assert_eq!(response.content, None);
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].id, "call_a");
        assert_eq!(response.tool_calls[0].name, "get_stx_balance");
        assert_eq!(response.tool_calls[0].arguments, json!({"address": "SP1"}));
        assert_eq!(response.tool_calls[1].arguments, json!({}));
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn trailing_line_without_newline_is_flushed() {
        let mut acc = SseAccumulator::new();
        assert!(acc
            .feed("data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
            .unwrap()
            .is_empty());
        let (response, rest) = acc.finish().unwrap();
        assert_eq!(rest, vec!["tail"]);
        assert_eq!(response.content.as_deref(), Some("tail"));
    }

    #[test]
    fn comments_and_garbage_chunks() {
        let mut acc = SseAccumulator::new();
        assert!(acc.feed(": keep-alive\n").unwrap().is_empty());
        assert!(acc.feed("data: {not json}\n").is_err());
    }

    #[test]
    fn malformed_arguments_are_kept_verbatim() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_arguments("{oops"), json!("{oops"));
    }
}
