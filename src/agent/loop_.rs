//! Bounded tool-calling loop: Think → Act → Observe, at most `max_steps`
//! model round-trips per request.
//!
//! Each step:
//! 1. Sends the full history plus the tool catalog to the model
//! 2. Stops if the model answered without tool calls
//! 3. Executes requested tools concurrently, appending results in request order
//! 4. Repeats until the step cap, then returns the best partial answer

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::inference::{ChatModel, InferenceClient, InferenceError, TokenSink};
use crate::tools::{self, ToolContext, ToolDefinition};
use crate::types::*;

/// Shown when the step cap is hit and nothing else can be said.
pub const STEP_LIMIT_NOTICE: &str =
    "I wasn't able to finish gathering that information within the allowed number of steps. \
     Please try a more specific question.";

/// Shown when the model answers with neither text nor tool calls.
pub const EMPTY_ANSWER_NOTICE: &str =
    "I don't have an answer for that right now. Please try rephrasing your question.";

/// Loop bounds.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub max_steps: u32,
    pub max_tool_calls_per_step: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_steps: 5,
            max_tool_calls_per_step: 10,
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// The model produced a reply without requesting tools.
    Answered,
    /// The step cap was reached with tool work still in flight.
    StepLimit,
}

/// Result of one request's loop.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Final answer text.
    pub text: String,
    /// Whether `text` came from the model (and was therefore already streamed).
    pub from_model: bool,
    pub steps: u32,
    pub finish: Finish,
    pub tool_results: Vec<ToolResult>,
    pub usage: TokenUsage,
}

/// Run the loop over `messages` (system prompt first).
pub async fn run_tool_loop(
    model: &dyn ChatModel,
    model_name: &str,
    tool_ctx: &ToolContext,
    definitions: &[ToolDefinition],
    mut messages: Vec<ChatMessage>,
    settings: LoopSettings,
    sink: Option<&TokenSink>,
) -> Result<LoopOutcome, InferenceError> {
    let max_steps = settings.max_steps.max(1);
    let model_name = match model_name.trim() {
        "" => model.model_id(),
        name => name,
    };
    let mut accumulated = String::new();
    let mut all_results: Vec<ToolResult> = Vec::new();
    let mut last_results: Vec<ToolResult> = Vec::new();
    let mut usage = TokenUsage::default();

    for step in 1..=max_steps {
        let response = model
            .complete(model_name, &messages, definitions, sink)
            .await?;
        usage.add(&response.usage);

        let text = response.content.unwrap_or_default();
        if !text.is_empty() {
            debug!("[Step {}] Assistant: {}", step, truncate(&text, 200));
            if !accumulated.is_empty() {
                accumulated.push_str("\n\n");
            }
            accumulated.push_str(&text);
        }

        if response.tool_calls.is_empty() {
            log_usage(model_name, step, &usage);
            return Ok(finish(
                accumulated,
                &last_results,
                all_results,
                step,
                Finish::Answered,
                usage,
            ));
        }

        messages.push(ChatMessage::assistant_with_tools(
            text,
            response.tool_calls.clone(),
        ));

        let results = execute_step(
            tool_ctx,
            &response.tool_calls,
            settings.max_tool_calls_per_step as usize,
            step,
        )
        .await;

        for result in &results {
            messages.push(ChatMessage::tool(&result.tool_call_id, result.to_content()));
        }
        all_results.extend(results.iter().cloned());
        last_results = results;
    }

    warn!("Step cap of {} reached with tool calls pending", max_steps);
    log_usage(model_name, max_steps, &usage);
    Ok(finish(
        accumulated,
        &last_results,
        all_results,
        max_steps,
        Finish::StepLimit,
        usage,
    ))
}

/// Execute one step's tool calls concurrently; results keep request order.
/// Calls past the per-step cap get an error result so every id is answered.
async fn execute_step(
    ctx: &ToolContext,
    calls: &[ToolCall],
    max_calls: usize,
    step: u32,
) -> Vec<ToolResult> {
    let max_calls = max_calls.max(1);
    let (run, skipped) = calls.split_at(calls.len().min(max_calls));

    let pending = run.iter().map(|tc| async move {
        info!("[Step {}] Tool: {}({})", step, tc.name, tc.arguments);
        let mut result = tools::execute_tool(ctx, &tc.name, &tc.arguments).await;
        result.tool_call_id = tc.id.clone();
        if result.success {
            info!("[Step {}] Tool {} succeeded", step, tc.name);
        } else {
            warn!(
                "[Step {}] Tool {} error: {}",
                step,
                tc.name,
                result.error().unwrap_or("unknown error")
            );
        }
        result
    });
    let mut results = join_all(pending).await;

    for tc in skipped {
        warn!("[Step {}] Skipping tool {}: per-step limit", step, tc.name);
        let mut result = ToolResult::failure(
            &tc.name,
            format!(
                "Too many tool calls in one step (limit {}); call skipped",
                max_calls
            ),
        );
        result.tool_call_id = tc.id.clone();
        results.push(result);
    }
    results
}

/// Pick the best answer: model text, else the last tool summaries, else the
/// notice matching why the loop stopped.
fn finish(
    accumulated: String,
    last_results: &[ToolResult],
    tool_results: Vec<ToolResult>,
    steps: u32,
    finish: Finish,
    usage: TokenUsage,
) -> LoopOutcome {
    let (text, from_model) = if !accumulated.is_empty() {
        (accumulated, true)
    } else {
        let summaries: Vec<&str> = last_results.iter().filter_map(|r| r.formatted()).collect();
        if summaries.is_empty() {
            let notice = match finish {
                Finish::Answered => EMPTY_ANSWER_NOTICE,
                Finish::StepLimit => STEP_LIMIT_NOTICE,
            };
            (notice.to_string(), false)
        } else {
            (summaries.join("\n"), false)
        }
    };
    LoopOutcome {
        text,
        from_model,
        steps,
        finish,
        tool_results,
        usage,
    }
}

fn log_usage(model_name: &str, steps: u32, usage: &TokenUsage) {
    let cost = InferenceClient::estimate_cost(model_name, usage);
    info!(
        "Loop finished after {} step(s): {} tokens (~${:.4})",
        steps, usage.total_tokens, cost
    );
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::inference::ScriptedModel;
    use serde_json::json;

    fn ctx() -> ToolContext {
        let config = AgentConfig {
            mock_mode: true,
            hiro_api_url: "http://127.0.0.1:9".into(),
            velar_api_url: "http://127.0.0.1:9".into(),
            ..AgentConfig::default()
        };
        ToolContext::from_config(&config, None, reqwest::Client::new()).unwrap()
    }

    fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args,
        }
    }

    fn base_messages() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("You are a test agent."),
            ChatMessage::user("What's my balance?"),
        ]
    }

    #[tokio::test]
    async fn terminates_at_step_cap_when_model_never_stops() {
        let model = ScriptedModel::new(vec![InferenceResponse::tools(vec![call(
            "c",
            "get_stx_balance",
            json!({}),
        )])]);
        let outcome = run_tool_loop(
            &model,
            "m",
            &ctx(),
            &tools::tool_definitions(),
            base_messages(),
            LoopSettings::default(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(model.call_count(), 5);
        assert_eq!(outcome.steps, 5);
        assert_eq!(outcome.finish, Finish::StepLimit);
        assert!(!outcome.from_model);
        assert_eq!(
            outcome.text,
            "Total: 2500.75 STX, Locked: 500.25 STX, Available: 2000.5 STX"
        );
        assert_eq!(outcome.tool_results.len(), 5);
    }

    #[tokio::test]
    async fn tool_results_feed_the_next_step_in_order() {
        let model = ScriptedModel::new(vec![
            InferenceResponse::tools(vec![
                call("a", "get_wallet_address", json!({})),
                call("b", "no_such_tool", json!({})),
                call("c", "get_stx_balance", json!({})),
            ]),
            InferenceResponse::text("You have 2000.5 STX available."),
        ]);
        let outcome = run_tool_loop(
            &model,
            "m",
            &ctx(),
            &tools::tool_definitions(),
            base_messages(),
            LoopSettings::default(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(outcome.finish, Finish::Answered);
        assert_eq!(outcome.steps, 2);
        assert!(outcome.from_model);
        assert_eq!(outcome.text, "You have 2000.5 STX available.");

        let second = &model.requests()[1];
        // system, user, assistant(tool calls), three tool messages
        assert_eq!(second.len(), 6);
        assert_eq!(second[2].tool_calls.len(), 3);
        let ids: Vec<_> = second[3..]
            .iter()
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(second[4].content.contains("Tool no_such_tool not found"));
        assert!(second[5].content.contains("2000.5"));
    }

    #[tokio::test]
    async fn excess_calls_in_one_step_get_error_results() {
        let calls = (0..4)
            .map(|i| call(&format!("id{}", i), "get_wallet_address", json!({})))
            .collect();
        let model = ScriptedModel::new(vec![
            InferenceResponse::tools(calls),
            InferenceResponse::text("done"),
        ]);
        let settings = LoopSettings {
            max_steps: 5,
            max_tool_calls_per_step: 2,
        };
        let outcome = run_tool_loop(
            &model,
            "m",
            &ctx(),
            &[],
            base_messages(),
            settings,
            None,
        )
        .await
        .unwrap();

        assert_eq!(outcome.tool_results.len(), 4);
        assert!(outcome.tool_results[0].success);
        assert!(outcome.tool_results[1].success);
        assert!(!outcome.tool_results[2].success);
        assert_eq!(outcome.tool_results[3].tool_call_id, "id3");
    }

    #[tokio::test]
    async fn empty_first_reply_gets_empty_answer_notice() {
        let model = ScriptedModel::new(vec![InferenceResponse::default()]);
        let outcome = run_tool_loop(
            &model,
            "m",
            &ctx(),
            &[],
            base_messages(),
            LoopSettings::default(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(outcome.finish, Finish::Answered);
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.text, EMPTY_ANSWER_NOTICE);
        assert!(!outcome.from_model);
    }

    #[tokio::test]
    async fn step_cap_without_summaries_gets_step_limit_notice() {
        let model = ScriptedModel::new(vec![InferenceResponse::tools(vec![call(
            "x",
            "no_such_tool",
            json!({}),
        )])]);
        let settings = LoopSettings {
            max_steps: 2,
            max_tool_calls_per_step: 10,
        };
        let outcome = run_tool_loop(
            &model,
            "m",
            &ctx(),
            &[],
            base_messages(),
            settings,
            None,
        )
        .await
        .unwrap();
        assert_eq!(outcome.finish, Finish::StepLimit);
        assert_eq!(outcome.text, STEP_LIMIT_NOTICE);
    }

    #[tokio::test]
    async fn rate_limit_propagates() {
        let model = ScriptedModel::rate_limited();
        let err = run_tool_loop(
            &model,
            "m",
            &ctx(),
            &[],
            base_messages(),
            LoopSettings::default(),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
