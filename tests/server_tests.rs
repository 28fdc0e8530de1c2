//! Router tests for the chat endpoint, driven by a scripted model.

use axum::{
    body::to_bytes,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use stacks_agent::{
    config::AgentConfig,
    inference::{ChatModel, ScriptedModel, RATE_LIMIT_MESSAGE},
    protocols::wallet_info::MOCK_ADDRESS,
    server::{self, AppState},
    tools::ToolContext,
    types::{ChatRole, InferenceResponse, ToolCall},
};

const UNREACHABLE: &str = "http://127.0.0.1:9";

fn mock_config() -> AgentConfig {
    AgentConfig {
        mock_mode: true,
        hiro_api_url: UNREACHABLE.into(),
        velar_api_url: UNREACHABLE.into(),
        alex_sdk_api_url: UNREACHABLE.into(),
        alex_backend_api_url: UNREACHABLE.into(),
        ..AgentConfig::default()
    }
}

fn create_test_app(config: AgentConfig, model: Arc<ScriptedModel>) -> Router {
    let tools = ToolContext::from_config(&config, None, reqwest::Client::new()).unwrap();
    let model: Arc<dyn ChatModel> = model;
    server::router(AppState::new(config, model, tools))
}

fn chat_request(body: Value, thread_id: Option<&str>) -> Request<axum::body::Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header("Content-Type", "application/json");
    if let Some(id) = thread_id {
        builder = builder.header("x-thread-id", id);
    }
    builder
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn user_says(text: &str) -> Value {
    json!({ "messages": [{ "role": "user", "content": text }] })
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app(mock_config(), Arc::new(ScriptedModel::new(vec![])));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_json_reply_echoes_thread_id() {
    let model = Arc::new(ScriptedModel::new(vec![InferenceResponse::text(
        "Stacks settles on Bitcoin.",
    )]));
    let app = create_test_app(mock_config(), model.clone());

    let response = app
        .oneshot(chat_request(user_says("What is Stacks?"), Some("thread-42")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!({ "threadId": "thread-42", "message": "Stacks settles on Bitcoin." })
    );
    assert_eq!(model.call_count(), 1);

    let first = &model.requests()[0];
    assert_eq!(first[0].role, ChatRole::System);
    assert_eq!(first.last().unwrap().content, "What is Stacks?");
}

#[tokio::test]
async fn test_stream_false_generates_thread_id() {
    let model = Arc::new(ScriptedModel::new(vec![InferenceResponse::text("hi")]));
    let app = create_test_app(mock_config(), model);

    let mut body = user_says("hello");
    body["stream"] = json!(false);
    let response = app.oneshot(chat_request(body, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["message"], "hi");
    assert_eq!(json["threadId"].as_str().unwrap().len(), 26);
}

#[tokio::test]
async fn test_tool_result_feeds_next_step() {
    let model = Arc::new(ScriptedModel::new(vec![
        InferenceResponse::tools(vec![ToolCall {
            id: "call_1".into(),
            name: "get_wallet_address".into(),
            arguments: json!({}),
        }]),
        InferenceResponse::text("Your wallet is ready."),
    ]));
    let app = create_test_app(mock_config(), model.clone());

    let response = app
        .oneshot(chat_request(user_says("What is my address?"), Some("t")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["message"], "Your wallet is ready.");
    assert_eq!(model.call_count(), 2);

    let second = &model.requests()[1];
    let tool_msg = second.last().unwrap();
    assert_eq!(tool_msg.role, ChatRole::Tool);
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
    assert!(tool_msg.content.contains(MOCK_ADDRESS));
}

#[tokio::test]
async fn test_failing_adapter_still_answers() {
    let model = Arc::new(ScriptedModel::new(vec![
        InferenceResponse::tools(vec![ToolCall {
            id: "call_v".into(),
            name: "get_velar_tokens".into(),
            arguments: json!({ "symbol": "VELAR" }),
        }]),
        InferenceResponse::text("Velar is unreachable right now."),
    ]));
    let app = create_test_app(mock_config(), model.clone());

    let response = app
        .oneshot(chat_request(user_says("Velar tokens?"), Some("t")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await["message"],
        "Velar is unreachable right now."
    );

    let tool_msg = model.requests()[1].last().cloned().unwrap();
    let output: Value = serde_json::from_str(&tool_msg.content).unwrap();
    assert!(output["error"].as_str().unwrap().contains("Velar"));
}

#[tokio::test]
async fn test_rate_limit_maps_to_429() {
    let app = create_test_app(mock_config(), Arc::new(ScriptedModel::rate_limited()));

    let response = app
        .oneshot(chat_request(user_says("hello"), Some("t-rl")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = read_json(response).await;
    assert_eq!(json["error"], RATE_LIMIT_MESSAGE);
    assert_eq!(json["threadId"], "t-rl");
}

#[tokio::test]
async fn test_last_message_must_be_user() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let app = create_test_app(mock_config(), model.clone());

    let body = json!({
        "messages": [
            { "role": "user", "content": "hi" },
            { "role": "assistant", "content": "hello" }
        ]
    });
    let response = app.oneshot(chat_request(body, Some("t"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(read_json(response).await["error"].is_string());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_missing_mnemonic_outside_mock_mode() {
    let config = AgentConfig {
        mock_mode: false,
        ..mock_config()
    };
    let model = Arc::new(ScriptedModel::new(vec![InferenceResponse::text("unused")]));
    let app = create_test_app(config, model.clone());

    let response = app
        .oneshot(chat_request(user_says("balance?"), Some("t")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = read_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("WALLET_MNEMONIC"));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_streams_plain_text() {
    let model = Arc::new(ScriptedModel::new(vec![InferenceResponse::text(
        "Hello from the Stacks agent",
    )]));
    let app = create_test_app(mock_config(), model);

    let response = app
        .oneshot(chat_request(user_says("hi"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(
        String::from_utf8(body.to_vec()).unwrap(),
        "Hello from the Stacks agent"
    );
}

#[tokio::test]
async fn test_stream_reports_rate_limit_in_body() {
    let app = create_test_app(mock_config(), Arc::new(ScriptedModel::rate_limited()));

    let response = app
        .oneshot(chat_request(user_says("hi"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(String::from_utf8(body.to_vec()).unwrap(), RATE_LIMIT_MESSAGE);
}
