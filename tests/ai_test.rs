//! Integration tests for the LLM client against a mock API.

use std::path::PathBuf;
use std::time::Duration;

use portlink::ai::{ChatMessage, LlmClient};
use portlink::config::Config;
use serde_json::json;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server_uri: &str) -> Config {
    Config {
        database_path: PathBuf::from(":memory:"),
        web_host: "127.0.0.1".to_string(),
        web_port: 0,
        cors_origin: None,
        jwt_secret: "test-secret-test-secret-test-secret!".to_string(),
        jwt_issuer: "portlink".to_string(),
        jwt_audience: "portlink-api".to_string(),
        access_token_ttl: Duration::from_secs(900),
        refresh_token_ttl: Duration::from_secs(86_400),
        feed_cache_enabled: false,
        llm_api_url: server_uri.to_string(),
        llm_api_key: Some("sk-test".to_string()),
        llm_model: "test-model".to_string(),
        llm_daily_quota: 20,
        llm_concurrency: 2,
        s3_bucket: None,
        s3_region: "us-east-1".to_string(),
        s3_endpoint: None,
        s3_prefix: "uploads/".to_string(),
    }
}

#[tokio::test]
async fn test_chat_returns_first_choice_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token("sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "Strong project structure."}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::from_config(&config_for(&server.uri())).expect("client enabled");
    let reply = client
        .chat(&[ChatMessage::user("evaluate this")])
        .await
        .unwrap();

    assert_eq!(reply, "Strong project structure.");
}

#[tokio::test]
async fn test_prompt_templates_reach_the_wire() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}]
        })))
        .mount(&server)
        .await;

    let client = LlmClient::from_config(&config_for(&server.uri())).unwrap();
    client
        .evaluate_portfolio(
            "Realtime chat",
            "Built with websockets",
            &["Rust".to_string(), "Axum".to_string()],
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();

    assert_eq!(body["model"], "test-model");
    assert_eq!(body["messages"][0]["role"], "system");
    let user_content = body["messages"][1]["content"].as_str().unwrap();
    assert!(user_content.contains("Realtime chat"));
    assert!(user_content.contains("Rust, Axum"));
}

#[tokio::test]
async fn test_api_error_body_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string("{\"error\": \"rate limited\"}"),
        )
        .mount(&server)
        .await;

    let client = LlmClient::from_config(&config_for(&server.uri())).unwrap();
    let err = client
        .chat(&[ChatMessage::user("hi")])
        .await
        .expect_err("error status must fail");

    let message = format!("{err:#}");
    assert!(message.contains("429"));
    assert!(message.contains("rate limited"));
}

#[tokio::test]
async fn test_empty_choices_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = LlmClient::from_config(&config_for(&server.uri())).unwrap();
    assert!(client.chat(&[ChatMessage::user("hi")]).await.is_err());
}

#[tokio::test]
async fn test_missing_api_key_disables_client() {
    let mut config = config_for("http://127.0.0.1:1");
    config.llm_api_key = None;

    assert!(LlmClient::from_config(&config).is_none());
}
