//! LLM chat-completion integration.
//!
//! Stateless passthrough to an OpenAI-compatible chat API with prompt
//! templating for the three product surfaces: portfolio evaluation,
//! interview question generation, and writing assistance. Concurrency is
//! capped with a semaphore; per-user quotas live in the `ai_requests`
//! ledger and are enforced by the HTTP layer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::API_USER_AGENT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for an OpenAI-compatible chat-completion endpoint.
pub struct LlmClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    semaphore: Arc<Semaphore>,
}

impl LlmClient {
    /// Build a client from configuration. Returns `None` when no API key is
    /// configured, which disables the AI surface entirely.
    #[must_use]
    pub fn from_config(config: &Config) -> Option<Self> {
        let api_key = config.llm_api_key.clone()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(API_USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Some(Self {
            client,
            api_url: config.llm_api_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.llm_model.clone(),
            semaphore: Arc::new(Semaphore::new(config.llm_concurrency)),
        })
    }

    /// Send a chat completion and return the first choice's content.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .context("LLM concurrency limiter closed")?;

        let url = format!("{}/chat/completions", self.api_url);
        debug!(model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages,
                temperature: 0.7,
            })
            .send()
            .await
            .context("Failed to reach LLM API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "LLM API returned an error");
            bail!("LLM API error ({status}): {body}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to decode LLM API response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("LLM API returned no choices")
    }

    /// Evaluate a portfolio post: strengths, weaknesses, concrete next steps.
    pub async fn evaluate_portfolio(
        &self,
        title: &str,
        content: &str,
        tech_stack: &[String],
    ) -> Result<String> {
        let messages = [
            ChatMessage::system(
                "You are a senior engineer reviewing developer portfolios. \
                 Give specific, actionable feedback: three strengths, three \
                 weaknesses, and concrete improvements. Be direct but kind.",
            ),
            ChatMessage::user(format!(
                "Project: {title}\nTech stack: {}\n\n{content}",
                tech_stack.join(", ")
            )),
        ];
        self.chat(&messages).await
    }

    /// Generate interview questions for a profession and skill set.
    pub async fn interview_questions(
        &self,
        profession: &str,
        skills: &[String],
    ) -> Result<String> {
        let messages = [
            ChatMessage::system(
                "You are an experienced technical interviewer. Produce ten \
                 interview questions ranging from warm-up to deep technical, \
                 tailored to the candidate's profession and skills.",
            ),
            ChatMessage::user(format!(
                "Profession: {profession}\nSkills: {}",
                skills.join(", ")
            )),
        ];
        self.chat(&messages).await
    }

    /// Improve a draft without changing its meaning.
    pub async fn writing_assist(&self, draft: &str) -> Result<String> {
        let messages = [
            ChatMessage::system(
                "You edit technical writing for clarity and flow. Rewrite the \
                 draft keeping the author's voice and all technical content. \
                 Return only the revised text.",
            ),
            ChatMessage::user(draft.to_string()),
        ];
        self.chat(&messages).await
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}
