//! OpenAI chat-completions client implementing [`Summarizer`] and
//! [`InsightExtractor`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{insight_user_message, parse_insight_output, parse_summary_output, summary_user_message};
use crate::error::{PipelineError, Result};
use crate::traits::ai::{ArticleSummary, InsightExtractor, Summarizer};
use crate::types::fragment::{InsightOutcome, InsightQuery};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-5";
pub const SUMMARY_TIMEOUT: Duration = Duration::from_secs(40);
pub const INSIGHT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
    summary_timeout: Duration,
    insight_timeout: Duration,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            summary_timeout: SUMMARY_TIMEOUT,
            insight_timeout: INSIGHT_TIMEOUT,
        }
    }

    /// Set a custom base URL (for proxies or compatible servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeouts(mut self, summary: Duration, insight: Duration) -> Self {
        self.summary_timeout = summary;
        self.insight_timeout = insight;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        json_mode: bool,
        timeout: Duration,
    ) -> Result<String> {
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "OpenAI request failed");
                PipelineError::Ai(if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "OpenAI API error");
            return Err(PipelineError::Ai(format!("API call failed: {status} {error_text}")));
        }

        let chat_response: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| PipelineError::Ai(format!("unreadable response: {e}")))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PipelineError::Ai("no response from OpenAI".into()))?;

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis(),
            "OpenAI chat completion"
        );
        Ok(content)
    }
}

#[async_trait]
impl Summarizer for OpenAiClient {
    async fn summarize(&self, instructions: &str, text: &str) -> Result<ArticleSummary> {
        let output = self
            .chat(instructions, &summary_user_message(text), false, self.summary_timeout)
            .await?;
        Ok(parse_summary_output(&output))
    }
}

#[async_trait]
impl InsightExtractor for OpenAiClient {
    async fn extract(&self, instructions: &str, query: &InsightQuery) -> Result<InsightOutcome> {
        let output = self
            .chat(
                instructions,
                &insight_user_message(query),
                true,
                self.insight_timeout,
            )
            .await?;
        parse_insight_output(&output)
    }
}
