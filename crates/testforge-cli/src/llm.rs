//! OpenAI-compatible chat-completions client
//!
//! One blocking-free client shared by the three agents. Transport and API
//! errors surface as collaborator failures so the orchestrator can fail
//! the run with the message intact.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use testforge_core::PipelineError;
use tokio_util::sync::CancellationToken;

/// Default chat-completions endpoint base.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";

/// Environment variables consulted for the API key, in order.
const API_KEY_VARS: [&str; 2] = ["TESTFORGE_API_KEY", "GROQ_API_KEY"];

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Chat-completions client for an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl LlmClient {
    /// Build a client from explicit settings, reading the API key from the
    /// environment.
    pub fn from_env(base_url: &str, model: &str) -> Result<Self, PipelineError> {
        let api_key = API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                PipelineError::collaborator(format!(
                    "no API key found; set {} or {}",
                    API_KEY_VARS[0], API_KEY_VARS[1]
                ))
            })?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::collaborator(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    /// Send one system+user exchange and return the raw assistant text.
    ///
    /// Retries on rate limiting with exponential backoff; every other
    /// failure is terminal.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
        };

        let mut backoff = INITIAL_BACKOFF;
        for attempt in 0..=MAX_RETRIES {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let response = tokio::select! {
                r = self
                    .http
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&request)
                    .send() => r,
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            }
            .map_err(|e| PipelineError::collaborator(format!("LLM request failed: {e}")))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| PipelineError::collaborator(format!("LLM response read failed: {e}")))?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    PipelineError::collaborator(format!("unparseable LLM response: {e}"))
                })?;
                return parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| {
                        PipelineError::collaborator("LLM response contained no choices")
                    });
            }

            if status.as_u16() == 429 && attempt < MAX_RETRIES {
                tracing::warn!(
                    attempt = attempt + 1,
                    backoff_secs = backoff.as_secs(),
                    "rate limited, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            let snippet: String = text.chars().take(200).collect();
            return Err(PipelineError::collaborator(format!(
                "LLM API error {status}: {snippet}"
            )));
        }

        Err(PipelineError::collaborator("LLM retries exhausted"))
    }
}
