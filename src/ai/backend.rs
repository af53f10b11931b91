//! Completion backend interface and the OpenRouter implementation.

use std::future::Future;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::AiConfig;

use super::conversation::Turn;

/// Default chat-completions endpoint. Any OpenAI-compatible service works
/// through the `base_url` override in the config.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// A remote text-completion service capable of streaming increments.
pub trait CompletionBackend: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Cheap pre-submission health check. Failing it short-circuits
    /// dispatch without occupying a worker slot.
    fn is_healthy(&self) -> bool;

    /// Stream raw text increments into `deltas` until the backend signals
    /// completion. A dropped receiver ends the stream early without error.
    fn stream(
        &self,
        turns: &[Turn],
        model: &str,
        deltas: mpsc::Sender<String>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// OpenRouter chat-completions client with SSE streaming.
#[derive(Clone)]
pub struct OpenRouterBackend {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterBackend {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.resolve_api_key(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Parse one SSE line, forwarding any delta content.
    ///
    /// Returns true when the stream-end marker was seen.
    async fn handle_line(line: &str, deltas: &mpsc::Sender<String>) -> Result<bool> {
        if line.is_empty() || line.starts_with(':') {
            return Ok(false);
        }
        let Some(data) = line.strip_prefix("data: ") else {
            return Ok(false);
        };
        if data == "[DONE]" {
            return Ok(true);
        }

        // Malformed events are skipped, matching keep-alive noise.
        let Ok(event) = serde_json::from_str::<StreamEvent>(data) else {
            return Ok(false);
        };

        if let Some(content) = event
            .choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            && !content.is_empty()
            && deltas.send(content.to_string()).await.is_err()
        {
            // Receiver dropped: consumer abandoned this task.
            return Ok(true);
        }

        Ok(false)
    }
}

impl CompletionBackend for OpenRouterBackend {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    fn is_healthy(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    async fn stream(&self, turns: &[Turn], model: &str, deltas: mpsc::Sender<String>) -> Result<()> {
        let api_key = self
            .api_key
            .as_deref()
            .context("API key not configured")?;

        let request = ChatRequest {
            model,
            messages: turns,
            stream: true,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .header("HTTP-Referer", "https://github.com/redraft/redraft")
            .header("X-Title", "redraft")
            .json(&request)
            .send()
            .await
            .context("Failed to reach completion backend")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("completion backend error ({}): {}", status, error_text);
        }

        let mut body = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = body.next().await {
            let bytes = chunk.context("completion stream interrupted")?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim_end_matches('\r').trim().to_string();
                buffer.drain(..=newline);
                if Self::handle_line(&line, &deltas).await? {
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}
