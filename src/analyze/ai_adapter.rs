//! AI adapter: content-generation provider abstraction + bounded retry wrapper.
//!
//! The pipeline only ever sees `ContentGenerator`: instruction text in, free-form
//! text out. Callers must treat the output as untrusted and possibly malformed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ai::AiConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// One instruction for the content-generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub instruction: String,
    /// Allow the provider to search the web while answering.
    pub web_search: bool,
    pub max_tokens: u32,
}

impl GenerateRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            web_search: false,
            max_tokens: 8000,
        }
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = n;
        self
    }
}

/// Trait object passed into the pipeline (and replaced by doubles in tests).
pub trait ContentGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynGenerator = Arc<dyn ContentGenerator>;

/// Factory: build a client according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a fixed-reply mock client.
/// * Else if `config.enabled==false` or no key is set, returns a disabled client.
/// * Else builds the real provider wrapped with the bounded retry policy.
pub fn build_client_from_config(config: &AiConfig) -> DynGenerator {
    let policy = RetryPolicy::from_config(config);

    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let mock = MockProvider {
            reply: r#"{"results": [], "articles": [], "groups": [], "standalone": []}"#.to_string(),
        };
        return Arc::new(RetryingClient::new(mock, policy));
    }

    if !config.enabled || config.api_key.is_empty() {
        return Arc::new(DisabledClient);
    }

    match config.provider.as_str() {
        "anthropic" => Arc::new(RetryingClient::new(AnthropicProvider::new(config), policy)),
        "openai" => Arc::new(RetryingClient::new(OpenAiProvider::new(config), policy)),
        _ => Arc::new(DisabledClient),
    }
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider: does a *real* remote call, exactly once.
pub trait Provider: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
    fn name(&self) -> &'static str;
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("hybrid-news-aggregator/0.1")
        .connect_timeout(Duration::from_secs(8))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Anthropic Messages API. Web-search requests attach the server-side search tool.
pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens_cap: u32,
}

impl AnthropicProvider {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            http: http_client(),
            api_key: config.api_key.clone(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "claude-sonnet-4-20250514".to_string()),
            max_tokens_cap: config.max_tokens,
        }
    }
}

/// Concatenate every `text` block of a Messages API response.
fn anthropic_text(body: &Value) -> String {
    body.get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

impl Provider for AnthropicProvider {
    fn fetch<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let mut body = serde_json::json!({
                "model": self.model,
                "max_tokens": request.max_tokens.min(self.max_tokens_cap),
                "messages": [{ "role": "user", "content": request.instruction }],
            });
            if request.web_search {
                body["tools"] = serde_json::json!([{
                    "type": "web_search_20250305",
                    "name": "web_search",
                    "max_uses": 5
                }]);
            }

            let resp = self
                .http
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .send()
                .await
                .context("anthropic request")?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                bail!("anthropic returned {status}: {}", crate::ingest::truncate_chars(&text, 200));
            }
            let json: Value = resp.json().await.context("anthropic response body")?;
            let text = anthropic_text(&json);
            if text.trim().is_empty() {
                bail!("anthropic returned no text content");
            }
            Ok(text)
        })
    }
    fn name(&self) -> &'static str {
        "anthropic"
    }
}

/// OpenAI provider (Chat Completions API).
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    search_model: Option<String>,
    max_tokens_cap: u32,
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            http: http_client(),
            api_key: config.api_key.clone(),
            model: config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            search_model: config.search_model.clone(),
            max_tokens_cap: config.max_tokens,
        }
    }
}

impl Provider for OpenAiProvider {
    fn fetch<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                #[serde(default)]
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                #[serde(default)]
                content: Option<String>,
            }

            let model = match (&self.search_model, request.web_search) {
                (Some(m), true) => m.as_str(),
                _ => self.model.as_str(),
            };
            let req = Req {
                model,
                messages: vec![Msg {
                    role: "user",
                    content: &request.instruction,
                }],
                max_tokens: request.max_tokens.min(self.max_tokens_cap),
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .context("openai request")?;

            let status = resp.status();
            if !status.is_success() {
                bail!("openai returned {status}");
            }
            let body: Resp = resp.json().await.context("openai response body")?;
            body.choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| anyhow!("openai returned no content"))
        })
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Fails every call; used when AI is disabled so every stage takes its degraded path.
pub struct DisabledClient;

impl ContentGenerator for DisabledClient {
    fn generate<'a>(
        &'a self,
        _request: &'a GenerateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async { Err(anyhow!("content generation is disabled")) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Simple mock provider for local runs.
#[derive(Clone)]
pub struct MockProvider {
    pub reply: String,
}

impl Provider for MockProvider {
    fn fetch<'a>(
        &'a self,
        _request: &'a GenerateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        let out = self.reply.clone();
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Retrying client wrapper (bounded attempts, fixed backoff, per-attempt timeout)
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(750),
            attempt_timeout: Duration::from_secs(90),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
            attempt_timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }
}

pub struct RetryingClient<P: Provider> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: Provider> RetryingClient<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn generate_impl(&self, request: &GenerateRequest) -> Result<String> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            counter!("generator_calls_total").increment(1);

            let outcome = tokio::time::timeout(self.policy.attempt_timeout, self.inner.fetch(request))
                .await
                .unwrap_or_else(|_| Err(anyhow!("timed out after {:?}", self.policy.attempt_timeout)));

            if outcome.is_err() {
                counter!("generator_errors_total").increment(1);
            }
            match outcome {
                Ok(text) => return Ok(text),
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(
                        error = %e,
                        provider = self.inner.name(),
                        attempt,
                        max_attempts,
                        "content generation attempt failed; retrying"
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "{} failed after {attempt} attempt(s)",
                        self.inner.name()
                    )));
                }
            }
        }
    }
}

impl<P: Provider> ContentGenerator for RetryingClient<P> {
    fn generate<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.generate_impl(request))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}
