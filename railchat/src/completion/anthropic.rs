//! Anthropic Messages API client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::config::CompletionSettings;
use crate::conversation::ConversationHistory;
use crate::error::{Error, RemoteError, Result};

use super::CompletionClient;

/// Default Anthropic API base URL.
pub const ANTHROPIC_API_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API version sent with every request.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const PROVIDER: &str = "anthropic";

/// Client for the Anthropic Messages API.
///
/// # Example
///
/// ```rust,ignore
/// use railchat::completion::AnthropicClient;
///
/// // From environment variable ANTHROPIC_API_KEY
/// let client = AnthropicClient::from_env()?;
///
/// // With custom configuration
/// let client = AnthropicClient::builder()
///     .api_key("sk-ant-...")
///     .settings(CompletionSettings::default().temperature(0.2))
///     .timeout_secs(30)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct AnthropicClient {
    http_client: reqwest::Client,
    api_key: Arc<str>,
    base_url: Arc<str>,
    anthropic_version: Arc<str>,
    settings: CompletionSettings,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.base_url)
            .field("anthropic_version", &self.anthropic_version)
            .field("settings", &self.settings)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    /// Create a client with the given API key and default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder().api_key(api_key).build()
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> AnthropicClientBuilder {
        AnthropicClientBuilder::default()
    }

    /// Create a client from environment variables.
    ///
    /// Uses `ANTHROPIC_API_KEY` for the API key and optionally
    /// `ANTHROPIC_BASE_URL` for a custom base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `ANTHROPIC_API_KEY` is not set.
    pub fn from_env() -> Result<Self> {
        Self::builder_from_env()?.build()
    }

    /// A builder pre-filled from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `ANTHROPIC_API_KEY` is not set.
    pub fn builder_from_env() -> Result<AnthropicClientBuilder> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| Error::config("ANTHROPIC_API_KEY environment variable not set"))?;

        let mut builder = Self::builder().api_key(api_key);
        if let Ok(base_url) = std::env::var("ANTHROPIC_BASE_URL") {
            builder = builder.base_url(base_url);
        }
        Ok(builder)
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the completion settings sent with each request.
    #[must_use]
    pub const fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(3);

        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("x-api-key", value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.anthropic_version) {
            headers.insert("anthropic-version", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        headers
    }

    fn build_request_body(&self, history: &ConversationHistory) -> Value {
        json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
            "messages": history,
        })
    }
}

/// Extract the reply text from a Messages API response body.
fn parse_reply(json: &Value) -> std::result::Result<String, RemoteError> {
    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(RemoteError::provider(PROVIDER, message));
    }

    json.get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| {
            blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .find_map(|block| block.get("text").and_then(Value::as_str))
        })
        .map(str::to_owned)
        .ok_or_else(|| RemoteError::response_format("a text content block", json.to_string()))
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    #[instrument(skip(self, history), fields(model = %self.settings.model, turns = history.len()))]
    async fn complete(
        &self,
        history: &ConversationHistory,
    ) -> std::result::Result<String, RemoteError> {
        let body = self.build_request_body(history);
        let url = format!("{}/v1/messages", self.base_url);

        debug!("Sending message to Anthropic API");
        let response = self
            .http_client
            .post(&url)
            .headers(self.auth_headers())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(
                PROVIDER,
                status.as_u16(),
                error_text,
            ));
        }

        let json: Value = response.json().await?;
        debug!("Received response from Anthropic API");
        parse_reply(&json)
    }
}

/// Builder for [`AnthropicClient`].
#[derive(Debug)]
pub struct AnthropicClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    anthropic_version: String,
    settings: CompletionSettings,
    timeout_secs: Option<u64>,
}

impl Default for AnthropicClientBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            anthropic_version: ANTHROPIC_VERSION.to_owned(),
            settings: CompletionSettings::default(),
            timeout_secs: None,
        }
    }
}

impl AnthropicClientBuilder {
    /// Set the API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set a custom base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the Anthropic API version.
    #[must_use]
    pub fn anthropic_version(mut self, version: impl Into<String>) -> Self {
        self.anthropic_version = version.into();
        self
    }

    /// Set the model, token limit and temperature.
    #[must_use]
    pub fn settings(mut self, settings: CompletionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub const fn timeout_secs(mut self, timeout: u64) -> Self {
        self.timeout_secs = Some(timeout);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no API key was set, or [`Error::Http`] if
    /// the HTTP client fails to build.
    pub fn build(self) -> Result<AnthropicClient> {
        let api_key = self
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::config("Anthropic API key is required"))?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| ANTHROPIC_API_BASE_URL.to_owned());

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        Ok(AnthropicClient {
            http_client: builder.build()?,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').into(),
            anthropic_version: self.anthropic_version.into(),
            settings: self.settings,
        })
    }
}
