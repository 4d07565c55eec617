//! Configuration types.
//!
//! [`GuardrailConfig`] names which checks run in each group, and
//! [`CompletionSettings`] carries the pass-through parameters for the remote
//! completion call.
//!
//! A guardrail configuration file is JSON:
//!
//! ```json
//! {
//!   "blocking": [
//!     { "name": "profanity_filter", "function": "check_profanity" }
//!   ],
//!   "non_blocking": [
//!     { "name": "log_conversation", "function": "log_to_database" }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::guardrail::GuardrailGroup;

/// Default model identifier for remote completions.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";

/// Default maximum number of output tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// One configured guardrail: a unique name bound to a catalog function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailEntry {
    /// Name of the guardrail, unique within its group.
    pub name: String,
    /// Catalog identifier of the check implementation.
    pub function: String,
}

impl GuardrailEntry {
    /// Create an entry.
    #[must_use]
    pub fn new(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
        }
    }
}

/// Which guardrails run in each group, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Guardrails that gate the conversation.
    #[serde(default)]
    pub blocking: Vec<GuardrailEntry>,
    /// Guardrails fired in the background.
    #[serde(default)]
    pub non_blocking: Vec<GuardrailEntry>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            blocking: vec![
                GuardrailEntry::new("profanity_filter", "check_profanity"),
                GuardrailEntry::new("sentiment_analysis", "analyze_sentiment"),
            ],
            non_blocking: vec![
                GuardrailEntry::new("log_conversation", "log_to_database"),
                GuardrailEntry::new("update_user_stats", "update_stats"),
            ],
        }
    }
}

impl GuardrailConfig {
    /// A configuration with no guardrails at all.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            blocking: Vec::new(),
            non_blocking: Vec::new(),
        }
    }

    /// Parse a configuration from JSON text.
    ///
    /// Missing groups default to empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the text is not a valid
    /// configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be read, or
    /// [`Error::Json`](crate::Error::Json) if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Entries configured for `group`.
    #[must_use]
    pub fn entries(&self, group: GuardrailGroup) -> &[GuardrailEntry] {
        match group {
            GuardrailGroup::Blocking => &self.blocking,
            GuardrailGroup::NonBlocking => &self.non_blocking,
        }
    }
}

/// Parameters passed through unchanged to the remote completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSettings {
    /// Model identifier.
    pub model: String,
    /// Maximum number of output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl CompletionSettings {
    /// Set the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the maximum number of output tokens.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}
