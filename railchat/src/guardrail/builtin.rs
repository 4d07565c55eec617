//! Built-in checks and the catalog that resolves them by function name.
//!
//! The built-ins are deliberately simple stand-ins; real deployments register
//! their own [`GuardrailCheck`] implementations under new names.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::GuardrailError;

use super::{GuardrailCheck, SharedGuardrailCheck};

/// Number of characters of a message recorded by [`ConversationLogger`].
const LOG_PREVIEW_CHARS: usize = 20;

/// Rejects text containing any word from a deny list.
///
/// Matching is a case-insensitive substring search.
#[derive(Debug, Clone)]
pub struct ProfanityFilter {
    words: Vec<String>,
}

impl ProfanityFilter {
    /// Create a filter over the given deny list.
    #[must_use]
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|word| word.as_ref().to_lowercase())
                .filter(|word| !word.is_empty())
                .collect(),
        }
    }

    /// Returns the normalized deny list.
    #[must_use]
    pub fn words(&self) -> &[String] {
        &self.words
    }
}

impl Default for ProfanityFilter {
    fn default() -> Self {
        Self::new(["badword1", "badword2"])
    }
}

#[async_trait]
impl GuardrailCheck for ProfanityFilter {
    async fn check(&self, text: &str) -> Result<bool, GuardrailError> {
        debug!("Checking profanity");
        let lower = text.to_lowercase();
        Ok(!self.words.iter().any(|word| lower.contains(word.as_str())))
    }
}

/// Placeholder sentiment check that accepts every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentAnalysis;

#[async_trait]
impl GuardrailCheck for SentimentAnalysis {
    async fn check(&self, _text: &str) -> Result<bool, GuardrailError> {
        Ok(true)
    }
}

/// Records a short preview of each message in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationLogger;

#[async_trait]
impl GuardrailCheck for ConversationLogger {
    async fn check(&self, text: &str) -> Result<bool, GuardrailError> {
        let preview: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
        info!(%preview, "Logged conversation message");
        Ok(true)
    }
}

/// Accumulates message statistics.
#[derive(Debug, Default)]
pub struct UserStats {
    messages: AtomicU64,
    characters: AtomicU64,
}

/// A point-in-time copy of [`UserStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Messages seen.
    pub messages: u64,
    /// Characters seen across all messages.
    pub characters: u64,
}

impl UserStats {
    /// Read the current totals.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            characters: self.characters.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl GuardrailCheck for UserStats {
    async fn check(&self, text: &str) -> Result<bool, GuardrailError> {
        let characters = text.chars().count() as u64;
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.characters.fetch_add(characters, Ordering::Relaxed);
        info!(characters, "Updated user stats");
        Ok(true)
    }
}

/// Maps function identifiers used in configuration to check implementations.
#[derive(Clone, Default)]
pub struct CheckCatalog {
    checks: HashMap<String, SharedGuardrailCheck>,
    user_stats: Option<Arc<UserStats>>,
}

impl CheckCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the built-in checks with fresh statistics.
    ///
    /// | function            | check                  |
    /// |---------------------|------------------------|
    /// | `check_profanity`   | [`ProfanityFilter`]    |
    /// | `analyze_sentiment` | [`SentimentAnalysis`]  |
    /// | `log_to_database`   | [`ConversationLogger`] |
    /// | `update_stats`      | [`UserStats`]          |
    #[must_use]
    pub fn builtin() -> Self {
        Self::with_user_stats(Arc::new(UserStats::default()))
    }

    /// Catalog of the built-in checks recording into `stats`.
    #[must_use]
    pub fn with_user_stats(stats: Arc<UserStats>) -> Self {
        let mut catalog = Self::new()
            .with("check_profanity", ProfanityFilter::default())
            .with("analyze_sentiment", SentimentAnalysis)
            .with("log_to_database", ConversationLogger);
        catalog.insert("update_stats", Arc::clone(&stats) as SharedGuardrailCheck);
        catalog.user_stats = Some(stats);
        catalog
    }

    /// Add a check under `function`, replacing any previous entry.
    #[must_use]
    pub fn with(mut self, function: impl Into<String>, check: impl GuardrailCheck + 'static) -> Self {
        self.insert(function, Arc::new(check));
        self
    }

    /// Add a shared check under `function`, replacing any previous entry.
    pub fn insert(&mut self, function: impl Into<String>, check: SharedGuardrailCheck) {
        self.checks.insert(function.into(), check);
    }

    /// Look up the check registered for `function`.
    #[must_use]
    pub fn resolve(&self, function: &str) -> Option<SharedGuardrailCheck> {
        self.checks.get(function).map(Arc::clone)
    }

    /// The statistics collector behind `update_stats`, if this is a built-in
    /// catalog.
    #[must_use]
    pub const fn user_stats(&self) -> Option<&Arc<UserStats>> {
        self.user_stats.as_ref()
    }
}

impl fmt::Debug for CheckCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<_> = self.checks.keys().collect();
        functions.sort();
        f.debug_struct("CheckCatalog")
            .field("functions", &functions)
            .finish_non_exhaustive()
    }
}
