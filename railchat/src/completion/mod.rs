//! Remote completion clients.
//!
//! The orchestrator only needs one capability from the remote service: turn
//! the conversation so far into the next assistant reply. [`CompletionClient`]
//! is that seam; [`AnthropicClient`] talks to the Anthropic Messages API and
//! [`MockClient`] replays scripted replies for tests.

mod anthropic;
mod mock;

pub use anthropic::{
    ANTHROPIC_API_BASE_URL, ANTHROPIC_VERSION, AnthropicClient, AnthropicClientBuilder,
};
pub use mock::MockClient;

use std::sync::Arc;

use async_trait::async_trait;

use crate::conversation::ConversationHistory;
use crate::error::RemoteError;

/// A remote service producing the next assistant reply.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Produce a reply to the conversation so far.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] for network, authentication, rate-limit or
    /// malformed-response failures.
    async fn complete(&self, history: &ConversationHistory) -> Result<String, RemoteError>;
}

/// A shared, reference-counted completion client.
pub type SharedCompletionClient = Arc<dyn CompletionClient>;
