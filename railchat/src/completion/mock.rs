//! Scripted completion client for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::conversation::ConversationHistory;
use crate::error::RemoteError;

use super::CompletionClient;

/// A [`CompletionClient`] that replays queued responses in order.
///
/// Every call records the history it was given, so tests can assert what
/// reached the remote side. When the queue is empty, calls fail with an
/// internal error.
#[derive(Debug, Default)]
pub struct MockClient {
    responses: Mutex<VecDeque<Result<String, RemoteError>>>,
    requests: Mutex<Vec<ConversationHistory>>,
    latency: Option<Duration>,
}

impl MockClient {
    /// Create a client with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    #[must_use]
    pub fn reply(self, text: impl Into<String>) -> Self {
        lock(&self.responses).push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn fail(self, error: RemoteError) -> Self {
        lock(&self.responses).push_back(Err(error));
        self
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Histories received, one per call.
    #[must_use]
    pub fn requests(&self) -> Vec<ConversationHistory> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    async fn complete(&self, history: &ConversationHistory) -> Result<String, RemoteError> {
        lock(&self.requests).push(history.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::internal("mock script exhausted")))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;

    #[tokio::test]
    async fn test_replays_script_in_order() {
        let client = MockClient::new()
            .reply("first")
            .fail(RemoteError::network("timeout"));

        let mut history = ConversationHistory::new();
        history.push(Turn::user("hi"));

        assert_eq!(client.complete(&history).await.unwrap(), "first");
        assert_eq!(
            client.complete(&history).await.unwrap_err().message,
            "timeout"
        );
        assert!(client.complete(&history).await.is_err());
        assert_eq!(client.calls(), 3);
        assert_eq!(client.requests()[0].turns(), [Turn::user("hi")]);
    }
}
