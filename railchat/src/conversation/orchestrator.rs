//! Orchestrator: drives one guarded conversation turn at a time.
//!
//! Each turn moves through:
//!
//! 1. **Blocking inbound**: the user text is screened by the blocking group.
//!    A rejection returns the fixed rejection message and leaves history
//!    untouched.
//! 2. **Dispatched**: the user turn is appended and the whole history is sent
//!    to the completion client. A remote failure aborts the turn with an error;
//!    the user turn stays in history and only then may the turn be retried.
//! 3. **Blocking outbound**: the reply is screened by the blocking group. A
//!    rejected reply is discarded, never appended.
//! 4. **Non-blocking fire-and-forget**: the reply is appended, the
//!    non-blocking group is detached, and the reply is returned at once.

use std::fmt;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::completion::SharedCompletionClient;
use crate::error::{Error, Result};
use crate::guardrail::{GuardrailExecutor, GuardrailGroup};

use super::{ConversationHistory, Turn};

/// Message returned whenever a blocking guardrail rejects a turn.
pub const DEFAULT_REJECTION_MESSAGE: &str =
    "I'm sorry, but I can't process that message due to content restrictions.";

/// Which side of the exchange was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionStage {
    /// The user's message failed the blocking guardrails.
    Inbound,
    /// The assistant's reply failed the blocking guardrails.
    Outbound,
}

/// The user-visible result of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply passed every blocking guardrail.
    Reply(String),
    /// A blocking guardrail rejected the message or the reply.
    Rejected {
        /// Where the rejection happened.
        stage: RejectionStage,
        /// The fixed rejection message to show.
        message: String,
    },
}

impl TurnOutcome {
    /// The text to show the user.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Reply(text) => text,
            Self::Rejected { message, .. } => message,
        }
    }

    /// Returns `true` if a guardrail rejected the turn.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

#[derive(Debug, Clone, Copy)]
enum TurnState {
    BlockingInbound,
    Dispatched,
    BlockingOutbound,
    NonBlockingFireAndForget,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BlockingInbound => "blocking_inbound",
            Self::Dispatched => "dispatched",
            Self::BlockingOutbound => "blocking_outbound",
            Self::NonBlockingFireAndForget => "non_blocking",
        })
    }
}

/// History plus whether the last dispatch failed remotely.
#[derive(Debug, Default)]
struct Session {
    history: ConversationHistory,
    retry_pending: bool,
}

/// Owns one conversation and wraps every turn in guardrails.
///
/// Turns are serialized: a second call to [`handle_turn`](Self::handle_turn)
/// waits until the first has finished with the history.
pub struct Orchestrator {
    executor: GuardrailExecutor,
    client: SharedCompletionClient,
    session: Mutex<Session>,
    rejection_message: String,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("executor", &self.executor)
            .field("rejection_message", &self.rejection_message)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator with an empty history.
    #[must_use]
    pub fn new(executor: GuardrailExecutor, client: SharedCompletionClient) -> Self {
        Self {
            executor,
            client,
            session: Mutex::new(Session::default()),
            rejection_message: DEFAULT_REJECTION_MESSAGE.to_owned(),
        }
    }

    /// Replace the message returned on rejection.
    #[must_use]
    pub fn with_rejection_message(mut self, message: impl Into<String>) -> Self {
        self.rejection_message = message.into();
        self
    }

    /// Returns the guardrail executor.
    #[must_use]
    pub const fn executor(&self) -> &GuardrailExecutor {
        &self.executor
    }

    /// A snapshot of the conversation history.
    pub async fn history(&self) -> ConversationHistory {
        self.session.lock().await.history.clone()
    }

    /// Process one user message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] if the completion client fails. Guardrail
    /// rejections are not errors; they come back as
    /// [`TurnOutcome::Rejected`].
    pub async fn handle_turn(&self, text: &str) -> Result<TurnOutcome> {
        let mut session = self.session.lock().await;

        debug!(state = %TurnState::BlockingInbound, "Turn started");
        let inbound = self.executor.evaluate(text, GuardrailGroup::Blocking).await;
        if !inbound.passed() {
            let rejected_by: Vec<_> = inbound.rejected_by().collect();
            info!(?rejected_by, "User message rejected by guardrails");
            return Ok(self.reject(RejectionStage::Inbound));
        }

        session.history.push(Turn::user(text));
        self.dispatch(&mut session).await
    }

    /// Re-send the pending user message after a failed remote call.
    ///
    /// Only a remote failure arms a retry. A reply discarded by the outbound
    /// guardrails is not regenerated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NothingToRetry`] if the last dispatch did not fail
    /// remotely, or [`Error::Remote`] if the completion client fails again.
    pub async fn retry_turn(&self) -> Result<TurnOutcome> {
        let mut session = self.session.lock().await;
        if !session.retry_pending || !session.history.awaiting_reply() {
            return Err(Error::NothingToRetry);
        }
        debug!("Retrying pending user message");
        self.dispatch(&mut session).await
    }

    /// Wait up to `timeout` for detached guardrails to finish.
    ///
    /// Returns the number of guardrails that were still running and had to be
    /// aborted.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        self.executor.drain(timeout).await
    }

    async fn dispatch(&self, session: &mut Session) -> Result<TurnOutcome> {
        let history = &session.history;
        debug!(state = %TurnState::Dispatched, turns = history.len(), "Calling completion client");
        let reply = self.client.complete(history).await;
        session.retry_pending = reply.is_err();
        let reply = reply.map_err(|e| {
            error!(error = %e, "Completion request failed");
            Error::Remote(e)
        })?;

        debug!(state = %TurnState::BlockingOutbound, "Checking reply");
        let outbound = self
            .executor
            .evaluate(&reply, GuardrailGroup::Blocking)
            .await;
        if !outbound.passed() {
            let rejected_by: Vec<_> = outbound.rejected_by().collect();
            info!(?rejected_by, "Assistant reply rejected by guardrails");
            return Ok(self.reject(RejectionStage::Outbound));
        }

        session.history.push(Turn::assistant(reply.as_str()));

        debug!(state = %TurnState::NonBlockingFireAndForget, "Reply accepted");
        self.executor
            .evaluate(&reply, GuardrailGroup::NonBlocking)
            .await;

        Ok(TurnOutcome::Reply(reply))
    }

    fn reject(&self, stage: RejectionStage) -> TurnOutcome {
        TurnOutcome::Rejected {
            stage,
            message: self.rejection_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::completion::MockClient;
    use crate::conversation::Role;
    use crate::error::{GuardrailError, RemoteError};
    use crate::guardrail::{GuardrailRegistry, async_check_fn, check_fn};

    fn no_badword_registry() -> GuardrailRegistry {
        let mut registry = GuardrailRegistry::new();
        registry
            .register(
                GuardrailGroup::Blocking,
                "no-badword",
                check_fn(|text| Ok(!text.contains("badword1"))),
            )
            .unwrap();
        registry
    }

    fn orchestrator(registry: GuardrailRegistry, client: &Arc<MockClient>) -> Orchestrator {
        let executor = GuardrailExecutor::new(Arc::new(registry));
        Orchestrator::new(executor, Arc::clone(client) as SharedCompletionClient)
    }

    #[tokio::test]
    async fn test_rejected_user_message_is_not_recorded() {
        let client = Arc::new(MockClient::new().reply("unused"));
        let orchestrator = orchestrator(no_badword_registry(), &client);

        let outcome = orchestrator.handle_turn("hello badword1").await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Rejected {
                stage: RejectionStage::Inbound,
                message: DEFAULT_REJECTION_MESSAGE.to_owned(),
            }
        );
        assert!(orchestrator.history().await.is_empty());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_registry_passes_everything_through() {
        let client = Arc::new(MockClient::new().reply("sure"));
        let orchestrator = orchestrator(GuardrailRegistry::new(), &client);

        let outcome = orchestrator.handle_turn("hello badword1").await.unwrap();

        assert_eq!(outcome, TurnOutcome::Reply("sure".to_owned()));
        assert_eq!(client.calls(), 1);
        assert_eq!(
            client.requests()[0].turns(),
            [Turn::user("hello badword1")]
        );
    }

    #[tokio::test]
    async fn test_accepted_turn_is_recorded() {
        let client = Arc::new(MockClient::new().reply("Hi!").reply("Fine, thanks."));
        let orchestrator = orchestrator(no_badword_registry(), &client);

        assert_eq!(orchestrator.handle_turn("hello").await.unwrap().text(), "Hi!");
        orchestrator.handle_turn("how are you?").await.unwrap();

        let history = orchestrator.history().await;
        assert_eq!(
            history.turns(),
            [
                Turn::user("hello"),
                Turn::assistant("Hi!"),
                Turn::user("how are you?"),
                Turn::assistant("Fine, thanks."),
            ]
        );
        // The second request carried the full conversation so far.
        assert_eq!(client.requests()[1].len(), 3);
    }

    #[tokio::test]
    async fn test_rejected_reply_is_discarded() {
        let client = Arc::new(MockClient::new().reply("here is badword1"));
        let orchestrator = orchestrator(no_badword_registry(), &client);

        let outcome = orchestrator.handle_turn("say something rude").await.unwrap();

        assert!(outcome.is_rejected());
        assert!(matches!(
            outcome,
            TurnOutcome::Rejected {
                stage: RejectionStage::Outbound,
                ..
            }
        ));
        let history = orchestrator.history().await;
        assert_eq!(history.turns(), [Turn::user("say something rude")]);
    }

    #[tokio::test]
    async fn test_remote_failure_is_distinct_from_rejection() {
        let client = Arc::new(MockClient::new().fail(RemoteError::network("timeout")));
        let orchestrator = orchestrator(no_badword_registry(), &client);

        let err = orchestrator.handle_turn("hello").await.unwrap_err();

        assert!(err.is_remote());
        let history = orchestrator.history().await;
        assert_eq!(history.count(Role::User), 1);
        assert_eq!(history.count(Role::Assistant), 0);
    }

    #[tokio::test]
    async fn test_retry_after_remote_failure() {
        let client = Arc::new(
            MockClient::new()
                .fail(RemoteError::network("timeout"))
                .reply("recovered"),
        );
        let orchestrator = orchestrator(no_badword_registry(), &client);

        assert!(orchestrator.handle_turn("hello").await.is_err());
        let outcome = orchestrator.retry_turn().await.unwrap();

        assert_eq!(outcome, TurnOutcome::Reply("recovered".to_owned()));
        assert_eq!(
            orchestrator.history().await.turns(),
            [Turn::user("hello"), Turn::assistant("recovered")]
        );
        assert!(matches!(
            orchestrator.retry_turn().await,
            Err(Error::NothingToRetry)
        ));
    }

    #[tokio::test]
    async fn test_rejected_reply_is_not_regenerated_by_retry() {
        let client = Arc::new(
            MockClient::new()
                .reply("badword1 reply")
                .reply("regenerated"),
        );
        let orchestrator = orchestrator(no_badword_registry(), &client);

        let outcome = orchestrator.handle_turn("hello").await.unwrap();
        assert!(matches!(
            outcome,
            TurnOutcome::Rejected {
                stage: RejectionStage::Outbound,
                ..
            }
        ));

        assert!(matches!(
            orchestrator.retry_turn().await,
            Err(Error::NothingToRetry)
        ));
        assert_eq!(client.calls(), 1);
        assert_eq!(orchestrator.history().await.turns(), [Turn::user("hello")]);
    }

    #[tokio::test]
    async fn test_new_message_after_failures_follows_pending_turn() {
        let client = Arc::new(
            MockClient::new()
                .reply("badword1 reply")
                .fail(RemoteError::network("timeout"))
                .reply("answer"),
        );
        let orchestrator = orchestrator(no_badword_registry(), &client);

        assert!(orchestrator.handle_turn("first").await.unwrap().is_rejected());
        assert!(orchestrator.handle_turn("second").await.is_err());
        let outcome = orchestrator.handle_turn("third").await.unwrap();
        assert_eq!(outcome.text(), "answer");

        assert_eq!(
            orchestrator.history().await.turns(),
            [
                Turn::user("first"),
                Turn::user("second"),
                Turn::user("third"),
                Turn::assistant("answer"),
            ]
        );
        // The last request carried every pending user turn.
        assert_eq!(client.requests()[2].len(), 3);
    }

    #[tokio::test]
    async fn test_retry_without_pending_message() {
        let client = Arc::new(MockClient::new());
        let orchestrator = orchestrator(GuardrailRegistry::new(), &client);

        assert!(matches!(
            orchestrator.retry_turn().await,
            Err(Error::NothingToRetry)
        ));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_blocking_check_error_rejects_turn() {
        let mut registry = GuardrailRegistry::new();
        registry
            .register(
                GuardrailGroup::Blocking,
                "flaky",
                check_fn(|_| Err(GuardrailError::check("classifier offline"))),
            )
            .unwrap();
        let client = Arc::new(MockClient::new().reply("unused"));
        let orchestrator = orchestrator(registry, &client);

        let outcome = orchestrator.handle_turn("hello").await.unwrap();

        assert!(outcome.is_rejected());
        assert!(orchestrator.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_blocking_runs_on_reply_only() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let slow_done = Arc::new(AtomicUsize::new(0));

        let mut registry = GuardrailRegistry::new();
        let recorder = Arc::clone(&seen);
        registry
            .register(
                GuardrailGroup::NonBlocking,
                "record",
                check_fn(move |text| {
                    recorder.lock().unwrap().push(text.to_owned());
                    Ok(true)
                }),
            )
            .unwrap();
        let done = Arc::clone(&slow_done);
        registry
            .register(
                GuardrailGroup::NonBlocking,
                "slow",
                async_check_fn(move |_| {
                    let done = Arc::clone(&done);
                    async move {
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        done.fetch_add(1, Ordering::SeqCst);
                        Ok(true)
                    }
                }),
            )
            .unwrap();

        let client = Arc::new(MockClient::new().reply("the reply"));
        let orchestrator = orchestrator(registry, &client);

        let start = std::time::Instant::now();
        let outcome = orchestrator.handle_turn("the question").await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(200));
        assert_eq!(outcome.text(), "the reply");
        assert_eq!(slow_done.load(Ordering::SeqCst), 0);

        assert_eq!(orchestrator.shutdown(Duration::from_secs(5)).await, 0);
        assert_eq!(slow_done.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["the reply".to_owned()]);
    }

    #[tokio::test]
    async fn test_custom_rejection_message() {
        let client = Arc::new(MockClient::new());
        let orchestrator =
            orchestrator(no_badword_registry(), &client).with_rejection_message("Nope.");

        let outcome = orchestrator.handle_turn("badword1").await.unwrap();
        assert_eq!(outcome.text(), "Nope.");
    }

    #[tokio::test]
    async fn test_turns_are_serialized() {
        let client = Arc::new(
            MockClient::new()
                .reply("one")
                .reply("two")
                .with_latency(Duration::from_millis(20)),
        );
        let orchestrator = Arc::new(orchestrator(GuardrailRegistry::new(), &client));

        let first = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.handle_turn("a").await }
        });
        let second = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.handle_turn("b").await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let history = orchestrator.history().await;
        let roles: Vec<_> = history.iter().map(|turn| turn.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }
}
