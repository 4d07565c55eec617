//! Guardrail executor: runs a group of checks and reduces them to a verdict.
//!
//! Blocking checks fan out onto one task each and fan back in once every task
//! has reported; there is no short-circuit. Non-blocking checks are spawned
//! as detached tasks and never awaited by the caller. Their handles are kept
//! so shutdown can wait for them with a bound. Dropping the executor does not
//! cancel them.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::error::GuardrailError;

use super::{CheckOutcome, GuardrailCheck, GuardrailGroup, GuardrailRegistry, GuardrailVerdict};

/// Runs registered guardrails against text.
///
/// Cloning is cheap and clones share the same registry and the same set of
/// detached tasks.
#[derive(Debug, Clone)]
pub struct GuardrailExecutor {
    registry: Arc<GuardrailRegistry>,
    check_timeout: Option<Duration>,
    detached: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl GuardrailExecutor {
    /// Create an executor over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<GuardrailRegistry>) -> Self {
        Self {
            registry,
            check_timeout: None,
            detached: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Bound the runtime of every check.
    ///
    /// A check that exceeds the limit is treated as failed with
    /// [`GuardrailError::TimedOut`].
    #[must_use]
    pub const fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = Some(timeout);
        self
    }

    /// Returns the registry this executor reads from.
    #[must_use]
    pub const fn registry(&self) -> &Arc<GuardrailRegistry> {
        &self.registry
    }

    /// Evaluate every check in `group` against `text`.
    ///
    /// For [`GuardrailGroup::Blocking`] this waits for all checks. For
    /// [`GuardrailGroup::NonBlocking`] it returns as soon as the checks have
    /// been spawned, with a passing verdict.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn evaluate(&self, text: &str, group: GuardrailGroup) -> GuardrailVerdict {
        if self.registry.checks_for(group).is_empty() {
            return GuardrailVerdict::empty(group);
        }

        match group {
            GuardrailGroup::Blocking => self.evaluate_blocking(text).await,
            GuardrailGroup::NonBlocking => self.spawn_detached(text),
        }
    }

    /// Number of detached checks that have not finished yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        let mut tasks = self.detached_tasks();
        tasks.retain(|handle| !handle.is_finished());
        tasks.len()
    }

    /// Wait up to `timeout` for detached checks to finish.
    ///
    /// Returns the number of checks still running when the timeout elapsed;
    /// those are aborted.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let tasks = std::mem::take(&mut *self.detached_tasks());
        if tasks.is_empty() {
            return 0;
        }

        debug!(pending = tasks.len(), ?timeout, "Draining detached guardrails");
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut remaining = 0;
        for mut handle in tasks {
            // Biased so handles that already finished are collected past the deadline.
            tokio::select! {
                biased;
                joined = &mut handle => log_detached_exit(joined),
                () = &mut deadline => {
                    handle.abort();
                    remaining += 1;
                }
            }
        }

        if remaining > 0 {
            warn!(remaining, "Detached guardrails still running at shutdown, aborted");
        }
        remaining
    }

    async fn evaluate_blocking(&self, text: &str) -> GuardrailVerdict {
        let checks = self.registry.checks_for(GuardrailGroup::Blocking);
        let text: Arc<str> = Arc::from(text);

        let handles: Vec<_> = checks
            .iter()
            .map(|definition| {
                let check = Arc::clone(definition.check());
                let text = Arc::clone(&text);
                let timeout = self.check_timeout;
                tokio::spawn(async move { run_check(check.as_ref(), &text, timeout).await })
            })
            .collect();

        let joined = futures::future::join_all(handles).await;

        let outcomes: Vec<CheckOutcome> = checks
            .iter()
            .zip(joined)
            .map(|(definition, joined)| {
                let result = joined.unwrap_or_else(|e| Err(join_error(&e)));
                match &result {
                    Ok(true) => debug!(guardrail = definition.name(), "Guardrail passed"),
                    Ok(false) => info!(guardrail = definition.name(), "Guardrail rejected text"),
                    Err(e) => warn!(guardrail = definition.name(), error = %e, "Guardrail failed"),
                }
                CheckOutcome::from_result(definition.name(), result)
            })
            .collect();

        GuardrailVerdict {
            group: GuardrailGroup::Blocking,
            outcomes,
            detached: 0,
        }
    }

    fn spawn_detached(&self, text: &str) -> GuardrailVerdict {
        let checks = self.registry.checks_for(GuardrailGroup::NonBlocking);
        let text: Arc<str> = Arc::from(text);
        let mut tasks = self.detached_tasks();
        tasks.retain(|handle| !handle.is_finished());

        for definition in checks {
            let check = Arc::clone(definition.check());
            let name = definition.name().to_owned();
            let text = Arc::clone(&text);
            let timeout = self.check_timeout;
            tasks.push(tokio::spawn(async move {
                let result = AssertUnwindSafe(run_check(check.as_ref(), &text, timeout))
                    .catch_unwind()
                    .await
                    .unwrap_or(Err(GuardrailError::Panicked));
                match result {
                    Ok(true) => debug!(guardrail = %name, "Detached guardrail completed"),
                    Ok(false) => info!(guardrail = %name, "Detached guardrail reported false"),
                    Err(e) => warn!(guardrail = %name, error = %e, "Detached guardrail failed"),
                }
            }));
        }

        debug!(count = checks.len(), "Spawned detached guardrails");
        GuardrailVerdict {
            group: GuardrailGroup::NonBlocking,
            outcomes: Vec::new(),
            detached: checks.len(),
        }
    }

    fn detached_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.detached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_check(
    check: &dyn GuardrailCheck,
    text: &str,
    timeout: Option<Duration>,
) -> Result<bool, GuardrailError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, check.check(text))
            .await
            .map_err(|_| GuardrailError::TimedOut(limit))?,
        None => check.check(text).await,
    }
}

fn join_error(err: &JoinError) -> GuardrailError {
    if err.is_panic() {
        GuardrailError::Panicked
    } else {
        GuardrailError::Cancelled
    }
}

fn log_detached_exit(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        warn!(error = %join_error(&e), "Detached guardrail task did not complete");
    }
}
