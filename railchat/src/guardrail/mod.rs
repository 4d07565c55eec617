//! Guardrail module: named checks wrapped around every message.
//!
//! Guardrails are validation or side-effect checks run against a piece of
//! text. Each check belongs to one of two groups:
//!
//! - **[`GuardrailGroup::Blocking`]**: all checks run concurrently and the
//!   caller waits for every one of them. The text passes only if every check
//!   returns `true`. A check that errors, panics or times out counts as `false`.
//! - **[`GuardrailGroup::NonBlocking`]**: checks are detached onto background
//!   tasks. The caller never waits and the group always passes; failures are
//!   only logged.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use railchat::guardrail::{GuardrailExecutor, GuardrailGroup, GuardrailRegistry, check_fn};
//!
//! let mut registry = GuardrailRegistry::new();
//! registry.register(
//!     GuardrailGroup::Blocking,
//!     "no-secrets",
//!     check_fn(|text| Ok(!text.contains("sk-"))),
//! )?;
//!
//! let executor = GuardrailExecutor::new(Arc::new(registry));
//! let verdict = executor.evaluate("hello", GuardrailGroup::Blocking).await;
//! assert!(verdict.passed());
//! ```

mod builtin;
mod executor;
mod registry;

pub use builtin::{
    CheckCatalog, ConversationLogger, ProfanityFilter, SentimentAnalysis, StatsSnapshot,
    UserStats,
};
pub use executor::GuardrailExecutor;
pub use registry::GuardrailRegistry;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GuardrailError;

/// The two guardrail groups and their execution semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailGroup {
    /// Awaited; the verdict gates the conversation.
    Blocking,
    /// Detached; observability and side effects only.
    NonBlocking,
}

impl GuardrailGroup {
    /// Both groups in enumeration order.
    pub const ALL: [Self; 2] = [Self::Blocking, Self::NonBlocking];

    /// Configuration key for this group.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::NonBlocking => "non_blocking",
        }
    }
}

impl fmt::Display for GuardrailGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for implementing guardrail check logic.
///
/// Return `Ok(true)` when the text passes, `Ok(false)` when it does not, and
/// `Err` when the check itself could not run. Checks must be cheap to share:
/// the same instance may be invoked concurrently for different texts.
#[async_trait]
pub trait GuardrailCheck: Send + Sync {
    /// Check the text.
    async fn check(&self, text: &str) -> Result<bool, GuardrailError>;
}

/// A shared, type-erased guardrail check.
pub type SharedGuardrailCheck = Arc<dyn GuardrailCheck>;

/// Adapter turning a synchronous closure into a [`GuardrailCheck`].
///
/// Built with [`check_fn`].
#[derive(Clone, Copy)]
pub struct FnCheck<F>(F);

/// Wrap a synchronous predicate as a guardrail check.
pub const fn check_fn<F>(f: F) -> FnCheck<F>
where
    F: Fn(&str) -> Result<bool, GuardrailError> + Send + Sync,
{
    FnCheck(f)
}

#[async_trait]
impl<F> GuardrailCheck for FnCheck<F>
where
    F: Fn(&str) -> Result<bool, GuardrailError> + Send + Sync,
{
    async fn check(&self, text: &str) -> Result<bool, GuardrailError> {
        (self.0)(text)
    }
}

impl<F> fmt::Debug for FnCheck<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCheck").finish_non_exhaustive()
    }
}

/// Adapter turning an async closure into a [`GuardrailCheck`].
///
/// Built with [`async_check_fn`]. The closure receives an owned copy of the
/// text so the returned future can be `'static`.
#[derive(Clone, Copy)]
pub struct AsyncFnCheck<F>(F);

/// Wrap an async function as a guardrail check.
pub const fn async_check_fn<F, Fut>(f: F) -> AsyncFnCheck<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, GuardrailError>> + Send,
{
    AsyncFnCheck(f)
}

#[async_trait]
impl<F, Fut> GuardrailCheck for AsyncFnCheck<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, GuardrailError>> + Send,
{
    async fn check(&self, text: &str) -> Result<bool, GuardrailError> {
        (self.0)(text.to_owned()).await
    }
}

impl<F> fmt::Debug for AsyncFnCheck<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnCheck").finish_non_exhaustive()
    }
}

/// A named check registered in one group.
///
/// Immutable once registered; cloning shares the underlying check.
#[derive(Clone)]
pub struct CheckDefinition {
    name: String,
    check: SharedGuardrailCheck,
}

impl CheckDefinition {
    /// Create a definition from a name and a shared check.
    #[must_use]
    pub fn new(name: impl Into<String>, check: SharedGuardrailCheck) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }

    /// Returns the name of this check.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the check implementation.
    #[must_use]
    pub const fn check(&self) -> &SharedGuardrailCheck {
        &self.check
    }
}

impl fmt::Debug for CheckDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The result of one check within a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Name of the check that produced this outcome.
    pub name: String,

    /// Whether the check passed. Always `false` when `error` is set.
    pub passed: bool,

    /// The failure raised by the check, if any.
    pub error: Option<GuardrailError>,
}

impl CheckOutcome {
    pub(crate) fn from_result(name: &str, result: Result<bool, GuardrailError>) -> Self {
        match result {
            Ok(passed) => Self {
                name: name.to_owned(),
                passed,
                error: None,
            },
            Err(error) => Self {
                name: name.to_owned(),
                passed: false,
                error: Some(error),
            },
        }
    }
}

/// The reduced outcome of running one group against one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardrailVerdict {
    /// The group that was evaluated.
    pub group: GuardrailGroup,

    /// Per-check outcomes in registry order. Empty for the non-blocking
    /// group, whose checks report in the background.
    pub outcomes: Vec<CheckOutcome>,

    /// Number of checks launched in the background.
    pub detached: usize,
}

impl GuardrailVerdict {
    pub(crate) const fn empty(group: GuardrailGroup) -> Self {
        Self {
            group,
            outcomes: Vec::new(),
            detached: 0,
        }
    }

    /// Returns `true` if every awaited check passed.
    ///
    /// Vacuously `true` for an empty group and for the non-blocking group.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.passed)
    }

    /// The boolean results in registry order.
    #[must_use]
    pub fn results(&self) -> Vec<bool> {
        self.outcomes.iter().map(|outcome| outcome.passed).collect()
    }

    /// Checks that failed internally rather than returning `false`.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &GuardrailError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.error.as_ref().map(|e| (outcome.name.as_str(), e)))
    }

    /// Names of checks that did not pass.
    pub fn rejected_by(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.passed)
            .map(|outcome| outcome.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_serde_names() {
        assert_eq!(
            serde_json::to_string(&GuardrailGroup::NonBlocking).unwrap(),
            "\"non_blocking\""
        );
        let group: GuardrailGroup = serde_json::from_str("\"blocking\"").unwrap();
        assert_eq!(group, GuardrailGroup::Blocking);
        assert_eq!(GuardrailGroup::NonBlocking.to_string(), "non_blocking");
    }

    #[test]
    fn test_empty_verdict_passes() {
        let verdict = GuardrailVerdict::empty(GuardrailGroup::Blocking);
        assert!(verdict.passed());
        assert!(verdict.results().is_empty());
    }

    #[test]
    fn test_verdict_with_failure() {
        let verdict = GuardrailVerdict {
            group: GuardrailGroup::Blocking,
            outcomes: vec![
                CheckOutcome::from_result("a", Ok(true)),
                CheckOutcome::from_result("b", Err(GuardrailError::check("boom"))),
            ],
            detached: 0,
        };
        assert!(!verdict.passed());
        assert_eq!(verdict.results(), vec![true, false]);
        assert_eq!(verdict.rejected_by().collect::<Vec<_>>(), vec!["b"]);
        let failures: Vec<_> = verdict.failures().collect();
        assert_eq!(failures, vec![("b", &GuardrailError::check("boom"))]);
    }

    #[tokio::test]
    async fn test_closure_adapters() {
        let sync_check = check_fn(|text| Ok(text.len() < 5));
        assert!(sync_check.check("hi").await.unwrap());
        assert!(!sync_check.check("too long").await.unwrap());

        let async_check = async_check_fn(|text: String| async move {
            if text.is_empty() {
                Err(GuardrailError::check("empty"))
            } else {
                Ok(true)
            }
        });
        assert!(async_check.check("x").await.unwrap());
        assert!(async_check.check("").await.is_err());
    }
}
